use serde_json::json;

use super::{count_rows, payload};
use crate::{Config, Store, WriteAction};

fn file_store(dir: &tempfile::TempDir) -> Store {
    let config = Config {
        database_url: dir.path().join("scouting.db").display().to_string(),
        max_connections: 4,
        ..Config::default()
    };
    Store::from_config(&config).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_first_upserts_make_one_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);

    let tasks = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .upsert_team(payload(json!({
                        "teamNumber": 2910,
                        "notes": format!("writer {i}"),
                    })))
                    .await
            })
        })
        .collect::<Vec<_>>();

    let mut inserted = 0;
    let mut ids = Vec::new();
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        if outcome.action == WriteAction::Inserted {
            inserted += 1;
        }
        ids.push(outcome.stored.id);
    }

    assert_eq!(inserted, 1);
    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(count_rows(&store, "teams"), 1);

    let stored = store.fetch_team(2910).await.unwrap().unwrap();
    assert!(stored.record.notes.starts_with("writer "));
}

#[tokio::test]
async fn stores_share_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let a = file_store(&dir);
    let b = file_store(&dir);

    a.upsert_match(payload(json!({"matchNumber": 1, "teamNumber": 4414})))
        .await
        .unwrap();
    let seen = b.list_matches(Some(4414)).await.unwrap();
    assert_eq!(seen.len(), 1);
}
