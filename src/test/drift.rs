//! Tables which do not look the way this crate would have created them.

use serde_json::json;

use super::{execute, memory_store, payload, teams_ddl};
use crate::probe::ListColumnType;
use crate::records::Team;
use crate::strategy::StrategyKind;
use crate::WriteAction;

#[tokio::test]
async fn stale_probe_falls_through_to_json() {
    let store = memory_store();
    let first = store
        .upsert_team(payload(json!({"teamNumber": 1, "coralLevels": ["L1"]})))
        .await
        .unwrap();
    assert_eq!(first.strategy, StrategyKind::Orm);

    // Someone migrates the table behind our back.
    execute(&store, "DROP TABLE teams");
    execute(
        &store,
        &teams_ddl(
            "JSON NOT NULL DEFAULT '[]' CHECK (coral_levels LIKE '[%]')",
        ),
    );

    let body = json!({"teamNumber": 2, "coralLevels": ["L2", "L4"]});
    let demoted = store.upsert_team(payload(body.clone())).await.unwrap();
    assert_eq!(demoted.strategy, StrategyKind::RawJson);
    assert_eq!(demoted.action, WriteAction::Inserted);
    assert_eq!(demoted.stored.record.coral_levels, vec!["L2", "L4"]);

    // The failed attempts dropped the cached probe, so the next write sees
    // the JSON column and the ORM gets it right again.
    let recovered = store.upsert_team(payload(body)).await.unwrap();
    assert_eq!(recovered.strategy, StrategyKind::Orm);
    assert_eq!(recovered.action, WriteAction::Updated);
    assert_eq!(recovered.stored.id, demoted.stored.id);
    assert_eq!(recovered.stored.record, demoted.stored.record);

    let info = store.probe::<Team>().await.unwrap();
    assert_eq!(info.list_column_type, ListColumnType::Json);
}

#[tokio::test]
async fn plain_text_lists_are_comma_separated() {
    let store = memory_store();
    execute(
        &store,
        "CREATE TABLE matches (id INTEGER PRIMARY KEY, match_number INTEGER, \
         team_number INTEGER, coral_levels TEXT)",
    );

    let outcome = store
        .upsert_match(payload(json!({
            "matchNumber": 4,
            "teamNumber": 118,
            "coralLevels": "[\"L3\", \"L4\"]",
        })))
        .await
        .unwrap();
    assert_eq!(outcome.stored.record.coral_levels, vec!["L3", "L4"]);

    let info = store.probe::<crate::Match>().await.unwrap();
    assert_eq!(info.list_column_type, ListColumnType::DelimitedText);
    assert!(info.has_column("created_at"));
}

#[tokio::test]
async fn legacy_rows_without_timestamps_are_still_updated() {
    let store = memory_store();
    execute(
        &store,
        "CREATE TABLE teams (id INTEGER PRIMARY KEY, team_number INTEGER, \
         coral_levels TEXT ARRAY, notes TEXT)",
    );
    execute(
        &store,
        "INSERT INTO teams (team_number, coral_levels, notes) \
         VALUES (604, '{\"L1\"}', 'from last season')",
    );

    let outcome = store
        .upsert_team(payload(json!({"teamNumber": 604, "notes": "rebuilt"})))
        .await
        .unwrap();

    // The healed timestamp columns are NULL for the old row, which the ORM
    // cannot read.
    assert_ne!(outcome.strategy, StrategyKind::Orm);
    assert_eq!(outcome.action, WriteAction::Updated);
    assert_eq!(outcome.stored.id, 1);
    assert_eq!(outcome.stored.created_at, None);
    assert!(outcome.stored.updated_at.is_some());
    assert_eq!(outcome.stored.record.notes, "rebuilt");
    assert!(outcome.stored.record.coral_levels.is_empty());

    let fetched = store.fetch_team(604).await.unwrap().unwrap();
    assert_eq!(fetched.record, outcome.stored.record);
}

#[tokio::test]
async fn reprobe_sees_new_columns() {
    let store = memory_store();
    execute(
        &store,
        "CREATE TABLE teams (id INTEGER PRIMARY KEY, team_number INTEGER)",
    );
    let before = store.probe::<Team>().await.unwrap();
    assert!(before.has_column("coral_levels"));
    assert_eq!(before.list_column_type, ListColumnType::NativeArray);

    execute(&store, "DROP TABLE teams");
    let cached = store.probe::<Team>().await.unwrap();
    assert_eq!(cached, before);

    let after = store.reprobe::<Team>().await.unwrap();
    assert!(after.exists);
    assert!(after.has_column("created_at"));
}

#[tokio::test]
async fn lists_plain_text_cannot_hold_are_kept_intact() {
    let store = memory_store();
    execute(
        &store,
        "CREATE TABLE teams (id INTEGER PRIMARY KEY, team_number INTEGER, \
         coral_levels TEXT)",
    );
    let levels = vec!["L2,L3 combo".to_string(), " L4".to_string()];

    let outcome = store
        .upsert_team(payload(json!({"teamNumber": 1334, "coralLevels": levels})))
        .await
        .unwrap();
    assert_ne!(outcome.strategy, StrategyKind::Orm);
    assert_eq!(outcome.stored.record.coral_levels, levels);

    let fetched = store.fetch_team(1334).await.unwrap().unwrap();
    assert_eq!(fetched.record.coral_levels, levels);

    // Lists the column can hold exactly still go through the ORM.
    let plain = store
        .upsert_team(payload(json!({"teamNumber": 1335, "coralLevels": ["L1", "L2"]})))
        .await
        .unwrap();
    assert_eq!(plain.strategy, StrategyKind::Orm);
}
