//! Feeds arbitrary payloads through the whole upsert path against an
//! in-memory database.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scoutdb::canonical::Payload;
use scoutdb::{Config, Store};

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = serde_json::from_slice::<Payload>(data) else {
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let store = Store::from_config(&Config::default()).unwrap();
        if let Ok(outcome) = store.upsert_team(payload.clone()).await {
            let fetched = store
                .fetch_team(outcome.stored.record.team_number)
                .await
                .unwrap();
            assert_eq!(fetched, Some(outcome.stored));
        }
        let _ = store.upsert_match(payload).await;
    });
});
