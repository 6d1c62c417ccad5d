//! Payload coercion must never panic, and whatever it accepts must be a
//! record the read side reproduces.

#![no_main]

use libfuzzer_sys::fuzz_target;
use scoutdb::canonical::list::ListEncoding;
use scoutdb::canonical::{Payload, materialize_list};
use scoutdb::records::{Entity, Match, Team};

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = serde_json::from_slice::<Payload>(data) else {
        return;
    };

    if let Ok(team) = Team::canonicalize(&payload) {
        assert!(team.team_number > 0);
        for encoding in
            [ListEncoding::NativeArray, ListEncoding::Json]
        {
            let encoded = encoding.encode(&team.coral_levels);
            assert_eq!(
                materialize_list("coral_levels", Some(&encoded)),
                team.coral_levels
            );
        }
    }
    let _ = Match::canonicalize(&payload);
});
