//! Whatever a strategy accepts must read back as the same record, whichever
//! way the list column is declared.

use diesel::prelude::*;
use proptest::prelude::*;

use super::teams_ddl;
use crate::probe::{SchemaCache, probe};
use crate::records::{Entity, Team};
use crate::strategy::{Cascade, PersistenceStrategy};
use crate::upsert::{fetch, upsert_record};

const LAYOUTS: [Option<&str>; 3] = [
    None,
    Some("JSON NOT NULL DEFAULT '[]' CHECK (coral_levels LIKE '[%]')"),
    Some("TEXT NOT NULL DEFAULT ''"),
];

fn connection(layout: Option<&str>) -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").unwrap();
    if let Some(list_column) = layout {
        diesel::sql_query(teams_ddl(list_column))
            .execute(&mut conn)
            .unwrap();
    }
    conn
}

fn item() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z0-9 ,_'\"\\\\{}\\[\\]-]{0,10}",
        Just("L2,L3 combo".to_string()),
        Just(" L4".to_string()),
        Just("NULL".to_string()),
    ]
}

fn dimension() -> impl Strategy<Value = Option<f64>> {
    prop::option::of(prop_oneof![
        prop::num::f64::NORMAL,
        Just(0.1 + 0.2),
        Just(1.0 / 3.0),
        Just(0.0),
        Just(f64::MAX),
        Just(f64::MIN_POSITIVE),
    ])
}

fn choice() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z]{1,8}")
}

prop_compose! {
    fn team()(
        team_number in 1..=i32::MAX,
        flags in any::<[bool; 4]>(),
        choices in [choice(), choice(), choice(), choice()],
        coral_levels in prop::collection::vec(item(), 0..5),
        dimensions in [dimension(), dimension(), dimension()],
        notes in "\\PC{0,20}",
        image_url in prop::option::of("/uploads/[a-z0-9]{1,8}\\.png"),
    ) -> Team {
        let [starting_position, intake_preference, scoring_preference, drivetrain] =
            choices;
        let [robot_width, robot_length, robot_height] = dimensions;
        Team {
            team_number,
            auto_score_coral: flags[0],
            auto_score_algae: flags[1],
            must_start_specific_position: flags[2],
            teleop_dealgifying: flags[3],
            starting_position,
            intake_preference,
            scoring_preference,
            drivetrain,
            coral_levels,
            robot_width,
            robot_length,
            robot_height,
            notes,
            image_url,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_strategy_reads_back_what_it_wrote(team in team()) {
        for layout in LAYOUTS {
            for strategy in Cascade::<Team>::standard().iter() {
                let mut conn = connection(layout);
                let schema = probe(&mut conn, &Team::TABLE);
                // A strategy may refuse a record; it may not change it.
                if let Ok(stored) = strategy.insert(&mut conn, &schema, &team) {
                    prop_assert_eq!(&stored.record, &team, "{} / {:?}", strategy.kind(), layout);
                }
            }
        }
    }

    #[test]
    fn cascade_stores_any_record_exactly(team in team()) {
        for layout in LAYOUTS {
            let mut conn = connection(layout);
            let schemas = SchemaCache::new();
            let cascade = Cascade::<Team>::standard();

            let outcome = upsert_record(&mut conn, &schemas, &cascade, &team).unwrap();
            prop_assert_eq!(&outcome.stored.record, &team, "{:?}", layout);

            let fetched = fetch(&mut conn, &schemas, &cascade, team.key()).unwrap();
            prop_assert_eq!(fetched.map(|stored| stored.record), Some(team.clone()));
        }
    }
}
