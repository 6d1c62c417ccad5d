//! End-to-end scenarios which go through the async [`crate::Store`].

mod concurrency;
mod drift;
mod round_trip;

use diesel::prelude::*;
use diesel::sql_types::BigInt;
use serde_json::Value;

use crate::canonical::Payload;
use crate::{Config, Store};

#[derive(QueryableByName)]
struct Count {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

fn memory_store() -> Store {
    Store::from_config(&Config::default()).unwrap()
}

fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap()
}

fn count_rows(store: &Store, table: &str) -> i64 {
    let mut conn = store.pool().get().unwrap();
    diesel::sql_query(format!("SELECT COUNT(*) AS count FROM {table}"))
        .get_result::<Count>(&mut conn)
        .unwrap()
        .count
}

fn execute(store: &Store, sql: &str) {
    let mut conn = store.pool().get().unwrap();
    diesel::sql_query(sql).execute(&mut conn).unwrap();
}

/// A fully populated `teams` table whose list column is declared as
/// `list_column`.
fn teams_ddl(list_column: &str) -> String {
    format!(
        "CREATE TABLE teams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_number INTEGER NOT NULL UNIQUE,
            auto_score_coral BOOLEAN NOT NULL DEFAULT 0,
            auto_score_algae BOOLEAN NOT NULL DEFAULT 0,
            must_start_specific_position BOOLEAN NOT NULL DEFAULT 0,
            teleop_dealgifying BOOLEAN NOT NULL DEFAULT 0,
            starting_position TEXT,
            intake_preference TEXT,
            scoring_preference TEXT,
            drivetrain TEXT,
            coral_levels {list_column},
            robot_width DOUBLE,
            robot_length DOUBLE,
            robot_height DOUBLE,
            notes TEXT NOT NULL DEFAULT '',
            image_url TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"
    )
}
