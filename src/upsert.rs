//! The upsert engine.
//!
//! An upsert moves through `Validating -> Probing -> Locating ->
//! {Updating | Inserting} -> Done`. Locating and writing happen with one
//! strategy at a time, inside one immediate transaction; if either fails the
//! transaction is rolled back and the attempt restarts at Locating with the
//! next strategy in the cascade.

use diesel::SqliteConnection;
use diesel::result::DatabaseErrorKind;

use crate::canonical::Payload;
use crate::error::{PersistenceError, Stage, StoreError, StrategyFailure};
use crate::probe::{SchemaCache, SchemaInfo};
use crate::records::{Entity, Stored, Team, team};
use crate::strategy::{
    Cascade, PersistenceStrategy, SqlValue, StrategyKind, raw,
};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WriteAction {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome<E> {
    /// The row as it now exists in the database.
    pub stored: Stored<E>,
    pub action: WriteAction,
    pub strategy: StrategyKind,
}

#[derive(Debug)]
struct AttemptError {
    stage: Stage,
    error: diesel::result::Error,
}

impl AttemptError {
    fn at(stage: Stage) -> impl FnOnce(diesel::result::Error) -> Self {
        move |error| AttemptError { stage, error }
    }
}

impl From<diesel::result::Error> for AttemptError {
    fn from(error: diesel::result::Error) -> Self {
        AttemptError {
            stage: Stage::Committing,
            error,
        }
    }
}

fn provisioned<E: Entity>(
    conn: &mut SqliteConnection,
    schemas: &SchemaCache,
) -> Result<SchemaInfo, StoreError> {
    let schema = schemas.get_or_probe(conn, &E::TABLE);
    if schema.exists {
        Ok(schema)
    } else {
        tracing::error!(
            table = E::TABLE.name,
            "table is missing and could not be created"
        );
        Err(StoreError::StorageUnavailable {
            table: E::TABLE.name,
        })
    }
}

/// Canonicalizes `payload` and upserts it under its natural key.
pub fn upsert<E: Entity>(
    conn: &mut SqliteConnection,
    schemas: &SchemaCache,
    cascade: &Cascade<E>,
    payload: &Payload,
) -> Result<UpsertOutcome<E>, StoreError> {
    let record = E::canonicalize(payload).inspect_err(|error| {
        tracing::debug!(table = E::TABLE.name, %error, "rejected payload");
    })?;
    upsert_record(conn, schemas, cascade, &record)
}

#[tracing::instrument(
    skip_all,
    fields(table = E::TABLE.name, key = %record.key())
)]
pub fn upsert_record<E: Entity>(
    conn: &mut SqliteConnection,
    schemas: &SchemaCache,
    cascade: &Cascade<E>,
    record: &E,
) -> Result<UpsertOutcome<E>, StoreError> {
    let schema = provisioned::<E>(conn, schemas)?;

    let mut failures = Vec::new();
    for strategy in cascade.iter() {
        match attempt(conn, &schema, strategy.as_ref(), record) {
            Ok(outcome) => {
                tracing::debug!(
                    strategy = %outcome.strategy,
                    action = ?outcome.action,
                    "upserted"
                );
                return Ok(outcome);
            }
            Err(AttemptError { stage, error }) => {
                tracing::warn!(
                    strategy = %strategy.kind(),
                    %stage,
                    %error,
                    "strategy failed, demoting"
                );
                // The probe result may no longer describe the table.
                schemas.invalidate(E::TABLE.name);
                failures.push(StrategyFailure {
                    strategy: strategy.kind(),
                    stage,
                    error,
                });
            }
        }
    }

    let error = PersistenceError {
        table: E::TABLE.name,
        key: record.key().to_string(),
        failures,
    };
    tracing::error!(%error, "every strategy failed");
    Err(error.into())
}

fn attempt<E: Entity>(
    conn: &mut SqliteConnection,
    schema: &SchemaInfo,
    strategy: &dyn PersistenceStrategy<E>,
    record: &E,
) -> Result<UpsertOutcome<E>, AttemptError> {
    let key = record.key();
    conn.immediate_transaction(|conn| {
        let existing = strategy
            .find_by_key(conn, schema, key)
            .map_err(AttemptError::at(Stage::Locating))?;

        let (stored, action) = match existing {
            Some(_) => (
                strategy
                    .update(conn, schema, record)
                    .map_err(AttemptError::at(Stage::Updating))?,
                WriteAction::Updated,
            ),
            None => match strategy.insert(conn, schema, record) {
                Ok(stored) => (stored, WriteAction::Inserted),
                Err(diesel::result::Error::DatabaseError(
                    DatabaseErrorKind::UniqueViolation,
                    info,
                )) => {
                    tracing::debug!(
                        message = info.message(),
                        "row appeared since locating, updating instead"
                    );
                    (
                        strategy
                            .update(conn, schema, record)
                            .map_err(AttemptError::at(Stage::Updating))?,
                        WriteAction::Updated,
                    )
                }
                Err(error) => {
                    return Err(AttemptError {
                        stage: Stage::Inserting,
                        error,
                    });
                }
            },
        };

        Ok(UpsertOutcome {
            stored,
            action,
            strategy: strategy.kind(),
        })
    })
}

/// Reads the row with `key`. Strategies are tried in cascade order and the
/// first one that can read the row answers.
#[tracing::instrument(skip(conn, schemas, cascade), fields(table = E::TABLE.name))]
pub fn fetch<E: Entity>(
    conn: &mut SqliteConnection,
    schemas: &SchemaCache,
    cascade: &Cascade<E>,
    key: E::Key,
) -> Result<Option<Stored<E>>, StoreError> {
    let schema = provisioned::<E>(conn, schemas)?;

    let mut failures = Vec::new();
    for strategy in cascade.iter() {
        match strategy.find_by_key(conn, &schema, key) {
            Ok(found) => return Ok(found),
            Err(error) => {
                tracing::warn!(
                    strategy = %strategy.kind(),
                    %error,
                    "read failed, demoting"
                );
                failures.push(StrategyFailure {
                    strategy: strategy.kind(),
                    stage: Stage::Locating,
                    error,
                });
            }
        }
    }

    schemas.invalidate(E::TABLE.name);
    Err(PersistenceError {
        table: E::TABLE.name,
        key: key.to_string(),
        failures,
    }
    .into())
}

/// Every row of `E` matching the column filters, ordered by natural key.
pub fn list<E: Entity>(
    conn: &mut SqliteConnection,
    schemas: &SchemaCache,
    filters: Vec<(&'static str, SqlValue)>,
) -> Result<Vec<Stored<E>>, StoreError> {
    let schema = provisioned::<E>(conn, schemas)?;
    raw::load_where::<E>(conn, &schema, filters).map_err(|source| {
        schemas.invalidate(E::TABLE.name);
        tracing::warn!(%source, "listing failed");
        StoreError::Query {
            table: E::TABLE.name,
            source,
        }
    })
}

/// Sets or clears a team's image reference. Returns `None` if the team does
/// not exist.
#[tracing::instrument(skip(conn, schemas))]
pub fn attach_team_image(
    conn: &mut SqliteConnection,
    schemas: &SchemaCache,
    team_number: i32,
    image_url: Option<String>,
) -> Result<Option<Stored<Team>>, StoreError> {
    let schema = provisioned::<Team>(conn, schemas)?;
    let failed = |source| -> StoreError {
        schemas.invalidate(Team::TABLE.name);
        StoreError::Query {
            table: Team::TABLE.name,
            source,
        }
    };

    let changed = raw::set_column::<Team>(
        conn,
        &schema,
        team_number,
        team::IMAGE_URL.name,
        SqlValue::Text(image_url),
    )
    .map_err(failed)?;
    if changed == 0 {
        return Ok(None);
    }

    let mut rows = raw::load_where::<Team>(
        conn,
        &schema,
        Team::key_values(team_number),
    )
    .map_err(failed)?;
    Ok(rows.pop())
}
