//! Persistence for pit and match scouting records.
//!
//! Inbound payloads are canonicalized, then upserted under their natural key
//! by the first strategy in a fixed cascade which succeeds against whatever
//! the table actually looks like.

pub mod canonical;
pub mod config;
pub mod error;
pub mod probe;
pub mod records;
pub mod schema;
pub mod state;
pub mod store;
pub mod strategy;
pub mod upsert;

#[cfg(test)]
mod test;

pub use config::Config;
pub use error::{PersistenceError, StoreError, ValidationError};
pub use records::{Match, MatchKey, Stored, Team};
pub use store::Store;
pub use upsert::{UpsertOutcome, WriteAction};
