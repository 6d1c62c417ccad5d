use std::fmt;

use chrono::NaiveDateTime;
use diesel::{QueryableByName, sqlite::Sqlite};
use serde::{Deserialize, Serialize};

use crate::canonical::Payload;
use crate::canonical::list::ListEncoding;
use crate::error::ValidationError;
use crate::strategy::SqlValue;

pub mod matches;
pub mod team;

pub use matches::{Match, MatchKey};
pub use team::Team;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ColumnKind {
    /// The surrogate id.
    Id,
    /// Part of the natural key.
    Key,
    Flag,
    /// A nullable enum-like string.
    Choice,
    List,
    Number,
    Text,
    Image,
    Timestamp,
}

#[derive(Copy, Clone, Debug)]
pub struct Column {
    /// Name of the column in the database.
    pub name: &'static str,
    /// Name of the field in inbound payloads.
    pub field: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(
        name: &'static str,
        field: &'static str,
        kind: ColumnKind,
    ) -> Self {
        Self { name, field, kind }
    }
}

/// Everything the probe and the raw strategies need to know about a table.
#[derive(Debug)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub list_column: &'static str,
}

impl TableDef {
    pub fn key_columns(&self) -> impl Iterator<Item = &'static Column> {
        self.columns.iter().filter(|c| c.kind == ColumnKind::Key)
    }
}

/// A canonical record as it exists in the database.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stored<T> {
    pub id: i64,
    #[serde(flatten)]
    pub record: T,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// A record kind which is upserted under a natural key.
pub trait Entity: Clone + PartialEq + fmt::Debug + Send + Sized + 'static {
    type Key: Copy + PartialEq + fmt::Debug + fmt::Display + Send + 'static;
    /// Row shape used by raw reads: every column as nullable text.
    type Row: QueryableByName<Sqlite> + Send + 'static;

    const TABLE: TableDef;

    fn key(&self) -> Self::Key;

    /// Field Canonicalizer entry point.
    fn canonicalize(payload: &Payload) -> Result<Self, ValidationError>;

    fn key_values(key: Self::Key) -> Vec<(&'static str, SqlValue)>;

    /// Non-key column values, with the list column in `encoding`. Columns
    /// owned by other collaborators are left out when unset.
    fn attribute_values(
        &self,
        encoding: ListEncoding,
    ) -> Vec<(&'static str, SqlValue)>;

    /// Record Materializer. Never fails; whatever cannot be decoded is
    /// logged and defaulted.
    fn materialize(row: Self::Row) -> Stored<Self>;
}
