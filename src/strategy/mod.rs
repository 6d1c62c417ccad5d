//! Persistence strategies and the cascade that tries them in order.

use std::fmt;

use diesel::{QueryResult, SqliteConnection};

use crate::canonical::list::ListEncoding;
use crate::probe::SchemaInfo;
use crate::records::{Entity, Stored};

pub mod orm;
pub mod raw;

pub use orm::Orm;
pub use raw::RawSql;

/// A value bound to a raw statement.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Int(i32),
    Bool(bool),
    Real(Option<f64>),
    Text(Option<String>),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum StrategyKind {
    Orm,
    RawNativeArray,
    RawJson,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Orm => "orm",
            StrategyKind::RawNativeArray => "raw sql (array literal)",
            StrategyKind::RawJson => "raw sql (json)",
        })
    }
}

/// One way of reading and writing rows of `E`. Implementations differ in
/// how they serialize the list column and in how tolerant their reads are.
///
/// `insert` and `update` return the row as read back by the same strategy.
pub trait PersistenceStrategy<E: Entity>: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn find_by_key(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        key: E::Key,
    ) -> QueryResult<Option<Stored<E>>>;

    fn insert(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        record: &E,
    ) -> QueryResult<Stored<E>>;

    fn update(
        &self,
        conn: &mut SqliteConnection,
        schema: &SchemaInfo,
        record: &E,
    ) -> QueryResult<Stored<E>>;
}

/// An ordered list of strategies. The order is fixed; the first strategy
/// that gets through an attempt wins.
pub struct Cascade<E: Entity> {
    strategies: Vec<Box<dyn PersistenceStrategy<E>>>,
}

impl<E: Entity> Cascade<E> {
    pub fn new(strategies: Vec<Box<dyn PersistenceStrategy<E>>>) -> Self {
        Self { strategies }
    }

    pub fn iter(
        &self,
    ) -> std::slice::Iter<'_, Box<dyn PersistenceStrategy<E>>> {
        self.strategies.iter()
    }
}

impl<E: Entity> Cascade<E>
where
    Orm: PersistenceStrategy<E>,
{
    /// ORM first, then raw SQL with an array literal, then raw SQL with
    /// JSON text.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(Orm),
            Box::new(RawSql::new(ListEncoding::NativeArray)),
            Box::new(RawSql::new(ListEncoding::Json)),
        ])
    }
}
