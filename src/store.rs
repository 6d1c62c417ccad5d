//! Async entry points. Each call checks a connection out of the pool and does
//! its work on the blocking thread pool.

use std::sync::Arc;

use tokio::task::spawn_blocking;

use crate::canonical::Payload;
use crate::config::Config;
use crate::error::StoreError;
use crate::probe::{SchemaCache, SchemaInfo};
use crate::records::{Entity, Match, MatchKey, Stored, Team, team};
use crate::state::{DbConn, DbPool, make_pool};
use crate::strategy::{Cascade, SqlValue};
use crate::upsert::{self, UpsertOutcome};

#[derive(Clone)]
pub struct Store {
    pool: DbPool,
    schemas: Arc<SchemaCache>,
    teams: Arc<Cascade<Team>>,
    matches: Arc<Cascade<Match>>,
}

impl Store {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            schemas: Arc::new(SchemaCache::new()),
            teams: Arc::new(Cascade::standard()),
            matches: Arc::new(Cascade::standard()),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        Ok(Self::new(make_pool(config)?))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut DbConn, &SchemaCache) -> Result<T, StoreError>
            + Send
            + 'static,
    {
        let pool = self.pool.clone();
        let schemas = self.schemas.clone();
        spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn, &schemas)
        })
        .await?
    }

    pub async fn upsert_team(
        &self,
        payload: Payload,
    ) -> Result<UpsertOutcome<Team>, StoreError> {
        let cascade = self.teams.clone();
        self.with_conn(move |conn, schemas| {
            upsert::upsert(conn, schemas, &cascade, &payload)
        })
        .await
    }

    pub async fn upsert_match(
        &self,
        payload: Payload,
    ) -> Result<UpsertOutcome<Match>, StoreError> {
        let cascade = self.matches.clone();
        self.with_conn(move |conn, schemas| {
            upsert::upsert(conn, schemas, &cascade, &payload)
        })
        .await
    }

    pub async fn fetch_team(
        &self,
        team_number: i32,
    ) -> Result<Option<Stored<Team>>, StoreError> {
        let cascade = self.teams.clone();
        self.with_conn(move |conn, schemas| {
            upsert::fetch(conn, schemas, &cascade, team_number)
        })
        .await
    }

    pub async fn fetch_match(
        &self,
        key: MatchKey,
    ) -> Result<Option<Stored<Match>>, StoreError> {
        let cascade = self.matches.clone();
        self.with_conn(move |conn, schemas| {
            upsert::fetch(conn, schemas, &cascade, key)
        })
        .await
    }

    pub async fn list_teams(&self) -> Result<Vec<Stored<Team>>, StoreError> {
        self.with_conn(|conn, schemas| {
            upsert::list::<Team>(conn, schemas, Vec::new())
        })
        .await
    }

    /// All matches, or only those played by `team_number`.
    pub async fn list_matches(
        &self,
        team_number: Option<i32>,
    ) -> Result<Vec<Stored<Match>>, StoreError> {
        let filters = team_number
            .map(|n| vec![(team::TEAM_NUMBER.name, SqlValue::Int(n))])
            .unwrap_or_default();
        self.with_conn(move |conn, schemas| {
            upsert::list::<Match>(conn, schemas, filters)
        })
        .await
    }

    pub async fn attach_team_image(
        &self,
        team_number: i32,
        image_url: Option<String>,
    ) -> Result<Option<Stored<Team>>, StoreError> {
        self.with_conn(move |conn, schemas| {
            upsert::attach_team_image(conn, schemas, team_number, image_url)
        })
        .await
    }

    /// What the cache currently believes about `table`, probing it if
    /// nothing is cached.
    pub async fn probe<E: Entity>(&self) -> Result<SchemaInfo, StoreError> {
        self.with_conn(|conn, schemas| {
            Ok(schemas.get_or_probe(conn, &E::TABLE))
        })
        .await
    }

    /// Drops the cached probe for `E` and inspects the table again.
    pub async fn reprobe<E: Entity>(&self) -> Result<SchemaInfo, StoreError> {
        self.with_conn(|conn, schemas| Ok(schemas.reprobe(conn, &E::TABLE)))
            .await
    }
}
