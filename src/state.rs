use std::time::Duration;

use diesel::{
    SqliteConnection,
    connection::SimpleConnection,
    r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection},
};

use crate::config::Config;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Applied to every connection as the pool hands it out.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for ConnectionOptions
{
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn make_pool(config: &Config) -> Result<DbPool, diesel::r2d2::PoolError> {
    let url = config.database_url.as_str();
    tracing::info!(location = url, "opening database");

    Pool::builder()
        .max_size(config.pool_size())
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }))
        .build(ConnectionManager::<SqliteConnection>::new(url))
}
