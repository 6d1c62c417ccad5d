use std::fmt;

use thiserror::Error;

use crate::strategy::StrategyKind;

/// The payload handed to us is structurally invalid. These are client bugs
/// and are never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("`{field}` is required")]
    MissingKey { field: &'static str },
    #[error("`{field}` must be a positive integer (got {value})")]
    InvalidKey { field: &'static str, value: String },
    #[error("`{field}` must be a number (got {value})")]
    NotANumber { field: &'static str, value: String },
    #[error("`{field}` must be a finite number")]
    NonFinite { field: &'static str },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("storage for table `{table}` is not provisioned")]
    StorageUnavailable { table: &'static str },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    /// A read or single-column write outside the strategy cascade failed.
    #[error("query on `{table}` failed: {source}")]
    Query {
        table: &'static str,
        #[source]
        source: diesel::result::Error,
    },
    #[error("could not acquire a database connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("storage worker did not complete: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Whether the caller (rather than the deployment) is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}

/// The state of an upsert attempt in which a strategy failed.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Stage {
    Locating,
    Inserting,
    Updating,
    /// Opening or committing the attempt's transaction.
    Committing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Locating => "locating",
            Stage::Inserting => "inserting",
            Stage::Updating => "updating",
            Stage::Committing => "committing",
        })
    }
}

#[derive(Debug)]
pub struct StrategyFailure {
    pub strategy: StrategyKind,
    pub stage: Stage,
    pub error: diesel::result::Error,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed while {}: {}", self.strategy, self.stage, self.error)
    }
}

/// Every strategy in the cascade was tried and none succeeded. Failures are
/// kept in the order they happened; the last one is the innermost cause.
#[derive(Debug)]
pub struct PersistenceError {
    pub table: &'static str,
    pub key: String,
    pub failures: Vec<StrategyFailure>,
}

impl PersistenceError {
    pub fn innermost(&self) -> Option<&diesel::result::Error> {
        self.failures.last().map(|failure| &failure.error)
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not persist `{}` row {} after {} attempt(s)",
            self.table,
            self.key,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.innermost()
            .map(|error| error as &(dyn std::error::Error + 'static))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}
