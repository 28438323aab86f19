//! Application-wide error types.

use thiserror::Error;

use crate::models::{DonationStatus, LifecycleEvent};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The claim lost the race, or the donation does not exist / is not claimable.
    #[error("Donation not available")]
    DonationUnavailable,

    /// No caller identity was supplied by the upstream auth layer.
    #[error("Missing caller identity")]
    Unauthenticated,

    /// The caller does not hold the claim (or ownership) the operation requires.
    #[error("Not authorized")]
    NotAuthorized,

    #[error("Invalid transition: cannot {event} a donation that is {from}")]
    InvalidTransition {
        from: DonationStatus,
        event: LifecycleEvent,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Transient persistence failure (lock contention, pool exhaustion, I/O).
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    /// Deterministic persistence failure; retrying the same request cannot help.
    #[error("Store error: {0}")]
    Store(#[source] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl ServiceError {
    /// Whether a caller may reasonably retry the same request later.
    ///
    /// The service itself never retries.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// SQLite primary result codes for a locked database (`SQLITE_BUSY`, `SQLITE_LOCKED`).
const SQLITE_TRANSIENT_CODES: [i32; 2] = [5, 6];

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        if is_transient(&err) {
            Self::StoreUnavailable(err)
        } else {
            Self::Store(err)
        }
    }
}

fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            // Extended codes carry the primary code in the low byte.
            .is_some_and(|code| SQLITE_TRANSIENT_CODES.contains(&(code & 0xff))),
        _ => false,
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
