//! Error taxonomy for the ingestion pipeline.
//!
//! Data anomalies (missing thumbnails, unparseable durations, items without a
//! video id) are deliberately *not* errors; they degrade to defaults inside
//! the `youtube` module and the run continues.

use thiserror::Error;

/// Terminal errors surfaced to callers of the import entry points.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Unusable identifier or missing required parameter/credential.
    /// Surfaced immediately, never retried.
    #[error("input error: {0}")]
    Input(String),

    /// Non-success response from an upstream endpoint (credential rejection
    /// included). The whole in-flight fetch/resolve is abandoned; no partial
    /// results are returned.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Request-level failure (DNS, connect, timeout) before any upstream
    /// status was observed.
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Container-creation slug collisions exhausted the retry bound.
    #[error("could not allocate a unique course slug after {attempts} attempts")]
    SlugExhausted { attempts: u32 },

    /// Store failure mid-run. Previously committed items remain; the run is
    /// safely resumable by re-invocation.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the persistent store seam.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A store-level unique constraint rejected the write (course slug,
    /// video external_url, or a lesson (module, title)/(module, position)
    /// pair). The Unique-Container Creator retries on this; everything else
    /// treats it as terminal.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error(transparent)]
    Backend(anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::UniqueViolation(db.message().to_string());
            }
        }
        StoreError::Backend(e.into())
    }
}
