//! Typed errors for the scan pipeline.
//!
//! Per-site and per-record errors are caught by the monitor and logged;
//! only `MonitorError` reaches the caller of a scan.

use std::path::PathBuf;
use thiserror::Error;

/// A site could not be fetched or rendered.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid site URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("browser session failed for {url}: {message}")]
    Browser { url: String, message: String },
}

/// The external context scorer failed. Always recovered with fallbacks.
#[derive(Debug, Error)]
pub enum ContextScoringError {
    #[error("scorer request failed: {0}")]
    Network(String),

    #[error("scorer API error: {0}")]
    Api(String),

    #[error("scorer returned non-numeric content: {0:?}")]
    NotNumeric(String),

    #[error("scorer returned empty content")]
    Empty,
}

/// One record could not be written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to serialize record {tender_id}: {source}")]
    Serialize {
        tender_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One stored record could not be read back.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Site catalog or check-state failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("site state database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("unknown site: {0}")]
    UnknownSite(String),

    #[error("duplicate site name: {0}")]
    DuplicateSite(String),

    #[error("invalid stored timestamp for {site}: {value}")]
    BadTimestamp { site: String, value: String },
}

/// Scan-wide failures. Per-site problems never produce one of these.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("site registry unavailable: {0}")]
    Registry(#[from] RegistryError),
}
