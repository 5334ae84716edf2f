use std::path::PathBuf;
use thiserror::Error;

/// Problems with the declarative source list. Always fatal, raised before any fetch.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("config must contain a non-empty 'sources' list")]
    NoSources,

    #[error("source #{index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("duplicate source name: {0}")]
    DuplicateSource(String),

    #[error("source '{source_name}' has an invalid url: {url}")]
    InvalidUrl { source_name: String, url: String },

    #[error("invalid keyword pattern '{pattern}': {error}")]
    InvalidPattern {
        pattern: String,
        #[source]
        error: regex::Error,
    },
}

/// Failures of the seen-set backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seen store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("seen store {path} is corrupted: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error(
        "seen store lock {path} is held by {holder}; delete it if no other run is active"
    )]
    Locked { path: PathBuf, holder: String },

    #[error("failed to encode seen store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-source fetch failures. Recorded in the run result, never fatal.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out after {0} seconds")]
    Timeout(u64),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webdriver error: {0}")]
    WebDriver(String),
}

/// Failures of the secondary classifier. Always absorbed with fail-open semantics.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("classifier API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

/// A run outcome that must not be treated as "completed".
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to initialise fetcher: {0}")]
    Fetcher(#[from] FetchError),
}

/// Report delivery failures. Logged by the caller, never change the run outcome.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("email is missing required setting '{0}'")]
    MissingSetting(&'static str),

    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build email: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("delivery task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
