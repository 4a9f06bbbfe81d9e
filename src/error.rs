//! Error types for scifetch
//!
//! Two layers of failure are modelled here:
//! - [`Error`] is returned from batch-level operations. Apart from
//!   construction and configuration problems, the only condition that aborts
//!   a running batch is an unusable output directory.
//! - [`FetchFailure`] is the typed reason a single retrieval was abandoned.
//!   It is recorded in the batch report and never aborts sibling tasks,
//!   except for [`FetchFailure::OutputDir`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for scifetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for scifetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.concurrency")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// An output directory could not be created.
    ///
    /// The directory is shared by every item targeting it, so the whole batch
    /// is stopped instead of failing item after item.
    #[error("cannot prepare output directory {}: {reason}", path.display())]
    OutputDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying OS error message
        reason: String,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Why a single retrieval was abandoned
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchFailure {
    /// The source location is not a valid URL
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The rejected location
        url: String,
        /// Parser message
        reason: String,
    },

    /// Connection, TLS or protocol failure while talking to the server
    #[error("transport error: {message}")]
    Transport {
        /// Error message from the HTTP client
        message: String,
        /// Whether the failure looks temporary (connect refused, timeout)
        transient: bool,
    },

    /// The redirect chain exceeded the configured hop limit
    #[error("stopped after {limit} redirects")]
    TooManyRedirects {
        /// Maximum number of redirects that were followed
        limit: usize,
    },

    /// The server answered with something other than 200 OK
    #[error("access failed with HTTP status {status}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
    },

    /// The destination file could not be created
    #[error("can't create {}: {reason}", path.display())]
    CreateFile {
        /// Destination path
        path: PathBuf,
        /// Underlying OS error message
        reason: String,
    },

    /// The body stream broke off or could not be written to disk
    #[error("transfer interrupted: {message}")]
    Stream {
        /// Error message
        message: String,
    },

    /// The parent directory of the destination could not be created (batch-fatal)
    #[error("cannot create parent directory {}: {reason}", path.display())]
    OutputDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying OS error message
        reason: String,
    },

    /// The external program is not configured and not on PATH
    #[error("{program} not found (configure a path or install it)")]
    ToolMissing {
        /// Program name
        program: String,
    },

    /// The external program could not be started
    #[error("failed to execute {program}: {reason}")]
    ToolLaunch {
        /// Program name
        program: String,
        /// Underlying OS error message
        reason: String,
    },

    /// The per-task log file could not be opened
    #[error("cannot open log file {}: {reason}", path.display())]
    LogFile {
        /// Log file path
        path: PathBuf,
        /// Underlying OS error message
        reason: String,
    },

    /// The external program finished but left no destination behind
    #[error("no output produced at {} (exit code {exit_code:?})", path.display())]
    NoOutput {
        /// Expected destination
        path: PathBuf,
        /// Exit code of the program, if it exited normally
        exit_code: Option<i32>,
    },

    /// The task was torn down before it reported back
    #[error("task aborted before completion")]
    Aborted,
}

impl FetchFailure {
    /// Whether this failure must stop the whole batch
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchFailure::OutputDir { .. })
    }

    /// Classify a reqwest error raised while sending a request or reading its body
    pub(crate) fn from_reqwest(err: &reqwest::Error, max_redirects: usize) -> Self {
        if err.is_redirect() {
            return FetchFailure::TooManyRedirects {
                limit: max_redirects,
            };
        }
        FetchFailure::Transport {
            message: err.to_string(),
            transient: err.is_connect() || err.is_timeout(),
        }
    }
}

impl From<FetchFailure> for Error {
    fn from(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::OutputDir { path, reason } => Error::OutputDir { path, reason },
            other => Error::Other(other.to_string()),
        }
    }
}
