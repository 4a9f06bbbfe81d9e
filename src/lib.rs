//! # scifetch
//!
//! Batch retrieval of large scientific artifacts (datasets, sequencing runs,
//! papers, supplementary files) identified by URLs or accessions.
//!
//! ## Design Philosophy
//!
//! scifetch is designed to be:
//! - **Engine-agnostic** - Native streaming HTTP or delegation to wget, curl,
//!   axel, git, rsync, gdc-client and prefetch under one concurrency model
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Typed outcomes** - Every item reports fetched, skipped or a typed failure
//!
//! ## Quick Start
//!
//! ```no_run
//! use scifetch::{BatchFetcher, BatchOptions, Config, FetchRequest};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = BatchFetcher::new(Config::default())?;
//!
//!     let requests = FetchRequest::all_into(
//!         [
//!             "https://ftp.ncbi.nlm.nih.gov/geo/series/GSE1nnn/GSE1000/matrix/GSE1000_series_matrix.txt.gz",
//!             "https://example.org/doi/pdf/10.1000/xyz?articleTools=true",
//!         ],
//!         Path::new("downloads"),
//!     );
//!     let options = BatchOptions {
//!         concurrency: Some(2),
//!         ..Default::default()
//!     };
//!
//!     let report = fetcher.fetch_all(&requests, &options).await?;
//!     for path in report.paths() {
//!         println!("{}", path.display());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Per-item engine selection
pub mod engine;
/// Error types
pub mod error;
/// External process runner
pub mod external;
/// Destination filename resolution
pub mod filename;
/// Native HTTP fetcher
pub mod native;
/// Batch orchestration and concurrency control
pub mod orchestrator;
/// Multi-bar progress display
pub mod progress;
/// Retry logic with exponential backoff
pub mod retry;
/// Shared HTTP session
pub mod session;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, PublisherQuirk};
pub use error::{Error, FetchFailure, Result};
pub use orchestrator::BatchFetcher;
pub use types::{BatchOptions, BatchReport, EngineName, FetchRequest, TaskId, TaskOutcome};
