//! Core types for scifetch

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::FetchFailure;

/// Length of generated task identifiers
const TASK_ID_LEN: usize = 15;

/// Named retrieval strategy requested by the caller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineName {
    /// In-process streaming HTTP GET with progress bars
    #[default]
    NativeHttp,
    /// `wget`, resumable download
    Wget,
    /// `curl`, simple download
    Curl,
    /// `axel`, parallel segmented download
    Axel,
    /// `git clone --recursive`
    Git,
    /// `rsync` mirror sync
    Rsync,
    /// GDC restricted-access archive client
    GdcClient,
    /// SRA toolkit `prefetch`
    Prefetch,
}

/// External programs an engine can delegate to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExternalTool {
    /// `wget -c`
    Wget,
    /// `curl -o`
    Curl,
    /// `axel -N -n <threads>`
    Axel,
    /// `git clone --recursive`
    Git,
    /// `rsync <src> <dest>`
    Rsync,
    /// `gdc-client download`
    GdcClient,
    /// `prefetch -O <dir>`
    Prefetch,
}

impl EngineName {
    /// All engines, in declaration order
    pub const ALL: [EngineName; 8] = [
        EngineName::NativeHttp,
        EngineName::Wget,
        EngineName::Curl,
        EngineName::Axel,
        EngineName::Git,
        EngineName::Rsync,
        EngineName::GdcClient,
        EngineName::Prefetch,
    ];

    /// The external program behind this engine, or `None` for the native HTTP path
    #[must_use]
    pub fn external_tool(self) -> Option<ExternalTool> {
        match self {
            EngineName::NativeHttp => None,
            EngineName::Wget => Some(ExternalTool::Wget),
            EngineName::Curl => Some(ExternalTool::Curl),
            EngineName::Axel => Some(ExternalTool::Axel),
            EngineName::Git => Some(ExternalTool::Git),
            EngineName::Rsync => Some(ExternalTool::Rsync),
            EngineName::GdcClient => Some(ExternalTool::GdcClient),
            EngineName::Prefetch => Some(ExternalTool::Prefetch),
        }
    }

    /// Canonical lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EngineName::NativeHttp => "native-http",
            EngineName::Wget => "wget",
            EngineName::Curl => "curl",
            EngineName::Axel => "axel",
            EngineName::Git => "git",
            EngineName::Rsync => "rsync",
            EngineName::GdcClient => "gdc-client",
            EngineName::Prefetch => "prefetch",
        }
    }
}

impl std::fmt::Display for EngineName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EngineName {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "native-http" | "native" | "http" => Ok(EngineName::NativeHttp),
            other => EngineName::ALL
                .into_iter()
                .find(|engine| engine.as_str() == other)
                .ok_or_else(|| crate::error::Error::config("engine", format!("unknown engine '{s}'"))),
        }
    }
}

impl ExternalTool {
    /// Program name looked up on PATH
    #[must_use]
    pub fn program(self) -> &'static str {
        match self {
            ExternalTool::Wget => "wget",
            ExternalTool::Curl => "curl",
            ExternalTool::Axel => "axel",
            ExternalTool::Git => "git",
            ExternalTool::Rsync => "rsync",
            ExternalTool::GdcClient => "gdc-client",
            ExternalTool::Prefetch => "prefetch",
        }
    }

    /// The engine this tool backs
    #[must_use]
    pub fn engine(self) -> EngineName {
        match self {
            ExternalTool::Wget => EngineName::Wget,
            ExternalTool::Curl => EngineName::Curl,
            ExternalTool::Axel => EngineName::Axel,
            ExternalTool::Git => EngineName::Git,
            ExternalTool::Rsync => EngineName::Rsync,
            ExternalTool::GdcClient => EngineName::GdcClient,
            ExternalTool::Prefetch => EngineName::Prefetch,
        }
    }

    /// Archive clients write into a directory and key their log by task ID only
    #[must_use]
    pub fn is_archive_client(self) -> bool {
        matches!(self, ExternalTool::GdcClient | ExternalTool::Prefetch)
    }
}

/// Identifier shared by every task of a batch; used to name log files
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a random alphanumeric identifier
    #[must_use]
    pub fn random() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TASK_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Borrow the identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One source location paired with the directory it should land in
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// URL, git address or archive accession
    pub source: String,
    /// Output directory for this item
    pub dest_dir: PathBuf,
}

impl FetchRequest {
    /// Pair a source with its output directory
    pub fn new(source: impl Into<String>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest_dir: dest_dir.into(),
        }
    }

    /// Pair every source with the same output directory
    pub fn all_into<I, S>(sources: I, dest_dir: &Path) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        sources
            .into_iter()
            .map(|source| Self::new(source, dest_dir))
            .collect()
    }
}

/// Options applied to every item of a batch
#[derive(Clone, Debug)]
pub struct BatchOptions {
    /// Requested engine (may be forced to git per item)
    pub engine: EngineName,
    /// Maximum in-flight retrievals (falls back to `download.concurrency`)
    pub concurrency: Option<usize>,
    /// Alternate base location; replaces the path, keeps the filename
    pub mirror: Option<String>,
    /// Free-form arguments appended to external tool invocations
    pub extra_args: String,
    /// Identifier used to name per-task log files
    pub task_id: TaskId,
    /// Remove an existing destination before the skip check
    pub overwrite: bool,
    /// Dispatch even when the destination exists
    pub ignore_existing: bool,
    /// Suppress progress bars and downgrade non-fatal warnings
    pub quiet: bool,
    /// Capture external tool output to a log file
    pub save_log: bool,
    /// Connections per file for axel (falls back to `download.axel_threads`)
    pub axel_threads: Option<usize>,
    /// Access token passed to the restricted-archive client
    pub gdc_token: Option<String>,
    /// Manifest passed to the restricted-archive client instead of a file ID
    pub gdc_manifest: Option<PathBuf>,
    /// Precomputed archive key passed to prefetch instead of the accession
    pub prefetch_key: Option<PathBuf>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            engine: EngineName::default(),
            concurrency: None,
            mirror: None,
            extra_args: String::new(),
            task_id: TaskId::random(),
            overwrite: false,
            ignore_existing: false,
            quiet: false,
            save_log: true,
            axel_threads: None,
            gdc_token: None,
            gdc_manifest: None,
            prefetch_key: None,
        }
    }
}

/// A single dispatched retrieval. Built by the orchestrator, consumed once.
#[derive(Clone, Debug)]
pub struct RetrievalTask {
    /// Position of the item in the batch
    pub index: usize,
    /// URL, git address or accession as supplied
    pub source: String,
    /// Output directory
    pub dest_dir: PathBuf,
    /// Filename produced by the filename resolver
    pub filename: String,
    /// Requested engine before per-item selection
    pub engine: EngineName,
    /// Mirror base, if any
    pub mirror: Option<String>,
    /// Extra tool arguments, already split on whitespace
    pub extra_args: Vec<String>,
    /// Batch task identifier
    pub task_id: TaskId,
    /// Overwrite flag as requested
    pub overwrite: bool,
    /// Ignore-existing flag as requested
    pub ignore_existing: bool,
    /// Effective quiet flag (may be forced on by the orchestrator)
    pub quiet: bool,
    /// Capture tool output to a log file
    pub save_log: bool,
    /// Connections per file for axel
    pub axel_threads: usize,
    /// Restricted-archive access token
    pub gdc_token: Option<String>,
    /// Restricted-archive manifest
    pub gdc_manifest: Option<PathBuf>,
    /// Sequencing-archive key file
    pub prefetch_key: Option<PathBuf>,
}

impl RetrievalTask {
    /// Full destination path
    #[must_use]
    pub fn destination(&self) -> PathBuf {
        self.dest_dir.join(&self.filename)
    }
}

/// What happened to one item of a batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The engine ran and the destination now exists
    Fetched {
        /// Destination path
        path: PathBuf,
    },
    /// The destination already existed; no engine was invoked
    Skipped {
        /// Existing destination path
        path: PathBuf,
    },
    /// The retrieval was abandoned
    Failed {
        /// Source as supplied
        source: String,
        /// Destination that was not produced
        path: PathBuf,
        /// Typed reason
        reason: FetchFailure,
    },
}

impl TaskOutcome {
    /// Destination path of the item, whatever the outcome
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            TaskOutcome::Fetched { path }
            | TaskOutcome::Skipped { path }
            | TaskOutcome::Failed { path, .. } => path,
        }
    }

    /// Whether this item ended in failure
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed { .. })
    }
}

/// Outcomes of a batch, in input order
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// One outcome per requested item
    pub outcomes: Vec<TaskOutcome>,
}

impl BatchReport {
    /// Destination paths that exist after the batch (fetched or skipped)
    pub fn paths(&self) -> Vec<PathBuf> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_failed())
            .map(|o| o.path().to_path_buf())
            .collect()
    }

    /// Number of items an engine produced
    pub fn fetched_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Fetched { .. }))
            .count()
    }

    /// Number of items skipped because the destination existed
    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Skipped { .. }))
            .count()
    }

    /// Failed items
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }
}
