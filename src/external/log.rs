//! Per-task log files and output forwarding for external programs.

use crate::error::FetchFailure;
use crate::types::{ExternalTool, TaskId};
use crate::utils::ensure_parent_dir;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// Log file for one invocation.
///
/// `<log_dir>/<task_id>_<dest basename>_<program>.log`, or
/// `<log_dir>/<task_id>_<program>.log` for the archive clients, which may
/// produce many files per call.
pub(crate) fn log_path(log_dir: &Path, task_id: &TaskId, dest: &Path, tool: ExternalTool) -> PathBuf {
    let name = if tool.is_archive_client() {
        format!("{}_{}.log", task_id, tool.program())
    } else {
        let base = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}_{}_{}.log", task_id, base, tool.program())
    };
    log_dir.join(name)
}

/// Where a child's output goes: an optional log file plus optional console echo
#[derive(Clone)]
pub(crate) struct OutputSink {
    file: Option<Arc<Mutex<tokio::fs::File>>>,
    program: &'static str,
    echo: bool,
}

impl OutputSink {
    /// Open (append) the log file when `path` is given
    pub(crate) async fn open(
        path: Option<&Path>,
        program: &'static str,
        echo: bool,
    ) -> Result<Self, FetchFailure> {
        let file = match path {
            Some(path) => {
                let log_failure = |e: String| FetchFailure::LogFile {
                    path: path.to_path_buf(),
                    reason: e,
                };
                ensure_parent_dir(path).await.map_err(|e| log_failure(e.to_string()))?;
                let file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|e| log_failure(e.to_string()))?;
                Some(Arc::new(Mutex::new(file)))
            }
            None => None,
        };
        Ok(Self {
            file,
            program,
            echo,
        })
    }

    /// Whether the child's output needs to be captured at all
    pub(crate) fn captures(&self) -> bool {
        self.file.is_some() || self.echo
    }

    /// Copy one output stream line by line until it closes
    pub(crate) async fn pump<R>(self, reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut segments = BufReader::new(reader).split(b'\n');
        loop {
            let line = match segments.next_segment().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(program = self.program, error = %e, "Output stream closed with error");
                    break;
                }
            };

            if let Some(file) = &self.file {
                let mut file = file.lock().await;
                let written = match file.write_all(&line).await {
                    Ok(()) => file.write_all(b"\n").await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    tracing::debug!(program = self.program, error = %e, "Failed to write log line");
                }
            }

            if self.echo {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end_matches('\r');
                if !text.is_empty() {
                    tracing::info!(target: "scifetch::external", program = self.program, "{}", text);
                }
            }
        }
    }

    /// Flush buffered log output
    pub(crate) async fn flush(&self) {
        if let Some(file) = &self.file
            && let Err(e) = file.lock().await.flush().await
        {
            tracing::debug!(program = self.program, error = %e, "Failed to flush log file");
        }
    }
}
