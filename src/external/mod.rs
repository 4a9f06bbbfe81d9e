//! External process runner -- delegates retrieval to wget, curl, axel, git,
//! rsync, gdc-client or prefetch.
//!
//! Split into focused submodules:
//! - [`args`] - Argument list per program
//! - [`log`] - Per-task log files and console forwarding
//!
//! The runner does not interpret a program's output or exit status beyond
//! logging it: a retrieval succeeded when its destination exists afterwards.

mod args;
mod log;

use crate::config::{Config, ToolsConfig};
use crate::error::FetchFailure;
use crate::types::{ExternalTool, RetrievalTask};
use crate::utils::path_exists;
use args::Invocation;
use log::OutputSink;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs external programs for [`RetrievalTask`]s
pub struct ExternalRunner {
    tools: ToolsConfig,
    log_dir: PathBuf,
}

impl ExternalRunner {
    /// Create a runner from the tool and log directory settings
    pub fn new(config: &Config) -> Self {
        Self {
            tools: config.tools.clone(),
            log_dir: config.download.log_dir.clone(),
        }
    }

    /// Locate the binary for `tool`: configured override first, then `PATH`
    pub fn resolve(&self, tool: ExternalTool) -> Result<PathBuf, FetchFailure> {
        if let Some(path) = self.tools.paths.get(&tool.engine()) {
            return Ok(path.clone());
        }
        if self.tools.search_path
            && let Ok(path) = which::which(tool.program())
        {
            return Ok(path);
        }
        Err(FetchFailure::ToolMissing {
            program: tool.program().to_string(),
        })
    }

    /// Log file an invocation of `tool` for `task` writes to
    pub fn log_path(&self, tool: ExternalTool, task: &RetrievalTask) -> PathBuf {
        log::log_path(&self.log_dir, &task.task_id, &task.destination(), tool)
    }

    /// Run `tool` against `location` and wait for it to exit.
    ///
    /// Returns the destination when the program left something there.
    pub async fn run(
        &self,
        tool: ExternalTool,
        task: &RetrievalTask,
        location: &str,
    ) -> Result<PathBuf, FetchFailure> {
        let program = self.resolve(tool)?;
        let dest = task.destination();
        let args = args::build(
            tool,
            &Invocation {
                location,
                dest: &dest,
                task,
                prefetch_max_size: &self.tools.prefetch_max_size,
            },
        );

        let log_path = task.save_log.then(|| self.log_path(tool, task));
        let sink = OutputSink::open(log_path.as_deref(), tool.program(), !task.quiet).await?;

        debug!(program = %program.display(), args = ?args, task_id = %task.task_id, "Spawning external tool");

        let mut command = Command::new(&program);
        // A batch stopped by a fatal error drops this future mid-wait
        command.args(&args).stdin(Stdio::null()).kill_on_drop(true);
        if sink.captures() {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let mut child = command.spawn().map_err(|e| FetchFailure::ToolLaunch {
            program: tool.program().to_string(),
            reason: e.to_string(),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, (), ()) = tokio::join!(
            child.wait(),
            async {
                if let Some(out) = stdout {
                    sink.clone().pump(out).await;
                }
            },
            async {
                if let Some(err) = stderr {
                    sink.clone().pump(err).await;
                }
            },
        );
        sink.flush().await;

        let status = status.map_err(|e| FetchFailure::ToolLaunch {
            program: tool.program().to_string(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            if task.quiet {
                debug!(program = tool.program(), status = %status, dest = %dest.display(), "External tool failed");
            } else {
                warn!(program = tool.program(), status = %status, dest = %dest.display(), "External tool failed");
            }
        }

        if path_exists(&dest).await {
            Ok(dest)
        } else {
            Err(FetchFailure::NoOutput {
                path: dest,
                exit_code: status.code(),
            })
        }
    }
}
