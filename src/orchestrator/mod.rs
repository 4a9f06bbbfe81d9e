//! Batch orchestrator and concurrency controller.
//!
//! [`BatchFetcher`] owns the per-run state (HTTP session, progress registry,
//! engines) and drives batches through it:
//! - [`dispatch`] - Retriever trait and the engine dispatcher
//!
//! Each item gets its own task. Tasks are spawned in input order, each after
//! acquiring one permit of a semaphore sized to the batch concurrency, and
//! release it when they finish whatever the outcome. A batch returns once
//! every task has been joined and the progress registry has drained.

mod dispatch;


use crate::config::Config;
use crate::error::{Error, FetchFailure, Result};
use crate::external::ExternalRunner;
use crate::filename::resolve_filename;
use crate::native::NativeFetcher;
use crate::progress::ProgressRegistry;
use crate::session::Session;
use crate::types::{BatchOptions, BatchReport, EngineName, FetchRequest, RetrievalTask, TaskOutcome};
use crate::utils::{ensure_dir, path_exists, remove_existing, split_extra_args};
use dispatch::{EngineDispatcher, Retriever};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Fetches batches of source locations (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct BatchFetcher {
    /// Configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    /// Cookie store shared by every native fetch of this fetcher
    session: Arc<Session>,
    /// Progress bars of in-flight native transfers
    progress: ProgressRegistry,
    /// Engine dispatch (trait object so tests can observe dispatches)
    retriever: Arc<dyn Retriever>,
}

impl BatchFetcher {
    /// Validate `config` and build the session, progress registry and engines
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let session = Arc::new(Session::new(&config.http)?);
        let progress = ProgressRegistry::new(&config.progress);
        let native = NativeFetcher::new(Arc::clone(&session), progress.clone(), &config)?;
        let external = ExternalRunner::new(&config);

        Ok(Self {
            retriever: Arc::new(EngineDispatcher::new(native, external)),
            config: Arc::new(config),
            session,
            progress,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_retriever(config: Config, retriever: Arc<dyn Retriever>) -> Result<Self> {
        let mut fetcher = Self::new(config)?;
        fetcher.retriever = retriever;
        Ok(fetcher)
    }

    /// Configuration this fetcher was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared HTTP session (cookie store)
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Shared progress registry
    pub fn progress(&self) -> &ProgressRegistry {
        &self.progress
    }

    /// Fetch every request, at most `concurrency` at a time.
    ///
    /// Items whose destination already exists are skipped unless
    /// `overwrite` (remove first) or `ignore_existing` (dispatch anyway) is
    /// set. Per-item failures are recorded in the report; only an unusable
    /// output directory stops the batch, in which case the error is returned
    /// once the tasks already running have been torn down.
    pub async fn fetch_all(&self, requests: &[FetchRequest], options: &BatchOptions) -> Result<BatchReport> {
        let concurrency = options
            .concurrency
            .unwrap_or(self.config.download.concurrency)
            .max(1);

        // External tools already write to the console
        let quiet = options.quiet
            || (requests.len() > 1 && concurrency > 1 && options.engine != EngineName::NativeHttp);

        for request in requests {
            let dest = request.dest_dir.join(resolve_filename(&request.source));
            if quiet {
                debug!("Trying {} => {}", request.source, dest.display());
            } else {
                info!("Trying {} => {}", request.source, dest.display());
            }
        }

        let extra_args = split_extra_args(&options.extra_args);
        let axel_threads = options
            .axel_threads
            .unwrap_or(self.config.download.axel_threads)
            .max(1);

        let permits = Arc::new(Semaphore::new(concurrency));
        let mut running: JoinSet<(usize, TaskOutcome)> = JoinSet::new();
        let mut outcomes: Vec<Option<TaskOutcome>> = vec![None; requests.len()];
        let mut fatal: Option<Error> = None;

        for (index, request) in requests.iter().enumerate() {
            if let Err(failure) = ensure_dir(&request.dest_dir).await {
                fatal = Some(failure.into());
                break;
            }

            let task = RetrievalTask {
                index,
                source: request.source.clone(),
                dest_dir: request.dest_dir.clone(),
                filename: resolve_filename(&request.source),
                engine: options.engine,
                mirror: options.mirror.clone(),
                extra_args: extra_args.clone(),
                task_id: options.task_id.clone(),
                overwrite: options.overwrite,
                ignore_existing: options.ignore_existing,
                quiet,
                save_log: options.save_log,
                axel_threads,
                gdc_token: options.gdc_token.clone(),
                gdc_manifest: options.gdc_manifest.clone(),
                prefetch_key: options.prefetch_key.clone(),
            };
            let dest = task.destination();

            if options.overwrite
                && let Err(e) = remove_existing(&dest).await
            {
                if quiet {
                    debug!(dest = %dest.display(), error = %e, "Can not remove existing destination");
                } else {
                    warn!(dest = %dest.display(), error = %e, "Can not remove existing destination");
                }
            }

            if path_exists(&dest).await && !options.ignore_existing {
                if quiet {
                    debug!("{} existed.", dest.display());
                } else {
                    info!("{} existed.", dest.display());
                }
                outcomes[index] = Some(TaskOutcome::Skipped { path: dest });
                continue;
            }

            // Blocks until a running task finishes when all permits are taken
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };

            while let Some(joined) = running.try_join_next() {
                record(joined, &mut outcomes, &mut fatal);
            }
            if fatal.is_some() {
                break;
            }

            let retriever = Arc::clone(&self.retriever);
            running.spawn(async move {
                let _permit = permit;
                let outcome = retriever.retrieve(&task).await;
                (task.index, outcome)
            });
        }

        // Dropping an aborted task kills its external program and removes
        // its partial download
        if fatal.is_some() {
            running.abort_all();
        }
        while let Some(joined) = running.join_next().await {
            record(joined, &mut outcomes, &mut fatal);
        }
        self.progress.wait_drained().await;

        if let Some(err) = fatal {
            error!(error = %err, "Batch aborted");
            return Err(err);
        }

        let outcomes = outcomes
            .into_iter()
            .zip(requests)
            .map(|(outcome, request)| {
                outcome.unwrap_or_else(|| TaskOutcome::Failed {
                    source: request.source.clone(),
                    path: request.dest_dir.join(resolve_filename(&request.source)),
                    reason: FetchFailure::Aborted,
                })
            })
            .collect();

        Ok(BatchReport { outcomes })
    }

    /// Fetch a single source into `dest_dir`
    pub async fn fetch_one(&self, source: &str, dest_dir: &Path, options: &BatchOptions) -> Result<TaskOutcome> {
        let report = self
            .fetch_all(&[FetchRequest::new(source, dest_dir)], options)
            .await?;
        report
            .outcomes
            .into_iter()
            .next()
            .ok_or_else(|| Error::Other("batch produced no outcome".to_string()))
    }
}

fn record(
    joined: std::result::Result<(usize, TaskOutcome), JoinError>,
    outcomes: &mut [Option<TaskOutcome>],
    fatal: &mut Option<Error>,
) {
    match joined {
        Ok((index, outcome)) => {
            if let TaskOutcome::Failed { reason, .. } = &outcome
                && reason.is_fatal()
                && fatal.is_none()
            {
                *fatal = Some(reason.clone().into());
            }
            if let Some(slot) = outcomes.get_mut(index) {
                *slot = Some(outcome);
            }
        }
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!(error = %e, "Retrieval task panicked"),
    }
}
