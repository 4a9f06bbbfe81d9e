//! Retriever seam and the production engine dispatcher.

use crate::engine;
use crate::external::ExternalRunner;
use crate::native::NativeFetcher;
use crate::types::{RetrievalTask, TaskOutcome};
use tracing::debug;

/// Abstraction over running one dispatched retrieval, enabling testability.
#[async_trait::async_trait]
pub(crate) trait Retriever: Send + Sync {
    async fn retrieve(&self, task: &RetrievalTask) -> TaskOutcome;
}

/// Production [`Retriever`]: selects an engine per item and hands the task
/// to the native fetcher or the external runner.
pub(crate) struct EngineDispatcher {
    native: NativeFetcher,
    external: ExternalRunner,
}

impl EngineDispatcher {
    pub(crate) fn new(native: NativeFetcher, external: ExternalRunner) -> Self {
        Self { native, external }
    }
}

#[async_trait::async_trait]
impl Retriever for EngineDispatcher {
    async fn retrieve(&self, task: &RetrievalTask) -> TaskOutcome {
        let selection = engine::select(task.engine, &task.source, task.mirror.as_deref());
        let dest = task.destination();
        debug!(
            engine = %selection.engine,
            location = %selection.location,
            dest = %dest.display(),
            "Dispatching retrieval"
        );

        let result = match selection.engine.external_tool() {
            None => self
                .native
                .fetch(&selection.location, &dest, task.quiet)
                .await
                .map(|()| dest.clone()),
            Some(tool) => self.external.run(tool, task, &selection.location).await,
        };

        match result {
            Ok(path) => TaskOutcome::Fetched { path },
            Err(reason) => TaskOutcome::Failed {
                source: task.source.clone(),
                path: dest,
                reason,
            },
        }
    }
}
