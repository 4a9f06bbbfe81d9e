//! Test configuration helpers for building fetchers isolated in a temp dir

use scifetch::config::RetryConfig;
use scifetch::{BatchFetcher, BatchOptions, Config, TaskId};
use std::path::Path;
use std::time::Duration;

/// Task identifier used by every integration test batch
pub const TEST_TASK_ID: &str = "ITEST";

/// Config with logs under `root`, no drawn progress, no PATH lookup and fast retries
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.log_dir = root.join("_log");
    config.progress.enabled = false;
    config.tools.search_path = false;
    config.http.user_agent = "scifetch-itest/1.0".to_string();
    config.retry = RetryConfig {
        max_attempts: 0,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Fetcher built from [`test_config`]
pub fn test_fetcher(root: &Path) -> BatchFetcher {
    BatchFetcher::new(test_config(root)).unwrap()
}

/// Batch options with a fixed task ID
pub fn test_options(concurrency: usize) -> BatchOptions {
    BatchOptions {
        concurrency: Some(concurrency),
        task_id: TaskId::from(TEST_TASK_ID),
        ..Default::default()
    }
}
