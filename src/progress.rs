//! Multi-bar progress display for native HTTP transfers
//!
//! [`ProgressRegistry`] wraps an [`indicatif::MultiProgress`] and counts the
//! bars currently registered. Each transfer holds a [`TransferBar`] for its
//! lifetime; dropping the bar deregisters it without touching bars owned by
//! other transfers. The orchestrator awaits [`ProgressRegistry::wait_drained`]
//! before returning a batch.

use crate::config::ProgressConfig;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Labels longer than this are truncated
const LABEL_WIDTH: usize = 35;

/// Characters kept before the ellipsis of a truncated label
const LABEL_KEEP: usize = 31;

const SIZED_TEMPLATE: &str = "{prefix} {bytes:>10} / {total_bytes:<10} {percent:>3}% [{bar:45}] {eta} {bytes_per_sec} {msg}";

const UNSIZED_TEMPLATE: &str = "{prefix} {bytes:>10} {spinner} {bytes_per_sec} {msg}";

const BAR_CHARS: &str = "=>-";

const DONE_MARK: &str = "√";

const ABANDONED_MARK: &str = "x";

fn sized_style() -> ProgressStyle {
    ProgressStyle::with_template(SIZED_TEMPLATE)
        .map(|style| style.progress_chars(BAR_CHARS))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn unsized_style() -> ProgressStyle {
    ProgressStyle::with_template(UNSIZED_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Bar label for a destination: its basename, truncated to 31 characters plus
/// an ellipsis when longer than 35, then padded to a fixed width.
#[must_use]
pub fn bar_label(dest: &Path) -> String {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = if name.chars().count() > LABEL_WIDTH {
        let kept: String = name.chars().take(LABEL_KEEP).collect();
        format!("{kept}...")
    } else {
        name
    };
    format!("{name:<LABEL_WIDTH$}")
}

struct Counter {
    active: AtomicUsize,
    drained: Notify,
}

/// Shared multi-bar display; cheap to clone
#[derive(Clone)]
pub struct ProgressRegistry {
    multi: MultiProgress,
    counter: Arc<Counter>,
}

impl ProgressRegistry {
    /// Create a registry drawing to stderr, or hidden when progress is disabled
    pub fn new(config: &ProgressConfig) -> Self {
        let target = if config.enabled {
            ProgressDrawTarget::stderr_with_hz(config.refresh_rate_hz.max(1))
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            counter: Arc::new(Counter {
                active: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
        }
    }

    /// Registry that tracks bars without drawing them
    pub fn hidden() -> Self {
        Self::new(&ProgressConfig {
            enabled: false,
            ..Default::default()
        })
    }

    /// Register a bar for one transfer. `total` is the declared content length;
    /// `None` gives an indeterminate spinner.
    pub fn register(&self, label: String, total: Option<u64>) -> TransferBar {
        let bar = match total {
            Some(len) => ProgressBar::new(len).with_style(sized_style()),
            None => ProgressBar::no_length().with_style(unsized_style()),
        };
        let bar = self.multi.add(bar.with_prefix(label));
        self.counter.active.fetch_add(1, Ordering::SeqCst);
        TransferBar {
            bar,
            counter: Arc::clone(&self.counter),
            finished: false,
        }
    }

    /// Number of bars currently registered
    pub fn active(&self) -> usize {
        self.counter.active.load(Ordering::SeqCst)
    }

    /// Wait until every registered bar has been dropped
    pub async fn wait_drained(&self) {
        loop {
            // Created before the check so a concurrent drop cannot be missed
            let notified = self.counter.drained.notified();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// One transfer's bar; deregisters on drop
pub struct TransferBar {
    bar: ProgressBar,
    counter: Arc<Counter>,
    finished: bool,
}

impl TransferBar {
    /// Advance by `bytes` copied
    pub fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    /// Bytes copied so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Mark the transfer complete
    pub fn finish(mut self) {
        self.bar.finish_with_message(DONE_MARK);
        self.finished = true;
    }
}

impl Drop for TransferBar {
    fn drop(&mut self) {
        if !self.finished {
            self.bar.abandon_with_message(ABANDONED_MARK);
        }
        if self.counter.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.counter.drained.notify_waiters();
        }
    }
}
