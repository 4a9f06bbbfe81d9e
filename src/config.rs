//! Configuration types for scifetch

use crate::error::{Error, Result};
use crate::types::EngineName;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf, time::Duration};

/// Desktop browser user agent sent with every native request.
/// Several publishers refuse or redirect non-browser agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/56.0.2924.87 Safari/537.36";

/// Batch behaviour (log location, concurrency, per-tool threading)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory for external tool logs (default: "_log")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Maximum concurrent retrievals (default: 3)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Connections per file when delegating to axel (default: 5)
    #[serde(default = "default_axel_threads")]
    pub axel_threads: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            concurrency: default_concurrency(),
            axel_threads: default_axel_threads(),
        }
    }
}

/// A publisher that answers with an HTML landing page embedding the real asset URL
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherQuirk {
    /// URL prefix identifying the publisher (e.g. "https://www.sciencedirect.com")
    pub origin: String,
    /// Regex matching the embedded asset URL inside the landing page
    pub asset_pattern: String,
}

/// Native HTTP client settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Redirect hops followed before the request fails (default: 20)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Connection timeout (None = client default)
    #[serde(default, with = "optional_duration_serde")]
    pub connect_timeout: Option<Duration>,

    /// Publisher landing-page rewrites
    #[serde(default = "default_publisher_quirks")]
    pub publisher_quirks: Vec<PublisherQuirk>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
            connect_timeout: None,
            publisher_quirks: default_publisher_quirks(),
        }
    }
}

/// External tool discovery
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Explicit binary per engine; takes precedence over PATH lookup
    #[serde(default)]
    pub paths: HashMap<EngineName, PathBuf>,

    /// Whether to search PATH for binaries that have no explicit path (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Maximum download size passed to prefetch (default: "500GB")
    #[serde(default = "default_prefetch_max_size")]
    pub prefetch_max_size: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            paths: HashMap::new(),
            search_path: true,
            prefetch_max_size: default_prefetch_max_size(),
        }
    }
}

/// Retry configuration for transient native HTTP failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Progress display settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Draw bars to stderr; when false bars are tracked but never drawn
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redraws per second (default: 5)
    #[serde(default = "default_refresh_rate_hz")]
    pub refresh_rate_hz: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_rate_hz: default_refresh_rate_hz(),
        }
    }
}

/// Main configuration for [`BatchFetcher`](crate::BatchFetcher)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Batch behaviour
    #[serde(default)]
    pub download: DownloadConfig,

    /// Native HTTP client
    #[serde(default)]
    pub http: HttpConfig,

    /// External tool discovery
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Transient failure retries
    #[serde(default)]
    pub retry: RetryConfig,

    /// Progress display
    #[serde(default)]
    pub progress: ProgressConfig,
}

impl Config {
    /// Check values that would make every batch fail
    pub fn validate(&self) -> Result<()> {
        if self.download.concurrency == 0 {
            return Err(Error::config(
                "download.concurrency",
                "concurrency must be at least 1",
            ));
        }
        if self.download.axel_threads == 0 {
            return Err(Error::config(
                "download.axel_threads",
                "axel_threads must be at least 1",
            ));
        }
        if self.progress.refresh_rate_hz == 0 {
            return Err(Error::config(
                "progress.refresh_rate_hz",
                "refresh rate must be at least 1",
            ));
        }
        for quirk in &self.http.publisher_quirks {
            if let Err(e) = regex::Regex::new(&quirk.asset_pattern) {
                return Err(Error::config(
                    "http.publisher_quirks",
                    format!("invalid asset pattern for {}: {}", quirk.origin, e),
                ));
            }
        }
        Ok(())
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("_log")
}

fn default_concurrency() -> usize {
    3
}

fn default_axel_threads() -> usize {
    5
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_redirects() -> usize {
    20
}

fn default_publisher_quirks() -> Vec<PublisherQuirk> {
    vec![PublisherQuirk {
        origin: "https://www.sciencedirect.com".to_string(),
        asset_pattern: "https://pdf.sciencedirectassets.com/.*&type=client".to_string(),
    }]
}

fn default_prefetch_max_size() -> String {
    "500GB".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_refresh_rate_hz() -> u8 {
    5
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
