//! Configuration types for epub-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for [`EpubDownloader`](crate::EpubDownloader)
///
/// Works out of the box with [`Config::default()`]; every field can be
/// overridden, which the tests use to point the client at a mock server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the remote content API (default: the public service)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Path of the sqlite cache database (default: "./epub-cache.db")
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Maximum concurrent file downloads (default: 10)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Startup delay between the first wave of pool workers (default: 50ms)
    ///
    /// Worker `w` waits `w * stagger` before its first pull, spreading the cold
    /// start instead of bursting `concurrency` requests at once.
    #[serde(default = "default_stagger", with = "duration_millis")]
    pub stagger: Duration,

    /// Courtesy delay between manifest listing pages (default: 100ms)
    #[serde(default = "default_page_delay", with = "duration_millis")]
    pub page_delay: Duration,

    /// Retry behavior for individual HTTP requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Maximum number of retained history entries (default: 100)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            cache_path: default_cache_path(),
            concurrency: default_concurrency(),
            stagger: default_stagger(),
            page_delay: default_page_delay(),
            retry: RetryConfig::default(),
            history_limit: default_history_limit(),
        }
    }
}

/// Retry configuration for transient HTTP failures
///
/// A request is attempted `max_retries + 1` times in total. The backoff before
/// retry `n` (zero-based) is `min(base_delay * 2^n, max_delay)`, unless the
/// server sent a `Retry-After` header, which is honored exactly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first failure (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay (default: 1s)
    #[serde(default = "default_base_delay", with = "duration_millis")]
    pub base_delay: Duration,

    /// Backoff ceiling (default: 10s)
    #[serde(default = "default_max_delay", with = "duration_millis")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// Backoff delay before the given zero-based retry attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Per-run download options supplied by the caller
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Serve previously cached files instead of re-downloading them (default: true)
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Ignore cached metadata and files for this run (default: false)
    #[serde(default)]
    pub force_refresh: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_refresh: false,
        }
    }
}

fn default_api_base() -> String {
    "https://learning.oreilly.com".to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./epub-cache.db")
}

fn default_concurrency() -> usize {
    10
}

fn default_stagger() -> Duration {
    Duration::from_millis(50)
}

fn default_page_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_history_limit() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_delay() -> Duration {
    Duration::from_millis(10_000)
}

fn default_true() -> bool {
    true
}

/// Serialize/deserialize a `Duration` as integer milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
