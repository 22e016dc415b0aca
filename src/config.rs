use std::io::{Error, ErrorKind, Result};
use std::str::FromStr;
use std::time::Duration;

use reqwest_retry::policies::ExponentialBackoff;

use crate::algorithm::BucketGeometry;
use crate::schemas::PerfType;

pub const DEFAULT_PERCENTILES: [f64; 5] = [0.05, 0.25, 0.5, 0.75, 0.95];

/// Retry schedule applied at the I/O boundary: http fetches and store writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            min_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn exponential_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::builder()
            .retry_bounds(self.min_backoff, self.max_backoff)
            .build_with_max_retries(self.max_retries)
    }

    /// Wait before retry number `attempt` (0 based): doubles from `min_backoff`,
    /// capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));

        self.min_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreSettings {
    Memory,
    Redis { url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    // @NOTE: server
    pub host: String,
    pub port: u16,
    pub concurrent: usize,

    // @NOTE: storage
    pub store: StoreSettings,

    // @NOTE: scraping
    pub cron: String,
    pub delay: Duration,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub perf_types: Vec<PerfType>,

    // @NOTE: statistics
    pub geometry: BucketGeometry,
    pub percentiles: Vec<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            concurrent: 1,
            store: StoreSettings::Memory,
            cron: "0 * * * *".to_string(),
            delay: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            perf_types: PerfType::ALL.to_vec(),
            geometry: BucketGeometry::LICHESS,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from any variable source, unset variables keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let redis_host = lookup("REDIS_HOST").unwrap_or_default();
        let store = if redis_host.is_empty() {
            StoreSettings::Memory
        } else {
            StoreSettings::Redis {
                url: format!(
                    "redis://{}:{}@{}:{}",
                    lookup("REDIS_USERNAME").unwrap_or_default(),
                    lookup("REDIS_PASSWORD").unwrap_or_default(),
                    redis_host,
                    lookup("REDIS_PORT").unwrap_or_else(|| "6379".to_string()),
                ),
            }
        };

        let retry = RetryPolicy {
            max_retries: parse(&lookup, "RETRY_MAX", defaults.retry.max_retries)?,
            min_backoff: Duration::from_millis(parse(
                &lookup,
                "RETRY_MIN_BACKOFF_MS",
                defaults.retry.min_backoff.as_millis() as u64,
            )?),
            max_backoff: Duration::from_millis(parse(
                &lookup,
                "RETRY_MAX_BACKOFF_MS",
                defaults.retry.max_backoff.as_millis() as u64,
            )?),
        };
        if retry.min_backoff > retry.max_backoff {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Invalid RETRY_MIN_BACKOFF_MS: larger than RETRY_MAX_BACKOFF_MS",
            ));
        }

        let geometry = BucketGeometry::new(
            parse(&lookup, "BUCKET_START", defaults.geometry.start)?,
            parse(&lookup, "BUCKET_WIDTH", defaults.geometry.width)?,
        )
        .map_err(|error| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid BUCKET_START/BUCKET_WIDTH: {}", error),
            )
        })?;

        Ok(Self {
            host: lookup("SERVER_HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "SERVER_PORT", defaults.port)?,
            concurrent: parse(&lookup, "SERVER_CONCURRENT", defaults.concurrent)?,
            store,
            cron: lookup("SCRAPE_CRON").unwrap_or(defaults.cron),
            delay: Duration::from_millis(parse(
                &lookup,
                "SCRAPE_DELAY_MS",
                defaults.delay.as_millis() as u64,
            )?),
            timeout: Duration::from_secs(parse(
                &lookup,
                "SCRAPE_TIMEOUT",
                defaults.timeout.as_secs(),
            )?),
            retry,
            perf_types: parse_list(&lookup, "PERF_TYPES", defaults.perf_types)?,
            geometry,
            percentiles: parse_percentiles(&lookup, defaults.percentiles)?,
        })
    }
}

fn parse<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|_| Error::new(ErrorKind::InvalidInput, format!("Invalid {}", name))),
        _ => Ok(default),
    }
}

fn parse_list<F, T>(lookup: &F, name: &str, default: Vec<T>) -> Result<Vec<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => value
            .split(',')
            .map(|item| {
                item.trim().parse::<T>().map_err(|_| {
                    Error::new(
                        ErrorKind::InvalidInput,
                        format!("Invalid {}: `{}`", name, item.trim()),
                    )
                })
            })
            .collect(),
        _ => Ok(default),
    }
}

fn parse_percentiles<F>(lookup: &F, default: Vec<f64>) -> Result<Vec<f64>>
where
    F: Fn(&str) -> Option<String>,
{
    let percentiles = parse_list(lookup, "PERCENTILES", default)?;

    match percentiles.iter().find(|p| !(**p > 0.0 && **p < 1.0)) {
        Some(p) => Err(Error::new(
            ErrorKind::InvalidInput,
            format!("Invalid PERCENTILES: {} is outside of (0, 1)", p),
        )),
        None => Ok(percentiles),
    }
}
