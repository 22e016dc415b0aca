use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use serde_json::{Map, Value};

use crate::config::{RetryPolicy, StoreSettings};

mod distributions;
mod memory;
mod redis_store;

pub use distributions::Distributions;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Top level fields of a stored document.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    Connection(String),
    Backend(String),
    NotFound { collection: String, id: String },
    Serialization(String),
}

impl StoreError {
    /// Worth another attempt: the backend may recover.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Backend(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::Connection(message) => write!(f, "store unreachable: {}", message),
            StoreError::Backend(message) => write!(f, "store failure: {}", message),
            StoreError::NotFound { collection, id } => {
                write!(f, "document {}/{} not found", collection, id)
            }
            StoreError::Serialization(message) => write!(f, "invalid document: {}", message),
        }
    }
}

impl Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        StoreError::Serialization(error.to_string())
    }
}

/// Minimal document database: collections of json objects addressed by id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates or replaces a document.
    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError>;

    /// Merges `fields` into an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Every document of `collection`, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;

    async fn ping(&self) -> bool;
}

pub async fn connect(settings: &StoreSettings) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match settings {
        StoreSettings::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreSettings::Redis { url } => Ok(Arc::new(RedisStore::connect(url).await?)),
    }
}

/// Runs `operation` until it succeeds, fails for good, or `policy` runs out of retries.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < policy.max_retries => {
                let wait = policy.backoff(attempt);

                warn!(
                    "Store operation failed ({}), retry #{} in {:?}",
                    error,
                    attempt + 1,
                    wait
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = with_retry(&policy(3), move || async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(StoreError::Connection("refused".to_string())),
                n => Ok(n),
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = with_retry(&policy(2), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("busy".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = with_retry(&policy(5), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Serialization("bad".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
