use std::sync::Arc;

use log::warn;
use serde_json::Value;

use super::{with_retry, Document, DocumentStore, StoreError};
use crate::config::RetryPolicy;
use crate::schemas::{Distribution, PercentileRatings, PerfType, DISTRIBUTIONS};

/// Typed access to the `distributions` collection.
#[derive(Clone)]
pub struct Distributions {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl Distributions {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Stores a snapshot and returns its id.
    pub async fn save(&self, distribution: &Distribution) -> Result<String, StoreError> {
        let id = distribution.id();
        let document = match serde_json::to_value(distribution)? {
            Value::Object(document) => document,
            _ => {
                return Err(StoreError::Serialization(
                    "distribution is not an object".to_string(),
                ))
            }
        };

        with_retry(&self.retry, || {
            self.store.set(DISTRIBUTIONS, &id, document.clone())
        })
        .await?;
        Ok(id)
    }

    pub async fn save_percentiles(
        &self,
        id: &str,
        percentiles: &PercentileRatings,
    ) -> Result<(), StoreError> {
        let mut fields = Document::new();
        fields.insert("percentiles".to_string(), serde_json::to_value(percentiles)?);

        with_retry(&self.retry, || {
            self.store.update(DISTRIBUTIONS, id, fields.clone())
        })
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Distribution>, StoreError> {
        match self.store.get(DISTRIBUTIONS, id).await? {
            Some(document) => Ok(Some(serde_json::from_value(Value::Object(document))?)),
            None => Ok(None),
        }
    }

    /// Every readable snapshot with its id, documents that do not decode are skipped.
    pub async fn list(&self) -> Result<Vec<(String, Distribution)>, StoreError> {
        Ok(self
            .store
            .list(DISTRIBUTIONS)
            .await?
            .into_iter()
            .filter_map(
                |(id, document)| match serde_json::from_value(Value::Object(document)) {
                    Ok(distribution) => Some((id, distribution)),
                    Err(error) => {
                        warn!("Skip unreadable distribution {}: {}", id, error);
                        None
                    }
                },
            )
            .collect())
    }

    /// Snapshots of one perf type, oldest first.
    pub async fn list_by_perf_type(
        &self,
        perf_type: PerfType,
    ) -> Result<Vec<Distribution>, StoreError> {
        let mut distributions = self
            .list()
            .await?
            .into_iter()
            .map(|(_, distribution)| distribution)
            .filter(|distribution| distribution.perf_type == perf_type)
            .collect::<Vec<_>>();

        distributions.sort_by_key(|distribution| distribution.date);
        Ok(distributions)
    }

    pub async fn ping(&self) -> bool {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::MemoryStore;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn repository() -> Distributions {
        Distributions::new(Arc::new(MemoryStore::new()), RetryPolicy::default())
    }

    fn snapshot(perf_type: PerfType, hour: u32) -> Distribution {
        Distribution::new(
            perf_type,
            Utc.with_ymd_and_hms(2020, 4, 7, hour, 0, 0).unwrap(),
            vec![1, 2, 3],
        )
    }

    #[tokio::test]
    async fn test_save_then_attach_percentiles() {
        let distributions = repository();
        let id = distributions.save(&snapshot(PerfType::Bullet, 9)).await.unwrap();
        let ratings = BTreeMap::from([("50".to_string(), 1500.0)]);

        distributions.save_percentiles(&id, &ratings).await.unwrap();

        let stored = distributions.get(&id).await.unwrap().unwrap();
        assert_eq!(id, "bullet07042009");
        assert_eq!(stored.distribution, vec![1, 2, 3]);
        assert_eq!(stored.percentiles, Some(ratings));
    }

    #[tokio::test]
    async fn test_percentiles_need_a_snapshot() {
        let result = repository()
            .save_percentiles("missing", &BTreeMap::new())
            .await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_by_perf_type() {
        let distributions = repository();

        for (perf_type, hour) in [
            (PerfType::Blitz, 12),
            (PerfType::Bullet, 10),
            (PerfType::Blitz, 8),
        ] {
            distributions.save(&snapshot(perf_type, hour)).await.unwrap();
        }

        let blitz = distributions
            .list_by_perf_type(PerfType::Blitz)
            .await
            .unwrap();
        assert_eq!(blitz.len(), 2);
        assert!(blitz[0].date < blitz[1].date);
        assert_eq!(distributions.list().await.unwrap().len(), 3);
    }
}
