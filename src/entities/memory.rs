use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{Document, DocumentStore, StoreError};

/// Process local store, used when no redis is configured.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("memory store lock is poisoned".to_string())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        self.collections
            .write()
            .map_err(poisoned)?
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        document.extend(fields);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .map_err(poisoned)?
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        Ok(self
            .collections
            .read()
            .map_err(poisoned)?
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, document)| (id.clone(), document.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ping(&self) -> bool {
        self.collections.read().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_set_replaces_and_update_merges() {
        let store = MemoryStore::new();

        store
            .set("items", "a", document(json!({"x": 1, "y": 2})))
            .await
            .unwrap();
        store.set("items", "a", document(json!({"x": 3}))).await.unwrap();
        store
            .update("items", "a", document(json!({"z": [1, 2]})))
            .await
            .unwrap();

        assert_eq!(
            store.get("items", "a").await.unwrap(),
            Some(document(json!({"x": 3, "z": [1, 2]})))
        );
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = MemoryStore::new();

        assert_eq!(
            store.update("items", "nope", Document::new()).await,
            Err(StoreError::NotFound {
                collection: "items".to_string(),
                id: "nope".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_id() {
        let store = MemoryStore::new();

        for id in ["c", "a", "b"] {
            store.set("items", id, Document::new()).await.unwrap();
        }

        let ids: Vec<String> = store
            .list("items")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(store.list("other").await.unwrap().is_empty());
        assert!(store.ping().await);
    }
}
