use async_trait::async_trait;
use log::debug;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client as RedisClient, Pipeline, RedisError, RedisResult};

use super::{Document, DocumentStore, StoreError};

/// Documents live as json strings under `{collection}:{id}`, the ids of a collection
/// are kept in the redis set `{collection}`.
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl From<RedisError> for StoreError {
    fn from(error: RedisError) -> Self {
        if error.is_connection_dropped() || error.is_connection_refusal() || error.is_timeout() {
            StoreError::Connection(error.to_string())
        } else {
            StoreError::Backend(error.to_string())
        }
    }
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = RedisClient::open(url)
            .map_err(|error| StoreError::Connection(format!("Invalid redis url: {}", error)))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| StoreError::Connection(error.to_string()))?;

        Ok(Self { connection })
    }

    fn key(collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }

    /// Stores the document and indexes its id in one MULTI/EXEC transaction.
    fn write(collection: &str, id: &str, payload: &str) -> Pipeline {
        let mut pipeline = redis::pipe();

        pipeline
            .atomic()
            .set(Self::key(collection, id), payload)
            .ignore()
            .sadd(collection, id)
            .ignore();
        pipeline
    }

    fn decode(raw: &str) -> Result<Document, StoreError> {
        Ok(serde_json::from_str::<Document>(raw)?)
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let payload = serde_json::to_string(&document)?;

        let _: () = Self::write(collection, id, &payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        let mut document = self
            .get(collection, id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        document.extend(fields);
        self.set(collection, id, document).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(Self::key(collection, id)).await?;

        raw.as_deref().map(Self::decode).transpose()
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let mut conn = self.connection.clone();
        let mut ids: Vec<String> = conn.smembers(collection).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ids.sort();

        let keys = ids
            .iter()
            .map(|id| Self::key(collection, id))
            .collect::<Vec<_>>();
        // @NOTE: explicit MGET, the typed helper degrades to GET for a single key
        let raws: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut documents = Vec::with_capacity(ids.len());
        for (id, raw) in ids.into_iter().zip(raws) {
            match raw {
                Some(raw) => documents.push((id, Self::decode(&raw)?)),
                None => debug!("Document {}:{} is indexed but missing", collection, id),
            }
        }
        Ok(documents)
    }

    async fn ping(&self) -> bool {
        let mut conn = self.connection.clone();
        let pong: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;

        pong.is_ok()
    }
}
