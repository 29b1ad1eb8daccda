//! Persistence of extracted records to the document database.
//!
//! The database is optional. [`MongoDocumentStore::connect`] returns an error
//! when the server cannot be reached, and the service then runs without
//! persistence instead of refusing to start.

use crate::config::DocumentStoreConfig;
use crate::error::Doc2JsonError;
use crate::schema::ExtractedRecord;
use async_trait::async_trait;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::{Client, Collection};
use tracing::{debug, info};

/// Insert-only store for extracted records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert `record`, returning the store-assigned identifier.
    async fn insert(&self, record: &ExtractedRecord) -> Result<String, Doc2JsonError>;
}

/// [`DocumentStore`] over one MongoDB collection.
pub struct MongoDocumentStore {
    collection: Collection<Document>,
}

impl MongoDocumentStore {
    pub fn new(collection: Collection<Document>) -> Self {
        Self { collection }
    }

    /// Connect and ping the server.
    ///
    /// Returns `Ok(None)` when no URI is configured.
    pub async fn connect(config: &DocumentStoreConfig) -> Result<Option<Self>, Doc2JsonError> {
        let Some(ref uri) = config.uri else {
            return Ok(None);
        };

        let unavailable = |e: mongodb::error::Error| Doc2JsonError::DatabaseUnavailable {
            detail: e.to_string(),
        };

        let client = Client::with_uri_str(uri).await.map_err(unavailable)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(unavailable)?;

        info!(
            "Document store: {}.{}",
            config.database, config.collection
        );
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);
        Ok(Some(Self::new(collection)))
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn insert(&self, record: &ExtractedRecord) -> Result<String, Doc2JsonError> {
        let document = bson::to_document(record).map_err(|e| Doc2JsonError::PersistFailed {
            detail: e.to_string(),
        })?;

        let result = self
            .collection
            .insert_one(document)
            .await
            .map_err(|e| Doc2JsonError::PersistFailed {
                detail: e.to_string(),
            })?;

        let id = id_to_string(&result.inserted_id);
        debug!("Inserted record {}", id);
        Ok(id)
    }
}

fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}
