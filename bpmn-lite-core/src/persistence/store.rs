//! Document-store abstraction: a Mongo-like `find`/`insert`/
//! `update`/`remove`/`create_unique_index` contract the engine persists
//! `Execution`s and `Definition`s through. Kept as a trait so the
//! engine is agnostic to the backing store — in-memory for tests and
//! single-node deployments, Postgres/JSONB for anything durable.

use crate::error::Result;
use crate::persistence::query::Query;
use async_trait::async_trait;
use serde_json::Value as Json;

/// One stored document: an opaque JSON body plus the id it was
/// inserted under.
#[derive(Clone, Debug)]
pub struct Document {
    pub id: String,
    pub body: Json,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;
    async fn find_one(&self, collection: &str, query: &Query) -> Result<Option<Document>>;
    async fn insert(&self, collection: &str, id: &str, body: Json) -> Result<()>;
    async fn update(&self, collection: &str, id: &str, body: Json) -> Result<()>;
    async fn remove(&self, collection: &str, id: &str) -> Result<()>;
    async fn create_unique_index(&self, collection: &str, field_path: &str) -> Result<()>;
}
