//! In-memory `DocumentStore`. Default backend for tests and
//! single-node deployments with no durability requirement, mirroring
//! the established `Arc<RwLock<Inner>>`-guarded store convention.

use crate::error::{EngineError, Result};
use crate::persistence::query::{matches, Query};
use crate::persistence::store::{Document, DocumentStore};
use async_trait::async_trait;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    collections: BTreeMap<String, BTreeMap<String, Json>>,
    unique_indexes: BTreeMap<String, Vec<String>>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore { inner: RwLock::new(Inner::default()) }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        let inner = self.inner.read().await;
        let docs = inner
            .collections
            .get(collection)
            .map(|c| {
                c.iter()
                    .filter(|(_, body)| matches(body, query))
                    .map(|(id, body)| Document { id: id.clone(), body: body.clone() })
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn find_one(&self, collection: &str, query: &Query) -> Result<Option<Document>> {
        Ok(self.find(collection, query).await?.into_iter().next())
    }

    async fn insert(&self, collection: &str, id: &str, body: Json) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(fields) = inner.unique_indexes.get(collection).cloned() {
            if let Some(existing) = inner.collections.get(collection) {
                for (existing_id, existing_body) in existing {
                    if existing_id == id {
                        continue;
                    }
                    if fields.iter().all(|f| {
                        crate::data_path::read(existing_body, f) == crate::data_path::read(&body, f)
                            && crate::data_path::read(&body, f).is_some()
                    }) {
                        return Err(EngineError::Validation {
                            element_id: collection.to_string(),
                            message: format!("unique index violation on {fields:?}"),
                        });
                    }
                }
            }
        }
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), body);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, body: Json) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), body);
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(c) = inner.collections.get_mut(collection) {
            c.remove(id);
        }
        Ok(())
    }

    async fn create_unique_index(&self, collection: &str, field_path: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let entry = inner.unique_indexes.entry(collection.to_string()).or_default();
        if !entry.contains(&field_path.to_string()) {
            entry.push(field_path.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_then_find() {
        let store = MemoryStore::new();
        store.insert("instances", "i1", json!({"status": "running"})).await.unwrap();
        let found = store.find("instances", &Query::eq("status", json!("running"))).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "i1");
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicate() {
        let store = MemoryStore::new();
        store.create_unique_index("instances", "business_key").await.unwrap();
        store.insert("instances", "i1", json!({"business_key": "ORDER-1"})).await.unwrap();
        let err = store.insert("instances", "i2", json!({"business_key": "ORDER-1"})).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn remove_deletes_document() {
        let store = MemoryStore::new();
        store.insert("instances", "i1", json!({})).await.unwrap();
        store.remove("instances", "i1").await.unwrap();
        assert!(store.find_one("instances", &Query::All).await.unwrap().is_none());
    }
}
