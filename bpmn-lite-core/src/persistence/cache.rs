//! Live-instance cache: a running `Execution` held
//! in-memory while its lock is checked out avoids a store round trip
//! per lifecycle step. Evicted as soon as the instance waits or ends,
//! since only the locker — not this cache — is required for
//! correctness; this is purely an optimization over re-fetching.

use crate::runtime::execution::Execution;
use crate::types::Id;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct ExecutionCache {
    inner: Arc<RwLock<HashMap<Id, Execution>>>,
}

impl ExecutionCache {
    pub fn new() -> Self {
        ExecutionCache { inner: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn get(&self, instance_id: Id) -> Option<Execution> {
        self.inner.read().await.get(&instance_id).cloned()
    }

    pub async fn put(&self, exec: Execution) {
        self.inner.write().await.insert(exec.instance_id, exec);
    }

    pub async fn evict(&self, instance_id: Id) {
        self.inner.write().await.remove(&instance_id);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

impl Default for ExecutionCache {
    fn default() -> Self {
        Self::new()
    }
}
