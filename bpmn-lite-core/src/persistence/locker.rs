//! Per-instance locking: exactly one caller
//! may hold an instance's lock at a time; the guard's `Drop` always
//! releases it, giving the "finally always runs" liveness property a
//! systems language without exceptions can't get from a `finally`
//! block. A housekeeping sweep reclaims locks whose holder died
//! without releasing (process crash, not a panic inside the guard's
//! own scope, which `Drop` already covers).

use crate::error::{EngineError, Result};
use crate::types::{now_ms, Id, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const DEFAULT_LEASE_MS: i64 = 30_000;

struct LockEntry {
    holder: Id,
    acquired_at: Timestamp,
    lease_ms: i64,
}

#[derive(Default)]
struct Inner {
    locks: HashMap<Id, LockEntry>,
}

/// Shared lock table. Cheap to clone (`Arc` inside) so both the engine
/// facade and a background sweeper task can hold a handle.
#[derive(Clone)]
pub struct InstanceLocker {
    inner: Arc<Mutex<Inner>>,
}

impl InstanceLocker {
    pub fn new() -> Self {
        InstanceLocker { inner: Arc::new(Mutex::new(Inner::default())) }
    }

    /// Acquire the lock for `instance_id`, or fail immediately if held
    /// by someone else and not yet expired.
    pub async fn acquire(&self, instance_id: Id) -> Result<InstanceLock> {
        let mut inner = self.inner.lock().await;
        let now = now_ms();
        if let Some(entry) = inner.locks.get(&instance_id) {
            if now - entry.acquired_at < entry.lease_ms {
                return Err(EngineError::Locked(instance_id));
            }
            warn!(%instance_id, "reclaiming expired instance lock");
        }
        let holder = crate::types::new_id();
        inner.locks.insert(
            instance_id,
            LockEntry { holder, acquired_at: now, lease_ms: DEFAULT_LEASE_MS },
        );
        debug!(%instance_id, %holder, "instance lock acquired");
        Ok(InstanceLock {
            locker: self.clone(),
            instance_id,
            holder,
            released: false,
        })
    }

    async fn release(&self, instance_id: Id, holder: Id) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.locks.get(&instance_id) {
            if entry.holder == holder {
                inner.locks.remove(&instance_id);
                debug!(%instance_id, %holder, "instance lock released");
            }
        }
    }

    /// Sweep locks whose lease has expired without being released —
    /// the holder's process crashed or was killed mid-hold. Returns how
    /// many were reclaimed.
    pub async fn sweep_expired(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let now = now_ms();
        let expired: Vec<Id> = inner
            .locks
            .iter()
            .filter(|(_, e)| now - e.acquired_at >= e.lease_ms)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            inner.locks.remove(id);
        }
        expired.len()
    }
}

impl Default for InstanceLocker {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard: release on drop. `std::mem::forget`-proof only insofar
/// as any normal control flow (return, `?`, panic-with-unwind) runs
/// destructors; a deliberate `mem::forget` or an abort bypasses it like
/// any other `Drop` guard.
pub struct InstanceLock {
    locker: InstanceLocker,
    instance_id: Id,
    holder: Id,
    released: bool,
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let locker = self.locker.clone();
        let instance_id = self.instance_id;
        let holder = self.holder;
        tokio::spawn(async move {
            locker.release(instance_id, holder).await;
        });
    }
}
