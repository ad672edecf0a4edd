use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::GroupId;

/// Per-group write locks.
///
/// Group updates rewrite the whole member list, so every read-modify-write
/// of a group (and every proof submission against one of its bills) holds
/// the group's lock for the duration of the operation.
#[derive(Clone, Default)]
pub struct GroupLocks {
    inner: Arc<Mutex<HashMap<GroupId, Arc<AsyncMutex<()>>>>>,
}

impl GroupLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `group_id`.
    pub async fn lock(&self, group_id: GroupId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(group_id).or_default().clone()
        };
        mutex.lock_owned().await
    }

    /// Drop the lock entry of a deleted group.
    pub fn forget(&self, group_id: GroupId) {
        let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(&group_id);
    }
}
