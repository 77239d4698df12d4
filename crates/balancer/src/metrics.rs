use common::ServerId;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// Current load reading per server, e.g. open connection count
pub type LoadSnapshot = BTreeMap<ServerId, u64>;

/// Source of per-server load readings for least-loaded placement
pub trait LoadMetrics: Send + Sync {
    /// A consistent snapshot of readings, or `None` when the source is unavailable
    fn snapshot(&self) -> Option<LoadSnapshot>;

    /// Account for `delta` chunks placed on (positive) or removed from
    /// (negative) a server. Sources that measure load externally ignore it.
    fn adjust(&self, _server_id: ServerId, _delta: i64) {}
}

/// Load readings pushed by an operator or an external monitor
#[derive(Debug)]
pub struct StaticLoadMetrics {
    loads: RwLock<LoadSnapshot>,
    available: AtomicBool,
}

impl Default for StaticLoadMetrics {
    fn default() -> Self {
        Self {
            loads: RwLock::new(LoadSnapshot::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl StaticLoadMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_load(&self, server_id: ServerId, load: u64) {
        self.loads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(server_id, load);
    }

    pub fn clear(&self) {
        self.loads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl FromIterator<(ServerId, u64)> for StaticLoadMetrics {
    fn from_iter<I: IntoIterator<Item = (ServerId, u64)>>(iter: I) -> Self {
        Self {
            loads: RwLock::new(iter.into_iter().collect()),
            available: AtomicBool::new(true),
        }
    }
}

impl LoadMetrics for StaticLoadMetrics {
    fn snapshot(&self) -> Option<LoadSnapshot> {
        if !self.available.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.loads.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn adjust(&self, server_id: ServerId, delta: i64) {
        let mut loads = self.loads.write().unwrap_or_else(PoisonError::into_inner);
        let load = loads.entry(server_id).or_insert(0);
        *load = if delta < 0 {
            load.saturating_sub(delta.unsigned_abs())
        } else {
            load.saturating_add(delta as u64)
        };
    }
}
