use crate::{BalancerError, BalancerResult, LoadBalancingPolicy, LoadMetrics, ServerRegistry};
use common::ServerId;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Picks one active server per chunk.
///
/// The round-robin cursor is a single atomic counter shared by every
/// caller, so concurrent selections each observe a distinct position.
pub struct LoadBalancer {
    registry: Arc<ServerRegistry>,
    policy: LoadBalancingPolicy,
    cursor: AtomicUsize,
    metrics: Option<Arc<dyn LoadMetrics>>,
}

impl LoadBalancer {
    pub fn new(registry: Arc<ServerRegistry>, policy: LoadBalancingPolicy) -> Self {
        Self {
            registry,
            policy,
            cursor: AtomicUsize::new(0),
            metrics: None,
        }
    }

    /// Attach the load source consulted by the least-loaded policy
    pub fn with_metrics(mut self, metrics: Arc<dyn LoadMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Report chunks placed on or removed from a server to the load source
    pub fn record_placement(&self, server_id: ServerId, delta: i64) {
        if let Some(metrics) = &self.metrics {
            metrics.adjust(server_id, delta);
        }
    }

    pub fn policy(&self) -> LoadBalancingPolicy {
        self.policy
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn active_servers(&self) -> Vec<ServerId> {
        self.registry.active_servers()
    }

    /// Select a server using the configured policy
    pub fn select_server(&self) -> BalancerResult<ServerId> {
        self.select_server_with(self.policy)
    }

    /// Select a server using `policy`, failing when no server is active
    pub fn select_server_with(&self, policy: LoadBalancingPolicy) -> BalancerResult<ServerId> {
        let active = self.registry.active_servers();
        if active.is_empty() {
            return Err(BalancerError::NoServerAvailable);
        }

        let selected = match policy {
            LoadBalancingPolicy::RoundRobin => self.next_round_robin(&active),
            LoadBalancingPolicy::Random => {
                active[rand::thread_rng().gen_range(0..active.len())]
            }
            LoadBalancingPolicy::LeastLoaded => self.least_loaded(&active),
        };
        debug!(server_id = %selected, policy = %policy, "Server selected");
        Ok(selected)
    }

    fn next_round_robin(&self, active: &[ServerId]) -> ServerId {
        let position = self.cursor.fetch_add(1, Ordering::Relaxed);
        active[position % active.len()]
    }

    fn least_loaded(&self, active: &[ServerId]) -> ServerId {
        let Some(snapshot) = self.metrics.as_ref().and_then(|m| m.snapshot()) else {
            debug!("No load metrics available, falling back to round_robin");
            return self.next_round_robin(active);
        };

        // (load, id) ordering breaks ties towards the lowest server id
        let lightest = active
            .iter()
            .filter_map(|id| snapshot.get(id).map(|&load| (load, *id)))
            .min();

        match lightest {
            Some((_, server_id)) => server_id,
            None => {
                debug!("No active server has a load reading, falling back to round_robin");
                self.next_round_robin(active)
            }
        }
    }
}
