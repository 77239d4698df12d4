use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Rule used to pick the server that receives the next chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingPolicy {
    #[default]
    RoundRobin,
    Random,
    LeastLoaded,
}

impl LoadBalancingPolicy {
    /// Parse a configured policy name. Unknown names fall back to
    /// round-robin with a warning instead of failing.
    pub fn from_config(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "round_robin" | "roundrobin" => LoadBalancingPolicy::RoundRobin,
            "random" => LoadBalancingPolicy::Random,
            "least_loaded" | "least_connections" => LoadBalancingPolicy::LeastLoaded,
            _ => {
                warn!(policy = name, "Unknown load balancing policy, using round_robin");
                LoadBalancingPolicy::RoundRobin
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancingPolicy::RoundRobin => "round_robin",
            LoadBalancingPolicy::Random => "random",
            LoadBalancingPolicy::LeastLoaded => "least_loaded",
        }
    }
}

impl fmt::Display for LoadBalancingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
