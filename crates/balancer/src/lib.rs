//! Server registry and chunk placement policies

pub mod balancer;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod registry;

pub use balancer::LoadBalancer;
pub use error::{BalancerError, BalancerResult};
pub use metrics::{LoadMetrics, LoadSnapshot, StaticLoadMetrics};
pub use policy::LoadBalancingPolicy;
pub use registry::ServerRegistry;
