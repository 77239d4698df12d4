use common::ServerId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BalancerError {
    #[error("no active storage server available")]
    NoServerAvailable,

    #[error("server {0} is not registered")]
    UnknownServer(ServerId),
}

pub type BalancerResult<T> = std::result::Result<T, BalancerError>;
