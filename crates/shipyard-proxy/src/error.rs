//! Error types for port and proxy rules.

use thiserror::Error;

/// Result type alias for port parsing.
pub type PortResult<T> = Result<T, PortError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("invalid port \"{value}\": {reason}")]
    Invalid { value: String, reason: String },

    #[error("invalid proxy \"{value}\": {reason}")]
    InvalidProxy { value: String, reason: String },

    #[error("image {image} declares no ports, no proxies and exposes none")]
    NoPorts { image: String },
}

/// Two images on one server answer the same `host:port/path`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("server \"{server}\": route {route} is claimed by both {first} and {second}")]
pub struct RouteConflict {
    pub server: String,
    pub route: String,
    pub first: String,
    pub second: String,
}
