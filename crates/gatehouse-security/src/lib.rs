//! # gatehouse-security
//!
//! Request security gating for the gatehouse host plugin. Scans inbound
//! parameters for script injection, drives the progressive lockout state
//! machine against the host's attempt ledger, and hardens plain page
//! responses.

pub mod config;
pub mod middleware;

// Re-export main types
pub use config::GateConfig;
pub use middleware::gate::{GateOutcome, GateRequest, RouteClassifier, SecurityGate};
pub use middleware::security_headers::{SecurityHeaders, SecurityHeadersConfig};

/// Common result type for security operations
pub type SecurityResult<T> = Result<T, SecurityError>;

/// Security-related errors
#[derive(thiserror::Error, Debug)]
pub enum SecurityError {
    #[error("Invalid scan pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}
