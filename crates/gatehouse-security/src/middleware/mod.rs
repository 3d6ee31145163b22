//! Security middleware components

pub mod gate;
pub mod security_headers;

pub use gate::SecurityGate;
pub use security_headers::SecurityHeaders;
