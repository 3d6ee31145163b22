//! Plugin configuration

use serde::{Deserialize, Serialize};

/// Configuration shared by the scoped-variable store and the auth session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Prefix applied to every plugin key in the host session store
    pub session_prefix: String,

    /// Session key (under the prefix) holding the serialized auth state
    pub state_key: String,

    /// Authority required to start impersonating another user
    pub impersonate_authority: String,

    /// Authority required of the effective identity to proxy another user
    pub proxy_authority: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_prefix: "gatehouse_".to_string(),
            state_key: "auth_tracking".to_string(),
            impersonate_authority: "~impersonate".to_string(),
            proxy_authority: "~proxy".to_string(),
        }
    }
}

impl AuthConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session key prefix
    pub fn session_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.session_prefix = prefix.into();
        self
    }

    /// Set the auth-state session key
    pub fn state_key(mut self, key: impl Into<String>) -> Self {
        self.state_key = key.into();
        self
    }

    /// Set the impersonation authority code
    pub fn impersonate_authority(mut self, code: impl Into<String>) -> Self {
        self.impersonate_authority = code.into();
        self
    }

    /// Set the proxy authority code
    pub fn proxy_authority(mut self, code: impl Into<String>) -> Self {
        self.proxy_authority = code.into();
        self
    }
}
