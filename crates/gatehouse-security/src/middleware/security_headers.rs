//! Hardened response headers
//!
//! Applied to plain page renders that pass the gate: disable response
//! caching and MIME sniffing. Redirects and async rejections are left
//! alone.

use serde::{Deserialize, Serialize};

/// Hardened-header configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityHeadersConfig {
    /// Cache-Control header
    pub cache_control: Option<String>,

    /// Pragma header (legacy no-cache)
    pub pragma: Option<String>,

    /// X-XSS-Protection header
    pub x_xss_protection: Option<String>,

    /// X-Content-Type-Options header
    pub x_content_type_options: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            cache_control: Some("no-store".to_string()),
            pragma: Some("no-cache".to_string()),
            x_xss_protection: Some("1".to_string()),
            x_content_type_options: Some("nosniff".to_string()),
        }
    }
}

/// Applies hardened headers to outgoing page responses.
#[derive(Debug, Clone, Default)]
pub struct SecurityHeaders {
    config: SecurityHeadersConfig,
}

impl SecurityHeaders {
    /// Create with a custom configuration
    pub fn new(config: SecurityHeadersConfig) -> Self {
        Self { config }
    }

    /// The header pairs to set on a plain page response.
    pub fn header_pairs(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(ref cache_control) = self.config.cache_control {
            headers.push(("Cache-Control", cache_control.clone()));
        }
        if let Some(ref pragma) = self.config.pragma {
            headers.push(("Pragma", pragma.clone()));
        }
        if let Some(ref xxp) = self.config.x_xss_protection {
            headers.push(("X-XSS-Protection", xxp.clone()));
        }
        if let Some(ref xcto) = self.config.x_content_type_options {
            headers.push(("X-Content-Type-Options", xcto.clone()));
        }
        headers
    }

    /// Apply the hardened headers to a host-supplied header list.
    pub fn apply(&self, headers: &mut Vec<(String, String)>) {
        for (name, value) in self.header_pairs() {
            headers.push((name.to_string(), value));
        }
    }
}
