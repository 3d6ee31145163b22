//! Security gate configuration

use serde::{Deserialize, Serialize};
use service_builder::builder;

/// Opening `<script` tag, with optional whitespace after `<`.
pub const SCRIPT_TAG_PATTERN: &str = r"<\s?script";

/// A `src` attribute referencing "script" inside any tag.
pub const SCRIPT_SRC_PATTERN: &str = r#"<.*src\s?=\s?['"].*script.+"#;

/// An inline `on<event>=` handler attribute inside any tag.
pub const EVENT_HANDLER_PATTERN: &str = r#"<.*on\w+\s?=\s?['"].*"#;

/// Opening `<iframe` tag, with optional whitespace after `<`.
pub const IFRAME_TAG_PATTERN: &str = r"<\s?iframe";

/// The default parameter scan patterns, applied case-insensitively.
pub fn default_blocked_patterns() -> Vec<String> {
    vec![
        SCRIPT_TAG_PATTERN.to_string(),
        SCRIPT_SRC_PATTERN.to_string(),
        EVENT_HANDLER_PATTERN.to_string(),
        IFRAME_TAG_PATTERN.to_string(),
    ]
}

/// Security gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Unreviewed flagged-parameter count at which a user is locked out
    pub lockout_threshold: u32,

    /// Case-insensitive regex patterns scanned against every parameter
    pub blocked_patterns: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            lockout_threshold: 3,
            blocked_patterns: default_blocked_patterns(),
        }
    }
}

impl GateConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lockout threshold
    pub fn lockout_threshold(mut self, threshold: u32) -> Self {
        self.lockout_threshold = threshold;
        self
    }

    /// Replace the scan patterns
    pub fn blocked_patterns(mut self, patterns: Vec<String>) -> Self {
        self.blocked_patterns = patterns;
        self
    }

    /// Add a scan pattern
    pub fn blocked_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.blocked_patterns.push(pattern.into());
        self
    }
}

/// Configuration for the gate builder
#[derive(Debug, Clone)]
#[builder]
pub struct GateBuilderConfig {
    #[builder(default = "3")]
    pub lockout_threshold: u32,

    #[builder(default = "default_blocked_patterns()")]
    pub blocked_patterns: Vec<String>,
}

impl GateBuilderConfig {
    /// Build a GateConfig from the builder config
    pub fn build_config(self) -> GateConfig {
        GateConfig {
            lockout_threshold: self.lockout_threshold,
            blocked_patterns: self.blocked_patterns,
        }
    }
}

// Add convenience methods to the generated builder
impl GateBuilderConfigBuilder {
    /// Add a scan pattern on top of the defaults
    pub fn extra_pattern<S: Into<String>>(self, pattern: S) -> Self {
        let mut patterns = self
            .blocked_patterns
            .clone()
            .unwrap_or_else(default_blocked_patterns);
        patterns.push(pattern.into());
        self.blocked_patterns(patterns)
    }

    pub fn build_config(self) -> GateBuilderConfig {
        self.build_with_defaults().unwrap()
    }
}
