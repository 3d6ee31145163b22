//! Scoped session variables
//!
//! Two lifetimes share the host session store, both under the plugin key
//! prefix: page scope (current request only) and flash scope (current
//! request plus exactly one following request). The flash scope is a pair
//! of explicit generation maps swapped at the top of each request, which
//! makes the generation boundary a first-class operation rather than a
//! key-renaming convention.

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::AuthConfig;
use crate::traits::{SessionStore, Severity};

const PAGE_KEY: &str = "page_scope";
const FLASH_CURRENT_KEY: &str = "flash_current";
const FLASH_PREVIOUS_KEY: &str = "flash_previous";
const MEMO_PREFIX: &str = "cache-";
const DELAYED_MESSAGE_PREFIX: &str = "delayed_message:";

/// Session-backed variable store for one request.
///
/// Borrows the per-request session handle; it is never a process-wide
/// singleton, so last-write-wins behavior between concurrent requests
/// stays a visible property of the [`SessionStore`] contract.
pub struct ScopedVariableStore<'a> {
    store: &'a mut dyn SessionStore,
    prefix: String,
}

impl<'a> ScopedVariableStore<'a> {
    pub fn new(store: &'a mut dyn SessionStore, config: &AuthConfig) -> Self {
        Self {
            store,
            prefix: config.session_prefix.clone(),
        }
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    // -- raw session vars ---------------------------------------------------

    /// Set a plugin session variable (survives until cleared or expired).
    pub fn set_var(&mut self, key: &str, value: Value) {
        self.store.set(&self.prefixed(key), value);
    }

    /// Get a plugin session variable.
    pub fn get_var(&self, key: &str) -> Option<Value> {
        self.store.get(&self.prefixed(key))
    }

    /// Get a plugin session variable, or a default.
    pub fn get_var_or(&self, key: &str, default: Value) -> Value {
        self.get_var(key).unwrap_or(default)
    }

    /// Remove a plugin session variable.
    pub fn remove_var(&mut self, key: &str) {
        self.store.remove(&self.prefixed(key));
    }

    /// Delete every plugin-prefixed key, leaving host session data alone.
    pub fn clear_custom_vars(&mut self) {
        for key in self.store.keys() {
            if key.starts_with(&self.prefix) {
                self.store.remove(&key);
            }
        }
    }

    // -- map helpers --------------------------------------------------------

    fn read_map(&self, key: &str) -> Map<String, Value> {
        match self.get_var(key) {
            Some(Value::Object(map)) => map,
            Some(_) => {
                debug!(key, "replacing non-object scope record");
                Map::new()
            }
            None => Map::new(),
        }
    }

    fn write_map(&mut self, key: &str, map: Map<String, Value>) {
        if map.is_empty() {
            self.remove_var(key);
        } else {
            self.set_var(key, Value::Object(map));
        }
    }

    // -- page scope ---------------------------------------------------------

    /// Set a value valid only for the current request.
    pub fn set_page(&mut self, var: &str, value: Value) {
        let mut page = self.read_map(PAGE_KEY);
        page.insert(var.to_string(), value);
        self.write_map(PAGE_KEY, page);
    }

    /// Get a page-scope value.
    pub fn get_page(&self, var: &str) -> Option<Value> {
        self.read_map(PAGE_KEY).get(var).cloned()
    }

    /// Remove all page-scope values. Called at the end of every request.
    pub fn clear_page_scope(&mut self) {
        self.remove_var(PAGE_KEY);
    }

    // -- flash scope --------------------------------------------------------

    /// Set a value valid for the current request and the next one.
    pub fn set_flash(&mut self, var: &str, value: Value) {
        let mut current = self.read_map(FLASH_CURRENT_KEY);
        current.insert(var.to_string(), value);
        self.write_map(FLASH_CURRENT_KEY, current);
    }

    /// Get a flash-scope value.
    ///
    /// The current generation is checked first so a value set during this
    /// request is visible immediately; otherwise the previous generation
    /// (set last request) answers.
    pub fn get_flash(&self, var: &str) -> Option<Value> {
        if let Some(value) = self.read_map(FLASH_CURRENT_KEY).get(var) {
            return Some(value.clone());
        }
        self.read_map(FLASH_PREVIOUS_KEY).get(var).cloned()
    }

    /// Get a flash-scope value, or a default.
    pub fn get_flash_or(&self, var: &str, default: Value) -> Value {
        self.get_flash(var).unwrap_or(default)
    }

    /// Advance the flash generation: drop the previous generation and age
    /// the current one into its place. Runs at the start of each request,
    /// except the message-poll endpoint.
    pub fn cycle_flash(&mut self) {
        let current = self.read_map(FLASH_CURRENT_KEY);
        self.remove_var(FLASH_CURRENT_KEY);
        self.write_map(FLASH_PREVIOUS_KEY, current);
    }

    // -- call-site memoization ----------------------------------------------

    /// Cache a once-per-request computed result under an explicit key
    /// chosen at the call site. Page-scoped.
    pub fn memo_store(&mut self, key: &'static str, value: Value) -> Value {
        self.set_page(&format!("{MEMO_PREFIX}{key}"), value.clone());
        value
    }

    /// Recall a result stored earlier in this request.
    pub fn memo_recall(&self, key: &'static str) -> Option<Value> {
        self.get_page(&format!("{MEMO_PREFIX}{key}"))
    }

    // -- delayed messages ---------------------------------------------------

    /// Hold a message for the page after the next one. One message per
    /// severity; a second call overwrites the first.
    pub fn set_delayed_message(&mut self, severity: Severity, message: &str) {
        self.set_flash(
            &format!("{DELAYED_MESSAGE_PREFIX}{severity}"),
            Value::from(message),
        );
    }

    /// The pending delayed message at a severity, if any.
    pub fn delayed_message(&self, severity: Severity) -> Option<String> {
        match self.get_flash(&format!("{DELAYED_MESSAGE_PREFIX}{severity}")) {
            Some(Value::String(message)) => Some(message),
            _ => None,
        }
    }

    // -- request lifecycle --------------------------------------------------

    /// Run at the start of every request. The message-poll endpoint must
    /// not advance the flash generation, or polling would consume messages
    /// meant for the next full page.
    pub fn begin_request(&mut self, is_message_poll: bool) {
        if !is_message_poll {
            self.cycle_flash();
        }
    }

    /// Run after the view has completed.
    pub fn end_request(&mut self) {
        self.clear_page_scope();
    }
}
