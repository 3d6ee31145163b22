//! External collaborator contracts
//!
//! The plugin core never talks to the host's database, router, or message
//! framework directly. Everything it needs from the host arrives through
//! the traits in this module, injected per request. In-memory
//! implementations are provided for tests and simple hosts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::AuthResult;

/// Raw identity assertion from the upstream login subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub authenticated: bool,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl Principal {
    /// Create an authenticated principal
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            authenticated: true,
            email: email.into(),
            username: username.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

/// An authority granted to a principal, with an optional active window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityGrant {
    pub code: String,
    pub title: String,
    pub effective_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl AuthorityGrant {
    /// Create an open-ended grant
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            effective_date: None,
            end_date: None,
        }
    }

    /// Grant has not started yet
    pub fn is_future(&self, now: DateTime<Utc>) -> bool {
        self.effective_date.is_some_and(|d| d > now)
    }

    /// Grant has ended
    pub fn is_history(&self, now: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|d| d <= now)
    }

    /// Active iff the effective date has passed (or is unset) and the end
    /// date has not (or is unset).
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !(self.is_future(now) || self.is_history(now))
    }
}

/// Source of upstream principals (the host login subsystem).
pub trait PrincipalSource {
    /// Resolve a principal by email, the unique key across the plugin.
    fn find_by_email(&self, email: &str) -> AuthResult<Option<Principal>>;
}

/// Source of authority grants for a principal.
pub trait AuthoritySource {
    /// Active `(code, title)` grants for a principal, filtered by the
    /// effective/end window at query time.
    fn active_grants(&self, principal: &Principal) -> AuthResult<Vec<AuthorityGrant>>;
}

/// Per-browser-session key/value store supplied by the host.
///
/// Concurrent requests from the same session apply last-write-wins
/// semantics with no locking; session expiry belongs to the backend.
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value);
    fn remove(&mut self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// Severity of a posted user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Success => write!(f, "success"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Sink for user-facing messages rendered by the host on the next page.
///
/// Implementations are expected to suppress duplicate pending messages at
/// the same severity, but must still log every call.
pub trait NotificationSink {
    fn post(&mut self, severity: Severity, message: &str);

    fn post_info(&mut self, message: &str) {
        self.post(Severity::Info, message);
    }

    fn post_success(&mut self, message: &str) {
        self.post(Severity::Success, message);
    }

    fn post_warning(&mut self, message: &str) {
        self.post(Severity::Warning, message);
    }

    fn post_error(&mut self, message: &str) {
        self.post(Severity::Error, message);
    }
}

/// Ledger of flagged request parameters, kept by the host.
pub trait AttemptLedger {
    /// Append a flagged parameter. Duplicates are recorded, not collapsed.
    fn record(
        &mut self,
        path: &str,
        user: Option<&str>,
        param_name: &str,
        param_value: &str,
    ) -> AuthResult<()>;

    /// Count records for a user that no reviewer has dismissed yet.
    fn count_unreviewed(&self, user: &str) -> AuthResult<u32>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// In-memory session store for tests and single-process hosts.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    values: HashMap<String, Value>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// In-memory principal source backed by a fixed list.
#[derive(Debug, Clone, Default)]
pub struct MemoryPrincipalSource {
    principals: Vec<Principal>,
}

impl MemoryPrincipalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, principal: Principal) {
        self.principals.push(principal);
    }
}

impl PrincipalSource for MemoryPrincipalSource {
    fn find_by_email(&self, email: &str) -> AuthResult<Option<Principal>> {
        Ok(self.principals.iter().find(|p| p.email == email).cloned())
    }
}

/// In-memory authority source keyed by principal email.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuthoritySource {
    grants: HashMap<String, Vec<AuthorityGrant>>,
}

impl MemoryAuthoritySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, email: impl Into<String>, grant: AuthorityGrant) {
        self.grants.entry(email.into()).or_default().push(grant);
    }
}

impl AuthoritySource for MemoryAuthoritySource {
    fn active_grants(&self, principal: &Principal) -> AuthResult<Vec<AuthorityGrant>> {
        let now = Utc::now();
        Ok(self
            .grants
            .get(&principal.email)
            .map(|grants| {
                grants
                    .iter()
                    .filter(|g| g.is_active(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// In-memory notification sink with pending-duplicate suppression.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationSink {
    pending: Vec<(Severity, String)>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting to be rendered.
    pub fn pending(&self) -> &[(Severity, String)] {
        &self.pending
    }

    pub fn contains(&self, severity: Severity, message: &str) -> bool {
        self.pending
            .iter()
            .any(|(s, m)| *s == severity && m == message)
    }

    /// Drain pending messages, as a host would when rendering a page.
    pub fn take(&mut self) -> Vec<(Severity, String)> {
        std::mem::take(&mut self.pending)
    }
}

impl NotificationSink for MemoryNotificationSink {
    fn post(&mut self, severity: Severity, message: &str) {
        // Duplicates are withheld from display but still logged.
        if self.contains(severity, message) {
            match severity {
                Severity::Error => error!("[DUPLICATE] {message}"),
                Severity::Warning => warn!("[DUPLICATE] {message}"),
                _ => info!("[DUPLICATE] {message}"),
            }
            return;
        }
        match severity {
            Severity::Error => error!("[POSTED] {message}"),
            Severity::Warning => warn!("[POSTED] {message}"),
            _ => info!("[POSTED] {message}"),
        }
        self.pending.push((severity, message.to_string()));
    }
}

/// One row of the in-memory attempt ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub path: String,
    pub user: Option<String>,
    pub param_name: String,
    pub param_value: String,
    pub reviewed: bool,
    pub date_created: DateTime<Utc>,
}

/// In-memory attempt ledger for tests and single-process hosts.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttemptLedger {
    records: Vec<AttemptRecord>,
}

impl MemoryAttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    /// Mark every record for a user as reviewed, clearing their lockout.
    pub fn review_all(&mut self, user: &str) {
        for record in &mut self.records {
            if record.user.as_deref() == Some(user) {
                record.reviewed = true;
            }
        }
    }
}

impl AttemptLedger for MemoryAttemptLedger {
    fn record(
        &mut self,
        path: &str,
        user: Option<&str>,
        param_name: &str,
        param_value: &str,
    ) -> AuthResult<()> {
        self.records.push(AttemptRecord {
            path: path.to_string(),
            user: user.map(str::to_string),
            param_name: param_name.to_string(),
            param_value: param_value.to_string(),
            reviewed: false,
            date_created: Utc::now(),
        });
        Ok(())
    }

    fn count_unreviewed(&self, user: &str) -> AuthResult<u32> {
        Ok(self
            .records
            .iter()
            .filter(|r| !r.reviewed && r.user.as_deref() == Some(user))
            .count() as u32)
    }
}
