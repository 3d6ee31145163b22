//! The three-slot auth session
//!
//! One request's answer to "who is acting": the authenticated identity
//! (always present; anonymous is a value, not an absence), an optional
//! impersonated identity, and an optional proxied identity. The whole
//! state is serialized under a single session key and re-persisted after
//! every mutating transition.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::identity::{Identity, IdentityResolver};
use crate::scope::ScopedVariableStore;
use crate::traits::{NotificationSink, Principal};

/// Persisted session record: the three slots, each nullable on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthSessionRecord {
    authenticated: Option<Identity>,
    impersonated: Option<Identity>,
    proxied: Option<Identity>,
}

/// Request-scoped actor state.
///
/// Constructed once per request via [`AuthSession::resume`]; superseded by
/// the next request's resolution rather than destroyed. Consumers must go
/// through [`effective_identity`](Self::effective_identity) and
/// [`user_or_proxy`](Self::user_or_proxy) instead of touching slots.
pub struct AuthSession {
    config: AuthConfig,
    authenticated: Identity,
    impersonated: Option<Identity>,
    proxied: Option<Identity>,
}

impl AuthSession {
    /// Resolve the acting session for this request.
    ///
    /// An unauthenticated (or absent) upstream principal yields the
    /// anonymous state. When the persisted state's authenticated email
    /// matches the principal, the prior state is reused verbatim with no
    /// re-resolution; otherwise a fresh state is built from the principal,
    /// the impersonated/proxied slots are cleared, and the new state is
    /// persisted immediately.
    pub fn resume(
        config: AuthConfig,
        scope: &mut ScopedVariableStore<'_>,
        resolver: &IdentityResolver<'_>,
        principal: Option<&Principal>,
    ) -> Self {
        let principal = match principal {
            Some(p) if p.authenticated => p,
            _ => {
                let mut session = Self::with_state(config, Identity::anonymous(), None, None);
                session.save(scope);
                return session;
            }
        };

        if let Some(record) = Self::load(scope, &config) {
            if let Some(authenticated) = record.authenticated {
                if authenticated.email == principal.email {
                    debug!(email = %principal.email, "resumed auth session");
                    let mut session = Self::with_state(
                        config,
                        authenticated,
                        record.impersonated,
                        record.proxied,
                    );
                    session.clean_slots();
                    return session;
                }
            }
        }

        // Authentication changed: rebuild from the principal.
        let mut session =
            Self::with_state(config, resolver.from_principal(principal), None, None);
        session.save(scope);
        session
    }

    fn with_state(
        config: AuthConfig,
        authenticated: Identity,
        impersonated: Option<Identity>,
        proxied: Option<Identity>,
    ) -> Self {
        Self {
            config,
            authenticated,
            impersonated,
            proxied,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn authenticated(&self) -> &Identity {
        &self.authenticated
    }

    pub fn impersonated(&self) -> Option<&Identity> {
        self.impersonated.as_ref()
    }

    pub fn proxied(&self) -> Option<&Identity> {
        self.proxied.as_ref()
    }

    pub fn is_impersonating(&self) -> bool {
        self.impersonated.is_some()
    }

    pub fn is_proxying(&self) -> bool {
        self.proxied.is_some()
    }

    pub fn is_logged_in(&self) -> bool {
        self.authenticated.is_logged_in()
    }

    /// The identity whose authorities govern the current action:
    /// impersonated if set, else authenticated.
    pub fn effective_identity(&self) -> &Identity {
        self.impersonated.as_ref().unwrap_or(&self.authenticated)
    }

    /// The subject of the current action: proxied if proxying, else the
    /// effective identity.
    pub fn user_or_proxy(&self) -> &Identity {
        match &self.proxied {
            Some(proxied) => proxied,
            None => self.effective_identity(),
        }
    }

    /// Whether the authenticated (never the impersonated) identity may
    /// start impersonating.
    pub fn can_impersonate(&self) -> bool {
        self.authenticated
            .has_authority(&self.config.impersonate_authority)
    }

    /// Authority check against the effective identity, or specifically the
    /// authenticated one when `use_impersonated` is false.
    pub fn has_authority(&self, authority_list: &str, use_impersonated: bool) -> bool {
        if use_impersonated {
            self.effective_identity().has_authority(authority_list)
        } else {
            self.authenticated.has_authority(authority_list)
        }
    }

    // -- transitions --------------------------------------------------------

    /// Start, switch, or stop (with `None`) impersonating.
    ///
    /// Requires the impersonate capability on the authenticated identity;
    /// refused silently otherwise. Starting a new impersonation resets the
    /// custom session state, which also clears any active proxy.
    pub fn set_impersonated(
        &mut self,
        scope: &mut ScopedVariableStore<'_>,
        resolver: &IdentityResolver<'_>,
        notifier: &mut dyn NotificationSink,
        target: Option<&str>,
    ) -> bool {
        if !self.can_impersonate() {
            return false;
        }

        if let Some(outgoing) = &self.impersonated {
            notifier.post_info(&format!(
                "No longer impersonating {}",
                outgoing.display_name()
            ));
        }
        self.reset_session(scope);

        let Some(target) = target.filter(|t| !t.is_empty()) else {
            return true;
        };

        let candidate = resolver.from_email(target);
        if candidate.is_valid() {
            let name = candidate.display_name();
            self.impersonated = Some(candidate);
            self.save(scope);
            notifier.post_success(&format!("Impersonating {name}"));
            true
        } else {
            notifier.post_error("Could not find the specified user to impersonate");
            false
        }
    }

    /// Start, switch, or stop (with `None`) proxying.
    ///
    /// Requires the proxy capability on the *effective* identity, so an
    /// impersonated identity holding it may proxy. The stored identity is
    /// marked proxied, which keeps it from ever counting as logged in.
    pub fn set_proxied(
        &mut self,
        scope: &mut ScopedVariableStore<'_>,
        resolver: &IdentityResolver<'_>,
        notifier: &mut dyn NotificationSink,
        target: Option<&str>,
    ) -> bool {
        if !self
            .effective_identity()
            .has_authority(&self.config.proxy_authority)
        {
            return false;
        }

        if let Some(outgoing) = &self.proxied {
            notifier.post_info(&format!("No longer proxying {}", outgoing.display_name()));
        }

        let Some(target) = target.filter(|t| !t.is_empty()) else {
            self.proxied = None;
            self.save(scope);
            return true;
        };

        let mut candidate = resolver.from_email(target);
        if candidate.is_valid() {
            candidate.is_proxied = true;
            let name = candidate.display_name();
            self.proxied = Some(candidate);
            self.save(scope);
            notifier.post_success(&format!("Proxying {name}"));
            true
        } else {
            notifier.post_error("Could not find the specified user to proxy");
            false
        }
    }

    /// Clear every custom scoped variable plus the impersonated and proxied
    /// slots, then re-persist the authenticated state.
    pub fn reset_session(&mut self, scope: &mut ScopedVariableStore<'_>) {
        scope.clear_custom_vars();
        self.impersonated = None;
        self.proxied = None;
        self.save(scope);
    }

    // -- persistence --------------------------------------------------------

    /// Serialize the three slots under the fixed session key.
    pub fn save(&mut self, scope: &mut ScopedVariableStore<'_>) {
        self.clean_slots();
        let record = AuthSessionRecord {
            authenticated: Some(self.authenticated.clone()),
            impersonated: self.impersonated.clone(),
            proxied: self.proxied.clone(),
        };
        match serde_json::to_value(&record) {
            Ok(value) => scope.set_var(&self.config.state_key, value),
            Err(err) => {
                let err = AuthError::from(err);
                error!(code = err.error_code(), %err, "could not persist auth session state");
            }
        }
    }

    fn load(scope: &ScopedVariableStore<'_>, config: &AuthConfig) -> Option<AuthSessionRecord> {
        let value = scope.get_var(&config.state_key)?;
        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                let err = AuthError::from(err);
                error!(code = err.error_code(), %err, "discarding unreadable auth session state");
                None
            }
        }
    }

    /// Invalid identities never survive: an invalid authenticated slot
    /// falls back to anonymous, invalid impersonated/proxied slots drop.
    fn clean_slots(&mut self) {
        if !self.authenticated.is_valid() {
            self.authenticated = Identity::anonymous();
        }
        if self.impersonated.as_ref().is_some_and(|i| !i.is_valid()) {
            self.impersonated = None;
        }
        if self.proxied.as_ref().is_some_and(|i| !i.is_valid()) {
            self.proxied = None;
        }
    }
}
