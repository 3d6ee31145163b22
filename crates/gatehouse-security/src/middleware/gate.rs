//! The per-request security gate
//!
//! Runs before view dispatch. First the lockout check: a user whose
//! unreviewed flagged-parameter count has reached the threshold is sent to
//! the lock page before any scanning, unless the request targets one of
//! the enumerated escape routes. Then the parameter scan: every query and
//! body parameter is tested against the configured patterns, every match
//! is recorded, and any match blocks the request even though the counter
//! has not been re-read.

use gatehouse_auth::{AttemptLedger, Identity, NotificationSink};
use log::{error, info, warn};
use regex::{Regex, RegexBuilder};

use crate::config::GateConfig;
use crate::{SecurityError, SecurityResult};

/// Route predicates supplied by the host router.
///
/// The escape routes are the paths a locked-out user may still reach:
/// logging out, stopping an impersonation, the lock page itself, health
/// checks, and the message poll.
pub trait RouteClassifier {
    fn is_logout(&self, path: &str) -> bool;
    fn is_stop_impersonation(&self, path: &str) -> bool;
    fn is_lock_page(&self, path: &str) -> bool;
    fn is_message_poll(&self, path: &str) -> bool;
    fn is_health_check(&self, path: &str) -> bool;
}

/// Borrowed view of an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub path: &'a str,

    /// Asynchronous/background request (XHR, fetch)
    pub is_async: bool,

    pub query_params: &'a [(String, String)],
    pub body_params: &'a [(String, String)],
}

impl<'a> GateRequest<'a> {
    /// A page request with no parameters.
    pub fn page(path: &'a str) -> Self {
        Self {
            path,
            is_async: false,
            query_params: &[],
            body_params: &[],
        }
    }
}

/// Decision produced before view dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Dispatch normally; plain page renders get hardened headers
    Proceed,

    /// Threshold reached on a prior request; send to the lock page
    RedirectToLockPage,

    /// Flagged parameters on this request; send to the interstitial block page
    RedirectToBlockPage,

    /// Flagged parameters on an async request; reject with an error status
    Forbidden,
}

/// Parameter scanner and progressive lockout state machine.
pub struct SecurityGate {
    config: GateConfig,
    patterns: Vec<Regex>,
}

impl SecurityGate {
    /// Create a gate, compiling the configured patterns once.
    pub fn new(config: GateConfig) -> SecurityResult<Self> {
        let patterns = config
            .blocked_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| SecurityError::InvalidPattern {
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<SecurityResult<Vec<_>>>()?;

        Ok(Self { config, patterns })
    }

    /// Get the configuration
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Does the given value appear to contain script content?
    pub fn contains_script(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        self.patterns.iter().any(|pattern| pattern.is_match(value))
    }

    fn is_escape_route(&self, routes: &dyn RouteClassifier, path: &str) -> bool {
        routes.is_logout(path)
            || routes.is_stop_impersonation(path)
            || routes.is_lock_page(path)
            || routes.is_message_poll(path)
            || routes.is_health_check(path)
    }

    /// Evaluate one request before dispatch.
    ///
    /// `acting_user` is the identity the request acts as (effective or
    /// proxied, per the host's choice); absence means no lockout is
    /// possible. Ledger failures never block the response.
    pub fn evaluate(
        &self,
        request: GateRequest<'_>,
        acting_user: Option<&Identity>,
        ledger: &mut dyn AttemptLedger,
        routes: &dyn RouteClassifier,
        notifier: &mut dyn NotificationSink,
    ) -> GateOutcome {
        let acting_user = acting_user.filter(|user| user.is_valid());

        // Locked-out users may still reach the escape routes; for those the
        // ledger is not even consulted.
        if !self.is_escape_route(routes, request.path) {
            if let Some(user) = acting_user {
                let attempts = match ledger.count_unreviewed(&user.email) {
                    Ok(count) => count,
                    Err(err) => {
                        error!(
                            "could not count unreviewed attempts for {}: {}",
                            user.email, err
                        );
                        0
                    }
                };
                if attempts >= self.config.lockout_threshold {
                    info!(
                        "{} is locked out ({} unreviewed flagged parameters)",
                        user.email, attempts
                    );
                    return GateOutcome::RedirectToLockPage;
                }
            }
        }

        // Scan every parameter without short-circuiting, so every offending
        // parameter lands in the ledger.
        let mut flagged = false;
        let params = request
            .query_params
            .iter()
            .chain(request.body_params.iter());
        for (name, value) in params {
            if !self.contains_script(value) {
                continue;
            }
            flagged = true;
            error!(
                "potential script injection in '{}' parameter on {}",
                name, request.path
            );
            let user_email = acting_user.map(|user| user.email.as_str());
            if let Err(err) = ledger.record(request.path, user_email, name, value) {
                warn!("could not record flagged parameter '{}': {}", name, err);
            }
        }

        if flagged {
            if request.is_async {
                notifier.post_error("Suspicious input detected. Unable to process request.");
                return GateOutcome::Forbidden;
            }
            return GateOutcome::RedirectToBlockPage;
        }

        GateOutcome::Proceed
    }
}
