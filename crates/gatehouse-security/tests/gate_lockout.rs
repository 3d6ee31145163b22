//! Lockout State Machine Tests
//!
//! End-to-end exercises of the security gate against the in-memory
//! collaborators: the lockout boundary, escape routes, async rejection,
//! and ledger recording behavior.

use gatehouse_auth::traits::{MemoryAttemptLedger, MemoryNotificationSink};
use gatehouse_auth::{AttemptLedger, AuthError, AuthResult, Identity, Severity};
use gatehouse_security::{GateConfig, GateOutcome, GateRequest, RouteClassifier, SecurityGate};

/// Fixed-path route table standing in for the host router.
struct FixedRoutes;

impl RouteClassifier for FixedRoutes {
    fn is_logout(&self, path: &str) -> bool {
        path == "/accounts/logout"
    }

    fn is_stop_impersonation(&self, path: &str) -> bool {
        path == "/auth/stop-impersonating"
    }

    fn is_lock_page(&self, path: &str) -> bool {
        path == "/security/locked"
    }

    fn is_message_poll(&self, path: &str) -> bool {
        path == "/messages"
    }

    fn is_health_check(&self, path: &str) -> bool {
        path == "/health"
    }
}

/// Ledger whose backing store is down, standing in for a host whose
/// database write or read fails mid-request.
#[derive(Default)]
struct OfflineLedger {
    fail_record: bool,
    fail_count: bool,
    inner: MemoryAttemptLedger,
}

impl AttemptLedger for OfflineLedger {
    fn record(
        &mut self,
        path: &str,
        user: Option<&str>,
        param_name: &str,
        param_value: &str,
    ) -> AuthResult<()> {
        if self.fail_record {
            return Err(AuthError::ledger_error("attempt table unavailable"));
        }
        self.inner.record(path, user, param_name, param_value)
    }

    fn count_unreviewed(&self, user: &str) -> AuthResult<u32> {
        if self.fail_count {
            return Err(AuthError::ledger_error("attempt table unavailable"));
        }
        self.inner.count_unreviewed(user)
    }
}

fn acting_user(email: &str) -> Identity {
    Identity {
        authenticated: true,
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: email.to_string(),
        username: email.split('@').next().unwrap_or_default().to_string(),
        is_proxied: false,
        authorities: Default::default(),
    }
}

fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_lockout_boundary_third_strike() {
    let gate = SecurityGate::new(GateConfig::default()).unwrap();
    let mut ledger = MemoryAttemptLedger::new();
    let mut notifier = MemoryNotificationSink::new();
    let user = acting_user("suspect@example.com");

    // Two prior unreviewed records.
    for _ in 0..2 {
        ledger
            .record("/forms/prior", Some(&user.email), "q", "<script>")
            .unwrap();
    }

    // Request with two prior strikes is not blocked at the door...
    let clean = params(&[("q", "hello")]);
    let request = GateRequest {
        path: "/forms/contact",
        is_async: false,
        query_params: &clean,
        body_params: &[],
    };
    let outcome = gate.evaluate(request, Some(&user), &mut ledger, &FixedRoutes, &mut notifier);
    assert_eq!(outcome, GateOutcome::Proceed);

    // ...but a third flagged parameter is recorded, and *this* request is
    // blocked by the match itself, not the counter.
    let dirty = params(&[("q", "<script>alert(1)</script>")]);
    let request = GateRequest {
        path: "/forms/contact",
        is_async: false,
        query_params: &dirty,
        body_params: &[],
    };
    let outcome = gate.evaluate(request, Some(&user), &mut ledger, &FixedRoutes, &mut notifier);
    assert_eq!(outcome, GateOutcome::RedirectToBlockPage);
    assert_eq!(ledger.count_unreviewed(&user.email).unwrap(), 3);

    // The next request is redirected to the lock page before any scan:
    // even clean parameters never reach the ledger.
    let records_before = ledger.records().len();
    let request = GateRequest {
        path: "/forms/contact",
        is_async: false,
        query_params: &clean,
        body_params: &[],
    };
    let outcome = gate.evaluate(request, Some(&user), &mut ledger, &FixedRoutes, &mut notifier);
    assert_eq!(outcome, GateOutcome::RedirectToLockPage);
    assert_eq!(ledger.records().len(), records_before);
}

#[test]
fn test_locked_out_user_may_reach_escape_routes() {
    let gate = SecurityGate::new(GateConfig::default()).unwrap();
    let mut ledger = MemoryAttemptLedger::new();
    let mut notifier = MemoryNotificationSink::new();
    let user = acting_user("suspect@example.com");

    for _ in 0..3 {
        ledger
            .record("/forms/prior", Some(&user.email), "q", "<script>")
            .unwrap();
    }

    for path in [
        "/accounts/logout",
        "/auth/stop-impersonating",
        "/security/locked",
        "/messages",
        "/health",
    ] {
        let outcome = gate.evaluate(
            GateRequest::page(path),
            Some(&user),
            &mut ledger,
            &FixedRoutes,
            &mut notifier,
        );
        assert_eq!(outcome, GateOutcome::Proceed, "escape route {path} blocked");
    }

    // Any other path stays locked.
    let outcome = gate.evaluate(
        GateRequest::page("/dashboard"),
        Some(&user),
        &mut ledger,
        &FixedRoutes,
        &mut notifier,
    );
    assert_eq!(outcome, GateOutcome::RedirectToLockPage);
}

#[test]
fn test_review_clears_lockout() {
    let gate = SecurityGate::new(GateConfig::default()).unwrap();
    let mut ledger = MemoryAttemptLedger::new();
    let mut notifier = MemoryNotificationSink::new();
    let user = acting_user("suspect@example.com");

    for _ in 0..3 {
        ledger
            .record("/forms/prior", Some(&user.email), "q", "<script>")
            .unwrap();
    }
    ledger.review_all(&user.email);

    let outcome = gate.evaluate(
        GateRequest::page("/dashboard"),
        Some(&user),
        &mut ledger,
        &FixedRoutes,
        &mut notifier,
    );
    assert_eq!(outcome, GateOutcome::Proceed);
}

#[test]
fn test_async_request_is_rejected_with_notification() {
    let gate = SecurityGate::new(GateConfig::default()).unwrap();
    let mut ledger = MemoryAttemptLedger::new();
    let mut notifier = MemoryNotificationSink::new();
    let user = acting_user("suspect@example.com");

    let dirty = params(&[("comment", "<iframe src='http://evil.example'>")]);
    let request = GateRequest {
        path: "/api/comments",
        is_async: true,
        query_params: &[],
        body_params: &dirty,
    };
    let outcome = gate.evaluate(request, Some(&user), &mut ledger, &FixedRoutes, &mut notifier);

    assert_eq!(outcome, GateOutcome::Forbidden);
    assert!(notifier.contains(
        Severity::Error,
        "Suspicious input detected. Unable to process request."
    ));
    assert_eq!(ledger.records().len(), 1);
}

#[test]
fn test_every_offending_parameter_is_recorded() {
    let gate = SecurityGate::new(GateConfig::default()).unwrap();
    let mut ledger = MemoryAttemptLedger::new();
    let mut notifier = MemoryNotificationSink::new();
    let user = acting_user("suspect@example.com");

    let query = params(&[("a", "<script>1</script>"), ("b", "clean")]);
    let body = params(&[
        ("c", "<img onerror='x()' src=y>"),
        ("d", "<iframe>"),
    ]);
    let request = GateRequest {
        path: "/forms/contact",
        is_async: false,
        query_params: &query,
        body_params: &body,
    };
    let outcome = gate.evaluate(request, Some(&user), &mut ledger, &FixedRoutes, &mut notifier);

    assert_eq!(outcome, GateOutcome::RedirectToBlockPage);
    // No short-circuit: all three offenders recorded, clean one skipped.
    assert_eq!(ledger.records().len(), 3);
    let names: Vec<&str> = ledger
        .records()
        .iter()
        .map(|r| r.param_name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "c", "d"]);
}

#[test]
fn test_record_failure_never_unblocks_flagged_request() {
    let gate = SecurityGate::new(GateConfig::default()).unwrap();
    let mut ledger = OfflineLedger {
        fail_record: true,
        ..Default::default()
    };
    let mut notifier = MemoryNotificationSink::new();
    let user = acting_user("suspect@example.com");

    // A flagged page request is still blocked even though nothing could
    // be appended to the ledger.
    let dirty = params(&[("q", "<script>alert(1)</script>")]);
    let request = GateRequest {
        path: "/forms/contact",
        is_async: false,
        query_params: &dirty,
        body_params: &[],
    };
    let outcome = gate.evaluate(request, Some(&user), &mut ledger, &FixedRoutes, &mut notifier);
    assert_eq!(outcome, GateOutcome::RedirectToBlockPage);
    assert!(ledger.inner.records().is_empty());

    // Same for the async variant: rejected, with the notification posted.
    let request = GateRequest {
        path: "/api/comments",
        is_async: true,
        query_params: &[],
        body_params: &dirty,
    };
    let outcome = gate.evaluate(request, Some(&user), &mut ledger, &FixedRoutes, &mut notifier);
    assert_eq!(outcome, GateOutcome::Forbidden);
    assert!(notifier.contains(
        Severity::Error,
        "Suspicious input detected. Unable to process request."
    ));
}

#[test]
fn test_count_failure_degrades_to_no_lockout() {
    let gate = SecurityGate::new(GateConfig::default()).unwrap();
    let mut ledger = OfflineLedger::default();
    let mut notifier = MemoryNotificationSink::new();
    let user = acting_user("suspect@example.com");

    // Enough unreviewed records to lock the user out...
    for _ in 0..3 {
        ledger
            .record("/forms/prior", Some(&user.email), "q", "<script>")
            .unwrap();
    }

    // ...but an unreadable counter means no lockout: a clean request
    // proceeds instead of dead-ending the user on the lock page.
    ledger.fail_count = true;
    let outcome = gate.evaluate(
        GateRequest::page("/dashboard"),
        Some(&user),
        &mut ledger,
        &FixedRoutes,
        &mut notifier,
    );
    assert_eq!(outcome, GateOutcome::Proceed);

    // Once the counter is readable again the lockout applies.
    ledger.fail_count = false;
    let outcome = gate.evaluate(
        GateRequest::page("/dashboard"),
        Some(&user),
        &mut ledger,
        &FixedRoutes,
        &mut notifier,
    );
    assert_eq!(outcome, GateOutcome::RedirectToLockPage);
}

#[test]
fn test_anonymous_requests_cannot_be_locked_out() {
    let gate = SecurityGate::new(GateConfig::default()).unwrap();
    let mut ledger = MemoryAttemptLedger::new();
    let mut notifier = MemoryNotificationSink::new();

    // Flagged anonymous requests are recorded without a user and still
    // blocked per request, but never accumulate into a lockout.
    for _ in 0..5 {
        let dirty = params(&[("q", "<script>")]);
        let request = GateRequest {
            path: "/search",
            is_async: false,
            query_params: &dirty,
            body_params: &[],
        };
        let outcome = gate.evaluate(request, None, &mut ledger, &FixedRoutes, &mut notifier);
        assert_eq!(outcome, GateOutcome::RedirectToBlockPage);
    }
    assert_eq!(ledger.records().len(), 5);
    assert!(ledger.records().iter().all(|r| r.user.is_none()));

    let outcome = gate.evaluate(
        GateRequest::page("/search"),
        None,
        &mut ledger,
        &FixedRoutes,
        &mut notifier,
    );
    assert_eq!(outcome, GateOutcome::Proceed);
}

#[test]
fn test_invalid_acting_identity_is_treated_as_anonymous() {
    let gate = SecurityGate::new(GateConfig::default()).unwrap();
    let mut ledger = MemoryAttemptLedger::new();
    let mut notifier = MemoryNotificationSink::new();

    // An invalid identity (empty email) cannot be locked out.
    let ghost = Identity::anonymous();
    for _ in 0..3 {
        ledger.record("/forms/prior", Some(""), "q", "<script>").unwrap();
    }
    let outcome = gate.evaluate(
        GateRequest::page("/dashboard"),
        Some(&ghost),
        &mut ledger,
        &FixedRoutes,
        &mut notifier,
    );
    assert_eq!(outcome, GateOutcome::Proceed);
}
