//! # gatehouse-auth: Session-backed identity for the gatehouse plugin
//!
//! This crate resolves "who is acting" for each request of a multi-tenant
//! web host: the authenticated identity, an optional impersonated identity,
//! and an optional proxied identity, all persisted through the host's
//! session store. It also provides the scoped-variable store (page and
//! flash lifetimes) that the rest of the plugin builds on.

pub mod config;
pub mod error;
pub mod traits;
pub mod roles;
pub mod identity;
pub mod scope;
pub mod session;
pub mod utils;

// Error handling
pub use error::AuthError;

// Core types
pub use config::AuthConfig;
pub use identity::{Identity, IdentityResolver};
pub use roles::RoleExpander;
pub use scope::ScopedVariableStore;
pub use session::AuthSession;

// External collaborator contracts
pub use traits::{
    AttemptLedger, AuthoritySource, AuthorityGrant, NotificationSink, Principal,
    PrincipalSource, SessionStore, Severity,
};

/// Authentication result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
