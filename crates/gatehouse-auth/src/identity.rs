//! Identity resolution and authority checking

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::error;

use crate::roles::RoleExpander;
use crate::traits::{AuthoritySource, Principal, PrincipalSource};
use crate::utils::csv_to_list;

/// Resolved, authority-bearing representation of an actor.
///
/// The email is the unique key; an identity with an empty email is
/// invalid and is never accepted as an impersonation or proxy target.
/// This struct is also the persisted session record for each actor slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub authenticated: bool,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub is_proxied: bool,
    /// Lowercase authority code -> display title
    pub authorities: HashMap<String, String>,
}

impl Identity {
    /// The anonymous identity: unauthenticated, no authorities, placeholder
    /// name. A valid value, not an absence.
    pub fn anonymous() -> Self {
        Self {
            first_name: "Anonymous".to_string(),
            ..Self::default()
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Sole well-formedness predicate: the email is non-empty.
    pub fn is_valid(&self) -> bool {
        !self.email.is_empty()
    }

    /// A proxied identity is never counted as logged in, regardless of its
    /// authenticated flag.
    pub fn is_logged_in(&self) -> bool {
        if self.is_proxied {
            return false;
        }
        self.authenticated
    }

    /// Any-of authority test over a single code or a comma-delimited list.
    ///
    /// Alias codes are expanded through [`RoleExpander`]; comparison is
    /// case-insensitive against the lowercase authority map. Never raises:
    /// malformed input degrades to `false`.
    pub fn has_authority(&self, authority_list: &str) -> bool {
        let codes = csv_to_list(authority_list);
        self.has_any_authority(&codes)
    }

    /// Any-of authority test over a list of codes.
    pub fn has_any_authority<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        if self.authorities.is_empty() {
            return false;
        }

        let mut master_list: Vec<String> = Vec::new();
        for code in codes {
            master_list.extend(RoleExpander::expand(code.as_ref()));
        }

        master_list
            .iter()
            .any(|code| self.authorities.contains_key(&code.to_lowercase()))
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.display_name(), self.email)
    }
}

/// Builds identities from upstream principals, session records, or email
/// lookups. Borrows the per-request collaborator handles; holds no state.
pub struct IdentityResolver<'a> {
    principals: &'a dyn PrincipalSource,
    authorities: &'a dyn AuthoritySource,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(
        principals: &'a dyn PrincipalSource,
        authorities: &'a dyn AuthoritySource,
    ) -> Self {
        Self {
            principals,
            authorities,
        }
    }

    /// The anonymous identity.
    pub fn anonymous(&self) -> Identity {
        Identity::anonymous()
    }

    /// Resume path: direct field copy from a serialized record, no
    /// authority re-expansion. Unreadable records degrade to `None`.
    pub fn from_record(&self, record: Value) -> Option<Identity> {
        match serde_json::from_value(record) {
            Ok(identity) => Some(identity),
            Err(err) => {
                error!(%err, "discarding unreadable identity record");
                None
            }
        }
    }

    /// Authenticate path: copy profile fields, then load active authority
    /// grants keyed by lowercased code. Grant-query failures are logged
    /// and leave the authority map empty.
    pub fn from_principal(&self, principal: &Principal) -> Identity {
        let mut identity = Identity {
            authenticated: principal.authenticated,
            first_name: principal.first_name.clone(),
            last_name: principal.last_name.clone(),
            email: principal.email.clone(),
            username: principal.username.clone(),
            is_proxied: false,
            authorities: HashMap::new(),
        };

        if principal.authenticated {
            match self.authorities.active_grants(principal) {
                Ok(grants) => {
                    for grant in grants {
                        identity
                            .authorities
                            .insert(grant.code.to_lowercase(), grant.title);
                    }
                }
                Err(err) => {
                    error!(email = %principal.email, %err, "could not load authority grants");
                }
            }
        }

        identity
    }

    /// Lookup path: resolve a principal by email and build from it. A
    /// missing or errored lookup yields an invalid (empty-email) identity.
    pub fn from_email(&self, email: &str) -> Identity {
        match self.principals.find_by_email(email) {
            Ok(Some(principal)) => self.from_principal(&principal),
            Ok(None) => Identity::default(),
            Err(err) => {
                error!(%email, %err, "principal lookup failed");
                Identity::default()
            }
        }
    }
}
