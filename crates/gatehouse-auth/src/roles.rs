//! Dynamic role expansion
//!
//! A symbolic authority alias (marked with `~`) expands to a fixed set of
//! literal authority codes. The table is a compile-time constant; there is
//! no persistence and no failure mode beyond "no match".

/// Sigil marking an authority code as a dynamic alias.
pub const ALIAS_SIGIL: char = '~';

const POWER_USER_ROLES: &[&str] = &["security_admin", "admin", "developer"];
const SUPER_USER_ROLES: &[&str] = &["developer"];
const IMPERSONATION_ROLES: &[&str] = &["developer"];
const CONTACT_ADMIN_ROLES: &[&str] = &["admin", "contact_admin"];
const SECURITY_ADMIN_ROLES: &[&str] = &["admin", "security_admin"];
const PROXY_ROLES: &[&str] = &["admin", "proxy"];

/// Keyword table in priority order. An alias containing more than one
/// keyword substring resolves to the first entry listed here, so the order
/// is load-bearing: `~security_proxy` is the security-admin set, not the
/// proxy set.
const KEYWORD_TABLE: &[(&str, &[&str])] = &[
    ("power", POWER_USER_ROLES),
    ("super", SUPER_USER_ROLES),
    ("imperson", IMPERSONATION_ROLES),
    ("contact", CONTACT_ADMIN_ROLES),
    ("security", SECURITY_ADMIN_ROLES),
    ("proxy", PROXY_ROLES),
];

/// Expands alias authority codes into literal code lists.
#[derive(Debug, Clone, Copy)]
pub struct RoleExpander;

impl RoleExpander {
    /// Expand one authority code.
    ///
    /// A literal code returns itself unchanged. An alias returns the
    /// literal set bound to its first matching keyword, or an empty list
    /// when no keyword matches (the authority becomes unsatisfiable).
    pub fn expand(code: &str) -> Vec<String> {
        if !code.contains(ALIAS_SIGIL) {
            return vec![code.to_string()];
        }

        for (keyword, literals) in KEYWORD_TABLE {
            if code.contains(keyword) {
                return literals.iter().map(|c| (*c).to_string()).collect();
            }
        }

        Vec::new()
    }
}
