//! crates/eco_portal_core/src/role.rs
//!
//! Works out which role a visitor is acting as, and which routes they may see.
//!
//! Resolution is a total function: missing or unrecognised signals fall
//! through to the next rule and finally to `Role::Student`.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{Identity, Role};
use crate::ports::{KeyValueStore, PortResult};
use crate::routes::RouteSet;

/// Durable storage key holding the role picked before login.
pub const SELECTED_ROLE_KEY: &str = "selectedRole";

//=========================================================================================
// Override Policy
//=========================================================================================

/// Decides whether a stored override can be superseded by the identity's own role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverridePolicy {
    /// The override beats every identity signal.
    #[default]
    OverrideWins,
    /// A role declared on the identity beats the override. Heuristics never do.
    DeclaredWins,
}

impl std::str::FromStr for OverridePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "override-wins" => Ok(OverridePolicy::OverrideWins),
            "declared-wins" => Ok(OverridePolicy::DeclaredWins),
            other => Err(format!(
                "'{}' is not one of override-wins, declared-wins",
                other
            )),
        }
    }
}

//=========================================================================================
// Heuristic Rule Table
//=========================================================================================

/// One keyword heuristic. A rule matches when any email keyword appears in the
/// lowercased email, or any user name keyword appears in the lowercased user name.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub role: Role,
    pub email_keywords: &'static [&'static str],
    pub user_name_keywords: &'static [&'static str],
}

impl KeywordRule {
    pub fn matches(&self, identity: &Identity) -> bool {
        let hit = |field: &Option<String>, keywords: &[&str]| {
            field.as_deref().is_some_and(|value| {
                let value = value.to_lowercase();
                keywords.iter().any(|k| value.contains(k))
            })
        };
        hit(&identity.email, self.email_keywords)
            || hit(&identity.user_name, self.user_name_keywords)
    }
}

/// Evaluated in order; the first matching rule wins.
pub const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        role: Role::Teacher,
        email_keywords: &["teacher", "edu", "school"],
        user_name_keywords: &["teacher", "prof"],
    },
    KeywordRule {
        role: Role::Ngo,
        email_keywords: &["ngo", "org", "foundation", "charity"],
        user_name_keywords: &["ngo", "org"],
    },
];

//=========================================================================================
// Pure Resolution
//=========================================================================================

/// The outcome of resolving a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub role: Option<Role>,
    pub routes: RouteSet,
}

/// Returns the first declared role, checking `role`, `metadata.role`, then `user_type`.
pub fn declared_role(identity: &Identity) -> Option<Role> {
    let metadata_role = identity.metadata.as_ref().and_then(|m| m.role.as_ref());
    [identity.role.as_ref(), metadata_role, identity.user_type.as_ref()]
        .into_iter()
        .flatten()
        .filter(|value| !value.trim().is_empty())
        .find_map(|value| value.parse::<Role>().ok())
}

/// Applies the keyword rule table.
pub fn inferred_role(identity: &Identity) -> Option<Role> {
    KEYWORD_RULES
        .iter()
        .find(|rule| rule.matches(identity))
        .map(|rule| rule.role)
}

/// Resolves the acting role and route set for a visitor.
pub fn resolve(
    identity: Option<&Identity>,
    override_role: Option<Role>,
    policy: OverridePolicy,
) -> Resolution {
    let Some(identity) = identity else {
        return Resolution {
            role: None,
            routes: RouteSet::unauthenticated(),
        };
    };

    let role = match (override_role, policy) {
        (Some(role), OverridePolicy::OverrideWins) => role,
        (override_role, _) => declared_role(identity)
            .or(override_role)
            .or_else(|| inferred_role(identity))
            .unwrap_or(Role::Student),
    };

    debug!(identity_id = %identity.id, %role, "Resolved session role");
    Resolution {
        role: Some(role),
        routes: RouteSet::authenticated(role),
    }
}

//=========================================================================================
// Session-Scoped Resolver
//=========================================================================================

/// Holds the role override for one browser session.
///
/// Reads go to the in-memory copy first and fall back to durable storage, so a
/// fresh session (after a reload) picks up the earlier selection.
pub struct RoleSession {
    store: Arc<dyn KeyValueStore>,
    cached: Option<Role>,
    policy: OverridePolicy,
}

impl RoleSession {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: OverridePolicy) -> Self {
        Self {
            store,
            cached: None,
            policy,
        }
    }

    pub fn policy(&self) -> OverridePolicy {
        self.policy
    }

    /// Records an explicit role choice and writes it through to durable storage.
    pub async fn select_role(&mut self, role: Role) -> PortResult<()> {
        self.cached = Some(role);
        self.store.set(SELECTED_ROLE_KEY, role.as_str()).await?;
        info!(%role, "Stored role override");
        Ok(())
    }

    pub async fn clear_override(&mut self) -> PortResult<()> {
        self.cached = None;
        self.store.remove(SELECTED_ROLE_KEY).await?;
        info!("Cleared role override");
        Ok(())
    }

    /// The current override, if any. Storage failures count as "no override".
    pub async fn current_override(&mut self) -> Option<Role> {
        if let Some(role) = self.cached {
            return Some(role);
        }

        let stored = match self.store.get(SELECTED_ROLE_KEY).await {
            Ok(stored) => stored?,
            Err(e) => {
                warn!("Failed to read role override, ignoring it: {}", e);
                return None;
            }
        };

        match stored.parse::<Role>() {
            Ok(role) => {
                self.cached = Some(role);
                Some(role)
            }
            Err(e) => {
                warn!("Ignoring stored role override: {}", e);
                None
            }
        }
    }

    pub async fn resolve(&mut self, identity: Option<&Identity>) -> Resolution {
        let override_role = self.current_override().await;
        resolve(identity, override_role, self.policy)
    }
}
