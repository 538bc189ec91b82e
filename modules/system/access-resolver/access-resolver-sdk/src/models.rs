//! Domain models for the access resolver.
//!
//! A resource owns an ordered list of [`Rule`]s. Evaluating a request picks
//! the first rule whose action and roles match and reports its ownership
//! flag and column attributes back to the enforcement point.

use std::fmt;

use adoptly_security::{ColumnPath, ColumnPolicy, ColumnPolicyError, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operation a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    /// Matches every action.
    Crud,
}

impl Action {
    /// Whether a rule declared for `self` applies to `requested`.
    #[must_use]
    pub fn covers(self, requested: Action) -> bool {
        self == Action::Crud || self == requested
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Crud => "crud",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword granting a rule to any caller, authenticated or not.
pub const ANYONE: &str = "NONE";

/// Which callers a rule applies to.
///
/// Serialized as the keyword `"NONE"` (anyone) or a list of roles. An empty
/// list matches nobody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRoles", into = "RawRoles")]
pub enum RoleMatcher {
    Anyone,
    Roles(Vec<Role>),
}

impl RoleMatcher {
    #[must_use]
    pub fn matches(&self, role: Option<Role>) -> bool {
        match self {
            Self::Anyone => true,
            Self::Roles(roles) => role.is_some_and(|r| roles.contains(&r)),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawRoles {
    Keyword(String),
    List(Vec<Role>),
}

impl TryFrom<RawRoles> for RoleMatcher {
    type Error = String;

    fn try_from(raw: RawRoles) -> Result<Self, Self::Error> {
        match raw {
            RawRoles::Keyword(k) if k == ANYONE => Ok(Self::Anyone),
            RawRoles::Keyword(k) => Err(format!(
                "expected \"{ANYONE}\" or a list of roles, got \"{k}\""
            )),
            RawRoles::List(roles) => Ok(Self::Roles(roles)),
        }
    }
}

impl From<RoleMatcher> for RawRoles {
    fn from(matcher: RoleMatcher) -> Self {
        match matcher {
            RoleMatcher::Anyone => Self::Keyword(ANYONE.to_owned()),
            RoleMatcher::Roles(roles) => Self::List(roles),
        }
    }
}

/// Column attributes of a rule: exactly one of the two lists must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded: Option<Vec<ColumnPath>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<ColumnPath>>,
}

impl ColumnAttributes {
    /// # Errors
    ///
    /// [`ColumnPolicyError`] when both lists or neither are set.
    pub fn to_policy(&self) -> Result<ColumnPolicy, ColumnPolicyError> {
        ColumnPolicy::from_lists(self.excluded.clone(), self.included.clone())
    }
}

/// One entry of a resource's ordered rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub action: Action,
    pub roles: RoleMatcher,
    /// Whether the caller must own the targeted rows.
    #[serde(default)]
    pub ownership: bool,
    #[serde(default)]
    pub attributes: ColumnAttributes,
}

impl Rule {
    #[must_use]
    pub fn matches(&self, action: Action, role: Option<Role>) -> bool {
        self.action.covers(action) && self.roles.matches(role)
    }
}

/// The caller an evaluation is made for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub authenticated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub subject: Subject,
    pub resource: String,
    pub action: Action,
}

/// Decision for one request.
///
/// `ownership` and `attributes` come from the matched rule and are only
/// meaningful when `decision` is `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub decision: bool,
    #[serde(default)]
    pub ownership: bool,
    #[serde(default)]
    pub attributes: ColumnAttributes,
}

impl EvaluationResponse {
    #[must_use]
    pub fn deny() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn allow(rule: &Rule) -> Self {
        Self {
            decision: true,
            ownership: rule.ownership,
            attributes: rule.attributes.clone(),
        }
    }
}

/// Resolved authorization decision for one (resource, action, role).
///
/// Computed once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    Denied,
    Allowed {
        ownership_required: bool,
        columns: ColumnPolicy,
    },
}

impl Grant {
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    #[must_use]
    pub fn ownership_required(&self) -> bool {
        matches!(
            self,
            Self::Allowed {
                ownership_required: true,
                ..
            }
        )
    }

    #[must_use]
    pub fn columns(&self) -> Option<&ColumnPolicy> {
        match self {
            Self::Allowed { columns, .. } => Some(columns),
            Self::Denied => None,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn crud_covers_every_action() {
        for action in [Action::Create, Action::Read, Action::Update, Action::Delete] {
            assert!(Action::Crud.covers(action));
            assert!(action.covers(action));
        }
        assert!(!Action::Read.covers(Action::Update));
    }

    #[test]
    fn none_keyword_matches_anonymous_callers() {
        let matcher: RoleMatcher = serde_json::from_str(r#""NONE""#).unwrap();
        assert_eq!(matcher, RoleMatcher::Anyone);
        assert!(matcher.matches(None));
        assert!(matcher.matches(Some(Role::Tutor)));
    }

    #[test]
    fn empty_role_list_matches_nobody() {
        let matcher: RoleMatcher = serde_json::from_str("[]").unwrap();
        assert!(!matcher.matches(None));
        assert!(!matcher.matches(Some(Role::Administrator)));
    }

    #[test]
    fn role_list_requires_membership() {
        let matcher: RoleMatcher = serde_json::from_str(r#"["SHELTER", "TUTOR"]"#).unwrap();
        assert!(matcher.matches(Some(Role::Shelter)));
        assert!(!matcher.matches(Some(Role::Administrator)));
        assert!(!matcher.matches(None));
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        assert!(serde_json::from_str::<RoleMatcher>(r#""ANY""#).is_err());
    }

    #[test]
    fn role_matcher_serializes_back_to_keyword() {
        assert_eq!(serde_json::to_string(&RoleMatcher::Anyone).unwrap(), r#""NONE""#);
    }

    #[test]
    fn rule_deserializes_with_defaults() {
        let rule: Rule = serde_json::from_str(
            r#"{"action": "read", "roles": ["SHELTER"], "attributes": {"excluded": ["id"]}}"#,
        )
        .unwrap();
        assert!(!rule.ownership);
        assert!(rule.matches(Action::Read, Some(Role::Shelter)));
        assert_eq!(
            rule.attributes.to_policy().unwrap(),
            ColumnPolicy::exclude(["id"])
        );
    }

    #[test]
    fn attributes_with_both_lists_are_misconfigured() {
        let attrs = ColumnAttributes {
            excluded: Some(vec![]),
            included: Some(vec![ColumnPath::all_root()]),
        };
        assert_eq!(attrs.to_policy(), Err(ColumnPolicyError::BothListsSet));
        assert_eq!(
            ColumnAttributes::default().to_policy(),
            Err(ColumnPolicyError::NoListSet)
        );
    }

    #[test]
    fn denied_grant_has_no_columns() {
        assert!(!Grant::Denied.is_granted());
        assert!(!Grant::Denied.ownership_required());
        assert!(Grant::Denied.columns().is_none());
    }
}
