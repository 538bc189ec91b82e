use std::fmt;

use serde_json::Value;
use uuid::Uuid;

use crate::column_policy::ColumnPath;

/// A scalar value for scope filtering.
///
/// Owner ids travel through records as JSON; this is the typed form used
/// once an id has been resolved for a caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeValue {
    /// UUID value (user ids, shelter ids, etc.)
    Uuid(Uuid),
    /// String value.
    String(String),
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
}

impl ScopeValue {
    /// Try to extract a UUID from this value.
    ///
    /// Returns `Some` for `ScopeValue::Uuid` directly, and for
    /// `ScopeValue::String` if the string is a valid UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(u) => Some(*u),
            Self::String(s) => Uuid::parse_str(s).ok(),
            Self::Int(_) | Self::Bool(_) => None,
        }
    }

    /// Convert a JSON scalar. UUID strings become `ScopeValue::Uuid`;
    /// objects, arrays, floats and `null` are rejected.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(
                Uuid::parse_str(s).map_or_else(|_| Self::String(s.clone()), Self::Uuid),
            ),
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Whether a stored JSON value equals this scope value.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Uuid(u), Value::String(s)) => Uuid::parse_str(s).is_ok_and(|v| v == *u),
            (Self::String(expected), Value::String(s)) => expected == s,
            (Self::Int(expected), Value::Number(n)) => n.as_i64() == Some(*expected),
            (Self::Bool(expected), Value::Bool(b)) => expected == b,
            _ => false,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Uuid(u) => Value::String(u.to_string()),
            Self::String(s) => Value::String(s.clone()),
            Self::Int(n) => Value::Number((*n).into()),
            Self::Bool(b) => Value::Bool(*b),
        }
    }
}

impl fmt::Display for ScopeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid(u) => write!(f, "{u}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<Uuid> for ScopeValue {
    #[inline]
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<&Uuid> for ScopeValue {
    #[inline]
    fn from(u: &Uuid) -> Self {
        Self::Uuid(*u)
    }
}

impl From<String> for ScopeValue {
    #[inline]
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for ScopeValue {
    #[inline]
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<i64> for ScopeValue {
    #[inline]
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for ScopeValue {
    #[inline]
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Equality restriction on the owner column: `column = value`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OwnerFilter {
    column: ColumnPath,
    value: ScopeValue,
}

impl OwnerFilter {
    #[must_use]
    pub fn new(column: ColumnPath, value: impl Into<ScopeValue>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }

    /// Owner column; may be a relation path such as `pet.shelterId`.
    #[inline]
    #[must_use]
    pub fn column(&self) -> &ColumnPath {
        &self.column
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &ScopeValue {
        &self.value
    }
}

/// Row-level restriction for collection reads.
///
/// Ownership on lists is enforced by constraining the query, never by
/// filtering loaded rows, so rows of other owners are not fetched at all.
///
/// # Examples
///
/// ```
/// use adoptly_security::{ColumnPath, OwnerScope};
/// use uuid::Uuid;
///
/// // deny-all (default)
/// assert!(OwnerScope::default().is_deny_all());
///
/// let shelter = Uuid::new_v4();
/// let scope = OwnerScope::owned(ColumnPath::root("shelterId"), shelter);
/// assert!(!scope.is_deny_all());
/// assert!(scope.permits(Some(&serde_json::json!(shelter.to_string()))));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OwnerScope {
    /// No row-level filtering.
    AllowAll,
    /// Nothing is visible.
    DenyAll,
    /// Only rows whose owner column equals the filter value.
    Owned(OwnerFilter),
}

impl Default for OwnerScope {
    /// Default is deny-all.
    fn default() -> Self {
        Self::DenyAll
    }
}

impl OwnerScope {
    #[must_use]
    pub fn allow_all() -> Self {
        Self::AllowAll
    }

    #[must_use]
    pub fn deny_all() -> Self {
        Self::DenyAll
    }

    #[must_use]
    pub fn owned(column: ColumnPath, value: impl Into<ScopeValue>) -> Self {
        Self::Owned(OwnerFilter::new(column, value))
    }

    #[inline]
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Self::AllowAll)
    }

    #[inline]
    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        matches!(self, Self::DenyAll)
    }

    #[must_use]
    pub fn filter(&self) -> Option<&OwnerFilter> {
        match self {
            Self::Owned(filter) => Some(filter),
            Self::AllowAll | Self::DenyAll => None,
        }
    }

    /// Evaluate the scope against the value a row holds in the owner column.
    #[must_use]
    pub fn permits(&self, owner_value: Option<&Value>) -> bool {
        match self {
            Self::AllowAll => true,
            Self::DenyAll => false,
            Self::Owned(filter) => owner_value.is_some_and(|v| filter.value.matches(v)),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    const S1: &str = "11111111-1111-1111-1111-111111111111";
    const S2: &str = "22222222-2222-2222-2222-222222222222";

    fn uid(s: &str) -> Uuid {
        Uuid::parse_str(s).unwrap()
    }

    #[test]
    fn from_json_detects_uuids() {
        assert_eq!(ScopeValue::from_json(&json!(S1)), Some(ScopeValue::Uuid(uid(S1))));
        assert_eq!(
            ScopeValue::from_json(&json!("plain")),
            Some(ScopeValue::String("plain".to_owned()))
        );
        assert_eq!(ScopeValue::from_json(&json!(7)), Some(ScopeValue::Int(7)));
        assert_eq!(ScopeValue::from_json(&json!(null)), None);
        assert_eq!(ScopeValue::from_json(&json!({"id": S1})), None);
    }

    #[test]
    fn owned_scope_matches_only_its_owner() {
        let scope = OwnerScope::owned(ColumnPath::root("shelterId"), uid(S1));

        assert!(scope.permits(Some(&json!(S1))));
        assert!(!scope.permits(Some(&json!(S2))));
        assert!(!scope.permits(None));
        assert_eq!(
            scope.filter().map(|f| f.column().as_str()),
            Some("shelterId")
        );
    }

    #[test]
    fn allow_all_and_deny_all() {
        assert!(OwnerScope::allow_all().permits(None));
        assert!(OwnerScope::allow_all().is_unconstrained());
        assert!(!OwnerScope::deny_all().permits(Some(&json!(S1))));
    }

    #[test]
    fn to_json_roundtrips_through_from_json() {
        let value = ScopeValue::Uuid(uid(S2));
        assert_eq!(ScopeValue::from_json(&value.to_json()), Some(value));
    }
}
