use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Application roles a caller can hold.
///
/// Serialized in `SCREAMING_SNAKE_CASE` to match the permission tables
/// (`ADMINISTRATOR`, `SHELTER`, `TUTOR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Administrator,
    Shelter,
    Tutor,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Administrator => "ADMINISTRATOR",
            Self::Shelter => "SHELTER",
            Self::Tutor => "TUTOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `CallerContext` carries the identity resolved for a request.
///
/// Built by the authentication collaborator (token verification happens
/// outside this crate) and passed through the request lifecycle. Services use
/// it together with the access resolver to obtain a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    /// Subject ID of the authenticated user. Nil for anonymous callers.
    subject_id: Uuid,
    /// Role claimed by the verified token. Anonymous callers carry none.
    role: Option<Role>,
    /// Whether a token was presented and verified.
    authenticated: bool,
}

impl CallerContext {
    /// Create a new `CallerContext` builder
    #[must_use]
    pub fn builder() -> CallerContextBuilder {
        CallerContextBuilder::default()
    }

    /// Create an anonymous context: nil subject, no role, not authenticated.
    #[must_use]
    pub fn anonymous() -> Self {
        CallerContextBuilder::default().build()
    }

    /// Shorthand for an authenticated caller with the given role.
    #[must_use]
    pub fn authenticated(subject_id: Uuid, role: Role) -> Self {
        Self::builder().subject_id(subject_id).role(role).build()
    }

    #[must_use]
    pub fn subject_id(&self) -> Uuid {
        self.subject_id
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

#[derive(Default)]
pub struct CallerContextBuilder {
    subject_id: Option<Uuid>,
    role: Option<Role>,
    authenticated: Option<bool>,
}

impl CallerContextBuilder {
    #[must_use]
    pub fn subject_id(mut self, subject_id: Uuid) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    #[must_use]
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Override the authenticated flag. Defaults to `true` when a subject id
    /// was supplied and `false` otherwise.
    #[must_use]
    pub fn authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = Some(authenticated);
        self
    }

    #[must_use]
    pub fn build(self) -> CallerContext {
        let authenticated = self
            .authenticated
            .unwrap_or_else(|| self.subject_id.is_some_and(|id| !id.is_nil()));
        CallerContext {
            subject_id: self.subject_id.unwrap_or_default(),
            role: if authenticated { self.role } else { None },
            authenticated,
        }
    }
}
