use std::fmt;

use access_resolver_sdk::ResourceType;
use adoptly_db::EntityMeta;
use adoptly_security::Role;

use crate::domain::ownership::Ownership;

/// A field a write may not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    /// The primary key; must match the id in the request path.
    PrimaryKey,
    /// A root column fixed once stored, such as an owner foreign key.
    Fixed(&'static str),
    /// A nested key that must equal a root column (`user.id` vs `userId`).
    Linked {
        path: &'static str,
        column: &'static str,
    },
}

/// Static wiring of one entity type into the generic controller.
pub struct EntityDescriptor {
    /// Resource name in the rule table.
    pub resource: ResourceType,
    pub meta: &'static EntityMeta,
    /// Column the owner scope constrains; may be a relation path.
    pub owner_column: &'static str,
    pub identity: &'static [IdentityField],
    pub ownership: &'static dyn Ownership,
    /// Role given to the nested `user` created along with the entity.
    pub user_role: Option<Role>,
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("resource", &self.resource)
            .field("entity", &self.meta.name)
            .field("owner_column", &self.owner_column)
            .field("identity", &self.identity)
            .field("user_role", &self.user_role)
            .finish_non_exhaustive()
    }
}
