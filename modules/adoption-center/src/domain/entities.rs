//! The five entities of the adoption center and their descriptors.
//!
//! | entity   | owner column    | ownership                              |
//! |----------|-----------------|----------------------------------------|
//! | user     | `id`            | the user itself                        |
//! | shelter  | `userId`        | the shelter's user                     |
//! | tutor    | `userId`        | the tutor's user                       |
//! | pet      | `shelterId`     | the user of the pet's shelter          |
//! | adoption | `pet.shelterId` | the user of the adopted pet's shelter  |

use access_resolver_sdk::ResourceType;
use adoptly_db::entity::columns::{CREATED_AT, DELETED_AT, ID, UPDATED_AT};
use adoptly_db::{EntityMeta, EntityStore, FindQuery, Record, RelationKind, RelationMeta};
use adoptly_security::{ColumnPath, OwnerScope, Role, ScopeValue};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::descriptor::{EntityDescriptor, IdentityField};
use crate::domain::error::DomainError;
use crate::domain::ownership::{DirectOwnership, Ownership};

pub mod fields {
    pub const USER_ID: &str = "userId";
    pub const SHELTER_ID: &str = "shelterId";
    pub const PET_ID: &str = "petId";
    pub const TUTOR_ID: &str = "tutorId";
    pub const ADOPTED: &str = "adopted";
    pub const ROLE: &str = "role";
    pub const DATE: &str = "date";
}

pub static USER: EntityMeta = EntityMeta {
    name: "User",
    table: "users",
    alias: "user",
    id_column: ID,
    columns: &[
        ID, "name", "email", "password", "role", "phone", "city", "about", "photo", CREATED_AT,
        UPDATED_AT, DELETED_AT,
    ],
    relations: &[],
    unique: &["email"],
    soft_delete_column: Some(DELETED_AT),
};

pub static PET: EntityMeta = EntityMeta {
    name: "Pet",
    table: "pets",
    alias: "pet",
    id_column: ID,
    columns: &[
        ID,
        "name",
        "species",
        "size",
        "age",
        "description",
        "photo",
        fields::ADOPTED,
        fields::SHELTER_ID,
        CREATED_AT,
        UPDATED_AT,
        DELETED_AT,
    ],
    relations: &[],
    unique: &[],
    soft_delete_column: Some(DELETED_AT),
};

pub static SHELTER: EntityMeta = EntityMeta {
    name: "Shelter",
    table: "shelters",
    alias: "shelter",
    id_column: ID,
    columns: &[ID, fields::USER_ID, CREATED_AT, UPDATED_AT, DELETED_AT],
    relations: &[
        RelationMeta {
            alias: "user",
            target: &USER,
            kind: RelationKind::BelongsTo {
                local_key: fields::USER_ID,
            },
            cascade: true,
        },
        RelationMeta {
            alias: "pets",
            target: &PET,
            kind: RelationKind::HasMany {
                foreign_key: fields::SHELTER_ID,
            },
            cascade: true,
        },
    ],
    unique: &[fields::USER_ID],
    soft_delete_column: Some(DELETED_AT),
};

pub static TUTOR: EntityMeta = EntityMeta {
    name: "Tutor",
    table: "tutors",
    alias: "tutor",
    id_column: ID,
    columns: &[ID, fields::USER_ID, CREATED_AT, UPDATED_AT, DELETED_AT],
    relations: &[RelationMeta {
        alias: "user",
        target: &USER,
        kind: RelationKind::BelongsTo {
            local_key: fields::USER_ID,
        },
        cascade: true,
    }],
    unique: &[fields::USER_ID],
    soft_delete_column: Some(DELETED_AT),
};

pub static ADOPTION: EntityMeta = EntityMeta {
    name: "Adoption",
    table: "adoptions",
    alias: "adoption",
    id_column: ID,
    columns: &[
        ID,
        fields::PET_ID,
        fields::TUTOR_ID,
        fields::DATE,
        CREATED_AT,
        UPDATED_AT,
        DELETED_AT,
    ],
    relations: &[
        RelationMeta {
            alias: "pet",
            target: &PET,
            kind: RelationKind::BelongsTo {
                local_key: fields::PET_ID,
            },
            cascade: false,
        },
        RelationMeta {
            alias: "tutor",
            target: &TUTOR,
            kind: RelationKind::BelongsTo {
                local_key: fields::TUTOR_ID,
            },
            cascade: false,
        },
    ],
    // One live adoption per pet; a cancelled one is soft-deleted.
    unique: &[fields::PET_ID],
    soft_delete_column: Some(DELETED_AT),
};

/// Load a live row by the id held in `entity[key]`.
async fn load_related(
    store: &dyn EntityStore,
    meta: &'static EntityMeta,
    entity: &Record,
    key: &str,
) -> Result<Option<Record>, DomainError> {
    let Some(id) = entity.get(key).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let (mut rows, _) = store
        .find_many(meta, &FindQuery::by_id(id.clone()).page(0, Some(1)))
        .await?;
    Ok(rows.pop())
}

/// Pets belong to whoever owns their shelter.
#[derive(Debug, Clone, Copy)]
pub struct ShelterOwnership {
    pub shelter_key: &'static str,
}

#[async_trait]
impl Ownership for ShelterOwnership {
    async fn is_owner(
        &self,
        store: &dyn EntityStore,
        entity: &Record,
        caller: Uuid,
    ) -> Result<bool, DomainError> {
        if entity.get(self.shelter_key).is_none_or(Value::is_null) {
            return Ok(false);
        }
        let shelter = load_related(store, &SHELTER, entity, self.shelter_key)
            .await?
            .ok_or_else(|| DomainError::bad_request("Shelter does not exist"))?;
        Ok(USER_ID_OWNERSHIP.owns(&shelter, caller))
    }

    async fn owner_id_for(
        &self,
        store: &dyn EntityStore,
        caller: Uuid,
    ) -> Result<Option<ScopeValue>, DomainError> {
        let query = FindQuery::all()
            .scoped(OwnerScope::owned(ColumnPath::root(fields::USER_ID), caller))
            .page(0, Some(1));
        let (rows, _) = store.find_many(&SHELTER, &query).await?;
        Ok(rows
            .first()
            .and_then(|shelter| SHELTER.id_of(shelter))
            .and_then(ScopeValue::from_json))
    }
}

/// Adoptions belong to whoever owns the adopted pet.
#[derive(Debug, Clone, Copy)]
pub struct AdoptionOwnership {
    pub pet_key: &'static str,
    pub pet: ShelterOwnership,
}

#[async_trait]
impl Ownership for AdoptionOwnership {
    async fn is_owner(
        &self,
        store: &dyn EntityStore,
        entity: &Record,
        caller: Uuid,
    ) -> Result<bool, DomainError> {
        if entity.get(self.pet_key).is_none_or(Value::is_null) {
            return Ok(false);
        }
        let pet = load_related(store, &PET, entity, self.pet_key)
            .await?
            .ok_or_else(|| DomainError::bad_request("Pet does not exist"))?;
        self.pet.is_owner(store, &pet, caller).await
    }

    async fn owner_id_for(
        &self,
        store: &dyn EntityStore,
        caller: Uuid,
    ) -> Result<Option<ScopeValue>, DomainError> {
        self.pet.owner_id_for(store, caller).await
    }
}

const USER_OWNERSHIP: DirectOwnership = DirectOwnership { column: ID };
const USER_ID_OWNERSHIP: DirectOwnership = DirectOwnership {
    column: fields::USER_ID,
};
const PET_OWNERSHIP: ShelterOwnership = ShelterOwnership {
    shelter_key: fields::SHELTER_ID,
};
const ADOPTION_OWNERSHIP: AdoptionOwnership = AdoptionOwnership {
    pet_key: fields::PET_ID,
    pet: PET_OWNERSHIP,
};

const USER_LINK: IdentityField = IdentityField::Linked {
    path: "user.id",
    column: fields::USER_ID,
};

pub static USERS: EntityDescriptor = EntityDescriptor {
    resource: ResourceType { name: "users" },
    meta: &USER,
    owner_column: ID,
    identity: &[IdentityField::PrimaryKey],
    ownership: &USER_OWNERSHIP,
    user_role: None,
};

pub static SHELTERS: EntityDescriptor = EntityDescriptor {
    resource: ResourceType { name: "shelters" },
    meta: &SHELTER,
    owner_column: fields::USER_ID,
    identity: &[
        IdentityField::PrimaryKey,
        IdentityField::Fixed(fields::USER_ID),
        USER_LINK,
    ],
    ownership: &USER_ID_OWNERSHIP,
    user_role: Some(Role::Shelter),
};

pub static TUTORS: EntityDescriptor = EntityDescriptor {
    resource: ResourceType { name: "tutors" },
    meta: &TUTOR,
    owner_column: fields::USER_ID,
    identity: &[
        IdentityField::PrimaryKey,
        IdentityField::Fixed(fields::USER_ID),
        USER_LINK,
    ],
    ownership: &USER_ID_OWNERSHIP,
    user_role: Some(Role::Tutor),
};

pub static PETS: EntityDescriptor = EntityDescriptor {
    resource: ResourceType { name: "pets" },
    meta: &PET,
    owner_column: fields::SHELTER_ID,
    identity: &[
        IdentityField::PrimaryKey,
        IdentityField::Fixed(fields::SHELTER_ID),
    ],
    ownership: &PET_OWNERSHIP,
    user_role: None,
};

pub static ADOPTIONS: EntityDescriptor = EntityDescriptor {
    resource: ResourceType { name: "adoptions" },
    meta: &ADOPTION,
    owner_column: "pet.shelterId",
    identity: &[IdentityField::PrimaryKey, IdentityField::Fixed(fields::PET_ID)],
    ownership: &ADOPTION_OWNERSHIP,
    user_role: None,
};

/// Every descriptor, in rule-table order.
pub static ALL: [&EntityDescriptor; 5] = [&ADOPTIONS, &PETS, &SHELTERS, &TUTORS, &USERS];

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use adoptly_db::{MemoryStore, all_columns};
    use serde_json::json;

    fn record(value: &Value) -> Record {
        value.as_object().unwrap().clone()
    }

    async fn seed_shelter(store: &MemoryStore, user: Uuid) -> String {
        let saved = store
            .save(
                &SHELTER,
                record(&json!({"user": {"id": user.to_string(), "name": "Happy Paws"}})),
            )
            .await
            .unwrap();
        saved["id"].as_str().unwrap().to_owned()
    }

    #[test]
    fn owner_columns_are_selectable() {
        for descriptor in ALL {
            let columns = all_columns(descriptor.meta);
            assert!(
                columns.iter().any(|c| c.as_str() == descriptor.owner_column),
                "{} owner column {} is not a column path",
                descriptor.meta.name,
                descriptor.owner_column
            );
        }
    }

    #[tokio::test]
    async fn pet_owner_goes_through_the_shelter() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let shelter_id = seed_shelter(&store, owner).await;
        let pet = record(&json!({"name": "Rex", "shelterId": shelter_id}));

        assert!(PET_OWNERSHIP.is_owner(&store, &pet, owner).await.unwrap());
        assert!(!PET_OWNERSHIP.is_owner(&store, &pet, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn missing_shelter_is_a_bad_request() {
        let store = MemoryStore::new();
        let pet = record(&json!({"shelterId": Uuid::new_v4().to_string()}));

        assert_eq!(
            PET_OWNERSHIP.is_owner(&store, &pet, Uuid::new_v4()).await,
            Err(DomainError::bad_request("Shelter does not exist"))
        );
    }

    #[tokio::test]
    async fn missing_pet_is_a_bad_request() {
        let store = MemoryStore::new();
        let adoption = record(&json!({"petId": Uuid::new_v4().to_string()}));

        assert_eq!(
            ADOPTION_OWNERSHIP.is_owner(&store, &adoption, Uuid::new_v4()).await,
            Err(DomainError::bad_request("Pet does not exist"))
        );
    }

    #[tokio::test]
    async fn shelter_scope_resolves_the_shelter_id() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let shelter_id = seed_shelter(&store, owner).await;
        seed_shelter(&store, Uuid::new_v4()).await;

        let scoped = PET_OWNERSHIP.owner_id_for(&store, owner).await.unwrap();
        assert_eq!(scoped.map(|v| v.to_string()), Some(shelter_id));

        let nobody = PET_OWNERSHIP.owner_id_for(&store, Uuid::new_v4()).await.unwrap();
        assert_eq!(nobody, None);
    }
}
