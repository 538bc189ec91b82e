//! Fixtures for the module's unit tests: an in-memory store, the embedded
//! rule table, and seeded rows with known ids.

use std::sync::Arc;

use adoptly_db::{EntityStore, MemoryStore, Record};
use adoptly_security::{CallerContext, Role};
use serde_json::{Value, json};
use static_access_plugin::{Service, StaticAccessPluginConfig, config::DEFAULT_PERMISSIONS};
use uuid::Uuid;

use crate::domain::entities::{PET, SHELTER, TUTOR, USER};
use crate::domain::service::{AppServices, ServiceConfig};

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

pub fn id_of(record: &Record) -> Uuid {
    Uuid::parse_str(record["id"].as_str().unwrap()).unwrap()
}

pub fn services(store: &Arc<MemoryStore>) -> AppServices<MemoryStore> {
    let rules = StaticAccessPluginConfig::from_yaml(DEFAULT_PERMISSIONS).unwrap();
    let resolver = Arc::new(Service::new(rules).unwrap());
    AppServices::new(store, resolver, ServiceConfig::default())
}

pub fn admin() -> CallerContext {
    CallerContext::authenticated(Uuid::new_v4(), Role::Administrator)
}

pub fn as_user(id: Uuid, role: Role) -> CallerContext {
    CallerContext::authenticated(id, role)
}

pub async fn seed_user(store: &MemoryStore, role: Role) -> Uuid {
    let id = Uuid::new_v4();
    store
        .save(
            &USER,
            record(json!({
                "id": id.to_string(),
                "name": format!("{} user", role.as_str()),
                "email": format!("{id}@adoptly.test"),
                "password": "secret",
                "role": role.as_str(),
            })),
        )
        .await
        .unwrap();
    id
}

/// A shelter user plus their shelter. Returns `(user_id, shelter_id)`.
pub async fn seed_shelter(store: &MemoryStore) -> (Uuid, Uuid) {
    let user = seed_user(store, Role::Shelter).await;
    let shelter = Uuid::new_v4();
    store
        .save(
            &SHELTER,
            record(json!({"id": shelter.to_string(), "userId": user.to_string()})),
        )
        .await
        .unwrap();
    (user, shelter)
}

/// A tutor user plus their tutor row. Returns `(user_id, tutor_id)`.
pub async fn seed_tutor(store: &MemoryStore) -> (Uuid, Uuid) {
    let user = seed_user(store, Role::Tutor).await;
    let tutor = Uuid::new_v4();
    store
        .save(
            &TUTOR,
            record(json!({"id": tutor.to_string(), "userId": user.to_string()})),
        )
        .await
        .unwrap();
    (user, tutor)
}

pub async fn seed_pet(store: &MemoryStore, shelter: Uuid, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    store
        .save(
            &PET,
            record(json!({
                "id": id.to_string(),
                "name": name,
                "species": "dog",
                "adopted": false,
                "shelterId": shelter.to_string(),
            })),
        )
        .await
        .unwrap();
    id
}
