//! Programs and courses share one shape and one set of handlers; the
//! [`Registry`] each route works on is attached as an extension.

use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use chrono::Utc;

use crate::err::{Entity, Error, Operation};
use crate::models::{Deleted, EntryPayload, Listing, Registry, RegistryEntry};
use crate::normalize::build_entry;
use crate::store::{SharedStore, StoreError};
use crate::validate::{validate_entry, validate_entry_patch};
use crate::{created, proceeds, Payload};

pub fn routes(registry: Registry) -> Router {
    Router::new()
        .route(registry.path(), get(list_entries).post(create_entry))
        .route(
            &format!("{}/:code", registry.path()),
            put(update_entry).delete(delete_entry),
        )
        .layer(Extension(registry))
}

fn entity(registry: Registry) -> Entity {
    match registry {
        Registry::Programs => Entity::Program,
        Registry::Courses => Entity::Course,
    }
}

fn storage_error(registry: Registry, op: Operation) -> impl FnOnce(StoreError) -> Error {
    move |err| Error::from_store(err, entity(registry), op)
}

pub async fn list_entries(
    Extension(registry): Extension<Registry>,
    Extension(store): Extension<SharedStore>,
) -> Payload<Listing<RegistryEntry>> {
    let entries = store
        .find_all_entries(registry)
        .await
        .map_err(storage_error(registry, Operation::List))?;
    proceeds(Listing::from(entries))
}

pub async fn create_entry(
    Extension(registry): Extension<Registry>,
    Extension(store): Extension<SharedStore>,
    payload: Result<Json<EntryPayload>, JsonRejection>,
) -> Payload<RegistryEntry> {
    let Json(payload) = payload?;
    let entry = build_entry(validate_entry(payload)?, Utc::now());

    let stored = store
        .insert_entry(registry, entry)
        .await
        .map_err(storage_error(registry, Operation::Create))?;
    log::info!("Added {} {}", entity(registry).label(), stored.code);
    created(stored)
}

pub async fn update_entry(
    Path(code): Path<String>,
    Extension(registry): Extension<Registry>,
    Extension(store): Extension<SharedStore>,
    payload: Result<Json<EntryPayload>, JsonRejection>,
) -> Payload<RegistryEntry> {
    let Json(payload) = payload?;
    let patch = validate_entry_patch(payload)?;

    let updated = store
        .find_and_update_entry(registry, &code, &patch)
        .await
        .map_err(storage_error(registry, Operation::Update))?;
    log::info!("Updated {} {}", entity(registry).label(), code);
    proceeds(updated)
}

pub async fn delete_entry(
    Path(code): Path<String>,
    Extension(registry): Extension<Registry>,
    Extension(store): Extension<SharedStore>,
) -> Payload<Deleted> {
    store
        .find_and_delete_entry(registry, &code)
        .await
        .map_err(storage_error(registry, Operation::Delete))?;
    log::info!("Deleted {} {}", entity(registry).label(), code);
    proceeds(Deleted {
        message: format!("{} deleted successfully.", entity(registry).label()),
    })
}
