use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use chrono::Utc;
use pbkdf2::password_hash::{PasswordHasher, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;

use crate::err::{Entity, Error, Operation};
use crate::models::{Deleted, Listing, UserChanges, UserPatch, UserPayload, UserRecord};
use crate::store::{SharedStore, StoreError};
use crate::validate::{validate_new_user, validate_user_patch};
use crate::{created, proceeds, Payload};

pub fn routes() -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:username", put(update_user).delete(delete_user))
}

fn storage_error(op: Operation) -> impl FnOnce(StoreError) -> Error {
    move |err| Error::from_store(err, Entity::User, op)
}

/// Hashes `password` into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Pbkdf2.hash_password(password.as_bytes(), &salt)?.to_string())
}

fn into_patch(changes: UserChanges) -> Result<UserPatch, Error> {
    Ok(UserPatch {
        username: changes.username,
        full_name: changes.full_name,
        password_hash: changes
            .password
            .as_deref()
            .map(hash_password)
            .transpose()?,
        role: changes.role,
    })
}

pub async fn list_users(Extension(store): Extension<SharedStore>) -> Payload<Listing<UserRecord>> {
    let users = store
        .find_all_users()
        .await
        .map_err(storage_error(Operation::List))?;
    proceeds(Listing::from(users))
}

pub async fn create_user(
    Extension(store): Extension<SharedStore>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Payload<UserRecord> {
    let Json(payload) = payload?;
    let user = validate_new_user(payload)?;

    let record = UserRecord {
        password_hash: hash_password(&user.password)?,
        username: user.username,
        full_name: user.full_name,
        role: user.role.as_str().to_string(),
        created_date: Utc::now(),
    };
    let stored = store
        .insert_user(record)
        .await
        .map_err(storage_error(Operation::Create))?;
    log::info!("Created {} account {}", stored.role, stored.username);
    created(stored)
}

pub async fn update_user(
    Path(username): Path<String>,
    Extension(store): Extension<SharedStore>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Payload<UserRecord> {
    let Json(payload) = payload?;
    let patch = into_patch(validate_user_patch(payload)?)?;

    let updated = store
        .find_and_update_user(&username, &patch)
        .await
        .map_err(storage_error(Operation::Update))?;
    log::info!("Updated account {}", username);
    proceeds(updated)
}

pub async fn delete_user(
    Path(username): Path<String>,
    Extension(store): Extension<SharedStore>,
) -> Payload<Deleted> {
    store
        .find_and_delete_user(&username)
        .await
        .map_err(storage_error(Operation::Delete))?;
    log::info!("Deleted account {}", username);
    proceeds(Deleted {
        message: "User deleted successfully.".to_string(),
    })
}
