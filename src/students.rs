use axum::extract::rejection::JsonRejection;
use axum::extract::Path;
use axum::routing::{get, put};
use axum::{Extension, Json, Router};
use chrono::Utc;

use crate::err::{Entity, Error, Operation};
use crate::models::{Deleted, Listing, StudentPayload, StudentRecord};
use crate::normalize::build_record;
use crate::store::SharedStore;
use crate::validate::{validate_new, validate_partial, Rules};
use crate::{created, proceeds, Payload};

pub fn routes() -> Router {
    Router::new()
        .route("/students", get(list_students).post(create_student))
        .route(
            "/students/:student_id",
            put(update_student).delete(delete_student),
        )
}

fn storage_error(op: Operation) -> impl FnOnce(crate::store::StoreError) -> Error {
    move |err| Error::from_store(err, Entity::Student, op)
}

pub async fn list_students(
    Extension(store): Extension<SharedStore>,
) -> Payload<Listing<StudentRecord>> {
    let students = store
        .find_all_students()
        .await
        .map_err(storage_error(Operation::List))?;
    proceeds(Listing::from(students))
}

pub async fn create_student(
    Extension(store): Extension<SharedStore>,
    Extension(rules): Extension<Rules>,
    payload: Result<Json<StudentPayload>, JsonRejection>,
) -> Payload<StudentRecord> {
    let Json(payload) = payload?;
    let input = validate_new(payload, &rules)?;
    let record = build_record(input, Utc::now());

    let stored = store
        .insert_student(record)
        .await
        .map_err(storage_error(Operation::Create))?;
    log::info!("Registered student {} ({})", stored.student_id, stored.full_name);
    created(stored)
}

pub async fn update_student(
    Path(student_id): Path<String>,
    Extension(store): Extension<SharedStore>,
    Extension(rules): Extension<Rules>,
    payload: Result<Json<StudentPayload>, JsonRejection>,
) -> Payload<StudentRecord> {
    let Json(payload) = payload?;
    let patch = validate_partial(payload, &rules)?;

    let updated = store
        .find_and_update_student(&student_id, &patch)
        .await
        .map_err(storage_error(Operation::Update))?;
    if updated.student_id != student_id {
        log::info!("Student {} re-keyed to {}", student_id, updated.student_id);
    } else {
        log::info!("Updated student {}", student_id);
    }
    proceeds(updated)
}

pub async fn delete_student(
    Path(student_id): Path<String>,
    Extension(store): Extension<SharedStore>,
) -> Payload<Deleted> {
    store
        .find_and_delete_student(&student_id)
        .await
        .map_err(storage_error(Operation::Delete))?;
    log::info!("Deleted student {}", student_id);
    proceeds(Deleted {
        message: "Student deleted successfully.".to_string(),
    })
}
