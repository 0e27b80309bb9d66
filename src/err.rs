use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

use crate::store::StoreError;
use crate::validate::ValidationError;

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
}

/// Error body returned to callers, tagged by kind under `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    MissingRequiredField {
        field: &'static str,
        reason: &'static str,
        message: String,
    },
    InvalidFormat {
        field: &'static str,
        reason: &'static str,
        message: String,
    },
    UniqueConstraintViolation { message: String },
    NotFound { message: String },
    InvalidPayload { message: String },
    StorageUnavailable { message: String },
    InternalError { kind: &'static str, message: String },
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingRequiredField { .. }
            | Error::InvalidFormat { .. }
            | Error::UniqueConstraintViolation { .. }
            | Error::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::StorageUnavailable { .. } | Error::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Maps a storage outcome for `entity` during `op` to a response error.
    pub fn from_store(err: StoreError, entity: Entity, op: Operation) -> Error {
        match err {
            StoreError::NotFound => Error::NotFound {
                message: format!("{} not found.", entity.label()),
            },
            StoreError::UniqueViolation => {
                let message = conflict_message(entity, op);
                log::warn!("{:?} {:?} rejected: {}", op, entity, message);
                Error::UniqueConstraintViolation {
                    message: message.to_string(),
                }
            }
            StoreError::Unavailable(message) => {
                log::error!("Storage unavailable during {:?} {:?}: {}", op, entity, message);
                Error::StorageUnavailable { message }
            }
            StoreError::Backend(message) => {
                log::error!("Storage failure during {:?} {:?}: {}", op, entity, message);
                Error::InternalError {
                    kind: "DatabaseError",
                    message,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Student,
    Program,
    Course,
    User,
}

impl Entity {
    pub fn label(&self) -> &'static str {
        match self {
            Entity::Student => "Student",
            Entity::Program => "Program",
            Entity::Course => "Course",
            Entity::User => "User",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
}

/// Storage does not say which unique key collided, so the message depends
/// only on what was being written and how.
pub fn conflict_message(entity: Entity, op: Operation) -> &'static str {
    match (entity, op) {
        (Entity::Student, Operation::Create) => "Student ID or RFID code already registered.",
        (Entity::Student, _) => "Duplicate student_id or rfid_code after update.",
        (Entity::Program, _) => "Program code already exists.",
        (Entity::Course, _) => "Course code already exists.",
        (Entity::User, _) => "Username already taken.",
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        match err {
            ValidationError::MissingRequiredField { field } => Self::MissingRequiredField {
                field,
                reason: "missing_required_field",
                message,
            },
            ValidationError::InvalidFormat { field, reason } => Self::InvalidFormat {
                field,
                reason: reason.code(),
                message,
            },
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidPayload {
            message: rejection.to_string(),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "PasswordHashError",
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::FormatViolation;

    #[test]
    fn conflicts_are_classified_by_operation() {
        assert_eq!(
            conflict_message(Entity::Student, Operation::Create),
            "Student ID or RFID code already registered."
        );
        assert_eq!(
            conflict_message(Entity::Student, Operation::Update),
            "Duplicate student_id or rfid_code after update."
        );
        let err = Error::from_store(StoreError::UniqueViolation, Entity::Student, Operation::Update);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_outcomes_map_to_statuses() {
        let not_found = Error::from_store(StoreError::NotFound, Entity::Student, Operation::Delete);
        assert_eq!(
            not_found,
            Error::NotFound {
                message: "Student not found.".into()
            }
        );
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let down = Error::from_store(
            StoreError::Unavailable("pool timed out".into()),
            Entity::Course,
            Operation::List,
        );
        assert_eq!(down.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_errors_keep_field_and_reason() {
        let err = Error::from(ValidationError::InvalidFormat {
            field: "first_name",
            reason: FormatViolation::Name,
        });
        let body = serde_json::to_value(&err).unwrap();
        assert_eq!(body["error"], "InvalidFormat");
        assert_eq!(body["field"], "first_name");
        assert_eq!(body["reason"], "invalid_name_format");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
