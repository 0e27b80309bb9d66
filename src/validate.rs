//! Format checks applied to raw request bodies before anything reaches storage.
//!
//! Validation rejects, it never repairs. The one exception is surrounding
//! whitespace on name components, which is trimmed before the pattern check
//! and stays trimmed in the result.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::models::{
    EntryPatch, EntryPayload, NewEntry, NewStudent, NewUser, Role, StudentPatch, StudentPayload,
    UserChanges, UserPayload,
};

lazy_static! {
    static ref STUDENT_ID: Regex = Regex::new(r"^[0-9]{2}-[A-Z]-[0-9]{5}$").unwrap();
    static ref NAME: Regex = Regex::new(r"^[\p{L} ]+$").unwrap();
    static ref USERNAME: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").unwrap();
}

pub const MIN_PASSWORD_LEN: usize = 8;

/// Deployment-level switches that change which fields are mandatory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rules {
    /// Require `school_year` and `semester` on every student.
    pub require_term_fields: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatViolation {
    StudentId,
    Name,
    Username,
    PasswordLength,
    Role,
}

impl FormatViolation {
    /// Stable machine readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            FormatViolation::StudentId => "invalid_student_id_format",
            FormatViolation::Name => "invalid_name_format",
            FormatViolation::Username => "invalid_username_format",
            FormatViolation::PasswordLength => "password_too_short",
            FormatViolation::Role => "invalid_role",
        }
    }
}

impl fmt::Display for FormatViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FormatViolation::StudentId => "must look like 12-A-12345",
            FormatViolation::Name => "may only contain letters and spaces",
            FormatViolation::Username => {
                "must be 3 to 32 letters, digits, dots, dashes or underscores"
            }
            FormatViolation::PasswordLength => "must be at least 8 characters long",
            FormatViolation::Role => "must be either `admin` or `staff`",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`{field}` is required")]
    MissingRequiredField { field: &'static str },
    #[error("`{field}` {reason}")]
    InvalidFormat {
        field: &'static str,
        reason: FormatViolation,
    },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingRequiredField { field } => field,
            ValidationError::InvalidFormat { field, .. } => field,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingRequiredField { .. } => "missing_required_field",
            ValidationError::InvalidFormat { reason, .. } => reason.code(),
        }
    }
}

type Result<T> = std::result::Result<T, ValidationError>;

fn invalid(field: &'static str, reason: FormatViolation) -> ValidationError {
    ValidationError::InvalidFormat { field, reason }
}

fn required(field: &'static str, value: Option<String>) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ValidationError::MissingRequiredField { field }),
    }
}

/// Empty strings count as absent for optional fields.
fn optional(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn student_id(value: String) -> Result<String> {
    if value.is_empty() {
        return Err(ValidationError::MissingRequiredField {
            field: "student_id",
        });
    }
    if !STUDENT_ID.is_match(&value) {
        return Err(invalid("student_id", FormatViolation::StudentId));
    }
    Ok(value)
}

fn name(field: &'static str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingRequiredField { field });
    }
    if !NAME.is_match(trimmed) {
        return Err(invalid(field, FormatViolation::Name));
    }
    Ok(trimmed.to_owned())
}

fn optional_name(field: &'static str, value: Option<String>) -> Result<Option<String>> {
    match optional(value) {
        Some(value) => name(field, value).map(Some),
        None => Ok(None),
    }
}

fn term(field: &'static str, value: Option<String>, rules: &Rules) -> Result<Option<String>> {
    if rules.require_term_fields {
        required(field, value).map(Some)
    } else {
        Ok(optional(value))
    }
}

/// Checks a full registration. An explicit `null` counts as missing.
pub fn validate_new(payload: StudentPayload, rules: &Rules) -> Result<NewStudent> {
    Ok(NewStudent {
        student_id: student_id(required("student_id", payload.student_id.flatten())?)?,
        rfid_code: required("rfid_code", payload.rfid_code.flatten())?,
        first_name: name("first_name", required("first_name", payload.first_name.flatten())?)?,
        middle_name: optional_name("middle_name", payload.middle_name.flatten())?,
        last_name: name("last_name", required("last_name", payload.last_name.flatten())?)?,
        suffix: optional_name("suffix", payload.suffix.flatten())?,
        year_level: required("year_level", payload.year_level.flatten())?,
        program: required("program", payload.program.flatten())?,
        course: optional(payload.course.flatten()),
        school_year: term("school_year", payload.school_year.flatten(), rules)?,
        semester: term("semester", payload.semester.flatten(), rules)?,
        photo: optional(payload.photo.flatten()),
        email: optional(payload.email.flatten()),
        created_by: optional(payload.created_by.flatten()),
    })
}

/// Checks only the fields present in an update.
///
/// A present required field must carry a value: `null` or an empty string is
/// rejected, while on an optional field either one clears it. `student_id` is
/// pattern checked even though it is also the lookup key, so a record can
/// never be re-keyed to a malformed id. `created_by` is fixed at registration
/// and ignored here.
pub fn validate_partial(payload: StudentPayload, rules: &Rules) -> Result<StudentPatch> {
    Ok(StudentPatch {
        student_id: payload
            .student_id
            .map(|v| required("student_id", v).and_then(student_id))
            .transpose()?,
        rfid_code: payload
            .rfid_code
            .map(|v| required("rfid_code", v))
            .transpose()?,
        first_name: payload
            .first_name
            .map(|v| required("first_name", v).and_then(|v| name("first_name", v)))
            .transpose()?,
        middle_name: payload
            .middle_name
            .map(|v| optional_name("middle_name", v))
            .transpose()?,
        last_name: payload
            .last_name
            .map(|v| required("last_name", v).and_then(|v| name("last_name", v)))
            .transpose()?,
        suffix: payload
            .suffix
            .map(|v| optional_name("suffix", v))
            .transpose()?,
        year_level: payload
            .year_level
            .map(|v| required("year_level", v))
            .transpose()?,
        program: payload
            .program
            .map(|v| required("program", v))
            .transpose()?,
        course: payload.course.map(optional),
        school_year: payload
            .school_year
            .map(|v| term("school_year", v, rules))
            .transpose()?,
        semester: payload
            .semester
            .map(|v| term("semester", v, rules))
            .transpose()?,
        photo: payload.photo.map(optional),
        email: payload.email.map(optional),
    })
}

fn code(value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingRequiredField { field: "code" });
    }
    Ok(trimmed.to_owned())
}

pub fn validate_entry(payload: EntryPayload) -> Result<NewEntry> {
    Ok(NewEntry {
        code: code(required("code", payload.code.flatten())?)?,
        description: required("description", payload.description.flatten())?,
    })
}

pub fn validate_entry_patch(payload: EntryPayload) -> Result<EntryPatch> {
    Ok(EntryPatch {
        code: payload
            .code
            .map(|v| required("code", v).and_then(code))
            .transpose()?,
        description: payload
            .description
            .map(|v| required("description", v))
            .transpose()?,
    })
}

fn username(value: String) -> Result<String> {
    if value.is_empty() {
        return Err(ValidationError::MissingRequiredField { field: "username" });
    }
    if !USERNAME.is_match(&value) {
        return Err(invalid("username", FormatViolation::Username));
    }
    Ok(value)
}

fn password(value: String) -> Result<String> {
    if value.is_empty() {
        return Err(ValidationError::MissingRequiredField { field: "password" });
    }
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid("password", FormatViolation::PasswordLength));
    }
    Ok(value)
}

fn role(value: String) -> Result<Role> {
    Role::parse(&value).ok_or_else(|| invalid("role", FormatViolation::Role))
}

pub fn validate_new_user(payload: UserPayload) -> Result<NewUser> {
    Ok(NewUser {
        username: username(required("username", payload.username.flatten())?)?,
        full_name: name("full_name", required("full_name", payload.full_name.flatten())?)?,
        password: password(required("password", payload.password.flatten())?)?,
        role: payload.role.flatten().map(role).transpose()?.unwrap_or_default(),
    })
}

pub fn validate_user_patch(payload: UserPayload) -> Result<UserChanges> {
    Ok(UserChanges {
        username: payload
            .username
            .map(|v| required("username", v).and_then(username))
            .transpose()?,
        full_name: payload
            .full_name
            .map(|v| required("full_name", v).and_then(|v| name("full_name", v)))
            .transpose()?,
        password: payload
            .password
            .map(|v| required("password", v).and_then(password))
            .transpose()?,
        role: payload
            .role
            .map(|v| required("role", v).and_then(role))
            .transpose()?,
    })
}
