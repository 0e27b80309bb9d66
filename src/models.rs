use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::skip_serializing_none;

/// A request field: `None` when the key is absent, `Some(None)` for an
/// explicit `null`.
pub type Field = Option<Option<String>>;

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

/// Reads a present field, keeping `null` apart from absence. Numbers are
/// taken as their decimal text, so `"year_level": 1` reads as `"1"`.
fn field<'de, D>(deserializer: D) -> Result<Field, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(Some(value.map(|scalar| match scalar {
        Scalar::Text(text) => text,
        Scalar::Number(number) => number.to_string(),
    })))
}

/// A registered student, as stored and as returned to callers.
///
/// `full_name` is always derived from the four name components and is never
/// taken from a request body.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentRecord {
    pub student_id: String,
    pub rfid_code: String,
    pub full_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub suffix: Option<String>,
    pub year_level: String,
    pub program: String,
    pub course: Option<String>,
    pub school_year: Option<String>,
    pub semester: Option<String>,
    pub photo: Option<String>,
    pub email: Option<String>,
    pub created_by: Option<String>,
    pub created_date: DateTime<Utc>,
}

/// Raw student fields as they arrive over the wire. Every field is optional so
/// the same shape serves registrations and partial updates; the validator
/// decides what presence means.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentPayload {
    #[serde(default, deserialize_with = "field")]
    pub student_id: Field,
    #[serde(default, deserialize_with = "field")]
    pub rfid_code: Field,
    #[serde(default, deserialize_with = "field")]
    pub first_name: Field,
    #[serde(default, deserialize_with = "field")]
    pub middle_name: Field,
    #[serde(default, deserialize_with = "field")]
    pub last_name: Field,
    #[serde(default, deserialize_with = "field")]
    pub suffix: Field,
    #[serde(default, deserialize_with = "field")]
    pub year_level: Field,
    #[serde(default, deserialize_with = "field")]
    pub program: Field,
    #[serde(default, deserialize_with = "field")]
    pub course: Field,
    #[serde(default, deserialize_with = "field")]
    pub school_year: Field,
    #[serde(default, deserialize_with = "field")]
    pub semester: Field,
    #[serde(default, deserialize_with = "field")]
    pub photo: Field,
    #[serde(default, deserialize_with = "field")]
    pub email: Field,
    #[serde(default, deserialize_with = "field")]
    pub created_by: Field,
}

/// A registration that passed validation, before `full_name` is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub student_id: String,
    pub rfid_code: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub suffix: Option<String>,
    pub year_level: String,
    pub program: String,
    pub course: Option<String>,
    pub school_year: Option<String>,
    pub semester: Option<String>,
    pub photo: Option<String>,
    pub email: Option<String>,
    pub created_by: Option<String>,
}

/// A validated partial update.
///
/// `None` leaves a field untouched. For optional fields, `Some(None)` clears
/// the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentPatch {
    pub student_id: Option<String>,
    pub rfid_code: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<Option<String>>,
    pub last_name: Option<String>,
    pub suffix: Option<Option<String>>,
    pub year_level: Option<String>,
    pub program: Option<String>,
    pub course: Option<Option<String>>,
    pub school_year: Option<Option<String>>,
    pub semester: Option<Option<String>>,
    pub photo: Option<Option<String>>,
    pub email: Option<Option<String>>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self == &StudentPatch::default()
    }

    /// Whether any constituent of `full_name` is being changed.
    pub fn touches_name(&self) -> bool {
        self.first_name.is_some()
            || self.middle_name.is_some()
            || self.last_name.is_some()
            || self.suffix.is_some()
    }
}

/// Which flat code registry an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Registry {
    Programs,
    Courses,
}

impl Registry {
    pub fn table(&self) -> &'static str {
        match self {
            Registry::Programs => "programs",
            Registry::Courses => "courses",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Registry::Programs => "/programs",
            Registry::Courses => "/courses",
        }
    }
}

/// A program or course: a code with a human readable description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RegistryEntry {
    pub code: String,
    pub description: String,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryPayload {
    #[serde(default, deserialize_with = "field")]
    pub code: Field,
    #[serde(default, deserialize_with = "field")]
    pub description: Field,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub code: Option<String>,
    pub description: Option<String>,
}

/// An operator account of the registration desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserRecord {
    pub username: String,
    pub full_name: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Admin,
    #[default]
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "admin" => Some(Role::Admin),
            "staff" => Some(Role::Staff),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPayload {
    #[serde(default, deserialize_with = "field")]
    pub username: Field,
    #[serde(default, deserialize_with = "field")]
    pub full_name: Field,
    #[serde(default, deserialize_with = "field")]
    pub password: Field,
    #[serde(default, deserialize_with = "field")]
    pub role: Field,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
}

/// Validated user changes, still carrying the plaintext password.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

/// User changes ready for storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Listing<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for Listing<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Deleted {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_keeps_null_apart_from_absence() {
        let payload: StudentPayload =
            serde_json::from_str(r#"{"last_name": null, "suffix": "Jr"}"#).unwrap();
        assert_eq!(payload.last_name, Some(None));
        assert_eq!(payload.suffix, Some(Some("Jr".into())));
        assert_eq!(payload.first_name, None);
    }

    #[test]
    fn payload_reads_numbers_as_text() {
        let payload: StudentPayload =
            serde_json::from_str(r#"{"year_level": 1, "semester": 2.5}"#).unwrap();
        assert_eq!(payload.year_level, Some(Some("1".into())));
        assert_eq!(payload.semester, Some(Some("2.5".into())));
        assert!(serde_json::from_str::<StudentPayload>(r#"{"program": ["BSCS"]}"#).is_err());
    }
}
