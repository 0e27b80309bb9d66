use async_trait::async_trait;
use sqlx::PgPool;

use super::{Result, Storage, StoreError, StoreOptions};
use crate::models::{
    EntryPatch, Registry, RegistryEntry, StudentPatch, StudentRecord, UserPatch, UserRecord,
};
use crate::normalize::{merge_entry_patch, merge_patch, merge_user_patch};

const UNIQUE_VIOLATION: &str = "23505";
const RFID_INDEX: &str = "students_rfid_code_key";

const STUDENTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS students (
    student_id TEXT PRIMARY KEY,
    rfid_code TEXT NOT NULL,
    full_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    middle_name TEXT,
    last_name TEXT NOT NULL,
    suffix TEXT,
    year_level TEXT NOT NULL,
    program TEXT NOT NULL,
    course TEXT,
    school_year TEXT,
    semester TEXT,
    photo TEXT,
    email TEXT,
    created_by TEXT,
    created_date TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const STUDENTS_COURSE_COLUMN: &str = "ALTER TABLE students ADD COLUMN IF NOT EXISTS course TEXT";

const USERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    role TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_date TIMESTAMPTZ NOT NULL DEFAULT now()
)";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                StoreError::UniqueViolation
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// PostgreSQL backed storage. Uniqueness is enforced by the table's primary
/// keys and, when enabled, a unique index on `students.rfid_code`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    options: StoreOptions,
}

impl PgStore {
    pub fn new(pool: PgPool, options: StoreOptions) -> Self {
        Self { pool, options }
    }

    /// Creates missing tables and brings the RFID index in line with
    /// [`StoreOptions::enforce_rfid_uniqueness`].
    pub async fn prepare(&self) -> Result<()> {
        sqlx::query(STUDENTS_TABLE).execute(&self.pool).await?;
        sqlx::query(STUDENTS_COURSE_COLUMN).execute(&self.pool).await?;
        for registry in [Registry::Programs, Registry::Courses] {
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    code TEXT PRIMARY KEY,
                    description TEXT NOT NULL,
                    created_date TIMESTAMPTZ NOT NULL DEFAULT now()
                )",
                registry.table()
            ))
            .execute(&self.pool)
            .await?;
        }
        sqlx::query(USERS_TABLE).execute(&self.pool).await?;

        let rfid_index = if self.options.enforce_rfid_uniqueness {
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON students (rfid_code)",
                RFID_INDEX
            )
        } else {
            format!("DROP INDEX IF EXISTS {}", RFID_INDEX)
        };
        sqlx::query(&rfid_index).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for PgStore {
    async fn insert_student(&self, record: StudentRecord) -> Result<StudentRecord> {
        let stored = sqlx::query_as::<_, StudentRecord>(
            "INSERT INTO students (student_id, rfid_code, full_name, first_name, middle_name,
                last_name, suffix, year_level, program, course, school_year, semester, photo,
                email, created_by, created_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING *",
        )
        .bind(record.student_id)
        .bind(record.rfid_code)
        .bind(record.full_name)
        .bind(record.first_name)
        .bind(record.middle_name)
        .bind(record.last_name)
        .bind(record.suffix)
        .bind(record.year_level)
        .bind(record.program)
        .bind(record.course)
        .bind(record.school_year)
        .bind(record.semester)
        .bind(record.photo)
        .bind(record.email)
        .bind(record.created_by)
        .bind(record.created_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn find_all_students(&self) -> Result<Vec<StudentRecord>> {
        let students = sqlx::query_as::<_, StudentRecord>(
            "SELECT * FROM students ORDER BY created_date, student_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(students)
    }

    async fn find_and_update_student(
        &self,
        student_id: &str,
        patch: &StudentPatch,
    ) -> Result<StudentRecord> {
        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query_as::<_, StudentRecord>(
            "SELECT * FROM students WHERE student_id = $1 FOR UPDATE",
        )
        .bind(student_id)
        .fetch_optional(&mut tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        let merged = merge_patch(existing, patch);
        let updated = sqlx::query_as::<_, StudentRecord>(
            "UPDATE students SET student_id = $2, rfid_code = $3, full_name = $4, first_name = $5,
                middle_name = $6, last_name = $7, suffix = $8, year_level = $9, program = $10,
                course = $11, school_year = $12, semester = $13, photo = $14, email = $15
             WHERE student_id = $1 RETURNING *",
        )
        .bind(student_id)
        .bind(merged.student_id)
        .bind(merged.rfid_code)
        .bind(merged.full_name)
        .bind(merged.first_name)
        .bind(merged.middle_name)
        .bind(merged.last_name)
        .bind(merged.suffix)
        .bind(merged.year_level)
        .bind(merged.program)
        .bind(merged.course)
        .bind(merged.school_year)
        .bind(merged.semester)
        .bind(merged.photo)
        .bind(merged.email)
        .fetch_one(&mut tx)
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn find_and_delete_student(&self, student_id: &str) -> Result<StudentRecord> {
        let deleted = sqlx::query_as::<_, StudentRecord>(
            "DELETE FROM students WHERE student_id = $1 RETURNING *",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        deleted.ok_or(StoreError::NotFound)
    }

    async fn insert_entry(
        &self,
        registry: Registry,
        entry: RegistryEntry,
    ) -> Result<RegistryEntry> {
        let stored = sqlx::query_as::<_, RegistryEntry>(&format!(
            "INSERT INTO {} (code, description, created_date) VALUES ($1, $2, $3) RETURNING *",
            registry.table()
        ))
        .bind(entry.code)
        .bind(entry.description)
        .bind(entry.created_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn find_all_entries(&self, registry: Registry) -> Result<Vec<RegistryEntry>> {
        let entries = sqlx::query_as::<_, RegistryEntry>(&format!(
            "SELECT * FROM {} ORDER BY code",
            registry.table()
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn find_and_update_entry(
        &self,
        registry: Registry,
        code: &str,
        patch: &EntryPatch,
    ) -> Result<RegistryEntry> {
        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query_as::<_, RegistryEntry>(&format!(
            "SELECT * FROM {} WHERE code = $1 FOR UPDATE",
            registry.table()
        ))
        .bind(code)
        .fetch_optional(&mut tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        let merged = merge_entry_patch(existing, patch);
        let updated = sqlx::query_as::<_, RegistryEntry>(&format!(
            "UPDATE {} SET code = $2, description = $3 WHERE code = $1 RETURNING *",
            registry.table()
        ))
        .bind(code)
        .bind(merged.code)
        .bind(merged.description)
        .fetch_one(&mut tx)
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn find_and_delete_entry(
        &self,
        registry: Registry,
        code: &str,
    ) -> Result<RegistryEntry> {
        let deleted = sqlx::query_as::<_, RegistryEntry>(&format!(
            "DELETE FROM {} WHERE code = $1 RETURNING *",
            registry.table()
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        deleted.ok_or(StoreError::NotFound)
    }

    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord> {
        let stored = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (username, full_name, role, password_hash, created_date)
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(user.username)
        .bind(user.full_name)
        .bind(user.role)
        .bind(user.password_hash)
        .bind(user.created_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn find_all_users(&self) -> Result<Vec<UserRecord>> {
        let users = sqlx::query_as::<_, UserRecord>("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn find_and_update_user(&self, username: &str, patch: &UserPatch) -> Result<UserRecord> {
        let mut tx = self.pool.begin().await?;
        let existing =
            sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE username = $1 FOR UPDATE")
                .bind(username)
                .fetch_optional(&mut tx)
                .await?
                .ok_or(StoreError::NotFound)?;

        let merged = merge_user_patch(existing, patch);
        let updated = sqlx::query_as::<_, UserRecord>(
            "UPDATE users SET username = $2, full_name = $3, role = $4, password_hash = $5
             WHERE username = $1 RETURNING *",
        )
        .bind(username)
        .bind(merged.username)
        .bind(merged.full_name)
        .bind(merged.role)
        .bind(merged.password_hash)
        .fetch_one(&mut tx)
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn find_and_delete_user(&self, username: &str) -> Result<UserRecord> {
        let deleted =
            sqlx::query_as::<_, UserRecord>("DELETE FROM users WHERE username = $1 RETURNING *")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        deleted.ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_unavailable() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn connection_loss_is_unavailable() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(matches!(
            StoreError::from(sqlx::Error::Io(err)),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn missing_row_is_not_found() {
        assert_eq!(StoreError::from(sqlx::Error::RowNotFound), StoreError::NotFound);
    }

    #[test]
    fn other_failures_are_backend_errors() {
        match StoreError::from(sqlx::Error::Protocol("unexpected message".into())) {
            StoreError::Backend(message) => assert!(message.contains("unexpected message")),
            other => panic!("unexpected mapping: {:?}", other),
        }
    }
}
