//! In-process storage. Records live in insertion order behind one async
//! `RwLock`; uniqueness is checked while the write lock is held, so exactly
//! one of several racing writers with the same key wins.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Result, Storage, StoreError, StoreOptions};
use crate::models::{
    EntryPatch, Registry, RegistryEntry, StudentPatch, StudentRecord, UserPatch, UserRecord,
};
use crate::normalize::{merge_entry_patch, merge_patch, merge_user_patch};

#[derive(Debug, Default)]
struct Tables {
    students: Vec<StudentRecord>,
    programs: Vec<RegistryEntry>,
    courses: Vec<RegistryEntry>,
    users: Vec<UserRecord>,
}

impl Tables {
    fn entries(&self, registry: Registry) -> &Vec<RegistryEntry> {
        match registry {
            Registry::Programs => &self.programs,
            Registry::Courses => &self.courses,
        }
    }

    fn entries_mut(&mut self, registry: Registry) -> &mut Vec<RegistryEntry> {
        match registry {
            Registry::Programs => &mut self.programs,
            Registry::Courses => &mut self.courses,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    options: StoreOptions,
}

impl MemoryStore {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            options,
        }
    }

    /// Whether `candidate` collides with any student except the one at `skip`.
    fn student_conflicts(
        &self,
        students: &[StudentRecord],
        candidate: &StudentRecord,
        skip: Option<usize>,
    ) -> bool {
        students
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != skip)
            .any(|(_, other)| {
                other.student_id == candidate.student_id
                    || (self.options.enforce_rfid_uniqueness
                        && other.rfid_code == candidate.rfid_code)
            })
    }
}

fn position<T>(items: &[T], matches: impl Fn(&T) -> bool) -> Result<usize> {
    items
        .iter()
        .position(matches)
        .ok_or(StoreError::NotFound)
}

#[async_trait]
impl Storage for MemoryStore {
    async fn insert_student(&self, record: StudentRecord) -> Result<StudentRecord> {
        let mut tables = self.tables.write().await;
        if self.student_conflicts(&tables.students, &record, None) {
            return Err(StoreError::UniqueViolation);
        }
        tables.students.push(record.clone());
        Ok(record)
    }

    async fn find_all_students(&self) -> Result<Vec<StudentRecord>> {
        Ok(self.tables.read().await.students.clone())
    }

    async fn find_and_update_student(
        &self,
        student_id: &str,
        patch: &StudentPatch,
    ) -> Result<StudentRecord> {
        let mut tables = self.tables.write().await;
        let index = position(&tables.students, |s| s.student_id == student_id)?;
        let merged = merge_patch(tables.students[index].clone(), patch);
        if self.student_conflicts(&tables.students, &merged, Some(index)) {
            return Err(StoreError::UniqueViolation);
        }
        tables.students[index] = merged.clone();
        Ok(merged)
    }

    async fn find_and_delete_student(&self, student_id: &str) -> Result<StudentRecord> {
        let mut tables = self.tables.write().await;
        let index = position(&tables.students, |s| s.student_id == student_id)?;
        Ok(tables.students.remove(index))
    }

    async fn insert_entry(
        &self,
        registry: Registry,
        entry: RegistryEntry,
    ) -> Result<RegistryEntry> {
        let mut tables = self.tables.write().await;
        let entries = tables.entries_mut(registry);
        if entries.iter().any(|e| e.code == entry.code) {
            return Err(StoreError::UniqueViolation);
        }
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn find_all_entries(&self, registry: Registry) -> Result<Vec<RegistryEntry>> {
        let mut entries = self.tables.read().await.entries(registry).clone();
        entries.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(entries)
    }

    async fn find_and_update_entry(
        &self,
        registry: Registry,
        code: &str,
        patch: &EntryPatch,
    ) -> Result<RegistryEntry> {
        let mut tables = self.tables.write().await;
        let entries = tables.entries_mut(registry);
        let index = position(entries.as_slice(), |e| e.code == code)?;
        let merged = merge_entry_patch(entries[index].clone(), patch);
        let taken = entries
            .iter()
            .enumerate()
            .any(|(i, e)| i != index && e.code == merged.code);
        if taken {
            return Err(StoreError::UniqueViolation);
        }
        entries[index] = merged.clone();
        Ok(merged)
    }

    async fn find_and_delete_entry(
        &self,
        registry: Registry,
        code: &str,
    ) -> Result<RegistryEntry> {
        let mut tables = self.tables.write().await;
        let entries = tables.entries_mut(registry);
        let index = position(entries.as_slice(), |e| e.code == code)?;
        Ok(entries.remove(index))
    }

    async fn insert_user(&self, user: UserRecord) -> Result<UserRecord> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation);
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_all_users(&self) -> Result<Vec<UserRecord>> {
        let mut users = self.tables.read().await.users.clone();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn find_and_update_user(&self, username: &str, patch: &UserPatch) -> Result<UserRecord> {
        let mut tables = self.tables.write().await;
        let index = position(&tables.users, |u| u.username == username)?;
        let merged = merge_user_patch(tables.users[index].clone(), patch);
        let taken = tables
            .users
            .iter()
            .enumerate()
            .any(|(i, u)| i != index && u.username == merged.username);
        if taken {
            return Err(StoreError::UniqueViolation);
        }
        tables.users[index] = merged.clone();
        Ok(merged)
    }

    async fn find_and_delete_user(&self, username: &str) -> Result<UserRecord> {
        let mut tables = self.tables.write().await;
        let index = position(&tables.users, |u| u.username == username)?;
        Ok(tables.users.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn student(student_id: &str, rfid_code: &str) -> StudentRecord {
        StudentRecord {
            student_id: student_id.into(),
            rfid_code: rfid_code.into(),
            full_name: "Ana Reyes".into(),
            first_name: "Ana".into(),
            middle_name: None,
            last_name: "Reyes".into(),
            suffix: None,
            year_level: "1".into(),
            program: "BSCS".into(),
            course: None,
            school_year: None,
            semester: None,
            photo: None,
            email: None,
            created_by: None,
            created_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_student_id_is_rejected() {
        let store = MemoryStore::default();
        store.insert_student(student("12-A-12345", "RF1")).await.unwrap();
        let err = store
            .insert_student(student("12-A-12345", "RF2"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation);
        assert_eq!(store.find_all_students().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rfid_uniqueness_is_optional() {
        let strict = MemoryStore::new(StoreOptions {
            enforce_rfid_uniqueness: true,
        });
        strict.insert_student(student("12-A-00001", "RF1")).await.unwrap();
        assert_eq!(
            strict.insert_student(student("12-A-00002", "RF1")).await,
            Err(StoreError::UniqueViolation)
        );

        let relaxed = MemoryStore::new(StoreOptions {
            enforce_rfid_uniqueness: false,
        });
        relaxed.insert_student(student("12-A-00001", "RF1")).await.unwrap();
        relaxed.insert_student(student("12-A-00002", "RF1")).await.unwrap();
        assert_eq!(relaxed.find_all_students().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rekeying_onto_existing_id_is_rejected() {
        let store = MemoryStore::default();
        store.insert_student(student("12-A-00001", "RF1")).await.unwrap();
        store.insert_student(student("12-A-00002", "RF2")).await.unwrap();

        let patch = StudentPatch {
            student_id: Some("12-A-00001".into()),
            ..Default::default()
        };
        assert_eq!(
            store.find_and_update_student("12-A-00002", &patch).await,
            Err(StoreError::UniqueViolation)
        );

        // updating a record onto its own values is not a conflict
        let patch = StudentPatch {
            rfid_code: Some("RF2".into()),
            ..Default::default()
        };
        assert!(store.find_and_update_student("12-A-00002", &patch).await.is_ok());
    }

    #[tokio::test]
    async fn missing_keys_are_not_found() {
        let store = MemoryStore::default();
        store.insert_student(student("12-A-00001", "RF1")).await.unwrap();

        assert_eq!(
            store.find_and_delete_student("99-Z-99999").await,
            Err(StoreError::NotFound)
        );
        assert_eq!(
            store
                .find_and_update_student("99-Z-99999", &StudentPatch::default())
                .await,
            Err(StoreError::NotFound)
        );
        assert_eq!(store.find_all_students().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn registries_are_kept_apart() {
        let store = MemoryStore::default();
        let entry = RegistryEntry {
            code: "BSCS".into(),
            description: "Computer Science".into(),
            created_date: Utc::now(),
        };
        store
            .insert_entry(Registry::Programs, entry.clone())
            .await
            .unwrap();
        store
            .insert_entry(Registry::Courses, entry.clone())
            .await
            .unwrap();
        assert_eq!(
            store.insert_entry(Registry::Programs, entry).await,
            Err(StoreError::UniqueViolation)
        );
        assert_eq!(
            store.find_all_entries(Registry::Courses).await.unwrap().len(),
            1
        );
    }
}
