//! Derived fields and patch merging. Everything here is total: inputs have
//! already been through [`crate::validate`].

use chrono::{DateTime, Utc};

use crate::models::{
    EntryPatch, NewEntry, NewStudent, RegistryEntry, StudentPatch, StudentRecord, UserPatch,
    UserRecord,
};

/// Builds the display name: first, middle, last, suffix, single-space joined.
///
/// Empty components are skipped and whitespace runs inside any component are
/// collapsed, so the result never has doubled, leading or trailing spaces.
pub fn derive_full_name(first: &str, middle: Option<&str>, last: &str, suffix: Option<&str>) -> String {
    [Some(first), middle, Some(last), suffix]
        .into_iter()
        .flatten()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn full_name_of(record: &StudentRecord) -> String {
    derive_full_name(
        &record.first_name,
        record.middle_name.as_deref(),
        &record.last_name,
        record.suffix.as_deref(),
    )
}

pub fn build_record(input: NewStudent, created_date: DateTime<Utc>) -> StudentRecord {
    let full_name = derive_full_name(
        &input.first_name,
        input.middle_name.as_deref(),
        &input.last_name,
        input.suffix.as_deref(),
    );
    StudentRecord {
        student_id: input.student_id,
        rfid_code: input.rfid_code,
        full_name,
        first_name: input.first_name,
        middle_name: input.middle_name,
        last_name: input.last_name,
        suffix: input.suffix,
        year_level: input.year_level,
        program: input.program,
        course: input.course,
        school_year: input.school_year,
        semester: input.semester,
        photo: input.photo,
        email: input.email,
        created_by: input.created_by,
        created_date,
    }
}

fn overwrite<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *slot = value.clone();
    }
}

/// Applies `patch` on top of `existing`.
///
/// When any name component is present, `full_name` is recomputed from the
/// merged values of all four components, not only the changed ones.
pub fn merge_patch(mut existing: StudentRecord, patch: &StudentPatch) -> StudentRecord {
    overwrite(&mut existing.student_id, &patch.student_id);
    overwrite(&mut existing.rfid_code, &patch.rfid_code);
    overwrite(&mut existing.first_name, &patch.first_name);
    overwrite(&mut existing.middle_name, &patch.middle_name);
    overwrite(&mut existing.last_name, &patch.last_name);
    overwrite(&mut existing.suffix, &patch.suffix);
    overwrite(&mut existing.year_level, &patch.year_level);
    overwrite(&mut existing.program, &patch.program);
    overwrite(&mut existing.course, &patch.course);
    overwrite(&mut existing.school_year, &patch.school_year);
    overwrite(&mut existing.semester, &patch.semester);
    overwrite(&mut existing.photo, &patch.photo);
    overwrite(&mut existing.email, &patch.email);

    if patch.touches_name() {
        existing.full_name = full_name_of(&existing);
    }
    existing
}

pub fn build_entry(input: NewEntry, created_date: DateTime<Utc>) -> RegistryEntry {
    RegistryEntry {
        code: input.code,
        description: input.description,
        created_date,
    }
}

pub fn merge_entry_patch(mut existing: RegistryEntry, patch: &EntryPatch) -> RegistryEntry {
    overwrite(&mut existing.code, &patch.code);
    overwrite(&mut existing.description, &patch.description);
    existing
}

pub fn merge_user_patch(mut existing: UserRecord, patch: &UserPatch) -> UserRecord {
    overwrite(&mut existing.username, &patch.username);
    overwrite(&mut existing.full_name, &patch.full_name);
    overwrite(&mut existing.password_hash, &patch.password_hash);
    if let Some(role) = patch.role {
        existing.role = role.as_str().to_owned();
    }
    existing
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ana() -> StudentRecord {
        build_record(
            NewStudent {
                student_id: "12-A-12345".into(),
                rfid_code: "RF1".into(),
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
                created_by: Some("admin".into()),
            },
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
        )
    }

    #[test]
    fn full_name_skips_empty_parts() {
        assert_eq!(derive_full_name("Ana", Some(""), "Reyes", None), "Ana Reyes");
        assert_eq!(
            derive_full_name("Jose", Some("Protasio"), "Rizal", Some("Jr")),
            "Jose Protasio Rizal Jr"
        );
    }

    #[test]
    fn full_name_has_no_stray_spaces() {
        let cases = [
            (" Ana ", Some("  "), "Reyes  ", Some(" ")),
            ("Mary  Ann", None, "Dela  Cruz", Some("III")),
            ("A", Some(" B "), "C", Some("")),
        ];
        for (first, middle, last, suffix) in cases {
            let name = derive_full_name(first, middle, last, suffix);
            assert!(!name.contains("  "), "{:?}", name);
            assert_eq!(name, name.trim());
        }
    }

    #[test]
    fn new_record_derives_full_name() {
        assert_eq!(ana().full_name, "Ana Reyes");
    }

    #[test]
    fn empty_patch_is_identity() {
        let existing = ana();
        assert_eq!(merge_patch(existing.clone(), &StudentPatch::default()), existing);
    }

    #[test]
    fn middle_name_patch_rebuilds_full_name() {
        let patch = StudentPatch {
            middle_name: Some(Some("Lopez".into())),
            ..Default::default()
        };
        assert_eq!(merge_patch(ana(), &patch).full_name, "Ana Lopez Reyes");
    }

    #[test]
    fn last_name_patch_keeps_suffix_at_the_end() {
        let mut existing = ana();
        existing.suffix = Some("Jr".into());
        existing.full_name = full_name_of(&existing);

        let patch = StudentPatch {
            last_name: Some("Santos".into()),
            ..Default::default()
        };
        let merged = merge_patch(existing, &patch);
        assert!(merged.full_name.ends_with("Santos Jr"));
        assert_eq!(merged.full_name, "Ana Santos Jr");
    }

    #[test]
    fn clearing_suffix_rebuilds_full_name() {
        let mut existing = ana();
        existing.suffix = Some("Jr".into());
        existing.full_name = full_name_of(&existing);

        let patch = StudentPatch {
            suffix: Some(None),
            ..Default::default()
        };
        let merged = merge_patch(existing, &patch);
        assert_eq!(merged.suffix, None);
        assert_eq!(merged.full_name, "Ana Reyes");
    }

    #[test]
    fn non_name_patch_keeps_everything_else() {
        let existing = ana();
        let patch = StudentPatch {
            year_level: Some("2".into()),
            email: Some(Some("ana@example.edu".into())),
            ..Default::default()
        };
        let merged = merge_patch(existing.clone(), &patch);
        assert_eq!(merged.year_level, "2");
        assert_eq!(merged.email.as_deref(), Some("ana@example.edu"));
        assert_eq!(merged.full_name, existing.full_name);
        assert_eq!(merged.created_date, existing.created_date);
        assert_eq!(merged.created_by, existing.created_by);
    }

    #[test]
    fn course_is_set_and_cleared_without_touching_full_name() {
        let patch = StudentPatch {
            course: Some(Some("CS101".into())),
            ..Default::default()
        };
        let merged = merge_patch(ana(), &patch);
        assert_eq!(merged.course.as_deref(), Some("CS101"));
        assert_eq!(merged.full_name, "Ana Reyes");

        let patch = StudentPatch {
            course: Some(None),
            ..Default::default()
        };
        assert_eq!(merge_patch(merged, &patch).course, None);
    }
}
