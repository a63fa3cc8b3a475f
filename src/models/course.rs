// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Course catalog records: course documents with embedded enrollments,
//! the archive lifecycle, and the enrollment ledger rules.
//!
//! All state transitions are pure methods on plain data; persistence is
//! handled by the db layer, which runs the mutating methods inside
//! Firestore transactions.

use crate::error::AppError;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// Default archive grace period, in calendar months.
pub const DEFAULT_GRACE_PERIOD_MONTHS: u32 = 6;

/// Lifecycle status of a course.
///
/// The `Archived` variant carries its own timestamps, so an archived course
/// without an archive date is unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CourseStatus {
    Active,
    Inactive,
    Archived {
        archived_at: DateTime<Utc>,
        /// Instant after which previously-enrolled students lose access.
        grace_period_ends: DateTime<Utc>,
        reason: String,
    },
}

impl CourseStatus {
    pub fn is_archived(&self) -> bool {
        matches!(self, CourseStatus::Archived { .. })
    }
}

/// Enrollment status within a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Cancelled,
}

/// A student's enrollment, embedded in the course document.
///
/// `version_enrolled` is fixed at enrollment time and never advances
/// automatically: a student keeps the content snapshot they purchased even
/// if the course is revised later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub user_id: u64,
    pub version_enrolled: u32,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

/// Denormalized enrollment entry stored in the `enrollment_index`
/// collection (document id `{user_id}_{course_id}`) so the dashboard can
/// query a user's enrollments without scanning every course document.
///
/// Written in the same transaction as the embedded record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentIndexEntry {
    pub user_id: u64,
    pub course_id: String,
    pub version_enrolled: u32,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
}

impl EnrollmentIndexEntry {
    pub fn doc_id(user_id: u64, course_id: &str) -> String {
        format!("{}_{}", user_id, course_id)
    }
}

/// Course document stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Document id (admin-chosen slug)
    pub course_id: String,
    pub title: String,
    pub description: String,
    /// Price in cents
    pub price_cents: u32,
    pub status: CourseStatus,
    /// Latest published version number
    pub version: u32,
    /// Version new enrollments receive (invariant: `current_version <= version`)
    pub current_version: u32,
    /// Optional enrollment cap
    pub max_enrollments: Option<u32>,
    pub is_public: bool,
    pub total_enrollments: u32,
    /// Embedded enrollment ledger
    pub enrollments: Vec<EnrollmentRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    // ─── Archive Lifecycle ───────────────────────────────────────

    /// Archive the course with a grace period for enrolled students.
    ///
    /// Fails with `InvalidState` if the course is already archived.
    pub fn archive(
        &mut self,
        reason: &str,
        grace_period_months: u32,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.status.is_archived() {
            return Err(AppError::InvalidState(format!(
                "Course {} is already archived",
                self.course_id
            )));
        }

        let grace_period_ends = now
            .checked_add_months(Months::new(grace_period_months))
            .ok_or_else(|| AppError::Validation("Grace period out of range".to_string()))?;

        self.status = CourseStatus::Archived {
            archived_at: now,
            grace_period_ends,
            reason: reason.to_string(),
        };
        self.updated_at = now;
        Ok(())
    }

    /// Restore an archived course to active, clearing the archive fields.
    ///
    /// Archived courses never reactivate automatically; this is the only
    /// path back to `Active`.
    pub fn unarchive(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.is_archived() {
            return Err(AppError::InvalidState(format!(
                "Course {} is not archived",
                self.course_id
            )));
        }
        self.status = CourseStatus::Active;
        self.updated_at = now;
        Ok(())
    }

    /// Whether enrolled students can still access course content.
    ///
    /// Active and inactive courses remain accessible to students who
    /// already enrolled; archived courses are accessible strictly before
    /// the grace period ends.
    pub fn is_accessible_to_enrolled(&self, now: DateTime<Utc>) -> bool {
        match &self.status {
            CourseStatus::Active | CourseStatus::Inactive => true,
            CourseStatus::Archived {
                grace_period_ends, ..
            } => now < *grace_period_ends,
        }
    }

    // ─── Enrollment Ledger ───────────────────────────────────────

    /// Enroll a user, pinning them to `current_version`.
    ///
    /// Returns the new record on success. The caller is responsible for
    /// running this inside a transaction so the capacity and duplicate
    /// checks cannot race with concurrent enrollments.
    pub fn enroll(&mut self, user_id: u64, now: DateTime<Utc>) -> Result<EnrollmentRecord, AppError> {
        if self.status != CourseStatus::Active {
            return Err(AppError::NotAvailable(format!(
                "Course {} is not open for enrollment",
                self.course_id
            )));
        }

        if let Some(cap) = self.max_enrollments {
            if self.total_enrollments >= cap {
                return Err(AppError::Capacity(format!(
                    "Course {} has reached its enrollment cap of {}",
                    self.course_id, cap
                )));
            }
        }

        if self.active_enrollment(user_id).is_some() {
            return Err(AppError::DuplicateEnrollment(format!(
                "User {} is already enrolled in course {}",
                user_id, self.course_id
            )));
        }

        let record = EnrollmentRecord {
            user_id,
            version_enrolled: self.current_version,
            status: EnrollmentStatus::Active,
            enrolled_at: now,
            last_accessed_at: now,
        };
        self.enrollments.push(record.clone());
        self.total_enrollments += 1;
        self.updated_at = now;
        Ok(record)
    }

    /// The user's active enrollment, if any.
    ///
    /// At most one active enrollment exists per user (enforced by
    /// `enroll`); cancelled or completed records are ignored.
    pub fn active_enrollment(&self, user_id: u64) -> Option<&EnrollmentRecord> {
        self.enrollments
            .iter()
            .find(|e| e.user_id == user_id && e.status == EnrollmentStatus::Active)
    }

    /// Whether the user may access content from the given version.
    ///
    /// Students may access the version they bought or any earlier one,
    /// never a later version without re-enrolling.
    pub fn has_access_to_version(&self, user_id: u64, version: u32) -> bool {
        self.active_enrollment(user_id)
            .is_some_and(|e| e.version_enrolled >= version)
    }

    // ─── Versioning ──────────────────────────────────────────────

    /// Bump the version counters for a newly published version.
    ///
    /// Returns the new version number. Existing enrollments stay pinned to
    /// the version they were created with.
    pub fn publish_next_version(&mut self, now: DateTime<Utc>) -> u32 {
        self.version += 1;
        self.current_version = self.version;
        self.updated_at = now;
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_course(status: CourseStatus) -> Course {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Course {
            course_id: "rust-101".to_string(),
            title: "Rust for Beginners".to_string(),
            description: "Learn Rust".to_string(),
            price_cents: 4900,
            status,
            version: 1,
            current_version: 1,
            max_enrollments: None,
            is_public: true,
            total_enrollments: 0,
            enrollments: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn t(month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, month, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_archive_sets_grace_period() {
        let mut course = make_course(CourseStatus::Active);
        course.archive("retired", 6, t(1)).unwrap();

        match &course.status {
            CourseStatus::Archived {
                archived_at,
                grace_period_ends,
                reason,
            } => {
                assert_eq!(*archived_at, t(1));
                assert_eq!(*grace_period_ends, t(7));
                assert_eq!(reason, "retired");
            }
            other => panic!("Expected archived status, got {:?}", other),
        }
    }

    #[test]
    fn test_archive_twice_fails() {
        let mut course = make_course(CourseStatus::Active);
        course.archive("retired", 6, t(1)).unwrap();

        let err = course.archive("again", 6, t(2)).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn test_unarchive_restores_active() {
        let mut course = make_course(CourseStatus::Active);
        course.archive("retired", 6, t(1)).unwrap();
        course.unarchive(t(2)).unwrap();

        assert_eq!(course.status, CourseStatus::Active);
    }

    #[test]
    fn test_unarchive_non_archived_fails() {
        let mut course = make_course(CourseStatus::Active);
        let err = course.unarchive(t(1)).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[test]
    fn test_grace_period_access_window() {
        // Archived in January with 6 months grace: accessible at +5 months,
        // denied at +7 months.
        let mut course = make_course(CourseStatus::Active);
        course.archive("retired", 6, t(1)).unwrap();

        assert!(course.is_accessible_to_enrolled(t(6)));
        assert!(!course.is_accessible_to_enrolled(t(8)));
    }

    #[test]
    fn test_inactive_course_remains_accessible_to_enrolled() {
        let course = make_course(CourseStatus::Inactive);
        assert!(course.is_accessible_to_enrolled(t(1)));
    }

    #[test]
    fn test_enroll_pins_current_version() {
        let mut course = make_course(CourseStatus::Active);
        course.version = 3;
        course.current_version = 2;

        let record = course.enroll(42, t(1)).unwrap();

        assert_eq!(record.version_enrolled, 2);
        assert_eq!(course.total_enrollments, 1);
    }

    #[test]
    fn test_enroll_inactive_course_fails() {
        let mut course = make_course(CourseStatus::Inactive);
        let err = course.enroll(42, t(1)).unwrap_err();
        assert!(matches!(err, AppError::NotAvailable(_)));
    }

    #[test]
    fn test_enroll_at_capacity_fails() {
        let mut course = make_course(CourseStatus::Active);
        course.max_enrollments = Some(1);
        course.enroll(1, t(1)).unwrap();

        let err = course.enroll(2, t(1)).unwrap_err();
        assert!(matches!(err, AppError::Capacity(_)));
    }

    #[test]
    fn test_enroll_twice_fails() {
        let mut course = make_course(CourseStatus::Active);
        course.enroll(42, t(1)).unwrap();

        let err = course.enroll(42, t(2)).unwrap_err();
        assert!(matches!(err, AppError::DuplicateEnrollment(_)));
    }

    #[test]
    fn test_version_pinning_survives_new_version() {
        let mut course = make_course(CourseStatus::Active);
        course.enroll(42, t(1)).unwrap();

        let new_version = course.publish_next_version(t(2));
        assert_eq!(new_version, 2);
        assert_eq!(course.current_version, 2);

        // Student enrolled at version 1 keeps access to version 1 but does
        // not gain access to version 2.
        assert!(course.has_access_to_version(42, 1));
        assert!(!course.has_access_to_version(42, 2));
    }

    #[test]
    fn test_has_access_to_version_without_enrollment() {
        let course = make_course(CourseStatus::Active);
        assert!(!course.has_access_to_version(42, 1));
    }

    #[test]
    fn test_status_serde_tagging() {
        let status = CourseStatus::Archived {
            archived_at: t(1),
            grace_period_ends: t(7),
            reason: "retired".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "archived");
        assert!(json["grace_period_ends"].is_string());
    }
}
