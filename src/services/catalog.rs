// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Course catalog service: course/version administration, enrollment,
//! and entitlement-filtered video listings.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{
    Course, CourseStatus, CourseVersion, EnrollmentRecord, VersionStatus, Video, VideoStatus,
    DEFAULT_GRACE_PERIOD_MONTHS,
};
use crate::services::entitlement::{self, AccessContext, LockReason};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Video definition supplied when creating or versioning a course.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVideoInput {
    pub title: String,
    pub duration_seconds: f64,
    #[serde(default)]
    pub is_free_preview: bool,
}

/// Payload for creating a course with its initial version.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCourseInput {
    /// Document id (url-safe slug)
    pub course_id: String,
    pub title: String,
    pub description: String,
    pub price_cents: u32,
    pub max_enrollments: Option<u32>,
    #[serde(default)]
    pub is_public: bool,
    pub thumbnail_url: Option<String>,
    pub videos: Vec<NewVideoInput>,
}

/// Payload for publishing a new version of an existing course.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVersionInput {
    /// Metadata overrides; fall back to the course record when absent
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub videos: Vec<NewVideoInput>,
}

/// One video in a listing, with the resolved access decision.
#[derive(Debug, Clone, Serialize)]
pub struct VideoWithAccess {
    #[serde(flatten)]
    pub video: Video,
    pub has_access: bool,
    pub is_locked: bool,
    pub lock_reason: Option<LockReason>,
}

/// Entitlement-annotated video listing for one course version.
#[derive(Debug, Clone, Serialize)]
pub struct VideoListing {
    pub course_id: String,
    pub version_number: u32,
    pub videos: Vec<VideoWithAccess>,
    /// Whether an active enrollment exists, independent of archive state.
    /// Lets callers tell "locked: never purchased" apart from "locked:
    /// archived past the grace period".
    pub user_has_purchased: bool,
}

/// Course catalog and enrollment operations.
#[derive(Clone)]
pub struct CatalogService {
    db: FirestoreDb,
}

impl CatalogService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    // ─── Administration ──────────────────────────────────────────

    /// Create a course with its initial version snapshot and videos.
    pub async fn create_course(&self, input: NewCourseInput) -> Result<Course> {
        validate_course_id(&input.course_id)?;
        if input.videos.is_empty() {
            return Err(AppError::Validation(
                "A course needs at least one video".to_string(),
            ));
        }
        if self.db.get_course(&input.course_id).await?.is_some() {
            return Err(AppError::InvalidState(format!(
                "Course {} already exists",
                input.course_id
            )));
        }

        let now = Utc::now();
        let course = Course {
            course_id: input.course_id.clone(),
            title: input.title.clone(),
            description: input.description.clone(),
            price_cents: input.price_cents,
            status: CourseStatus::Active,
            version: 1,
            current_version: 1,
            max_enrollments: input.max_enrollments,
            is_public: input.is_public,
            total_enrollments: 0,
            enrollments: vec![],
            created_at: now,
            updated_at: now,
        };

        let videos = build_videos(&input.course_id, 1, &input.videos)?;
        let snapshot = build_snapshot(&course, 1, input.thumbnail_url, &videos);

        // Videos and snapshot land before the course document so a
        // visible course always has resolvable content.
        self.db.batch_set_videos(&videos).await?;
        self.db.upsert_course_version(&snapshot).await?;
        self.db.upsert_course(&course).await?;

        tracing::info!(course_id = %course.course_id, videos = videos.len(), "Course created");
        Ok(course)
    }

    /// Publish a new immutable version of an existing course.
    ///
    /// Bumps both `version` and `current_version`; existing enrollments
    /// stay pinned to the version they purchased.
    pub async fn publish_version(
        &self,
        course_id: &str,
        input: NewVersionInput,
    ) -> Result<CourseVersion> {
        if input.videos.is_empty() {
            return Err(AppError::Validation(
                "A version needs at least one video".to_string(),
            ));
        }

        let course = self.db.require_course(course_id).await?;
        let next_version = course.version + 1;

        let videos = build_videos(course_id, next_version, &input.videos)?;
        let mut snapshot = build_snapshot(&course, next_version, input.thumbnail_url, &videos);
        if let Some(title) = input.title {
            snapshot.title = title;
        }
        if let Some(description) = input.description {
            snapshot.description = description;
        }

        // Content first, counters second. The transaction rejects a
        // concurrent publish that already claimed this version number.
        self.db.batch_set_videos(&videos).await?;
        self.db.upsert_course_version(&snapshot).await?;

        let now = Utc::now();
        let expected = course.version;
        self.db
            .mutate_course(course_id, |c| {
                if c.version != expected {
                    return Err(AppError::InvalidState(format!(
                        "Course {} was published concurrently",
                        c.course_id
                    )));
                }
                Ok(c.publish_next_version(now))
            })
            .await?;

        tracing::info!(course_id, version = next_version, "Version published");
        Ok(snapshot)
    }

    /// Archive a course with a grace period for enrolled students.
    pub async fn archive_course(
        &self,
        course_id: &str,
        reason: &str,
        grace_period_months: Option<u32>,
    ) -> Result<Course> {
        let months = grace_period_months.unwrap_or(DEFAULT_GRACE_PERIOD_MONTHS);
        let now = Utc::now();
        let (course, _) = self
            .db
            .mutate_course(course_id, |c| c.archive(reason, months, now))
            .await?;

        tracing::info!(course_id, grace_period_months = months, "Course archived");
        Ok(course)
    }

    /// Restore an archived course to active.
    pub async fn unarchive_course(&self, course_id: &str) -> Result<Course> {
        let now = Utc::now();
        let (course, _) = self
            .db
            .mutate_course(course_id, |c| c.unarchive(now))
            .await?;

        tracing::info!(course_id, "Course unarchived");
        Ok(course)
    }

    // ─── Enrollment ──────────────────────────────────────────────

    /// Enroll a user in a course, pinned to its current version.
    ///
    /// The payment collaborator calls this same path when a checkout
    /// completes.
    pub async fn enroll(&self, course_id: &str, user_id: u64) -> Result<EnrollmentRecord> {
        let (_, record) = self.db.enroll_user(course_id, user_id, Utc::now()).await?;
        Ok(record)
    }

    // ─── Listing ─────────────────────────────────────────────────

    /// List one version's videos with per-video entitlement applied.
    ///
    /// Version resolution: enrolled users default to their pinned version,
    /// everyone else to the course's current version. A non-admin may
    /// request an earlier version but never a later one than their pin.
    pub async fn list_videos(
        &self,
        user_id: u64,
        is_admin: bool,
        course_id: &str,
        requested_version: Option<u32>,
    ) -> Result<VideoListing> {
        let course = self.db.require_course(course_id).await?;
        let now = Utc::now();

        let pinned = course
            .active_enrollment(user_id)
            .map(|e| e.version_enrolled)
            .unwrap_or(course.current_version);

        let version_number = match requested_version {
            Some(v) if !is_admin && v > pinned => {
                return Err(AppError::Forbidden(format!(
                    "Version {} of course {} requires re-enrollment",
                    v, course_id
                )));
            }
            Some(v) => v,
            None => pinned,
        };

        let snapshot = self
            .db
            .get_course_version(course_id, version_number)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Version {} of course {} not found",
                    version_number, course_id
                ))
            })?;

        let by_id: HashMap<String, Video> = self
            .db
            .get_videos_for_course(course_id)
            .await?
            .into_iter()
            .map(|v| (v.video_id.clone(), v))
            .collect();

        let ctx = AccessContext::for_course(user_id, is_admin, &course, now);
        let videos: Vec<VideoWithAccess> = snapshot
            .video_ids
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .map(|video| {
                let access = entitlement::resolve(&video, &ctx);
                VideoWithAccess {
                    video,
                    has_access: access.has_access,
                    is_locked: access.is_locked,
                    lock_reason: access.lock_reason,
                }
            })
            .collect();

        Ok(VideoListing {
            course_id: course_id.to_string(),
            version_number,
            videos,
            user_has_purchased: course.active_enrollment(user_id).is_some(),
        })
    }
}

/// Course ids double as Firestore document ids and storage path segments.
fn validate_course_id(course_id: &str) -> Result<()> {
    let valid = !course_id.is_empty()
        && course_id.len() <= 64
        && course_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::Validation(
            "Course id must be a non-empty url-safe slug".to_string(),
        ));
    }
    Ok(())
}

fn build_videos(
    course_id: &str,
    version_number: u32,
    inputs: &[NewVideoInput],
) -> Result<Vec<Video>> {
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            if !input.duration_seconds.is_finite() || input.duration_seconds <= 0.0 {
                return Err(AppError::Validation(format!(
                    "Video '{}' has an invalid duration",
                    input.title
                )));
            }
            let order = i as u32 + 1;
            Ok(Video {
                video_id: format!("{}_v{}_{}", course_id, version_number, order),
                course_id: course_id.to_string(),
                version_number,
                title: input.title.clone(),
                is_free_preview: input.is_free_preview,
                order,
                duration_seconds: input.duration_seconds,
                status: VideoStatus::Active,
            })
        })
        .collect()
}

fn build_snapshot(
    course: &Course,
    version_number: u32,
    thumbnail_url: Option<String>,
    videos: &[Video],
) -> CourseVersion {
    CourseVersion {
        course_id: course.course_id.clone(),
        version_number,
        title: course.title.clone(),
        description: course.description.clone(),
        price_cents: course.price_cents,
        thumbnail_url,
        storage_folder: format!("courses/{}/v{}", course.course_id, version_number),
        video_ids: videos.iter().map(|v| v.video_id.clone()).collect(),
        status: VersionStatus::Active,
    }
}
