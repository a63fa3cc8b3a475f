// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Progress tracking service.
//!
//! Handles the core workflow for a progress heartbeat:
//! 1. Validate the reported durations
//! 2. Check entitlement (progress only accrues for watchable videos)
//! 3. Throttle: frequent heartbeats compute fully but skip the storage write
//! 4. Persist via an atomic conditional upsert
//! 5. Roll the per-video result up into the course completion summary

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::progress::{self, ProgressRecord};
use crate::models::{Course, CourseVersion, Video};
use crate::services::entitlement::{self, AccessContext};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Minimum spacing between storage writes for one `(user, video)` pair.
/// Heartbeats inside the window are accepted but not persisted.
pub const PROGRESS_WRITE_INTERVAL_SECS: i64 = 5;

const MAX_CONCURRENT_COURSE_LOOKUPS: usize = 8;

/// Throttle entries older than this no longer influence throttling or the
/// next merge and are swept, keeping the map bounded by recently active
/// viewers instead of every `(user, video)` pair ever seen.
const THROTTLE_ENTRY_TTL_SECS: i64 = 60;

/// Sweep cadence, counted in persisted writes.
const THROTTLE_SWEEP_EVERY: u64 = 256;

/// Last persisted write plus the newest playhead seen since, per
/// `(user_id, video_id)`. Shared across handlers within this instance.
struct ThrottleEntry {
    last_persisted_at: DateTime<Utc>,
    latest_watched: f64,
}

/// Course-level completion rollup.
///
/// Defined over the count of completed videos, not the average of raw
/// percentages, so "all videos completed" is always exactly 100.
#[derive(Debug, Clone, Serialize)]
pub struct CourseProgressSummary {
    pub course_id: String,
    pub total_videos: u32,
    pub completed_videos: u32,
    pub progress_percentage: u32,
}

/// Per-video entry in a course progress report. Videos never watched
/// report zero percent.
#[derive(Debug, Clone, Serialize)]
pub struct VideoProgressEntry {
    pub video_id: String,
    pub title: String,
    pub order: u32,
    pub watched_percentage: u32,
    pub completion_percentage: u32,
    pub is_completed: bool,
}

/// Full course progress report for one user.
#[derive(Debug, Clone, Serialize)]
pub struct CourseProgress {
    pub videos: Vec<VideoProgressEntry>,
    pub overall: CourseProgressSummary,
}

/// Result of one progress update.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdateOutcome {
    pub video_progress: ProgressRecord,
    pub course_progress: CourseProgressSummary,
    /// True when the write was elided by the heartbeat throttle. Still a
    /// success, distinguishable from a rejected update.
    pub skipped: bool,
}

/// One course line on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardCourse {
    pub course_id: String,
    pub title: String,
    pub progress: u32,
    pub completed_lessons: u32,
    pub total_lessons: u32,
}

/// Roll per-video records up into the course summary.
///
/// `video_ids` is the enrolled version's ordered lesson list; records are
/// keyed by video id and may be missing for unwatched videos.
pub fn aggregate_course_progress(
    course_id: &str,
    video_ids: &[String],
    records: &HashMap<String, ProgressRecord>,
) -> CourseProgressSummary {
    let total_videos = video_ids.len() as u32;
    let completed_videos = video_ids
        .iter()
        .filter(|id| records.get(*id).is_some_and(|r| r.is_completed))
        .count() as u32;

    let progress_percentage = if total_videos == 0 {
        0
    } else {
        (completed_videos as f64 / total_videos as f64 * 100.0).round() as u32
    };

    CourseProgressSummary {
        course_id: course_id.to_string(),
        total_videos,
        completed_videos,
        progress_percentage,
    }
}

/// Tracks per-video watch progress and derives course completion.
#[derive(Clone)]
pub struct ProgressService {
    db: FirestoreDb,
    recent_writes: Arc<DashMap<(u64, String), ThrottleEntry>>,
    writes_since_sweep: Arc<AtomicU64>,
}

impl ProgressService {
    pub fn new(db: FirestoreDb) -> Self {
        Self {
            db,
            recent_writes: Arc::new(DashMap::new()),
            writes_since_sweep: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a watch-progress heartbeat.
    pub async fn update_progress(
        &self,
        user_id: u64,
        is_admin: bool,
        course_id: &str,
        video_id: &str,
        watched_duration: f64,
        total_duration: f64,
    ) -> Result<ProgressUpdateOutcome> {
        progress::validate_durations(watched_duration, total_duration)?;

        let course = self.db.require_course(course_id).await?;
        let video = self
            .db
            .get_video(video_id)
            .await?
            .filter(|v| v.course_id == course_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Video {} not found in course {}", video_id, course_id))
            })?;

        let now = Utc::now();
        self.check_watchable(user_id, is_admin, &course, &video, now)?;

        let key = (user_id, video_id.to_string());

        // Fold in any newer playhead observed while writes were throttled,
        // then clamp: validation already allowed up to 10% overshoot.
        let effective_watched = self
            .recent_writes
            .get(&key)
            .map(|e| watched_duration.max(e.latest_watched))
            .unwrap_or(watched_duration)
            .min(total_duration);

        let within_window = self.recent_writes.get(&key).is_some_and(|e| {
            now.signed_duration_since(e.last_persisted_at)
                < Duration::seconds(PROGRESS_WRITE_INTERVAL_SECS)
        });

        let (video_progress, skipped) = if within_window {
            // Computation still happens; only the storage write is a no-op.
            let existing = self.db.get_progress(user_id, video_id).await?;
            let merged = progress::merge_update(
                existing.as_ref(),
                user_id,
                course_id,
                video_id,
                effective_watched,
                total_duration,
                now,
            )?;

            if let Some(mut entry) = self.recent_writes.get_mut(&key) {
                entry.latest_watched = entry.latest_watched.max(effective_watched);
            }

            tracing::debug!(user_id, video_id, "Progress write throttled (skipped)");
            (merged, true)
        } else {
            let merged = self
                .db
                .upsert_progress(
                    user_id,
                    course_id,
                    video_id,
                    effective_watched,
                    total_duration,
                    now,
                )
                .await?;

            self.recent_writes.insert(
                key,
                ThrottleEntry {
                    last_persisted_at: now,
                    latest_watched: merged.watched_duration,
                },
            );

            if self.writes_since_sweep.fetch_add(1, Ordering::Relaxed) + 1 >= THROTTLE_SWEEP_EVERY {
                self.writes_since_sweep.store(0, Ordering::Relaxed);
                self.prune_stale(now);
            }
            (merged, false)
        };

        let course_progress = self
            .course_summary(user_id, &course, Some(&video_progress))
            .await?;

        Ok(ProgressUpdateOutcome {
            video_progress,
            course_progress,
            skipped,
        })
    }

    /// Full per-video progress report for the user's enrolled version.
    pub async fn get_course_progress(&self, user_id: u64, course_id: &str) -> Result<CourseProgress> {
        let course = self.db.require_course(course_id).await?;
        let now = Utc::now();

        if course.active_enrollment(user_id).is_some() && !course.is_accessible_to_enrolled(now) {
            return Err(AppError::NotAvailable(
                "Course is no longer accessible".to_string(),
            ));
        }

        let version = self.enrolled_version(user_id, &course).await?;
        let videos: HashMap<String, Video> = self
            .db
            .get_videos_for_course(course_id)
            .await?
            .into_iter()
            .map(|v| (v.video_id.clone(), v))
            .collect();
        let records = self.progress_by_video(user_id, course_id, None).await?;

        let entries: Vec<VideoProgressEntry> = version
            .video_ids
            .iter()
            .filter_map(|id| videos.get(id))
            .map(|video| {
                let record = records.get(&video.video_id);
                VideoProgressEntry {
                    video_id: video.video_id.clone(),
                    title: video.title.clone(),
                    order: video.order,
                    watched_percentage: record.map_or(0, |r| r.watched_percentage),
                    completion_percentage: record.map_or(0, |r| r.completion_percentage),
                    is_completed: record.is_some_and(|r| r.is_completed),
                }
            })
            .collect();

        let overall = aggregate_course_progress(course_id, &version.video_ids, &records);

        Ok(CourseProgress {
            videos: entries,
            overall,
        })
    }

    /// Dashboard rollup across all of the user's enrollments.
    ///
    /// Reuses the per-course aggregate; completion is never recomputed
    /// with a different formula here.
    pub async fn get_dashboard_progress(&self, user_id: u64) -> Result<Vec<DashboardCourse>> {
        let enrollments = self.db.get_enrollments_for_user(user_id).await?;

        let mut courses: Vec<DashboardCourse> = stream::iter(enrollments)
            .map(|enrollment| {
                let service = self.clone();
                async move {
                    let course = match service.db.get_course(&enrollment.course_id).await? {
                        Some(course) => course,
                        // Course deleted out from under the index entry
                        None => return Ok::<_, AppError>(None),
                    };
                    let summary = service.course_summary(user_id, &course, None).await?;
                    Ok(Some(DashboardCourse {
                        course_id: course.course_id.clone(),
                        title: course.title.clone(),
                        progress: summary.progress_percentage,
                        completed_lessons: summary.completed_videos,
                        total_lessons: summary.total_videos,
                    }))
                }
            })
            .buffer_unordered(MAX_CONCURRENT_COURSE_LOOKUPS)
            .collect::<Vec<Result<Option<DashboardCourse>>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<DashboardCourse>>>>()?
            .into_iter()
            .flatten()
            .collect();

        courses.sort_by(|a, b| a.course_id.cmp(&b.course_id));
        Ok(courses)
    }

    // ─── Internals ───────────────────────────────────────────────

    /// Drop throttle entries whose last persisted write is older than the
    /// TTL. Anything that old cannot elide a write anymore, and its cached
    /// playhead has either been persisted or abandoned.
    fn prune_stale(&self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(THROTTLE_ENTRY_TTL_SECS);
        self.recent_writes
            .retain(|_, entry| entry.last_persisted_at > cutoff);
    }

    /// Progress may only advance for videos the user may watch.
    fn check_watchable(
        &self,
        user_id: u64,
        is_admin: bool,
        course: &Course,
        video: &Video,
        now: DateTime<Utc>,
    ) -> Result<()> {
        // An enrollment in a course archived past its grace period is not
        // a purchase-state problem; surface it as such.
        if course.active_enrollment(user_id).is_some() && !course.is_accessible_to_enrolled(now) {
            return Err(AppError::NotAvailable(
                "Course is no longer accessible".to_string(),
            ));
        }

        let ctx = AccessContext::for_course(user_id, is_admin, course, now);
        let access = entitlement::resolve(video, &ctx);
        if !access.has_access {
            return Err(AppError::Forbidden(format!(
                "Video {} requires purchase",
                video.video_id
            )));
        }
        Ok(())
    }

    /// The version whose videos count for this user: the pinned enrolled
    /// version, or the current version for admins and preview browsing.
    async fn enrolled_version(&self, user_id: u64, course: &Course) -> Result<CourseVersion> {
        let version_number = course
            .active_enrollment(user_id)
            .map(|e| e.version_enrolled)
            .unwrap_or(course.current_version);

        self.db
            .get_course_version(&course.course_id, version_number)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Version {} of course {} not found",
                    version_number, course.course_id
                ))
            })
    }

    async fn progress_by_video(
        &self,
        user_id: u64,
        course_id: &str,
        overlay: Option<&ProgressRecord>,
    ) -> Result<HashMap<String, ProgressRecord>> {
        let mut records: HashMap<String, ProgressRecord> = self
            .db
            .get_progress_for_course(user_id, course_id)
            .await?
            .into_iter()
            .map(|r| (r.video_id.clone(), r))
            .collect();

        // A just-computed (possibly throttled, unpersisted) record takes
        // precedence over what the query returned.
        if let Some(record) = overlay {
            records.insert(record.video_id.clone(), record.clone());
        }

        Ok(records)
    }

    async fn course_summary(
        &self,
        user_id: u64,
        course: &Course,
        overlay: Option<&ProgressRecord>,
    ) -> Result<CourseProgressSummary> {
        let version = self.enrolled_version(user_id, course).await?;
        let records = self
            .progress_by_video(user_id, &course.course_id, overlay)
            .await?;
        Ok(aggregate_course_progress(
            &course.course_id,
            &version.video_ids,
            &records,
        ))
    }
}
