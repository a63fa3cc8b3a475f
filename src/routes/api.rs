// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! API routes for authenticated users.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::EnrollmentRecord;
use crate::services::catalog::VideoListing;
use crate::services::progress::{CourseProgress, DashboardCourse, ProgressUpdateOutcome};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/courses/{course_id}/videos", get(list_course_videos))
        .route("/api/courses/{course_id}/enroll", post(enroll))
        .route("/api/courses/{course_id}/progress", get(get_course_progress))
        .route("/api/progress", post(update_progress))
        .route("/api/dashboard/progress", get(get_dashboard_progress))
}

// ─── Video Listing ───────────────────────────────────────────

#[derive(Deserialize)]
struct ListVideosQuery {
    /// Explicit version; defaults to the user's pinned/current version
    version: Option<u32>,
}

/// List one course version's videos with per-video access decisions.
async fn list_course_videos(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
    Query(params): Query<ListVideosQuery>,
) -> Result<Json<VideoListing>> {
    tracing::debug!(
        user_id = user.user_id,
        course_id = %course_id,
        version = ?params.version,
        "Listing course videos"
    );

    let listing = state
        .catalog
        .list_videos(user.user_id, user.is_admin(), &course_id, params.version)
        .await?;

    Ok(Json(listing))
}

// ─── Enrollment ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct EnrollResponse {
    pub course_id: String,
    pub enrollment: EnrollmentRecord,
}

/// Enroll the current user in a course.
///
/// The payment webhook collaborator lands on this same service path once
/// a checkout completes.
async fn enroll(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<Json<EnrollResponse>> {
    let enrollment = state.catalog.enroll(&course_id, user.user_id).await?;

    Ok(Json(EnrollResponse {
        course_id,
        enrollment,
    }))
}

// ─── Progress ────────────────────────────────────────────────

#[derive(Deserialize)]
struct UpdateProgressRequest {
    course_id: String,
    video_id: String,
    watched_duration: f64,
    total_duration: f64,
}

/// Record a watch-progress heartbeat.
///
/// Throttled heartbeats succeed with `skipped: true`; they are not errors.
async fn update_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateProgressRequest>,
) -> Result<Json<ProgressUpdateOutcome>> {
    let outcome = state
        .progress
        .update_progress(
            user.user_id,
            user.is_admin(),
            &req.course_id,
            &req.video_id,
            req.watched_duration,
            req.total_duration,
        )
        .await?;

    Ok(Json(outcome))
}

/// Per-video progress for the user's enrolled version of a course.
async fn get_course_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseProgress>> {
    let progress = state
        .progress
        .get_course_progress(user.user_id, &course_id)
        .await?;

    Ok(Json(progress))
}

// ─── Dashboard ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct DashboardResponse {
    pub courses: Vec<DashboardCourse>,
}

/// Completion summary across all of the user's enrollments.
async fn get_dashboard_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DashboardResponse>> {
    let courses = state.progress.get_dashboard_progress(user.user_id).await?;
    Ok(Json(DashboardResponse { courses }))
}
