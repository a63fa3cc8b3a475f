// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Admin routes for catalog administration and the archive lifecycle.

use crate::error::Result;
use crate::models::{Course, CourseVersion};
use crate::services::catalog::{NewCourseInput, NewVersionInput};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Admin routes. Layered with `require_auth` + `require_admin` in
/// routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/courses", post(create_course))
        .route("/api/admin/courses/{course_id}/versions", post(publish_version))
        .route("/api/admin/courses/{course_id}/archive", post(archive_course))
        .route(
            "/api/admin/courses/{course_id}/unarchive",
            post(unarchive_course),
        )
}

/// Create a course with its initial version and videos.
async fn create_course(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewCourseInput>,
) -> Result<Json<Course>> {
    let course = state.catalog.create_course(input).await?;
    Ok(Json(course))
}

/// Publish a new immutable version of a course.
async fn publish_version(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
    Json(input): Json<NewVersionInput>,
) -> Result<Json<CourseVersion>> {
    let version = state.catalog.publish_version(&course_id, input).await?;
    Ok(Json(version))
}

#[derive(Deserialize)]
struct ArchiveRequest {
    reason: String,
    /// Defaults to six months
    grace_period_months: Option<u32>,
}

/// Archive a course, leaving enrolled students a grace period.
async fn archive_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
    Json(req): Json<ArchiveRequest>,
) -> Result<Json<Course>> {
    let course = state
        .catalog
        .archive_course(&course_id, &req.reason, req.grace_period_months)
        .await?;
    Ok(Json(course))
}

/// Restore an archived course to active.
async fn unarchive_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<Json<Course>> {
    let course = state.catalog.unarchive_course(&course_id).await?;
    Ok(Json(course))
}
