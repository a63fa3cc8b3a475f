// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Per-video access decisions.
//!
//! `resolve` is a total, side-effect-free function over already-fetched
//! data. It runs once per video on catalog listings and once per playback
//! or progress request, so it must never touch the database.

use crate::models::{Course, Video};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why a video is locked for this user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    PurchaseRequired,
}

/// Resolved access decision for one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoAccess {
    pub has_access: bool,
    pub is_locked: bool,
    pub lock_reason: Option<LockReason>,
}

impl VideoAccess {
    fn granted() -> Self {
        Self {
            has_access: true,
            is_locked: false,
            lock_reason: None,
        }
    }

    fn locked() -> Self {
        Self {
            has_access: false,
            is_locked: true,
            lock_reason: Some(LockReason::PurchaseRequired),
        }
    }
}

/// Everything the resolver needs to know about the requesting user,
/// relative to one course.
#[derive(Debug, Clone, Copy)]
pub struct AccessContext {
    pub user_id: u64,
    pub is_admin: bool,
    /// Active enrollment exists *and* the course is still accessible
    /// (archive grace period not expired). An enrollment in a course past
    /// its grace period does not count as purchased.
    pub has_purchased: bool,
}

impl AccessContext {
    /// Build the context for a user against a fetched course.
    pub fn for_course(user_id: u64, is_admin: bool, course: &Course, now: DateTime<Utc>) -> Self {
        let has_purchased =
            course.active_enrollment(user_id).is_some() && course.is_accessible_to_enrolled(now);
        Self {
            user_id,
            is_admin,
            has_purchased,
        }
    }
}

/// Decide whether the user may watch this video.
///
/// Precedence: admin, then purchased, then free preview, then locked.
pub fn resolve(video: &Video, ctx: &AccessContext) -> VideoAccess {
    if ctx.is_admin {
        return VideoAccess::granted();
    }
    if ctx.has_purchased {
        return VideoAccess::granted();
    }
    if video.is_free_preview {
        return VideoAccess::granted();
    }
    VideoAccess::locked()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VideoStatus;

    fn make_video(is_free_preview: bool) -> Video {
        Video {
            video_id: "vid-1".to_string(),
            course_id: "rust-101".to_string(),
            version_number: 1,
            title: "Intro".to_string(),
            is_free_preview,
            order: 1,
            duration_seconds: 300.0,
            status: VideoStatus::Active,
        }
    }

    fn ctx(is_admin: bool, has_purchased: bool) -> AccessContext {
        AccessContext {
            user_id: 42,
            is_admin,
            has_purchased,
        }
    }

    #[test]
    fn test_precedence_matrix() {
        // (is_admin, has_purchased, is_free_preview) -> has_access
        let cases = [
            (true, true, true, true),
            (true, true, false, true),
            (true, false, true, true),
            (true, false, false, true),
            (false, true, true, true),
            (false, true, false, true),
            (false, false, true, true),
            (false, false, false, false),
        ];

        for (is_admin, has_purchased, is_free_preview, expected) in cases {
            let access = resolve(&make_video(is_free_preview), &ctx(is_admin, has_purchased));
            assert_eq!(
                access.has_access, expected,
                "admin={} purchased={} preview={}",
                is_admin, has_purchased, is_free_preview
            );
            assert_eq!(access.is_locked, !expected);
        }
    }

    #[test]
    fn test_locked_video_reports_purchase_required() {
        let access = resolve(&make_video(false), &ctx(false, false));
        assert_eq!(access.lock_reason, Some(LockReason::PurchaseRequired));
    }

    #[test]
    fn test_granted_video_has_no_lock_reason() {
        let access = resolve(&make_video(false), &ctx(false, true));
        assert_eq!(access.lock_reason, None);
    }

    #[test]
    fn test_lock_reason_serializes_snake_case() {
        let json = serde_json::to_string(&LockReason::PurchaseRequired).unwrap();
        assert_eq!(json, "\"purchase_required\"");
    }
}
