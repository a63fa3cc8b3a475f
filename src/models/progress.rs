// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Per-video watch progress: validation, percentage math, the completion
//! rule, and the high-water-mark merge.
//!
//! The merge here is the single source of truth for what an accepted
//! update does to a stored record. The db layer runs it inside a Firestore
//! transaction, so concurrent writers for the same `(user, video)` pair
//! converge to the higher watched duration instead of clobbering each
//! other, and completion never reverts once reached.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Watched percentage at which a video counts as completed.
pub const COMPLETION_THRESHOLD: u32 = 90;

/// Player-rounding tolerance: watched duration may exceed the total by up
/// to 10% and is clamped; anything beyond is rejected as malformed.
pub const MAX_OVERSHOOT_RATIO: f64 = 1.10;

/// Watch progress for one `(user, video)` pair.
///
/// Document id: `{user_id}_{video_id}` in the `progress` collection.
/// Created on first watch event, mutated on every accepted update, never
/// deleted while the enrollment exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: u64,
    pub course_id: String,
    pub video_id: String,
    /// High-water mark of the playhead, in seconds
    pub watched_duration: f64,
    pub total_duration: f64,
    /// Rounded 0..=100
    pub watched_percentage: u32,
    /// Mirrors `watched_percentage` until the completion threshold, then
    /// saturates to exactly 100
    pub completion_percentage: u32,
    pub is_completed: bool,
    pub last_watched_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Document id in the `progress` collection.
    pub fn doc_id(user_id: u64, video_id: &str) -> String {
        format!("{}_{}", user_id, video_id)
    }
}

/// Resolved completion state for a watched percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub is_completed: bool,
    pub completion_percentage: u32,
}

/// Reject malformed progress input.
///
/// Negative watched duration, non-positive total, or overshoot beyond the
/// 10% tolerance are all `Validation` errors.
pub fn validate_durations(watched: f64, total: f64) -> Result<(), AppError> {
    if !watched.is_finite() || !total.is_finite() {
        return Err(AppError::Validation(
            "Durations must be finite numbers".to_string(),
        ));
    }
    if watched < 0.0 {
        return Err(AppError::Validation(
            "Watched duration cannot be negative".to_string(),
        ));
    }
    if total <= 0.0 {
        return Err(AppError::Validation(
            "Total duration must be positive".to_string(),
        ));
    }
    if watched > total * MAX_OVERSHOOT_RATIO {
        return Err(AppError::Validation(format!(
            "Watched duration {}s exceeds video length {}s by more than 10%",
            watched, total
        )));
    }
    Ok(())
}

/// Rounded watched percentage, clamped to 0..=100.
pub fn calculate_percentage(watched: f64, total: f64) -> u32 {
    let pct = (watched / total * 100.0).round();
    pct.clamp(0.0, 100.0) as u32
}

/// Apply the completion rule to a watched percentage.
///
/// Completion is binary-then-saturating: at or above the threshold the
/// completion percentage is forced to exactly 100, below it the raw
/// percentage passes through.
pub fn determine_completion(watched_percentage: u32) -> Completion {
    if watched_percentage >= COMPLETION_THRESHOLD {
        Completion {
            is_completed: true,
            completion_percentage: 100,
        }
    } else {
        Completion {
            is_completed: false,
            completion_percentage: watched_percentage,
        }
    }
}

/// Merge an accepted update into the stored record (or create one).
///
/// Invariants enforced here:
/// - watched duration never regresses below the stored high-water mark
/// - completion, once true, never reverts and `completion_percentage`
///   never drops below 100
/// - accepted overshoot is clamped so the stored duration never exceeds
///   the total
/// - `last_watched_at` always advances to `now`
pub fn merge_update(
    existing: Option<&ProgressRecord>,
    user_id: u64,
    course_id: &str,
    video_id: &str,
    watched: f64,
    total: f64,
    now: DateTime<Utc>,
) -> Result<ProgressRecord, AppError> {
    validate_durations(watched, total)?;

    let incoming = watched.min(total);
    let high_water = match existing {
        Some(prev) => incoming.max(prev.watched_duration.min(total)),
        None => incoming,
    };

    let watched_percentage = calculate_percentage(high_water, total);
    let mut completion = determine_completion(watched_percentage);

    if let Some(prev) = existing {
        if prev.is_completed {
            completion.is_completed = true;
            completion.completion_percentage = completion.completion_percentage.max(100);
        }
    }

    Ok(ProgressRecord {
        user_id,
        course_id: course_id.to_string(),
        video_id: video_id.to_string(),
        watched_duration: high_water,
        total_duration: total,
        watched_percentage,
        completion_percentage: completion.completion_percentage,
        is_completed: completion.is_completed,
        last_watched_at: now,
    })
}
