// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const COURSES: &str = "courses";
    /// Immutable version snapshots (keyed by `{course_id}_v{n}`)
    pub const COURSE_VERSIONS: &str = "course_versions";
    pub const VIDEOS: &str = "videos";
    /// Watch progress (keyed by `{user_id}_{video_id}`)
    pub const PROGRESS: &str = "progress";
    /// Per-user enrollment join records (keyed by `{user_id}_{course_id}`)
    pub const ENROLLMENT_INDEX: &str = "enrollment_index";
}
