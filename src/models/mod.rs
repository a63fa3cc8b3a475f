// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Data models for the application.

pub mod course;
pub mod progress;
pub mod version;

pub use course::{
    Course, CourseStatus, EnrollmentIndexEntry, EnrollmentRecord, EnrollmentStatus,
    DEFAULT_GRACE_PERIOD_MONTHS,
};
pub use progress::ProgressRecord;
pub use version::{CourseVersion, VersionStatus, Video, VideoStatus};
