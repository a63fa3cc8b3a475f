// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Course version snapshots and video records.

use serde::{Deserialize, Serialize};

/// Status of a published course version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Active,
    Archived,
}

/// Immutable content snapshot for one version of a course.
///
/// `(course_id, version_number)` is unique; content updates publish a new
/// version rather than mutating history. Only metadata corrections may
/// touch an existing snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseVersion {
    pub course_id: String,
    pub version_number: u32,
    /// Title/description/price as they were when this version shipped
    pub title: String,
    pub description: String,
    pub price_cents: u32,
    pub thumbnail_url: Option<String>,
    /// Object-storage prefix for this version's assets
    pub storage_folder: String,
    /// Ordered video ids (the authority for lesson ordering)
    pub video_ids: Vec<String>,
    pub status: VersionStatus,
}

impl CourseVersion {
    /// Document id in the `course_versions` collection.
    pub fn doc_id(course_id: &str, version_number: u32) -> String {
        format!("{}_v{}", course_id, version_number)
    }
}

/// Processing status of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Active,
    Processing,
    Error,
    Archived,
}

/// Video record, stamped with the course version it was uploaded into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    /// Document id
    pub video_id: String,
    pub course_id: String,
    /// Version this video was uploaded into
    pub version_number: u32,
    pub title: String,
    /// Anyone may watch a free preview, purchased or not
    pub is_free_preview: bool,
    /// 1-based position within its version
    pub order: u32,
    pub duration_seconds: f64,
    pub status: VideoStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_doc_id() {
        assert_eq!(CourseVersion::doc_id("rust-101", 3), "rust-101_v3");
    }

    #[test]
    fn test_video_status_serde() {
        let json = serde_json::to_string(&VideoStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
