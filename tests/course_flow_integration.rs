// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! End-to-end course lifecycle against the Firestore emulator:
//! create → enroll → watch → complete → aggregate → dashboard.

use coursetrack::services::catalog::{NewCourseInput, NewVideoInput};
use coursetrack::services::{CatalogService, ProgressService};

mod common;
use common::test_db;

fn course_input(course_id: &str, videos: usize) -> NewCourseInput {
    NewCourseInput {
        course_id: course_id.to_string(),
        title: "Integration Course".to_string(),
        description: "Testing end to end".to_string(),
        price_cents: 1900,
        max_enrollments: None,
        is_public: true,
        thumbnail_url: None,
        videos: (0..videos)
            .map(|i| NewVideoInput {
                title: format!("Lesson {}", i + 1),
                duration_seconds: 100.0,
                is_free_preview: i == 0,
            })
            .collect(),
    }
}

#[tokio::test]
async fn test_full_course_flow() {
    require_emulator!();

    let db = test_db().await;
    let catalog = CatalogService::new(db.clone());
    let progress = ProgressService::new(db.clone());
    let user_id = 555001;
    let course_id = "flow-course";

    let course = catalog
        .create_course(course_input(course_id, 3))
        .await
        .expect("Course creation failed");
    assert_eq!(course.version, 1);

    // Before enrollment: only the free preview is watchable.
    let listing = catalog
        .list_videos(user_id, false, course_id, None)
        .await
        .expect("Listing failed");
    assert!(!listing.user_has_purchased);
    assert_eq!(listing.videos.len(), 3);
    assert!(listing.videos[0].has_access); // free preview
    assert!(listing.videos[1].is_locked);
    assert!(listing.videos[2].is_locked);

    // Progress on a locked video is forbidden.
    let err = progress
        .update_progress(user_id, false, course_id, "flow-course_v1_2", 10.0, 100.0)
        .await
        .unwrap_err();
    assert!(matches!(err, coursetrack::error::AppError::Forbidden(_)));

    // Enroll, then everything unlocks.
    let enrollment = catalog.enroll(course_id, user_id).await.expect("Enroll failed");
    assert_eq!(enrollment.version_enrolled, 1);

    let err = catalog.enroll(course_id, user_id).await.unwrap_err();
    assert!(matches!(
        err,
        coursetrack::error::AppError::DuplicateEnrollment(_)
    ));

    let listing = catalog
        .list_videos(user_id, false, course_id, None)
        .await
        .expect("Listing failed");
    assert!(listing.user_has_purchased);
    assert!(listing.videos.iter().all(|v| v.has_access));

    // Complete two of three videos, leave one at 40%.
    for video_id in ["flow-course_v1_1", "flow-course_v1_2"] {
        let outcome = progress
            .update_progress(user_id, false, course_id, video_id, 95.0, 100.0)
            .await
            .expect("Progress update failed");
        assert!(outcome.video_progress.is_completed);
        assert!(!outcome.skipped);
    }
    let outcome = progress
        .update_progress(user_id, false, course_id, "flow-course_v1_3", 40.0, 100.0)
        .await
        .expect("Progress update failed");
    assert!(!outcome.video_progress.is_completed);

    // Scenario C: 2 of 3 completed -> 67%.
    assert_eq!(outcome.course_progress.completed_videos, 2);
    assert_eq!(outcome.course_progress.progress_percentage, 67);

    let report = progress
        .get_course_progress(user_id, course_id)
        .await
        .expect("Course progress failed");
    assert_eq!(report.videos.len(), 3);
    assert_eq!(report.overall.progress_percentage, 67);

    // Dashboard reuses the same rollup.
    let dashboard = progress
        .get_dashboard_progress(user_id)
        .await
        .expect("Dashboard failed");
    let entry = dashboard
        .iter()
        .find(|c| c.course_id == course_id)
        .expect("Dashboard missing course");
    assert_eq!(entry.progress, 67);
    assert_eq!(entry.completed_lessons, 2);
    assert_eq!(entry.total_lessons, 3);
}

#[tokio::test]
async fn test_heartbeat_throttling() {
    require_emulator!();

    let db = test_db().await;
    let catalog = CatalogService::new(db.clone());
    let progress = ProgressService::new(db.clone());
    let user_id = 555002;
    let course_id = "throttle-course";

    catalog
        .create_course(course_input(course_id, 1))
        .await
        .expect("Course creation failed");
    catalog.enroll(course_id, user_id).await.expect("Enroll failed");

    let video_id = "throttle-course_v1_1";

    let first = progress
        .update_progress(user_id, false, course_id, video_id, 10.0, 100.0)
        .await
        .expect("First update failed");
    assert!(!first.skipped);

    // Immediately after: accepted for computation, write elided.
    let second = progress
        .update_progress(user_id, false, course_id, video_id, 20.0, 100.0)
        .await
        .expect("Second update failed");
    assert!(second.skipped);
    assert_eq!(second.video_progress.watched_percentage, 20);

    // Stored state still reflects only the persisted write.
    let stored = db
        .get_progress(user_id, video_id)
        .await
        .expect("Fetch failed")
        .expect("Record missing");
    assert_eq!(stored.watched_duration, 10.0);
}

#[tokio::test]
async fn test_enrollment_capacity_and_version_pinning() {
    require_emulator!();

    let db = test_db().await;
    let catalog = CatalogService::new(db.clone());
    let course_id = "capacity-course";

    let mut input = course_input(course_id, 1);
    input.max_enrollments = Some(1);
    catalog.create_course(input).await.expect("Course creation failed");

    catalog.enroll(course_id, 555003).await.expect("Enroll failed");
    let err = catalog.enroll(course_id, 555004).await.unwrap_err();
    assert!(matches!(err, coursetrack::error::AppError::Capacity(_)));

    // Publish version 2; the enrolled student stays pinned to version 1.
    let version = catalog
        .publish_version(
            course_id,
            coursetrack::services::catalog::NewVersionInput {
                title: None,
                description: None,
                thumbnail_url: None,
                videos: vec![
                    NewVideoInput {
                        title: "Lesson 1 (revised)".to_string(),
                        duration_seconds: 120.0,
                        is_free_preview: true,
                    },
                    NewVideoInput {
                        title: "Lesson 2 (new)".to_string(),
                        duration_seconds: 180.0,
                        is_free_preview: false,
                    },
                ],
            },
        )
        .await
        .expect("Publish failed");
    assert_eq!(version.version_number, 2);

    let listing = catalog
        .list_videos(555003, false, course_id, None)
        .await
        .expect("Listing failed");
    assert_eq!(listing.version_number, 1);
    assert_eq!(listing.videos.len(), 1);

    // Requesting the newer version without re-enrolling is refused.
    let err = catalog
        .list_videos(555003, false, course_id, Some(2))
        .await
        .unwrap_err();
    assert!(matches!(err, coursetrack::error::AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_archive_past_grace_blocks_enrolled_access() {
    require_emulator!();

    let db = test_db().await;
    let catalog = CatalogService::new(db.clone());
    let progress = ProgressService::new(db.clone());
    let user_id = 555007;
    let course_id = "expired-course";
    let video_id = "expired-course_v1_1";

    catalog
        .create_course(course_input(course_id, 1))
        .await
        .expect("Course creation failed");
    catalog.enroll(course_id, user_id).await.expect("Enroll failed");

    progress
        .update_progress(user_id, false, course_id, video_id, 30.0, 100.0)
        .await
        .expect("Progress update failed");

    // A zero-month grace period expires immediately.
    catalog
        .archive_course(course_id, "retired", Some(0))
        .await
        .expect("Archive failed");

    // The enrollment still exists, but access has lapsed: this is
    // "course no longer accessible", not a purchase problem.
    let err = progress
        .update_progress(user_id, false, course_id, video_id, 50.0, 100.0)
        .await
        .unwrap_err();
    assert!(matches!(err, coursetrack::error::AppError::NotAvailable(_)));

    let err = progress
        .get_course_progress(user_id, course_id)
        .await
        .unwrap_err();
    assert!(matches!(err, coursetrack::error::AppError::NotAvailable(_)));
}

#[tokio::test]
async fn test_archive_lifecycle_via_service() {
    require_emulator!();

    let db = test_db().await;
    let catalog = CatalogService::new(db.clone());
    let course_id = "archive-course";

    catalog
        .create_course(course_input(course_id, 1))
        .await
        .expect("Course creation failed");
    catalog.enroll(course_id, 555005).await.expect("Enroll failed");

    let archived = catalog
        .archive_course(course_id, "superseded", None)
        .await
        .expect("Archive failed");
    assert!(archived.status.is_archived());

    // Enrolling in an archived course is refused.
    let err = catalog.enroll(course_id, 555006).await.unwrap_err();
    assert!(matches!(err, coursetrack::error::AppError::NotAvailable(_)));

    // Archiving again is an invalid transition.
    let err = catalog
        .archive_course(course_id, "again", None)
        .await
        .unwrap_err();
    assert!(matches!(err, coursetrack::error::AppError::InvalidState(_)));

    let restored = catalog
        .unarchive_course(course_id)
        .await
        .expect("Unarchive failed");
    assert!(!restored.status.is_archived());
}
