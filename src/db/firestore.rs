// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Courses (catalog documents with embedded enrollments)
//! - Course versions (immutable content snapshots)
//! - Videos
//! - Progress records (conditional high-water-mark upserts)
//! - Enrollment index (join collection for dashboard queries)
//!
//! Anything that checks-then-writes a shared document (enrollment,
//! progress) runs inside a Firestore transaction; there is no
//! application-level read-modify-write outside one.

use crate::db::collections;
use crate::error::AppError;
use crate::models::progress::merge_update;
use crate::models::{Course, CourseVersion, EnrollmentIndexEntry, EnrollmentRecord, ProgressRecord, Video};
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;
const MAX_TXN_ATTEMPTS: usize = 5;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing
        // a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Clone of the client whose reads carry the transaction's consistency
    /// selector. A plain fluent select does not join the transaction:
    /// reads must go through this clone or the commit has an empty read
    /// set and conflicting concurrent writes are applied blindly.
    fn transaction_reader(
        client: &firestore::FirestoreDb,
        transaction: &firestore::FirestoreTransaction<'_>,
    ) -> firestore::FirestoreDb {
        client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        )
    }

    // ─── Course Operations ───────────────────────────────────────

    async fn read_course(
        db: &firestore::FirestoreDb,
        course_id: &str,
    ) -> Result<Option<Course>, AppError> {
        db.fluent()
            .select()
            .by_id_in(collections::COURSES)
            .obj()
            .one(course_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a course by its id.
    pub async fn get_course(&self, course_id: &str) -> Result<Option<Course>, AppError> {
        Self::read_course(self.get_client()?, course_id).await
    }

    /// Get a course, failing with NotFound if it does not exist.
    pub async fn require_course(&self, course_id: &str) -> Result<Course, AppError> {
        self.get_course(course_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Course {} not found", course_id)))
    }

    /// Create or update a course document.
    pub async fn upsert_course(&self, course: &Course) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COURSES)
            .document_id(&course.course_id)
            .object(course)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Apply a mutation to a course inside a transaction.
    ///
    /// The course document embeds the enrollment ledger, so any
    /// check-then-write (archive, unarchive, enrollment bookkeeping) must
    /// go through here rather than a plain read + upsert, which could
    /// clobber a concurrent enrollment.
    pub async fn mutate_course<R, F>(&self, course_id: &str, mutate: F) -> Result<(Course, R), AppError>
    where
        F: Fn(&mut Course) -> Result<R, AppError>,
    {
        let client = self.get_client()?;
        let mut last_err = None;

        for _ in 0..MAX_TXN_ATTEMPTS {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            let reader = Self::transaction_reader(client, &transaction);
            let mut course = match Self::read_course(&reader, course_id).await {
                Ok(Some(course)) => course,
                Ok(None) => {
                    let _ = transaction.rollback().await;
                    return Err(AppError::NotFound(format!("Course {} not found", course_id)));
                }
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            let outcome = match mutate(&mut course) {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Domain rejection, nothing to write
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            client
                .fluent()
                .update()
                .in_col(collections::COURSES)
                .document_id(&course.course_id)
                .object(&course)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add course to transaction: {}", e))
                })?;

            match transaction.commit().await {
                Ok(_) => return Ok((course, outcome)),
                Err(e) if is_retryable(&e) => last_err = Some(e),
                Err(e) => {
                    return Err(AppError::Database(format!("Transaction commit failed: {}", e)))
                }
            }
        }

        Err(txn_attempts_exhausted(last_err))
    }

    // ─── Enrollment Operations ───────────────────────────────────

    /// Atomically enroll a user in a course.
    ///
    /// Runs the capacity/duplicate checks and both writes (embedded record
    /// plus the `enrollment_index` join document) in one transaction, so
    /// two concurrent enrollments cannot both pass the checks.
    pub async fn enroll_user(
        &self,
        course_id: &str,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> Result<(Course, EnrollmentRecord), AppError> {
        let client = self.get_client()?;
        let mut last_err = None;

        for _ in 0..MAX_TXN_ATTEMPTS {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            let reader = Self::transaction_reader(client, &transaction);
            let mut course = match Self::read_course(&reader, course_id).await {
                Ok(Some(course)) => course,
                Ok(None) => {
                    let _ = transaction.rollback().await;
                    return Err(AppError::NotFound(format!("Course {} not found", course_id)));
                }
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            let record = match course.enroll(user_id, now) {
                Ok(record) => record,
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            client
                .fluent()
                .update()
                .in_col(collections::COURSES)
                .document_id(&course.course_id)
                .object(&course)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add course to transaction: {}", e))
                })?;

            let index_entry = EnrollmentIndexEntry {
                user_id,
                course_id: course_id.to_string(),
                version_enrolled: record.version_enrolled,
                status: record.status,
                enrolled_at: record.enrolled_at,
            };
            client
                .fluent()
                .update()
                .in_col(collections::ENROLLMENT_INDEX)
                .document_id(EnrollmentIndexEntry::doc_id(user_id, course_id))
                .object(&index_entry)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!(
                        "Failed to add enrollment index to transaction: {}",
                        e
                    ))
                })?;

            match transaction.commit().await {
                Ok(_) => {
                    tracing::info!(
                        user_id,
                        course_id,
                        version = record.version_enrolled,
                        "User enrolled"
                    );
                    return Ok((course, record));
                }
                Err(e) if is_retryable(&e) => last_err = Some(e),
                Err(e) => {
                    return Err(AppError::Database(format!("Transaction commit failed: {}", e)))
                }
            }
        }

        Err(txn_attempts_exhausted(last_err))
    }

    /// Get all enrollment index entries for a user.
    pub async fn get_enrollments_for_user(
        &self,
        user_id: u64,
    ) -> Result<Vec<EnrollmentIndexEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ENROLLMENT_INDEX)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Course Version Operations ───────────────────────────────

    /// Get a version snapshot for a course.
    pub async fn get_course_version(
        &self,
        course_id: &str,
        version_number: u32,
    ) -> Result<Option<CourseVersion>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::COURSE_VERSIONS)
            .obj()
            .one(CourseVersion::doc_id(course_id, version_number))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a version snapshot.
    pub async fn upsert_course_version(&self, version: &CourseVersion) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::COURSE_VERSIONS)
            .document_id(CourseVersion::doc_id(&version.course_id, version.version_number))
            .object(version)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Video Operations ────────────────────────────────────────

    /// Get a video by id.
    pub async fn get_video(&self, video_id: &str) -> Result<Option<Video>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::VIDEOS)
            .obj()
            .one(video_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all videos for a course, across versions.
    ///
    /// The caller orders and filters by the version's `video_ids` list,
    /// which is the ordering authority.
    pub async fn get_videos_for_course(&self, course_id: &str) -> Result<Vec<Video>, AppError> {
        let course_id = course_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::VIDEOS)
            .filter(move |q| q.for_all([q.field("course_id").eq(course_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store multiple video records.
    ///
    /// Uses concurrent writes with a limit to avoid overloading Firestore.
    pub async fn batch_set_videos(&self, videos: &[Video]) -> Result<(), AppError> {
        let client = self.get_client()?;

        stream::iter(videos.to_vec())
            .map(|video| async move {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::VIDEOS)
                    .document_id(&video.video_id)
                    .object(&video)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(())
    }

    // ─── Progress Operations ─────────────────────────────────────

    async fn read_progress(
        db: &firestore::FirestoreDb,
        user_id: u64,
        video_id: &str,
    ) -> Result<Option<ProgressRecord>, AppError> {
        db.fluent()
            .select()
            .by_id_in(collections::PROGRESS)
            .obj()
            .one(ProgressRecord::doc_id(user_id, video_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the progress record for one `(user, video)` pair.
    pub async fn get_progress(
        &self,
        user_id: u64,
        video_id: &str,
    ) -> Result<Option<ProgressRecord>, AppError> {
        Self::read_progress(self.get_client()?, user_id, video_id).await
    }

    /// Get all of a user's progress records for one course.
    pub async fn get_progress_for_course(
        &self,
        user_id: u64,
        course_id: &str,
    ) -> Result<Vec<ProgressRecord>, AppError> {
        let course_id = course_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PROGRESS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    q.field("course_id").eq(course_id.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically upsert a progress record with high-water-mark semantics.
    ///
    /// Reads the stored record and applies `merge_update` inside one
    /// Firestore transaction, so two concurrent updates for the same video
    /// converge to the higher watched duration and completion never
    /// reverts. If another request commits first the transaction aborts
    /// and is retried against the fresh record, rather than losing the
    /// earlier write.
    ///
    /// Returns the merged record as persisted.
    pub async fn upsert_progress(
        &self,
        user_id: u64,
        course_id: &str,
        video_id: &str,
        watched_duration: f64,
        total_duration: f64,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, AppError> {
        let client = self.get_client()?;
        let mut last_err = None;

        for _ in 0..MAX_TXN_ATTEMPTS {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            // Read through the transaction so the record joins its read
            // set; a concurrent commit on the same document then aborts
            // this commit instead of being overwritten.
            let reader = Self::transaction_reader(client, &transaction);
            let existing = match Self::read_progress(&reader, user_id, video_id).await {
                Ok(existing) => existing,
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            let merged = match merge_update(
                existing.as_ref(),
                user_id,
                course_id,
                video_id,
                watched_duration,
                total_duration,
                now,
            ) {
                Ok(merged) => merged,
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            client
                .fluent()
                .update()
                .in_col(collections::PROGRESS)
                .document_id(ProgressRecord::doc_id(user_id, video_id))
                .object(&merged)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add progress to transaction: {}", e))
                })?;

            match transaction.commit().await {
                Ok(_) => {
                    tracing::debug!(
                        user_id,
                        video_id,
                        watched = merged.watched_duration,
                        percentage = merged.watched_percentage,
                        completed = merged.is_completed,
                        "Progress persisted"
                    );
                    return Ok(merged);
                }
                Err(e) if is_retryable(&e) => last_err = Some(e),
                Err(e) => {
                    return Err(AppError::Database(format!("Transaction commit failed: {}", e)))
                }
            }
        }

        Err(txn_attempts_exhausted(last_err))
    }
}

/// Whether a failed commit may succeed on a fresh attempt (contended
/// transactions abort rather than queue).
fn is_retryable(err: &firestore::errors::FirestoreError) -> bool {
    matches!(err, firestore::errors::FirestoreError::DatabaseError(db_err) if db_err.retry_possible)
}

fn txn_attempts_exhausted(last_err: Option<firestore::errors::FirestoreError>) -> AppError {
    let detail = last_err
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    AppError::Database(format!(
        "Transaction aborted after {} attempts: {}",
        MAX_TXN_ATTEMPTS, detail
    ))
}
