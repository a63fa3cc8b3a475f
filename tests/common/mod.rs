// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

use coursetrack::config::Config;
use coursetrack::db::FirestoreDb;
use coursetrack::middleware::auth::{create_jwt, Role};
use coursetrack::routes::create_router;
use coursetrack::services::{CatalogService, ProgressService};
use coursetrack::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();
    let catalog = CatalogService::new(db.clone());
    let progress = ProgressService::new(db.clone());

    let state = Arc::new(AppState {
        config,
        db,
        catalog,
        progress,
    });

    (create_router(state.clone()), state)
}

/// Mint a student session token for tests.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: u64, signing_key: &[u8]) -> String {
    create_jwt(user_id, Role::Student, signing_key).expect("Failed to create JWT")
}

/// Mint an admin session token for tests.
#[allow(dead_code)]
pub fn create_admin_jwt(user_id: u64, signing_key: &[u8]) -> String {
    create_jwt(user_id, Role::Admin, signing_key).expect("Failed to create JWT")
}
