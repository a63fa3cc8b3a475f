// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! CourseTrack: content entitlement and consumption tracking for a
//! course-selling platform.
//!
//! This crate decides whether a user may watch a given video in a given
//! course version, and tracks how much of each video they have watched,
//! rolled up into per-course completion.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::FirestoreDb;
use services::{CatalogService, ProgressService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub catalog: CatalogService,
    pub progress: ProgressService,
}
