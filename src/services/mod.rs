// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Business logic services.

pub mod catalog;
pub mod entitlement;
pub mod progress;

pub use catalog::CatalogService;
pub use progress::ProgressService;
