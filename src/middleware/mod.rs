// SPDX-License-Identifier: MIT
// Copyright 2026 CourseTrack Contributors

//! Request middleware.

pub mod auth;
pub mod security;
