// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`prism-core`)
//!
//! HTTP surface that translates external requests into pipeline calls.
//! **No business logic lives here**: all real work is delegated to
//! `crate::application::pipeline`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Per-stage endpoints, combined conversion, agent health |

pub mod api;

pub use api::{app, AppState};
