// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Agent state, bounded memory, feedback, the design model, pattern results,
//! stage payloads and the boundaries of external collaborators.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and algorithms with no I/O

pub mod agent;
pub mod config;
pub mod design;
pub mod events;
pub mod feedback;
pub mod llm;
pub mod memory;
pub mod pattern;
pub mod pipeline;
pub mod tooling;
