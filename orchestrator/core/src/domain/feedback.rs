// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Feedback Loop - recency-weighted success tracking
//
// Keeps the most recent outcomes of an agent (newest first) and derives a
// success rate in which older outcomes decay exponentially. The owning agent
// compares that rate against `threshold` to decide when to learn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Decay applied per position in the newest-first sequence.
const RECENCY_DECAY: f64 = 0.1;

/// An outcome to record. `observed_at` is stamped on insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub success: bool,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Feedback {
    pub fn success(payload: serde_json::Value) -> Self {
        Self {
            success: true,
            payload,
        }
    }

    pub fn failure(payload: serde_json::Value) -> Self {
        Self {
            success: false,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub observed_at: DateTime<Utc>,
    pub success: bool,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct FeedbackLoop {
    items: VecDeque<FeedbackItem>,
    max_items: usize,
    learning_rate: f64,
    threshold: f64,
}

impl FeedbackLoop {
    pub fn new(max_items: usize, learning_rate: f64, threshold: f64) -> Self {
        let max_items = max_items.max(1);
        Self {
            items: VecDeque::with_capacity(max_items),
            max_items,
            learning_rate,
            threshold,
        }
    }

    /// Records `feedback` at the front; drops the oldest item when full.
    pub fn add_feedback(&mut self, feedback: Feedback) {
        self.items.push_front(FeedbackItem {
            observed_at: Utc::now(),
            success: feedback.success,
            payload: feedback.payload,
        });
        self.items.truncate(self.max_items);
    }

    /// Newest first.
    pub fn items(&self) -> Vec<FeedbackItem> {
        self.items.iter().cloned().collect()
    }

    /// Weighted success rate in [0, 1]; 1.0 with no history.
    pub fn success_rate(&self) -> f64 {
        if self.items.is_empty() {
            return 1.0;
        }
        let (weighted, total) = self.items.iter().enumerate().fold(
            (0.0_f64, 0.0_f64),
            |(weighted, total), (i, item)| {
                let weight = (-RECENCY_DECAY * i as f64).exp();
                let score = if item.success { 1.0 } else { 0.0 };
                (weighted + weight * score, total + weight)
            },
        );
        weighted / total
    }

    pub fn should_learn(&self) -> bool {
        self.success_rate() < self.threshold
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Unweighted share of failures in a feedback snapshot, as handed to
/// learning hooks.
pub fn failure_ratio(items: &[FeedbackItem]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    items.iter().filter(|item| !item.success).count() as f64 / items.len() as f64
}
