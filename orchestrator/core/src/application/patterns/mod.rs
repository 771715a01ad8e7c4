// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Pattern detection: rule tables, feature encoding, classifiers and the
//! ensemble that combines them.

pub mod classifier;
pub mod ensemble;
pub mod features;
pub mod rules;

pub use classifier::{ClassifierError, PatternClassifier, PrototypeClassifier, NONE_CLASS};
pub use ensemble::{EnsembleThresholds, PatternEnsemble};
pub use features::{FeatureEncoder, FEATURE_WIDTH};
pub use rules::{PatternRule, RuleCondition, RuleError, RuleSet};
