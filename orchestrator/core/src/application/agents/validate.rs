// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Validate
//!
//! Scores generated files on three axes:
//!
//! - **syntax**: share of files the parser accepts
//! - **style**: linter findings plus the built-in style table, as a penalty
//! - **responsiveness**: the built-in responsiveness table, over files that
//!   carry styles
//!
//! `overall` is a weighted mean. The report passes when `overall` reaches the
//! pass threshold, which learning moves.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::lifecycle::AgentBehavior;
use crate::domain::agent::AgentError;
use crate::domain::feedback::{failure_ratio, FeedbackItem};
use crate::domain::pipeline::{
    GeneratedFile, GenerationResult, Severity, ValidationIssue, ValidationReport, ValidationScores,
};
use crate::domain::tooling::{CheckOptions, LintIssue, Linter, SourceParser};
use crate::infrastructure::tooling::{RuleTable, TextRule};

const SYNTAX_WEIGHT: f64 = 0.4;
const STYLE_WEIGHT: f64 = 0.35;
const RESPONSIVENESS_WEIGHT: f64 = 0.25;

pub const DEFAULT_PASS_THRESHOLD: f64 = 0.7;
const MIN_PASS_THRESHOLD: f64 = 0.5;
const MAX_PASS_THRESHOLD: f64 = 0.95;

const MARKUP: &[&str] = &["html", "vue", "tsx", "jsx"];
const STYLESHEET: &[&str] = &["scss", "css", "vue"];

pub const STYLE_RULES: &[TextRule] = &[
    TextRule {
        id: "style/no-important",
        pattern: r"!important",
        severity: Severity::Warning,
        message: "Avoid !important",
        languages: STYLESHEET,
        strict_only: false,
    },
    TextRule {
        id: "style/no-inline-style",
        pattern: r#"\sstyle\s*=\s*["{]"#,
        severity: Severity::Warning,
        message: "Move inline styles to the stylesheet",
        languages: MARKUP,
        strict_only: false,
    },
    TextRule {
        id: "style/no-id-selector",
        pattern: r"^\s*#[A-Za-z][\w-]*\s*[{,]",
        severity: Severity::Info,
        message: "Prefer class selectors over ids",
        languages: STYLESHEET,
        strict_only: false,
    },
    TextRule {
        id: "style/no-deep-nesting",
        pattern: r"^\s{12,}[.&#\w\[:][^;]*\{\s*$",
        severity: Severity::Info,
        message: "Selector nested more than three levels",
        languages: &["scss"],
        strict_only: false,
    },
];

pub const RESPONSIVENESS_RULES: &[TextRule] = &[
    TextRule {
        id: "responsive/fixed-width",
        pattern: r"(?:^|[;\s{])(?:min-)?width\s*:\s*(?:[6-9]\d{2}|\d{4,})px",
        severity: Severity::Warning,
        message: "Fixed width of 600px or more does not fit narrow screens",
        languages: STYLESHEET,
        strict_only: false,
    },
    TextRule {
        id: "responsive/fixed-height",
        pattern: r"(?:^|[;\s{])height\s*:\s*\d{3,}px",
        severity: Severity::Info,
        message: "Fixed height clips content when text wraps",
        languages: STYLESHEET,
        strict_only: false,
    },
    TextRule {
        id: "responsive/absolute-position",
        pattern: r"position\s*:\s*absolute",
        severity: Severity::Info,
        message: "Absolute positioning rarely adapts to the viewport",
        languages: STYLESHEET,
        strict_only: false,
    },
    TextRule {
        id: "responsive/fixed-font-size",
        pattern: r"font-size\s*:\s*\d+px",
        severity: Severity::Info,
        message: "Use rem for font sizes",
        languages: STYLESHEET,
        strict_only: false,
    },
];

fn penalty(severity: Severity) -> f64 {
    match severity {
        Severity::Error => 0.25,
        Severity::Warning => 0.1,
        Severity::Info => 0.02,
    }
}

fn file_score<'a>(issues: impl Iterator<Item = &'a LintIssue>) -> f64 {
    (1.0 - issues.map(|i| penalty(i.severity)).sum::<f64>()).max(0.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        1.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub struct ValidateBehavior {
    linter: Arc<dyn Linter>,
    parser: Arc<dyn SourceParser>,
    style_rules: RuleTable,
    responsiveness_rules: RuleTable,
    pass_threshold: RwLock<f64>,
}

impl ValidateBehavior {
    pub fn new(linter: Arc<dyn Linter>, parser: Arc<dyn SourceParser>) -> Self {
        Self {
            linter,
            parser,
            style_rules: RuleTable::new(STYLE_RULES),
            responsiveness_rules: RuleTable::new(RESPONSIVENESS_RULES),
            pass_threshold: RwLock::new(DEFAULT_PASS_THRESHOLD),
        }
    }

    pub fn pass_threshold(&self) -> f64 {
        *self.pass_threshold.read()
    }

    fn check_file(
        &self,
        file: &GeneratedFile,
        strict_types: bool,
        issues: &mut Vec<ValidationIssue>,
        scores: &mut FileScores,
    ) {
        let options = CheckOptions {
            language: file.language.clone(),
            strict_types,
        };
        let to_issue = |file: &GeneratedFile, issue: LintIssue| ValidationIssue {
            file_path: file.path.clone(),
            rule_id: issue.rule_id,
            severity: issue.severity,
            message: issue.message,
            line: issue.line,
        };

        let diagnostics = self.parser.parse(&file.content, &options);
        scores.syntax.push(if diagnostics.is_empty() { 1.0 } else { 0.0 });
        issues.extend(diagnostics.into_iter().map(|d| ValidationIssue {
            file_path: file.path.clone(),
            rule_id: "syntax".into(),
            severity: Severity::Error,
            message: d.message,
            line: d.line,
        }));

        let mut style = self.linter.lint(&file.content, &options);
        style.extend(self.style_rules.scan(&file.content, &options));
        scores.style.push(file_score(style.iter()));
        issues.extend(style.into_iter().map(|i| to_issue(file, i)));

        if STYLESHEET.contains(&file.language.as_str()) && !file.content.trim().is_empty() {
            let responsive = self.responsiveness_rules.scan(&file.content, &options);
            scores.responsiveness.push(file_score(responsive.iter()));
            issues.extend(responsive.into_iter().map(|i| to_issue(file, i)));
        }
    }
}

#[derive(Default)]
struct FileScores {
    syntax: Vec<f64>,
    style: Vec<f64>,
    responsiveness: Vec<f64>,
}

#[async_trait]
impl AgentBehavior for ValidateBehavior {
    type Input = Arc<GenerationResult>;
    type Output = ValidationReport;

    async fn execute(&self, input: &Arc<GenerationResult>) -> Result<ValidationReport, AgentError> {
        let mut issues = Vec::new();
        let mut scores = FileScores::default();
        let mut files_checked = 0;

        for artifact in input.components.iter().chain(input.layout.iter()) {
            if artifact.is_failed() {
                // Placeholders count as unparseable; their content is not checked.
                for file in artifact.files() {
                    files_checked += 1;
                    scores.syntax.push(0.0);
                    issues.push(ValidationIssue {
                        file_path: file.path.clone(),
                        rule_id: "generation-failed".into(),
                        severity: Severity::Error,
                        message: format!("{} was not generated", artifact.component_name()),
                        line: None,
                    });
                }
                continue;
            }
            for file in artifact.files() {
                files_checked += 1;
                self.check_file(file, input.options.strict_types, &mut issues, &mut scores);
            }
        }

        let syntax = mean(&scores.syntax);
        let style = mean(&scores.style);
        let responsiveness = mean(&scores.responsiveness);
        let overall =
            SYNTAX_WEIGHT * syntax + STYLE_WEIGHT * style + RESPONSIVENESS_WEIGHT * responsiveness;
        let threshold = self.pass_threshold();

        debug!(files_checked, issues = issues.len(), overall, threshold, "Validation finished");
        Ok(ValidationReport {
            scores: ValidationScores {
                syntax,
                style,
                responsiveness,
                overall,
            },
            issues,
            files_checked,
            passed: overall >= threshold,
        })
    }

    fn perform_learning(&self, feedback: &[FeedbackItem], learning_rate: f64) -> Result<(), AgentError> {
        // Repeated failures loosen the bar; a healthy window tightens it.
        let delta = learning_rate * (0.5 - failure_ratio(feedback));
        let mut threshold = self.pass_threshold.write();
        let before = *threshold;
        *threshold = (before + delta).clamp(MIN_PASS_THRESHOLD, MAX_PASS_THRESHOLD);
        info!(before, after = *threshold, "Adjusted pass threshold");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feedback::{Feedback, FeedbackLoop};
    use crate::domain::pipeline::{ComponentArtifact, ConversionOptions};
    use crate::infrastructure::tooling::{DelimiterParser, RuleLinter};

    fn behavior() -> ValidateBehavior {
        ValidateBehavior::new(Arc::new(RuleLinter::default()), Arc::new(DelimiterParser::new()))
    }

    fn file(path: &str, language: &str, content: &str) -> GeneratedFile {
        GeneratedFile {
            path: path.into(),
            language: language.into(),
            content: content.into(),
        }
    }

    fn generation(components: Vec<ComponentArtifact>) -> Arc<GenerationResult> {
        Arc::new(GenerationResult {
            options: ConversionOptions::default(),
            components,
            layout: None,
        })
    }

    #[tokio::test]
    async fn test_clean_component_scores_full() {
        let result = generation(vec![ComponentArtifact::Generated {
            component_name: "Card".into(),
            node_id: "1:1".into(),
            files: vec![
                file("card/card.component.ts", "typescript", "export class Card {\n  title = '';\n}\n"),
                file("card/card.component.html", "html", "<article>\n  <h2>{{ title }}</h2>\n</article>\n"),
                file("card/card.component.scss", "scss", ":host {\n  display: flex;\n  max-width: 100%;\n}\n"),
            ],
        }]);
        let report = behavior().execute(&result).await.unwrap();

        assert_eq!(report.files_checked, 3);
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert!((report.scores.overall - 1.0).abs() < 1e-9);
        assert!(report.passed);
    }

    #[tokio::test]
    async fn test_issues_carry_file_and_rule() {
        let result = generation(vec![
            ComponentArtifact::Generated {
                component_name: "Hero".into(),
                node_id: "1:1".into(),
                files: vec![
                    file("hero/hero.component.ts", "typescript", "export class Hero {\n  data: any;\n"),
                    file("hero/hero.component.scss", "scss", ".hero {\n  width: 1200px;\n}\n"),
                ],
            },
            ComponentArtifact::Failed {
                component_name: "Footer".into(),
                node_id: "2:1".into(),
                error: "timeout".into(),
                files: vec![file("footer/footer.component.ts", "typescript", "// failed\n")],
            },
        ]);
        let report = behavior().execute(&result).await.unwrap();

        let found: Vec<(&str, &str)> = report
            .issues
            .iter()
            .map(|i| (i.file_path.as_str(), i.rule_id.as_str()))
            .collect();
        assert!(found.contains(&("hero/hero.component.ts", "syntax")));
        assert!(found.contains(&("hero/hero.component.ts", "no-explicit-any")));
        assert!(found.contains(&("hero/hero.component.scss", "responsive/fixed-width")));
        assert!(found.contains(&("footer/footer.component.ts", "generation-failed")));

        assert!((report.scores.syntax - 1.0 / 3.0).abs() < 1e-9);
        assert!((report.scores.responsiveness - 0.9).abs() < 1e-9);
        assert!(!report.passed);
    }

    #[test]
    fn test_learning_moves_threshold_within_bounds() {
        let behavior = behavior();
        let mut feedback = FeedbackLoop::new(10, 0.1, 0.7);
        for _ in 0..5 {
            feedback.add_feedback(Feedback::failure(serde_json::json!({})));
        }
        behavior.perform_learning(&feedback.items(), 0.2).unwrap();
        assert!((behavior.pass_threshold() - 0.6).abs() < 1e-9);

        for _ in 0..10 {
            behavior.perform_learning(&feedback.items(), 1.0).unwrap();
        }
        assert_eq!(behavior.pass_threshold(), MIN_PASS_THRESHOLD);
    }
}
