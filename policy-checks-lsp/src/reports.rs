//! Validation report generation
//!
//! A [`ValidationReport`] bundles a validation outcome with the notices it
//! produced. It is the `validatePolicy` command response and the CLI output
//! (summary, JSON or Markdown).

use serde::Serialize;

use crate::document::DocumentType;
use crate::findings::FindingSeverity;
use crate::notifications::{Notice, NoticeLevel};
use crate::policy_checks::ValidationOutcome;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoticeSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

impl NoticeSummary {
    pub fn from_notices(notices: &[Notice]) -> Self {
        let mut summary = NoticeSummary {
            total: notices.len(),
            ..Default::default()
        };
        for notice in notices {
            match notice.level {
                NoticeLevel::Error => summary.errors += 1,
                NoticeLevel::Warning => summary.warnings += 1,
                NoticeLevel::Info => summary.info += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub file: String,
    pub document_type: DocumentType,
    pub summary: NoticeSummary,
    pub outcome: ValidationOutcome,
    pub notices: Vec<Notice>,
}

impl ValidationReport {
    pub fn new(
        file: impl Into<String>,
        document_type: DocumentType,
        outcome: ValidationOutcome,
        notices: Vec<Notice>,
    ) -> Self {
        Self {
            file: file.into(),
            document_type,
            summary: NoticeSummary::from_notices(&notices),
            outcome,
            notices,
        }
    }

    /// Whether a CI run should fail
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0 || self.outcome.has_errors()
    }

    pub fn to_summary(&self) -> String {
        let mut lines = vec![
            format!("Policy checks for {} ({})", self.file, self.document_type),
            String::new(),
        ];
        for notice in &self.notices {
            lines.push(format!("  {} {}", level_icon(notice.level), notice.message));
        }
        if let ValidationOutcome::ApiError(message) = &self.outcome {
            lines.push(format!("  ✗ Access Analyzer request failed: {}", message));
        }
        lines.push(String::new());
        lines.push(format!(
            "  Errors: {}  Warnings: {}",
            self.summary.errors, self.summary.warnings
        ));
        lines.join("\n")
    }

    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            "# Policy Checks Report".to_string(),
            String::new(),
            format!("**File**: {}", self.file),
            format!("**Document type**: {}", self.document_type),
            format!("**Date**: {}", chrono::Local::now().format("%Y-%m-%d")),
            String::new(),
            "## Summary".to_string(),
            "| Severity | Count |".to_string(),
            "|----------|-------|".to_string(),
            format!("| ✗ Error | {} |", self.summary.errors),
            format!("| ⚠ Warning | {} |", self.summary.warnings),
            String::new(),
        ];

        let findings = self.outcome.findings();
        if !findings.is_empty() {
            lines.push("## Findings".to_string());
            lines.push(String::new());
            for finding in findings {
                let icon = match finding.severity {
                    FindingSeverity::Error => "✗",
                    FindingSeverity::Warning => "⚠",
                };
                let title = match (&finding.issue_code, &finding.learn_more_link) {
                    (Some(code), Some(link)) => format!("[{}]({})", code, link),
                    (Some(code), None) => code.clone(),
                    _ => finding.finding_type.clone(),
                };
                lines.push(format!("- **{}** ({} {}): {}", title, icon, finding.finding_type, finding.details));
                if let Some(location) = &finding.location {
                    lines.push(format!("  - Location: {}", location));
                }
            }
        } else {
            match &self.outcome {
                ValidationOutcome::Passed => {
                    lines.push("## No findings".to_string());
                    lines.push(String::new());
                    lines.push("✅ Policy checks did not discover any problems.".to_string());
                }
                ValidationOutcome::ApiError(message)
                | ValidationOutcome::ProcessFailed(message)
                | ValidationOutcome::InvalidOutput(message) => {
                    lines.push("## Validation failed".to_string());
                    lines.push(String::new());
                    lines.push("```".to_string());
                    lines.push(message.clone());
                    lines.push("```".to_string());
                }
                ValidationOutcome::Findings(_) => {}
            }
        }

        lines.join("\n")
    }
}

fn level_icon(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Error => "✗",
        NoticeLevel::Warning => "⚠",
        NoticeLevel::Info => "✓",
    }
}
