//! Validation findings and the parsers that produce them
//!
//! Two sources feed findings into the same [`Finding`] shape:
//!
//! - Access Analyzer `ValidatePolicy` responses, where `findingType == "ERROR"`
//!   is an error and every other type (`SECURITY_WARNING`, `WARNING`,
//!   `SUGGESTION`) is a warning;
//! - the JSON printed by the CLI validators, which already splits findings into
//!   `BlockingFindings` (errors) and `NonBlockingFindings` (warnings).

use serde::{Deserialize, Serialize};

use crate::access_analyzer::AnalyzerFinding;

/// How a finding is surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    /// Blocking / `ERROR`
    Error,
    /// Non-blocking / everything else
    Warning,
}

impl FindingSeverity {
    /// Classify an Access Analyzer finding type
    pub fn from_finding_type(finding_type: &str) -> Self {
        if finding_type == "ERROR" {
            FindingSeverity::Error
        } else {
            FindingSeverity::Warning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingSeverity::Error => "error",
            FindingSeverity::Warning => "warning",
        }
    }
}

/// A single issue reported by a policy validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: FindingSeverity,
    pub finding_type: String,
    pub details: String,
    /// Human-readable location inside the policy, if reported
    pub location: Option<String>,
    pub resource_name: Option<String>,
    pub policy_name: Option<String>,
    pub issue_code: Option<String>,
    pub learn_more_link: Option<String>,
}

impl Finding {
    /// Notification text for this finding
    pub fn message(&self) -> String {
        let mut message = if self.details.is_empty() {
            self.finding_type.clone()
        } else {
            format!("{}: {}", self.finding_type, self.details)
        };

        let mut context = Vec::new();
        if let Some(resource) = &self.resource_name {
            context.push(format!("Resource name: {}", resource));
        }
        if let Some(policy) = &self.policy_name {
            context.push(format!("Policy name: {}", policy));
        }
        if context.is_empty()
            && let Some(location) = &self.location
        {
            context.push(format!("Location: {}", location));
        }

        if !context.is_empty() {
            message.push_str(" - ");
            message.push_str(&context.join(", "));
        }
        message
    }

    /// Convert an Access Analyzer API finding
    pub fn from_analyzer(finding: &AnalyzerFinding) -> Self {
        Finding {
            severity: FindingSeverity::from_finding_type(&finding.finding_type),
            finding_type: finding.finding_type.clone(),
            details: finding.finding_details.clone(),
            location: format_locations(&finding.locations),
            resource_name: None,
            policy_name: None,
            issue_code: finding.issue_code.clone(),
            learn_more_link: finding.learn_more_link.clone(),
        }
    }

    fn from_cli(finding: &CliFinding, severity: FindingSeverity) -> Self {
        let details = finding.details.as_ref();
        let finding_type = finding
            .finding_type
            .clone()
            .or_else(|| details.and_then(|d| d.finding_type.clone()))
            .unwrap_or_else(|| severity.as_str().to_uppercase());
        let text = details
            .and_then(|d| d.finding_details.clone())
            .or_else(|| finding.message.clone())
            .unwrap_or_default();

        Finding {
            severity,
            finding_type,
            details: text,
            location: details.and_then(|d| format_locations(&d.locations)),
            resource_name: finding.resource_name.clone(),
            policy_name: finding.policy_name.clone(),
            issue_code: finding
                .code
                .clone()
                .or_else(|| details.and_then(|d| d.issue_code.clone())),
            learn_more_link: details.and_then(|d| d.learn_more_link.clone()),
        }
    }
}

/// Location of a finding inside a policy document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FindingLocation {
    pub path: Vec<PathElement>,
    pub span: Option<Span>,
}

/// One step of a location path (`Statement` -> `0` -> `Action`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    Index { index: u32 },
    Key { key: String },
    Value { value: String },
    Substring { substring: Substring },
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substring {
    pub start: u32,
    pub length: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: SpanPosition,
    pub end: SpanPosition,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanPosition {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

/// Render locations as `Statement[0].Action (line 4, column 7)`, joined by `; `
pub fn format_locations(locations: &[FindingLocation]) -> Option<String> {
    let rendered: Vec<String> = locations
        .iter()
        .map(format_location)
        .filter(|s| !s.is_empty())
        .collect();
    if rendered.is_empty() {
        None
    } else {
        Some(rendered.join("; "))
    }
}

fn format_location(location: &FindingLocation) -> String {
    let mut path = String::new();
    for element in &location.path {
        match element {
            PathElement::Index { index } => path.push_str(&format!("[{}]", index)),
            PathElement::Key { key } | PathElement::Value { value: key } => {
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
            }
            PathElement::Substring { substring } => {
                path.push_str(&format!(
                    "[{}..{}]",
                    substring.start,
                    substring.start.saturating_add(substring.length)
                ));
            }
            PathElement::Other(_) => {}
        }
    }

    match &location.span {
        Some(span) if path.is_empty() => {
            format!("line {}, column {}", span.start.line, span.start.column)
        }
        Some(span) => format!(
            "{} (line {}, column {})",
            path, span.start.line, span.start.column
        ),
        None => path,
    }
}

/// Errors raised while reading validator output
#[derive(Debug, thiserror::Error)]
pub enum ValidatorOutputError {
    #[error("validator produced no output")]
    Empty,
    #[error("validator output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// JSON printed on stdout by `tf-policy-validator` / `cfn-policy-validator`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidatorOutput {
    #[serde(rename = "BlockingFindings", default)]
    pub blocking_findings: Vec<CliFinding>,
    #[serde(rename = "NonBlockingFindings", default)]
    pub non_blocking_findings: Vec<CliFinding>,
}

/// One entry of either findings array
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CliFinding {
    pub finding_type: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub resource_name: Option<String>,
    pub policy_name: Option<String>,
    pub details: Option<CliFindingDetails>,
}

/// Nested Access Analyzer-style details
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CliFindingDetails {
    pub finding_details: Option<String>,
    pub finding_type: Option<String>,
    pub issue_code: Option<String>,
    pub learn_more_link: Option<String>,
    pub locations: Vec<FindingLocation>,
}

impl ValidatorOutput {
    /// Parse validator stdout
    pub fn parse(stdout: &str) -> Result<Self, ValidatorOutputError> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Err(ValidatorOutputError::Empty);
        }
        Ok(serde_json::from_str(trimmed)?)
    }

    pub fn is_empty(&self) -> bool {
        self.blocking_findings.is_empty() && self.non_blocking_findings.is_empty()
    }

    /// Blocking findings first, then non-blocking, each in reported order
    pub fn into_findings(self) -> Vec<Finding> {
        self.blocking_findings
            .iter()
            .map(|f| Finding::from_cli(f, FindingSeverity::Error))
            .chain(
                self.non_blocking_findings
                    .iter()
                    .map(|f| Finding::from_cli(f, FindingSeverity::Warning)),
            )
            .collect()
    }
}
