//! Policy checks: initial data, reference documents and validation dispatch
//!
//! [`PolicyChecks::validate_policy`] routes a document to the validator that
//! matches its [`DocumentType`] and reports every result through a
//! [`Notifier`]:
//!
//! | Result                               | Notices                                  |
//! |--------------------------------------|------------------------------------------|
//! | no findings                          | one info notice                          |
//! | findings                             | one error / warning notice per finding   |
//! | validator process failed             | one error notice, output not parsed      |
//! | validator output is not JSON         | one error notice                         |
//! | no usable AWS credentials            | one error notice                         |
//! | Access Analyzer request failed       | none (logged)                            |

use std::sync::Arc;

use serde::Serialize;

use crate::access_analyzer::{AccessAnalyzerError, PolicyValidator, ValidatePolicyRequest};
use crate::config::Config;
use crate::document::{DocumentType, PolicyDocument, PolicyType};
use crate::findings::{Finding, FindingSeverity, ValidatorOutput};
use crate::logger::get_logger;
use crate::notifications::Notifier;
use crate::validators::runner::CommandRunner;
use crate::validators::{ValidatorCommand, cloudformation_command, terraform_command};

/// Shown when a validation produced no findings
pub const NO_FINDINGS_MESSAGE: &str =
    "Policy checks did not discover any problems with your policy.";

/// Data handed to the policy checks UI when it opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyChecksInitialData {
    pub reference_file_path: String,
    pub tf_config_path: String,
    pub cfn_parameter_path: String,
    pub reference_document: String,
}

/// One validation request
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub document: PolicyDocument,
    pub policy_type: PolicyType,
    /// Overrides the configured Terraform config path
    pub tf_config_path: Option<String>,
    /// Overrides the configured CloudFormation parameter path
    pub cfn_parameter_path: Option<String>,
}

impl ValidationRequest {
    pub fn new(document: PolicyDocument, policy_type: PolicyType) -> Self {
        Self {
            document,
            policy_type,
            tf_config_path: None,
            cfn_parameter_path: None,
        }
    }
}

/// How a validation ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum ValidationOutcome {
    /// Validator ran and reported nothing
    Passed,
    /// Validator ran and reported findings
    Findings(Vec<Finding>),
    /// Access Analyzer request failed
    ApiError(String),
    /// Validator process could not be started or exited non-zero
    ProcessFailed(String),
    /// Validator exited cleanly but printed something other than findings JSON
    InvalidOutput(String),
}

impl ValidationOutcome {
    /// Whether the outcome should fail a CI run
    pub fn has_errors(&self) -> bool {
        match self {
            ValidationOutcome::Passed => false,
            ValidationOutcome::Findings(findings) => findings
                .iter()
                .any(|f| f.severity == FindingSeverity::Error),
            ValidationOutcome::ApiError(_)
            | ValidationOutcome::ProcessFailed(_)
            | ValidationOutcome::InvalidOutput(_) => true,
        }
    }

    pub fn findings(&self) -> &[Finding] {
        match self {
            ValidationOutcome::Findings(findings) => findings,
            _ => &[],
        }
    }
}

/// Read a reference policy document.
///
/// Returns the file contents, or an empty string when `path` is empty, does
/// not exist or cannot be read as UTF-8 text.
pub async fn read_reference_document(path: &str) -> String {
    if path.trim().is_empty() {
        return String::new();
    }
    match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!("Reference document {} unavailable: {}", path, e);
            String::new()
        }
    }
}

/// Validation dispatch over the configured validators
pub struct PolicyChecks {
    config: Config,
    validator: Arc<dyn PolicyValidator>,
    runner: Arc<dyn CommandRunner>,
}

impl PolicyChecks {
    pub fn new(
        config: Config,
        validator: Arc<dyn PolicyValidator>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            validator,
            runner,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initial data for the policy checks UI
    pub async fn init(&self) -> PolicyChecksInitialData {
        let settings = &self.config.policy_checks;
        PolicyChecksInitialData {
            reference_file_path: settings.reference_policy_file_path.clone(),
            tf_config_path: settings.terraform_config_file_path.clone(),
            cfn_parameter_path: settings.cloudformation_parameter_file_path.clone(),
            reference_document: read_reference_document(&settings.reference_policy_file_path)
                .await,
        }
    }

    /// Validate one document and report the results through `notifier`
    pub async fn validate_policy(
        &self,
        request: &ValidationRequest,
        notifier: &dyn Notifier,
    ) -> ValidationOutcome {
        tracing::info!(
            "Validating {} as {}",
            request.document.path.display(),
            request.document.document_type
        );

        match request.document.document_type {
            DocumentType::JsonPolicyLanguage => self.validate_json_policy(request, notifier).await,
            DocumentType::TerraformPlan => {
                let config_path = request
                    .tf_config_path
                    .as_deref()
                    .unwrap_or(&self.config.policy_checks.terraform_config_file_path);
                let command = terraform_command(
                    &self.config.validators,
                    &request.document.path,
                    config_path,
                    &self.config.region(),
                );
                self.run_validator(&command, notifier).await
            }
            DocumentType::CloudFormation => {
                let parameter_path = request
                    .cfn_parameter_path
                    .as_deref()
                    .unwrap_or(&self.config.policy_checks.cloudformation_parameter_file_path);
                let command = cloudformation_command(
                    &self.config.validators,
                    &request.document.path,
                    Some(parameter_path),
                    &self.config.region(),
                );
                self.run_validator(&command, notifier).await
            }
        }
    }

    async fn validate_json_policy(
        &self,
        request: &ValidationRequest,
        notifier: &dyn Notifier,
    ) -> ValidationOutcome {
        let api_request =
            ValidatePolicyRequest::new(request.document.text.clone(), request.policy_type);

        match self.validator.validate_policy(&api_request).await {
            Ok(response) => {
                let findings: Vec<Finding> =
                    response.findings.iter().map(Finding::from_analyzer).collect();
                report_findings(findings, notifier).await
            }
            Err(AccessAnalyzerError::Credentials(e)) => {
                // Nothing was sent; tell the user what to fix
                let message = format!("Policy checks cannot call IAM Access Analyzer: {}", e);
                get_logger().error(&message);
                notifier.show_error(message.clone()).await;
                ValidationOutcome::ApiError(message)
            }
            Err(e) => {
                get_logger().error(&format!("ValidatePolicy request failed: {}", e));
                ValidationOutcome::ApiError(e.to_string())
            }
        }
    }

    async fn run_validator(
        &self,
        command: &ValidatorCommand,
        notifier: &dyn Notifier,
    ) -> ValidationOutcome {
        let output = match self.runner.run(command).await {
            Ok(output) => output,
            Err(e) => {
                let message = e.to_string();
                get_logger().error(&message);
                notifier.show_error(message.clone()).await;
                return ValidationOutcome::ProcessFailed(message);
            }
        };

        match ValidatorOutput::parse(&output.stdout) {
            Ok(parsed) => report_findings(parsed.into_findings(), notifier).await,
            Err(e) => {
                let message = format!("Failed to parse validator output: {}", e);
                get_logger().error(&message);
                notifier.show_error(message.clone()).await;
                ValidationOutcome::InvalidOutput(message)
            }
        }
    }
}

async fn report_findings(findings: Vec<Finding>, notifier: &dyn Notifier) -> ValidationOutcome {
    if findings.is_empty() {
        notifier
            .show_information(NO_FINDINGS_MESSAGE.to_string())
            .await;
        return ValidationOutcome::Passed;
    }

    for finding in &findings {
        match finding.severity {
            FindingSeverity::Error => notifier.show_error(finding.message()).await,
            FindingSeverity::Warning => notifier.show_warning(finding.message()).await,
        }
    }
    ValidationOutcome::Findings(findings)
}
