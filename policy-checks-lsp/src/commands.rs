//! `workspace/executeCommand` identifiers, argument types and the handlers
//! that do not need the LSP client.

use std::path::PathBuf;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower_lsp::lsp_types::Url;

use crate::document::{DocumentType, PolicyType};
use crate::logger::get_logger;
use crate::state::GlobalState;

pub const POLICY_CHECKS: &str = "aws.accessanalyzer.policyChecks";
pub const GET_REFERENCE_DOCUMENT: &str = "aws.accessanalyzer.policyChecks.getReferenceDocument";
pub const VALIDATE_POLICY: &str = "aws.accessanalyzer.policyChecks.validatePolicy";
pub const TOGGLE_CODE_SUGGESTIONS: &str = "aws.consolas.toggleCodeSuggestion";
pub const ENABLE_CODE_SUGGESTIONS: &str = "aws.consolas.enableCodeSuggestions";
pub const SHOW_INTRODUCTION: &str = "aws.consolas.introduction";
pub const SHOW_REFERENCE_LOG: &str = "aws.consolas.openReferencePanel";

/// Every command advertised in `executeCommandProvider`
pub const ALL_COMMANDS: &[&str] = &[
    POLICY_CHECKS,
    GET_REFERENCE_DOCUMENT,
    VALIDATE_POLICY,
    TOGGLE_CODE_SUGGESTIONS,
    ENABLE_CODE_SUGGESTIONS,
    SHOW_INTRODUCTION,
    SHOW_REFERENCE_LOG,
];

/// Global-state key for automatic code suggestions
pub const AUTO_TRIGGER_ENABLED_KEY: &str = "CODEWHISPERER_AUTO_TRIGGER_ENABLED";
/// Global-state key recording that code suggestions were activated
pub const CODE_SUGGESTIONS_ACTIVATED_KEY: &str = "CODEWHISPERER_CODE_SUGGESTIONS_ACTIVATED";

pub const LEARN_MORE_URI: &str =
    "https://docs.aws.amazon.com/toolkit-for-vscode/latest/userguide/codewhisperer.html";

/// Arguments of [`GET_REFERENCE_DOCUMENT`]
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceDocumentArgs {
    #[serde(default)]
    pub path: String,
}

/// Arguments of [`VALIDATE_POLICY`]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePolicyArgs {
    pub uri: Url,
    pub document_type: String,
    #[serde(default)]
    pub policy_type: Option<String>,
    #[serde(default)]
    pub tf_config_path: Option<String>,
    #[serde(default)]
    pub cfn_parameter_path: Option<String>,
}

/// [`ValidatePolicyArgs`] after the string fields have been checked
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValidatePolicyArgs {
    pub uri: Url,
    /// `None` for buffers without a file behind them (`untitled:`)
    pub path: Option<PathBuf>,
    pub document_type: DocumentType,
    pub policy_type: PolicyType,
    pub tf_config_path: Option<String>,
    pub cfn_parameter_path: Option<String>,
}

impl ValidatePolicyArgs {
    pub fn parse(self) -> Result<ParsedValidatePolicyArgs, String> {
        let document_type = DocumentType::parse(&self.document_type)
            .ok_or_else(|| format!("unknown document type '{}'", self.document_type))?;
        let policy_type = match self.policy_type.as_deref() {
            None | Some("") => PolicyType::default(),
            Some(value) => {
                PolicyType::parse(value).ok_or_else(|| format!("unknown policy type '{}'", value))?
            }
        };
        // Only the CLI validators need a file on disk
        let path = self.uri.to_file_path().ok();
        if path.is_none() && document_type != DocumentType::JsonPolicyLanguage {
            return Err(format!("not a file URI: {}", self.uri));
        }

        Ok(ParsedValidatePolicyArgs {
            uri: self.uri,
            path,
            document_type,
            policy_type,
            tf_config_path: self.tf_config_path,
            cfn_parameter_path: self.cfn_parameter_path,
        })
    }
}

impl ParsedValidatePolicyArgs {
    /// File path when there is one, else the URI
    pub fn display_name(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => self.uri.to_string(),
        }
    }
}

/// Deserialize the first command argument
pub fn first_argument<T: DeserializeOwned>(arguments: &[Value]) -> Result<T, String> {
    let value = arguments
        .first()
        .cloned()
        .ok_or_else(|| "missing command argument".to_string())?;
    serde_json::from_value(value).map_err(|e| format!("invalid command argument: {}", e))
}

/// Flip automatic code suggestions; returns the new value
pub async fn toggle_code_suggestions(state: &GlobalState) -> bool {
    let enabled = !state.get_bool(AUTO_TRIGGER_ENABLED_KEY);
    state.set(AUTO_TRIGGER_ENABLED_KEY, Value::Bool(enabled)).await;
    get_logger().info(&format!(
        "Automatic code suggestions {}",
        if enabled { "enabled" } else { "disabled" }
    ));
    enabled
}

pub async fn enable_code_suggestions(state: &GlobalState) {
    state
        .set(CODE_SUGGESTIONS_ACTIVATED_KEY, Value::Bool(true))
        .await;
    get_logger().info("Code suggestions activated");
}
