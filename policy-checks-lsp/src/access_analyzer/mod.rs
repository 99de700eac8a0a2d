//! IAM Access Analyzer policy validation
//!
//! The [`PolicyValidator`] trait is the seam between validation dispatch and
//! the remote API. [`client::AccessAnalyzerClient`] is the production
//! implementation; tests substitute their own.

pub mod client;
pub mod http_client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::credentials::CredentialsError;
use crate::auth::sigv4::SigningError;
use crate::document::PolicyType;
use crate::findings::FindingLocation;

/// `ValidatePolicy` request body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePolicyRequest {
    pub policy_document: String,
    pub policy_type: String,
}

impl ValidatePolicyRequest {
    pub fn new(policy_document: impl Into<String>, policy_type: PolicyType) -> Self {
        Self {
            policy_document: policy_document.into(),
            policy_type: policy_type.as_api_str().to_string(),
        }
    }
}

/// All findings for one request (every page merged)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatePolicyResponse {
    pub findings: Vec<AnalyzerFinding>,
}

/// A finding as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerFinding {
    pub finding_type: String,
    #[serde(default)]
    pub finding_details: String,
    #[serde(default)]
    pub issue_code: Option<String>,
    #[serde(default)]
    pub learn_more_link: Option<String>,
    #[serde(default)]
    pub locations: Vec<FindingLocation>,
}

#[derive(Debug, thiserror::Error)]
pub enum AccessAnalyzerError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error("invalid Access Analyzer endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("failed to sign request: {0}")]
    Signing(#[from] SigningError),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("request to Access Analyzer failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Access Analyzer returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Validates a policy document remotely
#[async_trait]
pub trait PolicyValidator: Send + Sync {
    async fn validate_policy(
        &self,
        request: &ValidatePolicyRequest,
    ) -> Result<ValidatePolicyResponse, AccessAnalyzerError>;
}
