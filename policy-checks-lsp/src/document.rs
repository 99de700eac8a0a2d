//! Policy documents and the type tags that drive validation dispatch

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Kind of artifact being validated.
///
/// Each variant selects a different validator: the Access Analyzer API for
/// JSON policies, an external CLI for the two IaC formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// Raw IAM policy JSON
    JsonPolicyLanguage,
    /// `terraform show -json` plan output
    TerraformPlan,
    /// CloudFormation template (JSON or YAML)
    CloudFormation,
}

impl DocumentType {
    /// Parse a document type from its display name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "jsonpolicylanguage" | "json" | "jsonpolicy" => Some(DocumentType::JsonPolicyLanguage),
            "terraformplan" | "terraform" => Some(DocumentType::TerraformPlan),
            "cloudformation" | "cfn" => Some(DocumentType::CloudFormation),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentType::JsonPolicyLanguage => "JSON Policy Language",
            DocumentType::TerraformPlan => "Terraform Plan",
            DocumentType::CloudFormation => "CloudFormation",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Access Analyzer policy type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PolicyType {
    #[default]
    Identity,
    Resource,
    ServiceControl,
}

impl PolicyType {
    /// Parse from either the API value (`IDENTITY_POLICY`) or a UI label (`Identity`).
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "identity" | "identitypolicy" => Some(PolicyType::Identity),
            "resource" | "resourcepolicy" => Some(PolicyType::Resource),
            "servicecontrol" | "servicecontrolpolicy" | "scp" => Some(PolicyType::ServiceControl),
            _ => None,
        }
    }

    /// Value sent as `policyType` to the API
    pub fn as_api_str(&self) -> &'static str {
        match self {
            PolicyType::Identity => "IDENTITY_POLICY",
            PolicyType::Resource => "RESOURCE_POLICY",
            PolicyType::ServiceControl => "SERVICE_CONTROL_POLICY",
        }
    }
}

/// A document to validate: where it lives, what it contains, and how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDocument {
    pub path: PathBuf,
    pub text: String,
    pub document_type: DocumentType,
}

impl PolicyDocument {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>, document_type: DocumentType) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            document_type,
        }
    }

    /// Read a document from disk.
    pub async fn load(path: &Path, document_type: DocumentType) -> std::io::Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Self::new(path, text, document_type))
    }
}
