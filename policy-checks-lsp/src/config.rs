//! Configuration management for the policy checks server

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::logger::LogLevel;

/// Region used when neither settings nor the environment name one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Settings keys as exposed by the editor
pub const REFERENCE_POLICY_FILE_PATH_KEY: &str =
    "aws.accessAnalyzer.policyChecks.referencePolicyFilePath";
pub const TERRAFORM_CONFIG_FILE_PATH_KEY: &str =
    "aws.accessAnalyzer.policyChecks.terraformConfigFilePath";
pub const CLOUDFORMATION_PARAMETER_FILE_PATH_KEY: &str =
    "aws.accessAnalyzer.policyChecks.cloudFormationParameterFilePath";

/// LSP configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Policy checks inputs
    pub policy_checks: PolicyChecksConfig,
    /// External validator executables
    pub validators: ValidatorsConfig,
    /// Access Analyzer client configuration
    pub access_analyzer: AccessAnalyzerConfig,
    /// Log level for the output channel ("error", "warn", "info", "verbose", "debug")
    pub log_level: Option<String>,
}

/// Paths and region used by policy validation
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PolicyChecksConfig {
    pub reference_policy_file_path: String,
    pub terraform_config_file_path: String,
    pub cloudformation_parameter_file_path: String,
    /// AWS region; falls back to the environment, then `us-east-1`
    pub region: Option<String>,
}

/// Executable names (or absolute paths) for the CLI validators
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidatorsConfig {
    pub terraform: String,
    pub cloudformation: String,
}

impl Default for ValidatorsConfig {
    fn default() -> Self {
        Self {
            terraform: "tf-policy-validator".to_string(),
            cloudformation: "cfn-policy-validator".to_string(),
        }
    }
}

/// Access Analyzer client configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AccessAnalyzerConfig {
    /// Endpoint override (e.g. a VPC endpoint); defaults to the regional endpoint
    pub endpoint: Option<String>,
    /// Named profile in `~/.aws/credentials`; defaults to `AWS_PROFILE`
    pub profile: Option<String>,
}

/// A policy-checks setting whose value changed between two configurations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub key: &'static str,
    pub value: String,
}

impl Config {
    /// Parse configuration from initialization options
    pub fn from_init_options(options: Option<serde_json::Value>) -> Self {
        match options {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => Self::default(),
        }
    }

    /// Load a `policy-checks.toml` project file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Effective region: settings, then `AWS_REGION`, then `AWS_DEFAULT_REGION`
    pub fn region(&self) -> String {
        self.policy_checks
            .region
            .clone()
            .filter(|r| !r.trim().is_empty())
            .or_else(|| std::env::var("AWS_REGION").ok().filter(|r| !r.is_empty()))
            .or_else(|| {
                std::env::var("AWS_DEFAULT_REGION")
                    .ok()
                    .filter(|r| !r.is_empty())
            })
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .map(LogLevel::from_str_loose)
            .unwrap_or(LogLevel::Info)
    }

    /// Policy-checks path settings that differ from `previous`, in settings order
    pub fn changes_since(&self, previous: &Config) -> Vec<ConfigChange> {
        let old = &previous.policy_checks;
        let new = &self.policy_checks;
        let mut changes = Vec::new();

        if old.reference_policy_file_path != new.reference_policy_file_path {
            changes.push(ConfigChange {
                key: REFERENCE_POLICY_FILE_PATH_KEY,
                value: new.reference_policy_file_path.clone(),
            });
        }
        if old.terraform_config_file_path != new.terraform_config_file_path {
            changes.push(ConfigChange {
                key: TERRAFORM_CONFIG_FILE_PATH_KEY,
                value: new.terraform_config_file_path.clone(),
            });
        }
        if old.cloudformation_parameter_file_path != new.cloudformation_parameter_file_path {
            changes.push(ConfigChange {
                key: CLOUDFORMATION_PARAMETER_FILE_PATH_KEY,
                value: new.cloudformation_parameter_file_path.clone(),
            });
        }

        changes
    }
}
