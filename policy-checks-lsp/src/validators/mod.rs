//! External CLI validators for infrastructure-as-code documents
//!
//! Terraform plans go to `tf-policy-validator`, CloudFormation templates to
//! `cfn-policy-validator`. Both print `{BlockingFindings, NonBlockingFindings}`
//! JSON on stdout, parsed by [`crate::findings::ValidatorOutput`].

pub mod runner;

use std::path::Path;

use crate::config::ValidatorsConfig;

/// A program and its argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ValidatorCommand {
    /// Human-readable command line, for logs and error notices
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// `tf-policy-validator validate --config <cfg> --template-path <plan> --region <region>`
pub fn terraform_command(
    validators: &ValidatorsConfig,
    template_path: &Path,
    config_path: &str,
    region: &str,
) -> ValidatorCommand {
    ValidatorCommand {
        program: validators.terraform.clone(),
        args: vec![
            "validate".to_string(),
            "--config".to_string(),
            config_path.to_string(),
            "--template-path".to_string(),
            template_path.display().to_string(),
            "--region".to_string(),
            region.to_string(),
        ],
    }
}

/// `cfn-policy-validator validate --template-path <tpl> --region <region> [--parameters <p>]`
///
/// `--parameters` is only passed when a parameter file is configured.
pub fn cloudformation_command(
    validators: &ValidatorsConfig,
    template_path: &Path,
    parameter_path: Option<&str>,
    region: &str,
) -> ValidatorCommand {
    let mut args = vec![
        "validate".to_string(),
        "--template-path".to_string(),
        template_path.display().to_string(),
        "--region".to_string(),
        region.to_string(),
    ];
    if let Some(parameters) = parameter_path.filter(|p| !p.trim().is_empty()) {
        args.push("--parameters".to_string());
        args.push(parameters.to_string());
    }

    ValidatorCommand {
        program: validators.cloudformation.clone(),
        args,
    }
}
