//! Policy Checks LSP - Language Server for IAM policy validation
//!
//! This crate validates AWS IAM policy documents, Terraform plans and
//! CloudFormation templates (through IAM Access Analyzer and the
//! `tf-policy-validator` / `cfn-policy-validator` CLIs) and reports the
//! findings to the editor as notifications.

pub mod access_analyzer;
pub mod auth;
pub mod backend;
pub mod commands;
pub mod config;
pub mod document;
pub mod findings;
pub mod logger;
pub mod notifications;
pub mod policy_checks;
pub mod reports;
pub mod state;
pub mod utils;
pub mod validators;
