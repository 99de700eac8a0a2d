//! AWS credential lookup.
//!
//! Resolution order:
//!
//! 1. `AWS_ACCESS_KEY_ID` + `AWS_SECRET_ACCESS_KEY` (+ optional `AWS_SESSION_TOKEN`)
//! 2. The selected profile, merged from the shared config file
//!    (`AWS_CONFIG_FILE`, default `~/.aws/config`) and the shared credentials
//!    file (`AWS_SHARED_CREDENTIALS_FILE`, default `~/.aws/credentials`).
//!    A profile provides either static keys or a `credential_process`.
//! 3. Container credentials (`AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` /
//!    `AWS_CONTAINER_CREDENTIALS_FULL_URI`)
//! 4. EC2 instance metadata (IMDSv2), unless `AWS_EC2_METADATA_DISABLED=true`
//!
//! The profile is the explicitly configured one, else `AWS_PROFILE`, else
//! `default`. Steps 3 and 4 only run when that profile is `default` and it
//! does not provide credentials.
//!
//! Profiles that assume a role (`role_arn`) or sign in through IAM Identity
//! Center (`sso_*`) are not supported and fail with
//! [`CredentialsError::Unsupported`]. Export temporary keys or wrap the login
//! in a `credential_process` instead.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::Deserialize;

use super::redact_token;
use super::{process, remote};

const DEFAULT_PROFILE: &str = "default";

/// Static AWS credentials
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &redact_token(&self.access_key_id))
            .field("secret_access_key", &"****")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "****"),
            )
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error(
        "no AWS credentials found for profile '{0}': set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY, add keys or a credential_process to the profile, or run with an instance or container role"
    )]
    NotFound(String),
    #[error(
        "AWS profile '{profile}' uses {source_kind}, which is not supported; export temporary credentials or configure a credential_process"
    )]
    Unsupported {
        profile: String,
        source_kind: &'static str,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credential_process `{command}` failed: {message}")]
    Process { command: String, message: String },
    #[error("failed to fetch credentials from {provider}: {message}")]
    Remote {
        provider: &'static str,
        message: String,
    },
}

/// Credentials JSON shared by `credential_process`, container and IMDS
/// responses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CredentialsDocument {
    access_key_id: String,
    secret_access_key: String,
    #[serde(alias = "SessionToken")]
    token: Option<String>,
}

impl CredentialsDocument {
    pub(crate) fn into_credentials(self) -> Option<AwsCredentials> {
        if self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            return None;
        }
        Some(AwsCredentials {
            access_key_id: self.access_key_id,
            secret_access_key: self.secret_access_key,
            session_token: self.token.filter(|t| !t.is_empty()),
        })
    }
}

/// Credentials from the standard environment variables
pub fn from_env() -> Option<AwsCredentials> {
    let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
    let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
    if access_key_id.is_empty() || secret_access_key.is_empty() {
        return None;
    }
    Some(AwsCredentials {
        access_key_id,
        secret_access_key,
        session_token: std::env::var("AWS_SESSION_TOKEN")
            .ok()
            .filter(|t| !t.is_empty()),
    })
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Location of the shared credentials file
pub fn credentials_file_path() -> Option<PathBuf> {
    env_path("AWS_SHARED_CREDENTIALS_FILE")
        .or_else(|| dirs::home_dir().map(|home| home.join(".aws").join("credentials")))
}

/// Location of the shared config file
pub fn config_file_path() -> Option<PathBuf> {
    env_path("AWS_CONFIG_FILE")
        .or_else(|| dirs::home_dir().map(|home| home.join(".aws").join("config")))
}

/// Key/value pairs of one `[profile]` section in INI-formatted content.
///
/// Both `[name]` and `[profile name]` headers are accepted. Returns `None`
/// when the section is absent.
pub fn parse_profile(content: &str, profile: &str) -> Option<HashMap<String, String>> {
    let mut found = false;
    let mut in_profile = false;
    let mut settings = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip comments and blank lines
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let section = section.trim();
            let name = section.strip_prefix("profile ").unwrap_or(section).trim();
            in_profile = name == profile;
            found |= in_profile;
            continue;
        }

        if !in_profile {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        settings.insert(key.trim().to_string(), value.trim().to_string());
    }

    found.then_some(settings)
}

fn setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

fn static_keys(settings: &HashMap<String, String>) -> Option<AwsCredentials> {
    Some(AwsCredentials {
        access_key_id: setting(settings, "aws_access_key_id")?.to_string(),
        secret_access_key: setting(settings, "aws_secret_access_key")?.to_string(),
        session_token: setting(settings, "aws_session_token").map(str::to_string),
    })
}

/// Extract static keys for one profile from INI-formatted credentials content
pub fn parse_credentials_file(content: &str, profile: &str) -> Option<AwsCredentials> {
    parse_profile(content, profile).and_then(|settings| static_keys(&settings))
}

/// How a profile provides credentials
#[derive(Debug, PartialEq)]
enum ProfileSource {
    Static(AwsCredentials),
    Process(String),
    Unsupported(&'static str),
    Empty,
}

fn profile_source(settings: &HashMap<String, String>) -> ProfileSource {
    if setting(settings, "role_arn").is_some() {
        return ProfileSource::Unsupported("role assumption (role_arn)");
    }
    if setting(settings, "sso_session").is_some() || setting(settings, "sso_start_url").is_some()
    {
        return ProfileSource::Unsupported("IAM Identity Center (sso)");
    }
    if let Some(credentials) = static_keys(settings) {
        return ProfileSource::Static(credentials);
    }
    match setting(settings, "credential_process") {
        Some(command) => ProfileSource::Process(command.to_string()),
        None => ProfileSource::Empty,
    }
}

async fn read_profile(
    path: Option<PathBuf>,
    profile: &str,
) -> Result<Option<HashMap<String, String>>, CredentialsError> {
    let Some(path) = path.filter(|p| p.exists()) else {
        return Ok(None);
    };
    let content = read_file(&path).await?;
    Ok(parse_profile(&content, profile))
}

async fn read_file(path: &Path) -> Result<String, CredentialsError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CredentialsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Profile settings from both shared files; the credentials file wins per key
async fn load_profile(profile: &str) -> Result<Option<HashMap<String, String>>, CredentialsError> {
    let config = read_profile(config_file_path(), profile).await?;
    let credentials = read_profile(credentials_file_path(), profile).await?;

    Ok(match (config, credentials) {
        (None, None) => None,
        (Some(mut merged), Some(overrides)) => {
            merged.extend(overrides);
            Some(merged)
        }
        (Some(settings), None) | (None, Some(settings)) => Some(settings),
    })
}

/// Resolve credentials for `profile` (or `AWS_PROFILE`, or `default`)
pub async fn resolve(profile: Option<&str>, client: &Client) -> Result<AwsCredentials, CredentialsError> {
    if let Some(credentials) = from_env() {
        tracing::debug!(
            "Using AWS credentials from environment ({})",
            redact_token(&credentials.access_key_id)
        );
        return Ok(credentials);
    }

    let profile = profile
        .map(str::to_string)
        .or_else(|| std::env::var("AWS_PROFILE").ok().filter(|p| !p.is_empty()))
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

    let source = load_profile(&profile)
        .await?
        .map(|settings| profile_source(&settings))
        .unwrap_or(ProfileSource::Empty);

    match source {
        ProfileSource::Static(credentials) => {
            tracing::debug!(
                "Using AWS credentials from profile '{}' ({})",
                profile,
                redact_token(&credentials.access_key_id)
            );
            return Ok(credentials);
        }
        ProfileSource::Process(command) => {
            tracing::debug!("Using credential_process of profile '{}'", profile);
            return process::run_credential_process(&command).await;
        }
        ProfileSource::Unsupported(source_kind) => {
            return Err(CredentialsError::Unsupported {
                profile,
                source_kind,
            });
        }
        ProfileSource::Empty if profile != DEFAULT_PROFILE => {
            return Err(CredentialsError::NotFound(profile));
        }
        ProfileSource::Empty => {}
    }

    if let Some(credentials) = remote::from_container(client).await? {
        tracing::debug!("Using AWS credentials from the container credentials endpoint");
        return Ok(credentials);
    }

    match remote::from_instance_metadata(client).await {
        Ok(Some(credentials)) => {
            tracing::debug!("Using AWS credentials from instance metadata");
            Ok(credentials)
        }
        Ok(None) => Err(CredentialsError::NotFound(profile)),
        Err(e) => {
            tracing::debug!("Instance metadata unavailable: {}", e);
            Err(CredentialsError::NotFound(profile))
        }
    }
}
