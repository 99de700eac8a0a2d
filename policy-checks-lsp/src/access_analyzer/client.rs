//! # Access Analyzer client
//!
//! Calls the IAM Access Analyzer `ValidatePolicy` REST operation directly.
//!
//! ## API Details
//!
//! - **Endpoint**: `https://access-analyzer.{region}.amazonaws.com` (overridable)
//! - **Operation**: `POST /policy/validation`
//! - **Body**: `{"policyDocument": "...", "policyType": "IDENTITY_POLICY"}`
//! - **Authentication**: SigV4, service name `access-analyzer`
//! - **Pagination**: `nextToken` in the response, passed back as a query parameter
//!
//! ## Error Handling
//!
//! Non-2xx responses become [`AccessAnalyzerError::Api`] with the service's
//! `message` field when present. There is no retry; a failed validation is
//! terminal and the user re-triggers it.

use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::http_client::create_shared_client;
use super::{
    AccessAnalyzerError, AnalyzerFinding, PolicyValidator, ValidatePolicyRequest,
    ValidatePolicyResponse,
};
use crate::auth::credentials::{self, AwsCredentials};
use crate::auth::sigv4::{self, SigningParams};

const SERVICE_NAME: &str = "access-analyzer";
const VALIDATION_PATH: &str = "policy/validation";

/// Upper bound on pages followed for one document
const MAX_PAGES: usize = 50;

/// Where credentials come from
#[derive(Debug, Clone)]
enum CredentialsSource {
    /// The standard chain, optionally starting from a named profile
    Default { profile: Option<String> },
    Static(AwsCredentials),
}

/// Access Analyzer API client
pub struct AccessAnalyzerClient {
    client: Arc<Client>,
    region: String,
    endpoint: Option<String>,
    credentials: CredentialsSource,
}

impl AccessAnalyzerClient {
    pub fn new(region: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self::with_client(create_shared_client()?, region))
    }

    /// Create a client that shares an existing HTTP client
    pub fn with_client(client: Arc<Client>, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
            endpoint: None,
            credentials: CredentialsSource::Default { profile: None },
        }
    }

    /// Use a custom endpoint instead of the regional one
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint.filter(|e| !e.trim().is_empty());
        self
    }

    /// Use a named profile from the shared config and credentials files
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.credentials = CredentialsSource::Default { profile };
        self
    }

    /// Use fixed credentials
    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = CredentialsSource::Static(credentials);
        self
    }

    /// Get the shared HTTP client
    pub fn http_client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.{}.amazonaws.com", SERVICE_NAME, self.region),
        }
    }

    async fn resolve_credentials(&self) -> Result<AwsCredentials, AccessAnalyzerError> {
        match &self.credentials {
            CredentialsSource::Static(credentials) => Ok(credentials.clone()),
            CredentialsSource::Default { profile } => {
                Ok(credentials::resolve(profile.as_deref(), &self.client).await?)
            }
        }
    }

    fn page_url(&self, next_token: Option<&str>) -> Result<Url, AccessAnalyzerError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url(), VALIDATION_PATH))?;
        if let Some(token) = next_token {
            url.set_query(Some(&format!("nextToken={}", sigv4::uri_encode(token))));
        }
        Ok(url)
    }

    async fn fetch_page(
        &self,
        body: &[u8],
        credentials: &AwsCredentials,
        next_token: Option<&str>,
    ) -> Result<ValidatePolicyPage, AccessAnalyzerError> {
        let url = self.page_url(next_token)?;
        let params = SigningParams {
            credentials,
            region: &self.region,
            service: SERVICE_NAME,
            time: Utc::now(),
        };
        let signed = sigv4::sign_request(
            "POST",
            &url,
            &[("content-type", "application/json")],
            body,
            &params,
        )?;

        let mut request = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body.to_vec());
        for (name, value) in signed {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AccessAnalyzerError::Api {
                status: status.as_u16(),
                message: extract_error_message(&text),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl PolicyValidator for AccessAnalyzerClient {
    async fn validate_policy(
        &self,
        request: &ValidatePolicyRequest,
    ) -> Result<ValidatePolicyResponse, AccessAnalyzerError> {
        let credentials = self.resolve_credentials().await?;
        let body = serde_json::to_vec(request)?;

        let mut findings = Vec::new();
        let mut next_token: Option<String> = None;

        for page_number in 1..=MAX_PAGES {
            let page = self
                .fetch_page(&body, &credentials, next_token.as_deref())
                .await?;
            tracing::debug!(
                "Access Analyzer page {} returned {} findings",
                page_number,
                page.findings.len()
            );
            findings.extend(page.findings);

            match page.next_token {
                Some(_) if page_number == MAX_PAGES => {
                    tracing::warn!(
                        "Access Analyzer returned more than {} pages, ignoring the rest",
                        MAX_PAGES
                    );
                }
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(ValidatePolicyResponse { findings })
    }
}

/// Pull `message` out of an AWS JSON error body, falling back to the raw text
fn extract_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(alias = "Message")]
        message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidatePolicyPage {
    #[serde(default)]
    findings: Vec<AnalyzerFinding>,
    next_token: Option<String>,
}
