//! Credentials served over HTTP by the compute environment.
//!
//! - **Container**: ECS / EKS Pod Identity endpoint named by
//!   `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` or `AWS_CONTAINER_CREDENTIALS_FULL_URI`
//! - **Instance metadata**: IMDSv2 (session token, then the role's credentials)

use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use super::credentials::{AwsCredentials, CredentialsDocument, CredentialsError};

const CONTAINER_HOST: &str = "http://169.254.170.2";
const IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_TTL_SECONDS: &str = "21600";
const CONTAINER_TIMEOUT: Duration = Duration::from_secs(2);
const IMDS_TIMEOUT: Duration = Duration::from_secs(1);

fn env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

async fn send_text(
    request: RequestBuilder,
    provider: &'static str,
) -> Result<String, CredentialsError> {
    let remote = |message: String| CredentialsError::Remote { provider, message };

    let response = request.send().await.map_err(|e| remote(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(remote(format!("HTTP {}", status.as_u16())));
    }
    response.text().await.map_err(|e| remote(e.to_string()))
}

fn parse_document(body: &str, provider: &'static str) -> Result<AwsCredentials, CredentialsError> {
    let remote = |message: String| CredentialsError::Remote { provider, message };
    let document: CredentialsDocument =
        serde_json::from_str(body).map_err(|e| remote(format!("invalid response: {}", e)))?;
    document
        .into_credentials()
        .ok_or_else(|| remote("response has empty keys".to_string()))
}

async fn container_authorization() -> Result<Option<String>, CredentialsError> {
    if let Some(token) = env("AWS_CONTAINER_AUTHORIZATION_TOKEN") {
        return Ok(Some(token));
    }
    let Some(path) = env("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE") else {
        return Ok(None);
    };
    let token = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| CredentialsError::Io {
            path: path.into(),
            source,
        })?;
    Ok(Some(token.trim().to_string()))
}

/// Container credentials; `Ok(None)` when no endpoint is configured
pub async fn from_container(client: &Client) -> Result<Option<AwsCredentials>, CredentialsError> {
    let url = match (
        env("AWS_CONTAINER_CREDENTIALS_FULL_URI"),
        env("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI"),
    ) {
        (Some(full), _) => full,
        (None, Some(relative)) => format!("{}{}", CONTAINER_HOST, relative),
        (None, None) => return Ok(None),
    };

    let mut request = client.get(&url).timeout(CONTAINER_TIMEOUT);
    if let Some(token) = container_authorization().await? {
        request = request.header("authorization", token);
    }

    let body = send_text(request, "the container credentials endpoint").await?;
    parse_document(&body, "the container credentials endpoint").map(Some)
}

/// Instance role credentials; `Ok(None)` when IMDS is disabled or no role is attached
pub async fn from_instance_metadata(
    client: &Client,
) -> Result<Option<AwsCredentials>, CredentialsError> {
    if env("AWS_EC2_METADATA_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return Ok(None);
    }

    const PROVIDER: &str = "instance metadata";
    let endpoint = env("AWS_EC2_METADATA_SERVICE_ENDPOINT")
        .unwrap_or_else(|| IMDS_ENDPOINT.to_string());
    let endpoint = endpoint.trim_end_matches('/');

    let token = send_text(
        client
            .put(format!("{}/latest/api/token", endpoint))
            .header("x-aws-ec2-metadata-token-ttl-seconds", IMDS_TOKEN_TTL_SECONDS)
            .timeout(IMDS_TIMEOUT),
        PROVIDER,
    )
    .await?;

    let credentials_url = format!("{}/latest/meta-data/iam/security-credentials/", endpoint);
    let roles = send_text(
        client
            .get(&credentials_url)
            .header("x-aws-ec2-metadata-token", token.trim())
            .timeout(IMDS_TIMEOUT),
        PROVIDER,
    )
    .await?;
    let Some(role) = roles.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Ok(None);
    };

    let body = send_text(
        client
            .get(format!("{}{}", credentials_url, role))
            .header("x-aws-ec2-metadata-token", token.trim())
            .timeout(IMDS_TIMEOUT),
        PROVIDER,
    )
    .await?;
    parse_document(&body, PROVIDER).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::tests::clear_env;
    use serial_test::serial;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ROLE_CREDENTIALS: &str = r#"{
        "Code": "Success",
        "Type": "AWS-HMAC",
        "AccessKeyId": "ASIAROLE00000000000",
        "SecretAccessKey": "role-secret",
        "Token": "role-token",
        "Expiration": "2026-10-19T12:00:00Z"
    }"#;

    #[tokio::test]
    #[serial]
    async fn test_container_not_configured() {
        clear_env();
        assert!(from_container(&Client::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_container_full_uri_with_token() {
        clear_env();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/credentials/abc"))
            .and(header("authorization", "secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ROLE_CREDENTIALS))
            .expect(1)
            .mount(&server)
            .await;

        // SAFETY: serial_test ensures this test runs exclusively, preventing race conditions
        unsafe {
            std::env::set_var(
                "AWS_CONTAINER_CREDENTIALS_FULL_URI",
                format!("{}/v2/credentials/abc", server.uri()),
            );
            std::env::set_var("AWS_CONTAINER_AUTHORIZATION_TOKEN", "secret-token");
        }

        let creds = from_container(&Client::new()).await.unwrap().unwrap();
        assert_eq!(creds.access_key_id, "ASIAROLE00000000000");
        assert_eq!(creds.session_token.as_deref(), Some("role-token"));
        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn test_container_error_status() {
        clear_env();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        // SAFETY: serial_test ensures this test runs exclusively, preventing race conditions
        unsafe {
            std::env::set_var("AWS_CONTAINER_CREDENTIALS_FULL_URI", server.uri());
        }

        let err = from_container(&Client::new()).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 403"));
        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn test_instance_metadata_disabled() {
        clear_env();
        assert!(from_instance_metadata(&Client::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_instance_metadata_role_credentials() {
        clear_env();
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/latest/api/token"))
            .and(header("x-aws-ec2-metadata-token-ttl-seconds", "21600"))
            .respond_with(ResponseTemplate::new(200).set_body_string("imds-token"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/iam/security-credentials/"))
            .and(header("x-aws-ec2-metadata-token", "imds-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("PolicyCheckRole\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/iam/security-credentials/PolicyCheckRole"))
            .and(header("x-aws-ec2-metadata-token", "imds-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ROLE_CREDENTIALS))
            .mount(&server)
            .await;

        // SAFETY: serial_test ensures this test runs exclusively, preventing race conditions
        unsafe {
            std::env::remove_var("AWS_EC2_METADATA_DISABLED");
            std::env::set_var("AWS_EC2_METADATA_SERVICE_ENDPOINT", server.uri());
        }

        let client = Client::new();
        let creds = from_instance_metadata(&client).await.unwrap().unwrap();
        assert_eq!(creds.access_key_id, "ASIAROLE00000000000");

        // The full chain falls through to IMDS for an empty default profile
        let creds = crate::auth::credentials::resolve(None, &client).await.unwrap();
        assert_eq!(creds.secret_access_key, "role-secret");
        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn test_instance_without_role() {
        clear_env();
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_string("imds-token"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        // SAFETY: serial_test ensures this test runs exclusively, preventing race conditions
        unsafe {
            std::env::remove_var("AWS_EC2_METADATA_DISABLED");
            std::env::set_var("AWS_EC2_METADATA_SERVICE_ENDPOINT", server.uri());
        }

        assert!(from_instance_metadata(&Client::new()).await.unwrap().is_none());
        clear_env();
    }
}
