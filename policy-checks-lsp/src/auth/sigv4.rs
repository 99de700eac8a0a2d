//! AWS Signature Version 4 signing.
//!
//! Produces the `Authorization`, `X-Amz-Date` and (for temporary credentials)
//! `X-Amz-Security-Token` headers for a single request. The caller must send
//! exactly the headers that were signed.
//!
//! The canonical query string is taken verbatim from the URL, so callers build
//! query strings with [`uri_encode`] and keys in sorted order.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use super::credentials::AwsCredentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Inputs that scope a signature
pub struct SigningParams<'a> {
    pub credentials: &'a AwsCredentials,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

/// Percent-encode per SigV4 rules: everything except `A-Z a-z 0-9 - _ . ~`.
pub fn uri_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// The signing key was rejected by the HMAC implementation
#[derive(Debug, thiserror::Error)]
#[error("invalid signing key: {0}")]
pub struct SigningError(String);

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| SigningError(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Build the canonical request string (exposed for tests and debugging)
pub fn canonical_request(
    method: &str,
    url: &Url,
    headers: &[(String, String)],
    payload_hash: &str,
) -> (String, String) {
    let mut sorted: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim().to_string()))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = sorted
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();
    let signed_headers = sorted
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let path = if url.path().is_empty() { "/" } else { url.path() };
    let request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        path,
        url.query().unwrap_or_default(),
        canonical_headers,
        signed_headers,
        payload_hash
    );
    (request, signed_headers)
}

/// Sign a request and return the headers to add to it.
///
/// `headers` are additional headers to sign (e.g. `content-type`); `host` and
/// `x-amz-date` are always signed.
pub fn sign_request(
    method: &str,
    url: &Url,
    headers: &[(&str, &str)],
    payload: &[u8],
    params: &SigningParams<'_>,
) -> Result<Vec<(String, String)>, SigningError> {
    let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = params.time.format("%Y%m%d").to_string();

    let mut to_sign: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    to_sign.push(("host".to_string(), host_header(url)));
    to_sign.push(("x-amz-date".to_string(), amz_date.clone()));
    if let Some(token) = &params.credentials.session_token {
        to_sign.push(("x-amz-security-token".to_string(), token.clone()));
    }

    let payload_hash = sha256_hex(payload);
    let (canonical, signed_headers) = canonical_request(method, url, &to_sign, &payload_hash);

    let scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, params.region, params.service
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical.as_bytes())
    );

    let k_date = hmac_sha256(
        format!("AWS4{}", params.credentials.secret_access_key).as_bytes(),
        date_stamp.as_bytes(),
    )?;
    let k_region = hmac_sha256(&k_date, params.region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, params.service.as_bytes())?;
    let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
    let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, params.credentials.access_key_id, scope, signed_headers, signature
    );

    let mut out = vec![
        ("x-amz-date".to_string(), amz_date),
        ("authorization".to_string(), authorization),
    ];
    if let Some(token) = &params.credentials.session_token {
        out.push(("x-amz-security-token".to_string(), token.clone()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn example_credentials() -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: None,
        }
    }

    fn example_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap()
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("abc-_.~XYZ019"), "abc-_.~XYZ019");
        assert_eq!(uri_encode("a b"), "a%20b");
        assert_eq!(uri_encode("a+b/c="), "a%2Bb%2Fc%3D");
        assert_eq!(uri_encode("é"), "%C3%A9");
    }

    #[test]
    fn test_canonical_request_get_vanilla() {
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let headers = vec![
            ("Host".to_string(), "example.amazonaws.com".to_string()),
            ("X-Amz-Date".to_string(), "20150830T123600Z".to_string()),
        ];
        let (canonical, signed) = canonical_request("GET", &url, &headers, &sha256_hex(b""));
        assert_eq!(
            canonical,
            "GET\n/\n\nhost:example.amazonaws.com\nx-amz-date:20150830T123600Z\n\nhost;x-amz-date\ne3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(signed, "host;x-amz-date");
    }

    #[test]
    fn test_sign_get_vanilla() {
        let credentials = example_credentials();
        let params = SigningParams {
            credentials: &credentials,
            region: "us-east-1",
            service: "service",
            time: example_time(),
        };
        let url = Url::parse("https://example.amazonaws.com/").unwrap();
        let headers = sign_request("GET", &url, &[], b"", &params).unwrap();

        let authorization = headers
            .iter()
            .find(|(k, _)| k == "authorization")
            .map(|(_, v)| v.as_str())
            .unwrap();
        assert_eq!(
            authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, SignedHeaders=host;x-amz-date, Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert!(headers.contains(&("x-amz-date".to_string(), "20150830T123600Z".to_string())));
    }

    #[test]
    fn test_session_token_is_signed_and_returned() {
        let mut credentials = example_credentials();
        credentials.session_token = Some("session".to_string());
        let params = SigningParams {
            credentials: &credentials,
            region: "us-east-1",
            service: "access-analyzer",
            time: example_time(),
        };
        let url = Url::parse("https://access-analyzer.us-east-1.amazonaws.com/policy/validation")
            .unwrap();
        let headers = sign_request(
            "POST",
            &url,
            &[("content-type", "application/json")],
            b"{}",
            &params,
        )
        .unwrap();

        let authorization = &headers.iter().find(|(k, _)| k == "authorization").unwrap().1;
        assert!(authorization.contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token"
        ));
        assert!(headers.contains(&("x-amz-security-token".to_string(), "session".to_string())));
    }

    #[test]
    fn test_hmac_accepts_long_and_empty_keys() {
        let long_key = vec![0x42; 200];
        assert_eq!(hmac_sha256(&long_key, b"data").unwrap().len(), 32);
        assert_eq!(hmac_sha256(b"", b"data").unwrap().len(), 32);
    }

    #[test]
    fn test_host_header_includes_explicit_port() {
        let url = Url::parse("http://127.0.0.1:4566/policy/validation").unwrap();
        assert_eq!(host_header(&url), "127.0.0.1:4566");
        let url = Url::parse("https://access-analyzer.us-east-1.amazonaws.com/").unwrap();
        assert_eq!(host_header(&url), "access-analyzer.us-east-1.amazonaws.com");
    }
}
