//! Benchmark suite for policy-checks-lsp
//!
//! Run with: `cargo bench --bench benchmarks`
//! View report: `open target/criterion/report/index.html`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use policy_checks_lsp::access_analyzer::AnalyzerFinding;
use policy_checks_lsp::auth::credentials::AwsCredentials;
use policy_checks_lsp::auth::sigv4::{SigningParams, sign_request};
use policy_checks_lsp::findings::{Finding, ValidatorOutput};

// =============================================================================
// Test Data Generation
// =============================================================================

fn generate_validator_output(finding_count: usize) -> String {
    let finding = |i: usize, finding_type: &str| {
        format!(
            r#"{{
                "findingType": "{finding_type}",
                "code": "PASS_ROLE_WITH_STAR_IN_RESOURCE",
                "message": "Using iam:PassRole with a wildcard resource",
                "resourceName": "Role{i}",
                "policyName": "InlinePolicy{i}",
                "details": {{
                    "findingDetails": "Using the iam:PassRole action with wildcards (*) in the resource can be overly permissive.",
                    "findingType": "{finding_type}",
                    "issueCode": "PASS_ROLE_WITH_STAR_IN_RESOURCE",
                    "learnMoreLink": "https://docs.aws.amazon.com/IAM/latest/UserGuide/access-analyzer-reference-policy-checks.html",
                    "locations": [{{
                        "path": [{{"value": "Statement"}}, {{"index": {i}}}, {{"value": "Resource"}}],
                        "span": {{
                            "start": {{"line": {i}, "column": 20, "offset": 100}},
                            "end": {{"line": {i}, "column": 23, "offset": 103}}
                        }}
                    }}]
                }}
            }}"#
        )
    };

    let blocking: Vec<String> = (0..finding_count / 2).map(|i| finding(i, "ERROR")).collect();
    let non_blocking: Vec<String> = (finding_count / 2..finding_count)
        .map(|i| finding(i, "SECURITY_WARNING"))
        .collect();

    format!(
        r#"{{"BlockingFindings": [{}], "NonBlockingFindings": [{}]}}"#,
        blocking.join(","),
        non_blocking.join(",")
    )
}

fn generate_analyzer_findings(finding_count: usize) -> Vec<AnalyzerFinding> {
    (0..finding_count)
        .map(|i| {
            serde_json::from_value(serde_json::json!({
                "findingType": if i % 3 == 0 { "ERROR" } else { "SUGGESTION" },
                "findingDetails": "Add a value to the empty array.",
                "issueCode": "EMPTY_ARRAY_ACTION",
                "locations": [{
                    "path": [{"value": "Statement"}, {"index": i}, {"value": "Action"}],
                    "span": {
                        "start": {"line": i, "column": 5, "offset": 10},
                        "end": {"line": i, "column": 7, "offset": 12}
                    }
                }]
            }))
            .unwrap()
        })
        .collect()
}

// =============================================================================
// Parsing Benchmarks
// =============================================================================

fn bench_validator_output(c: &mut Criterion) {
    let mut group = c.benchmark_group("validator_output");

    for finding_count in [0, 10, 100] {
        let output = generate_validator_output(finding_count);
        group.bench_with_input(
            BenchmarkId::new("parse", finding_count),
            &output,
            |b, content| {
                b.iter(|| ValidatorOutput::parse(black_box(content)));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("parse_and_render", finding_count),
            &output,
            |b, content| {
                b.iter(|| {
                    let findings = ValidatorOutput::parse(black_box(content))
                        .map(ValidatorOutput::into_findings)
                        .unwrap_or_default();
                    findings.iter().map(Finding::message).collect::<Vec<_>>()
                });
            },
        );
    }

    group.finish();
}

fn bench_analyzer_findings(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyzer_findings");

    for finding_count in [10, 100] {
        let findings = generate_analyzer_findings(finding_count);
        group.bench_with_input(
            BenchmarkId::new("convert", finding_count),
            &findings,
            |b, findings| {
                b.iter(|| {
                    black_box(findings)
                        .iter()
                        .map(|f| Finding::from_analyzer(f).message())
                        .collect::<Vec<_>>()
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Signing Benchmarks
// =============================================================================

fn bench_sigv4(c: &mut Criterion) {
    let credentials = AwsCredentials {
        access_key_id: "AKIDEXAMPLE".to_string(),
        secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
        session_token: Some("session".to_string()),
    };
    let url = url::Url::parse("https://access-analyzer.us-east-1.amazonaws.com/policy/validation")
        .unwrap();
    let body = serde_json::to_vec(&serde_json::json!({
        "policyDocument": "{\"Version\":\"2012-10-17\",\"Statement\":[]}",
        "policyType": "IDENTITY_POLICY"
    }))
    .unwrap();

    c.bench_function("sigv4_sign_request", |b| {
        b.iter(|| {
            let params = SigningParams {
                credentials: &credentials,
                region: "us-east-1",
                service: "access-analyzer",
                time: chrono::Utc::now(),
            };
            sign_request(
                "POST",
                black_box(&url),
                &[("content-type", "application/json")],
                black_box(&body),
                &params,
            )
        });
    });
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(
    benches,
    bench_validator_output,
    bench_analyzer_findings,
    bench_sigv4,
);

criterion_main!(benches);
