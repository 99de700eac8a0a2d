#![no_main]

use libfuzzer_sys::fuzz_target;
use policy_checks_lsp::auth::credentials::parse_credentials_file;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        for profile in ["default", "dev", ""] {
            if let Some(credentials) = parse_credentials_file(content, profile) {
                assert!(!credentials.access_key_id.is_empty());
                assert!(!credentials.secret_access_key.is_empty());
                let debug = format!("{:?}", credentials);
                assert!(debug.contains("****"), "secrets are redacted in debug output");
            }
        }
    }
});
