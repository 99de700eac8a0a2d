#![no_main]

use libfuzzer_sys::fuzz_target;
use policy_checks_lsp::findings::{FindingSeverity, ValidatorOutput};

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let Ok(output) = ValidatorOutput::parse(content) else {
            return;
        };

        let blocking = output.blocking_findings.len();
        let total = blocking + output.non_blocking_findings.len();
        let findings = output.into_findings();

        assert_eq!(findings.len(), total, "every entry becomes one finding");
        for (i, finding) in findings.iter().enumerate() {
            let expected = if i < blocking {
                FindingSeverity::Error
            } else {
                FindingSeverity::Warning
            };
            assert_eq!(finding.severity, expected, "blocking findings come first");
            let _ = finding.message();
        }
    }
});
