#![no_main]

use libfuzzer_sys::fuzz_target;
use repolink_providers::webhook::{sign_sha256, SignatureScheme};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let split = usize::from(data[0]) % data.len();
    let (signature, body) = data[1..].split_at(split.min(data.len() - 1));
    let signature = String::from_utf8_lossy(signature);

    for scheme in [SignatureScheme::HmacSha256, SignatureScheme::Token] {
        let _ = scheme.verify(Some("fuzz-secret"), body, Some(signature.as_ref()));
    }

    // A genuine signature always verifies
    if let Some(valid) = sign_sha256("fuzz-secret", body) {
        assert!(SignatureScheme::HmacSha256.verify(Some("fuzz-secret"), body, Some(&valid)));
    }
});
