#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(coords) = repolink_types::parse_repo(s) {
            // Parsed coordinates always name both owner and repository
            assert!(!coords.owner.is_empty());
            assert!(!coords.name.is_empty());
        }
    }
});
