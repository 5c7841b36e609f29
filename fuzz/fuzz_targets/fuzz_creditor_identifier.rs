#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = incasso::core::identifier::is_valid_creditor_identifier(s);
        // Derivation must either fail or produce a validating identifier.
        if let Ok(id) = incasso::core::identifier::derive_creditor_identifier(s, "ZZZ") {
            assert!(incasso::core::identifier::is_valid_creditor_identifier(&id));
        }
    }
});
