#![no_main]

use incasso::core::CharsetMode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        for mode in [
            CharsetMode::Ascii,
            CharsetMode::Extended("ES".into()),
            CharsetMode::Extended("DE".into()),
        ] {
            let out = incasso::core::charset::normalize(s, &mode);
            // Normalized output must itself be a fixed point.
            assert_eq!(incasso::core::charset::normalize(&out, &mode), out);
        }
    }
});
