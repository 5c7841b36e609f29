#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Must not panic — errors are fine, panics are bugs.
        if let Ok(rows) = incasso::core::parse_feed(s) {
            for row in &rows {
                let _ = incasso::core::parse_feed_amount(&row.amount);
            }
            let _ = incasso::core::select_feed_row(&rows, "101A", Some("owner"));
        }
    }
});
