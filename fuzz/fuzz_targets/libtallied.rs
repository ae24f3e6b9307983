#![no_main]
use libfuzzer_sys::fuzz_target;

use libtallied::Ledger;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = Ledger::from_xml(input);
    }
});
