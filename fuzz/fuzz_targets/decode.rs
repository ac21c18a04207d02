#![no_main]

use libfuzzer_sys::fuzz_target;
use wirescope::{scanner::PatternScanner, wire};

fuzz_target!(|data: &[u8]| {
    if let Ok(tree) = wire::decode(data) {
        let _ = PatternScanner::default().extract(&tree);

        // Overlong varints decode fine but re-encode canonically, so the
        // fixed point starts at the first re-encoding.
        let bytes = wire::encode(&tree).expect("a decoded tree re-encodes");
        let canonical = wire::decode(&bytes).expect("re-encoded bytes decode");
        let again = wire::encode(&canonical).expect("a canonical tree re-encodes");
        assert_eq!(again, bytes);
        assert_eq!(wire::decode(&again).ok(), Some(canonical));
    }
});
