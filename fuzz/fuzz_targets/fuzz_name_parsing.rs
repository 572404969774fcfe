//! Fuzz target: command, mode and analyte name parsing
//!
//! Feeds arbitrary UTF-8 into every string-facing parser and verifies:
//! - No panics
//! - A parsed command or mode renders back to a name that parses to
//!   the same value
//! - Analyte resolution always yields one of the four modes
//!
//! cargo fuzz run fuzz_name_parsing

#![no_main]

use biosense::rafe::{RafeMode, analyte};
use biosense::safety::HardwareCommand;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(cmd) = text.parse::<HardwareCommand>() {
        assert_eq!(cmd.as_str().parse::<HardwareCommand>().ok(), Some(cmd));
    }
    if let Ok(mode) = text.parse::<RafeMode>() {
        assert_eq!(mode.as_str().parse::<RafeMode>().ok(), Some(mode));
    }

    let resolved = analyte::resolve(text);
    assert!(RafeMode::ALL.contains(&resolved.mode));
});
