#![no_main]

use filemap_log::LineRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|line: String| {
    if line.len() > 1_000_000 {
        return;
    }

    // Parsing should never panic, and a parsed line splits back losslessly
    if let Ok(record) = LineRecord::parse(line.clone()) {
        assert!(!record.key_token().is_empty());
        assert_eq!(
            format!("{}\t{}", record.key_token(), record.value_token()),
            line
        );
    }
});
