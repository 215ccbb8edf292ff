//! Fuzz harness for `verify::verify_records`.
//!
//! Splits the input into whole records and checks that verification never
//! panics and never errors on well-formed record sequences.

#![no_main]
use bchoc_core::block::RECORD_LEN;
use bchoc_core::verify::verify_records;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let records: Vec<[u8; RECORD_LEN]> = data
        .chunks_exact(RECORD_LEN)
        .filter_map(|chunk| chunk.try_into().ok())
        .collect();
    if records.is_empty() {
        return;
    }
    let report = verify_records(records.into_iter().map(Ok));
    assert!(report.is_ok(), "in-memory records must not error");
});
