//! Fuzz harness for `block::decode`.
//!
//! Arbitrary bytes must either be rejected with a `FormatError` or decode
//! to a block whose canonical encoding is byte-identical to the input.

#![no_main]
use bchoc_core::block::{RECORD_LEN, decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(block) = decode(data) else {
        return;
    };
    assert_eq!(data.len(), RECORD_LEN);
    assert_eq!(&encode(&block)[..], data, "decode/encode is not byte-exact");
});
