//! Fuzz target: `decode_notification_bytes`
//!
//! Drives arbitrary bytes through the notification decoder and asserts
//! that it never panics and that anything it accepts satisfies the
//! decoded-signal invariants.
//!
//! cargo fuzz run fuzz_notification_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use reverb::protocol::decode_notification_bytes;

fuzz_target!(|data: &[u8]| {
    if let Ok(signal) = decode_notification_bytes(data) {
        assert!(signal.frequency.is_finite(), "frequency must be finite");
        assert!(signal.frequency >= 0.0, "frequency must not be negative");
        assert!(
            !signal.frequency.is_sign_negative(),
            "-0 must be normalised"
        );
    }
});
