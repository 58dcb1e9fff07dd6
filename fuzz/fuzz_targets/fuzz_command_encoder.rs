//! Fuzz target: numeric coercion + command framing
//!
//! Treats the input as operator text.  Whatever the transmit path would
//! accept must frame into a command that parses back to the same fields.
//!
//! cargo fuzz run fuzz_command_encoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use reverb::protocol::number::{format_number, parse_number};
use reverb::protocol::{OutboundCommand, parse_command};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Some(n) = parse_number(text) else {
        return;
    };
    assert!(n.is_finite(), "coercion must reject non-finite values");

    let payload = format_number(n);
    assert!(!payload.contains(','), "canonical number must be comma-free");

    let line = OutboundCommand::once(payload.as_str()).encode();
    let back = parse_command(&line).expect("encoded command must parse");
    assert_eq!(back.value, payload);
    assert_eq!(back, OutboundCommand::once(payload.as_str()));
});
