//! Raw wire-format byte fixtures for deserialization-based test generators.
//!
//! These are not sampled from any real chain; they are hand-built to satisfy
//! our own serialization format so that generator code can deserialize a
//! concrete header/transaction/input/output without depending on `proptest`.

/// An 80-byte block header: version 1, zeroed previous hash and merkle root,
/// timestamp 0, bits `0x1e0ffff0`, nonce 0.
pub const DUMMY_HEADER: [u8; 80] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xf0, 0xff, 0x0f,
    0x1e, 0x00, 0x00, 0x00, 0x00,
];

/// A 9-byte transparent output: value 5,000,000,000 satoshis, empty lock script.
pub const DUMMY_OUTPUT1: [u8; 9] = [0x00, 0xf2, 0x05, 0x2a, 0x01, 0x00, 0x00, 0x00, 0x00];

/// A 41-byte transparent input spending outpoint `(0x11 * 32, 0)`, empty
/// unlock script, max sequence.
pub const DUMMY_INPUT1: [u8; 41] = [
    0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11,
    0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11,
    0x11, 0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff,
];

/// A 60-byte transaction: version 1, one `DUMMY_INPUT1`, one `DUMMY_OUTPUT1`,
/// locktime `Height(0)`.
pub const DUMMY_TX1: [u8; 60] = [
    0x01, 0x00, 0x00, 0x00, 0x01, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11,
    0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11,
    0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff,
    0x01, 0x00, 0xf2, 0x05, 0x2a, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];
