//! Hex-mode helpers
//!
//! Canonical display form is uppercase digit pairs separated by single
//! spaces ("48 65 6C"); parsing tolerates arbitrary whitespace between
//! pairs and accepts either case.

use super::CodecError;
use std::fmt::Write as _;

/// Format bytes as the canonical hex string
pub fn canonical_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// Parse user-entered hex text into bytes
///
/// Whitespace is stripped first; what remains must be an even number of hex
/// digits or the input is rejected.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, CodecError> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&cleaned).map_err(CodecError::InvalidHexInput)
}
