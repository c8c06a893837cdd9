//! Streaming codec between user text and wire bytes
//!
//! The outbound path turns a submitted string into wire bytes plus the echo
//! line shown in the log. The inbound path turns a batch of byte chunks
//! (split at arbitrary boundaries by the transport) into renderable text,
//! carrying one bit of state across calls so a CR+LF pair split over two
//! chunks still renders as a single line break.

mod hex;
mod text;

pub use self::hex::{canonical_hex, parse_hex};
pub use self::text::{caret_escape, caret_escape_len};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Newline sequence appended to outbound sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewlineMode {
    /// No line ending
    None,
    /// LF only (Unix)
    Lf,
    /// CR only (old Mac)
    Cr,
    /// CR+LF (Windows, most modems)
    #[default]
    CrLf,
}

impl NewlineMode {
    /// Wire bytes for this line ending
    pub fn bytes(&self) -> &'static [u8] {
        match self {
            Self::None => b"",
            Self::Lf => b"\n",
            Self::Cr => b"\r",
            Self::CrLf => b"\r\n",
        }
    }
}

/// How outbound text is interpreted and inbound bytes are displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Plain text (UTF-8)
    #[default]
    Text,
    /// Hex digit pairs
    Hex,
}

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Outbound hex text is not a valid sequence of hex digit pairs
    #[error("invalid hex input: {0}")]
    InvalidHexInput(#[source] ::hex::FromHexError),
}

/// Result of encoding an outbound submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// Exact bytes to hand to the transport
    pub wire: Bytes,
    /// Line appended to the log (ends with a logical `'\n'`)
    pub echo: String,
}

/// Decode-path state that survives across `decode_batch` calls
///
/// Reset on every (re)connect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeState {
    /// Last rendered inbound byte was a bare CR that may pair with a
    /// following LF in the next chunk
    pub pending_cr: bool,
}

impl DecodeState {
    /// Reset to the fresh-connection state
    pub fn reset(&mut self) {
        self.pending_cr = false;
    }
}

/// Render output of one `decode_batch` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutput {
    /// Characters to retroactively delete from the end of the log before
    /// appending `text` (non-zero only for a CRLF split across batches)
    pub trim_chars: usize,
    /// Text to append, as a single run
    pub text: String,
}

impl BatchOutput {
    /// True if this batch produced no render operations
    pub fn is_empty(&self) -> bool {
        self.trim_chars == 0 && self.text.is_empty()
    }
}

/// Encode an outbound submission into wire bytes plus its echo line
///
/// Text mode sends the UTF-8 bytes of `input` followed by the newline
/// sequence; the echo is `input` plus one logical newline regardless of the
/// newline mode. Hex mode parses `input` as hex digit pairs (whitespace
/// between pairs allowed, case-insensitive) and echoes the canonical hex
/// string of the full wire payload, so display and wire are byte-identical.
///
/// Never touches connection state; the session refuses to call it unless
/// connected.
pub fn encode(
    input: &str,
    encoding: EncodingMode,
    newline: NewlineMode,
) -> Result<Encoded, CodecError> {
    match encoding {
        EncodingMode::Text => {
            let mut wire = Vec::with_capacity(input.len() + 2);
            wire.extend_from_slice(input.as_bytes());
            wire.extend_from_slice(newline.bytes());
            let mut echo = String::with_capacity(input.len() + 1);
            echo.push_str(input);
            echo.push('\n');
            Ok(Encoded {
                wire: Bytes::from(wire),
                echo,
            })
        }
        EncodingMode::Hex => {
            let mut payload = parse_hex(input)?;
            payload.extend_from_slice(newline.bytes());
            let mut echo = canonical_hex(&payload);
            echo.push('\n');
            Ok(Encoded {
                wire: Bytes::from(payload),
                echo,
            })
        }
    }
}

/// Decode a batch of inbound chunks into one render operation
///
/// Chunks must be passed in the exact order the transport delivered them;
/// the cross-chunk CRLF splice depends on it. The whole batch is rendered
/// into a single buffer so the caller appends it to the log in one go.
pub fn decode_batch(
    chunks: &[Bytes],
    encoding: EncodingMode,
    newline: NewlineMode,
    state: &mut DecodeState,
) -> BatchOutput {
    match encoding {
        EncodingMode::Hex => {
            // one hex line per chunk; the pending flag plays no role here
            let mut out = String::new();
            for chunk in chunks {
                out.push_str(&canonical_hex(chunk));
                out.push('\n');
            }
            BatchOutput {
                trim_chars: 0,
                text: out,
            }
        }
        EncodingMode::Text => text::decode_text_batch(chunks, newline, state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(chunks: &[&[u8]], newline: NewlineMode, state: &mut DecodeState) -> BatchOutput {
        let chunks: Vec<Bytes> = chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect();
        decode_batch(&chunks, EncodingMode::Text, newline, state)
    }

    #[test]
    fn test_encode_text_appends_newline_bytes() {
        let enc = encode("AT", EncodingMode::Text, NewlineMode::CrLf).unwrap();
        assert_eq!(&enc.wire[..], b"AT\r\n");
        assert_eq!(enc.echo, "AT\n");

        let enc = encode("AT", EncodingMode::Text, NewlineMode::None).unwrap();
        assert_eq!(&enc.wire[..], b"AT");
        assert_eq!(enc.echo, "AT\n");
    }

    #[test]
    fn test_encode_hex_echo_matches_wire() {
        let enc = encode("48 65 6c", EncodingMode::Hex, NewlineMode::CrLf).unwrap();
        assert_eq!(&enc.wire[..], b"\x48\x65\x6c\r\n");
        assert_eq!(enc.echo, "48 65 6C 0D 0A\n");
        // hex-decoding the echo reproduces the wire bytes exactly
        let roundtrip = parse_hex(enc.echo.trim_end()).unwrap();
        assert_eq!(&roundtrip[..], &enc.wire[..]);
    }

    #[test]
    fn test_encode_hex_rejects_malformed_input() {
        assert!(matches!(
            encode("zz", EncodingMode::Hex, NewlineMode::CrLf),
            Err(CodecError::InvalidHexInput(_))
        ));
        // odd number of digits
        assert!(encode("4", EncodingMode::Hex, NewlineMode::None).is_err());
    }

    #[test]
    fn test_roundtrip_text_all_newline_modes() {
        for (mode, rendered) in [
            (NewlineMode::None, "hello"),
            (NewlineMode::Lf, "hello\n"),
            (NewlineMode::Cr, "hello^M"),
            (NewlineMode::CrLf, "hello\n"),
        ] {
            let enc = encode("hello", EncodingMode::Text, mode).unwrap();
            let mut state = DecodeState::default();
            let out = decode_batch(
                std::slice::from_ref(&enc.wire),
                EncodingMode::Text,
                mode,
                &mut state,
            );
            assert_eq!(out.text, rendered, "mode {mode:?}");
            assert_eq!(out.trim_chars, 0);
        }
    }

    #[test]
    fn test_hex_batch_renders_one_line_per_chunk() {
        let mut state = DecodeState::default();
        let chunks = [Bytes::from_static(b"\x01\x02"), Bytes::from_static(b"AB")];
        let out = decode_batch(&chunks, EncodingMode::Hex, NewlineMode::CrLf, &mut state);
        assert_eq!(out.text, "01 02\n41 42\n");
        assert!(!state.pending_cr);
    }

    #[test]
    fn test_split_crlf_within_one_batch() {
        let mut state = DecodeState::default();
        let out = batch(&[b"A\r", b"\nB"], NewlineMode::CrLf, &mut state);
        // the two chunks arrive in the same batch: the ^M emitted for the
        // bare CR is removed from the batch buffer itself
        assert_eq!(out.trim_chars, 0);
        assert_eq!(out.text, "A\nB");
        assert!(!state.pending_cr);
    }

    #[test]
    fn test_split_crlf_across_batches() {
        let mut state = DecodeState::default();
        let first = batch(&[b"A\r"], NewlineMode::CrLf, &mut state);
        assert_eq!(first.text, "A^M");
        assert!(state.pending_cr);

        let second = batch(&[b"\nB"], NewlineMode::CrLf, &mut state);
        // the ^M is already in the log; the renderer must take it back
        assert_eq!(second.trim_chars, 2);
        assert_eq!(second.text, "\nB");
        assert!(!state.pending_cr);

        // net result equals the unsplit delivery
        let mut fresh = DecodeState::default();
        let whole = batch(&[b"A\r\nB"], NewlineMode::CrLf, &mut fresh);
        let mut spliced = first.text.clone();
        for _ in 0..second.trim_chars {
            spliced.pop();
        }
        spliced.push_str(&second.text);
        assert_eq!(spliced, whole.text);
    }

    #[test]
    fn test_chunk_order_is_trusted() {
        let mut state = DecodeState::default();
        let out = batch(&[b"\x41", b"\x42"], NewlineMode::CrLf, &mut state);
        assert_eq!(out.text, "AB");

        let mut state = DecodeState::default();
        let out = batch(&[b"\x42", b"\x41"], NewlineMode::CrLf, &mut state);
        assert_eq!(out.text, "BA");
    }

    #[test]
    fn test_pending_cr_without_following_lf_stays_escaped() {
        let mut state = DecodeState::default();
        let first = batch(&[b"A\r"], NewlineMode::CrLf, &mut state);
        assert_eq!(first.text, "A^M");

        let second = batch(&[b"B"], NewlineMode::CrLf, &mut state);
        assert_eq!(second.trim_chars, 0);
        assert_eq!(second.text, "B");
        assert!(!state.pending_cr);
    }
}
