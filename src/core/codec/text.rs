//! Text-mode inbound rendering
//!
//! Chunks are decoded best-effort as UTF-8; control bytes render as caret
//! escapes (`^M` for CR). In CRLF mode a CR directly followed by LF is shown
//! as a single line break, even when the pair arrives split across two
//! chunks or two batches.

use super::{BatchOutput, DecodeState, NewlineMode};
use bytes::Bytes;

/// Caret-escape control characters in `text`
///
/// Characters below 0x20 become `^` plus the letter 0x40 above them, the
/// standard terminal convention. LF is kept literal when `keep_lf` is set
/// (a session with no newline mode shows it as `^J` instead).
pub fn caret_escape(text: &str, keep_lf: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if (c as u32) < 0x20 && (!keep_lf || c != '\n') {
            out.push('^');
            // 0x00..0x1f map onto '@'..'_'
            out.push(char::from_u32(c as u32 + 0x40).unwrap_or('?'));
        } else {
            out.push(c);
        }
    }
    out
}

/// Rendered width in characters of one caret-escaped control byte
///
/// The cross-batch CRLF splice deletes exactly this many characters for the
/// trailing CR; derived here rather than hard-coded so a different escape
/// style changes a single place.
pub fn caret_escape_len(byte: u8) -> usize {
    caret_escape(&(byte as char).to_string(), false).chars().count()
}

/// Decode one batch of text-mode chunks
pub(super) fn decode_text_batch(
    chunks: &[Bytes],
    newline: NewlineMode,
    state: &mut DecodeState,
) -> BatchOutput {
    let keep_lf = newline != NewlineMode::None;
    let splice_width = caret_escape_len(b'\r');

    let mut out = String::new();
    let mut trim_chars = 0;

    for chunk in chunks {
        let mut msg = String::from_utf8_lossy(chunk).into_owned();

        if newline == NewlineMode::CrLf && !msg.is_empty() {
            // don't show CR as ^M if directly before LF
            msg = msg.replace("\r\n", "\n");
            // special handling if CR and LF come in separate chunks
            if state.pending_cr && msg.starts_with('\n') {
                if out.chars().count() >= splice_width {
                    for _ in 0..splice_width {
                        out.pop();
                    }
                } else {
                    // the ^M was appended by a previous batch and already
                    // lives in the log; have the renderer take it back
                    trim_chars = splice_width;
                }
            }
            state.pending_cr = msg.ends_with('\r');
        }

        out.push_str(&caret_escape(&msg, keep_lf));
    }

    BatchOutput {
        trim_chars,
        text: out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caret_escape_control_bytes() {
        assert_eq!(caret_escape("a\rb", true), "a^Mb");
        assert_eq!(caret_escape("\x01\x1b", true), "^A^[");
        assert_eq!(caret_escape("plain", true), "plain");
    }

    #[test]
    fn test_caret_escape_lf_handling() {
        assert_eq!(caret_escape("a\nb", true), "a\nb");
        assert_eq!(caret_escape("a\nb", false), "a^Jb");
    }

    #[test]
    fn test_splice_width_matches_caret_cr() {
        assert_eq!(caret_escape_len(b'\r'), "^M".len());
    }

    #[test]
    fn test_crlf_collapsed_only_in_crlf_mode() {
        let mut state = DecodeState::default();
        let chunks = [Bytes::from_static(b"a\r\nb")];
        let out = decode_text_batch(&chunks, NewlineMode::Lf, &mut state);
        assert_eq!(out.text, "a^M\nb");

        let mut state = DecodeState::default();
        let out = decode_text_batch(&chunks, NewlineMode::CrLf, &mut state);
        assert_eq!(out.text, "a\nb");
    }

    #[test]
    fn test_empty_chunk_preserves_pending_flag() {
        let mut state = DecodeState { pending_cr: true };
        let chunks = [Bytes::new()];
        let out = decode_text_batch(&chunks, NewlineMode::CrLf, &mut state);
        assert!(out.is_empty());
        assert!(state.pending_cr);
    }

    #[test]
    fn test_lossy_decode_of_split_multibyte() {
        // "é" = 0xC3 0xA9 split across two chunks; best effort renders
        // replacement characters rather than dropping data
        let mut state = DecodeState::default();
        let chunks = [Bytes::from_static(b"\xc3"), Bytes::from_static(b"\xa9")];
        let out = decode_text_batch(&chunks, NewlineMode::CrLf, &mut state);
        assert_eq!(out.text, "\u{fffd}\u{fffd}");
    }
}
