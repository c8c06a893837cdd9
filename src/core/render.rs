//! Append-only styled render log
//!
//! The log is the session's display surface: a sequence of styled text runs
//! the session appends to, with one sanctioned exception — the retroactive
//! deletion used to reconcile a CR+LF that arrived split across two reads.
//! Any presentation layer (terminal, web view, native widget) can implement
//! [`LineRenderer`] against the same contract.

use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

/// Semantic color tag for a run of text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTag {
    /// Text echoed for an outbound send
    Sent,
    /// Text decoded from inbound bytes
    Received,
    /// Session status messages (connect, errors)
    Status,
}

/// One run of same-tagged text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    /// Run text
    pub text: String,
    /// Semantic tag
    pub tag: TextTag,
}

/// Render log errors
#[derive(Debug, Error)]
pub enum RenderError {
    /// Asked to delete more characters than the log holds
    #[error("underflow: log holds {len} chars, asked to delete {requested}")]
    Underflow {
        /// Characters currently in the log
        len: usize,
        /// Characters requested for deletion
        requested: usize,
    },
}

/// Display contract the session renders against
pub trait LineRenderer: Send {
    /// Append a run of text with the given tag
    fn append(&mut self, text: &str, tag: TextTag);

    /// Remove the last `chars` characters, clamping on underflow
    fn delete_last(&mut self, chars: usize);

    /// Clear the whole log
    fn clear(&mut self);
}

/// In-memory render log: the default [`LineRenderer`]
#[derive(Debug, Default)]
pub struct RenderLog {
    runs: Vec<StyledRun>,
    chars: usize,
}

impl RenderLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Total characters in the log
    pub fn char_count(&self) -> usize {
        self.chars
    }

    /// The styled runs, oldest first
    pub fn runs(&self) -> &[StyledRun] {
        &self.runs
    }

    /// The log flattened to plain text
    pub fn plain_text(&self) -> String {
        let mut out = String::with_capacity(self.chars);
        for run in &self.runs {
            out.push_str(&run.text);
        }
        out
    }

    /// Strict deletion: fails with [`RenderError::Underflow`] instead of
    /// clamping
    pub fn try_delete_last(&mut self, chars: usize) -> Result<(), RenderError> {
        if chars > self.chars {
            return Err(RenderError::Underflow {
                len: self.chars,
                requested: chars,
            });
        }
        let mut remaining = chars;
        while remaining > 0 {
            let Some(last) = self.runs.last_mut() else {
                break;
            };
            let run_len = last.text.chars().count();
            if run_len <= remaining {
                remaining -= run_len;
                self.runs.pop();
            } else {
                for _ in 0..remaining {
                    last.text.pop();
                }
                remaining = 0;
            }
        }
        self.chars -= chars;
        Ok(())
    }
}

impl LineRenderer for RenderLog {
    fn append(&mut self, text: &str, tag: TextTag) {
        if text.is_empty() {
            return;
        }
        self.chars += text.chars().count();
        // extend the previous run when the tag matches, so receive batches
        // don't fragment the log into per-chunk runs
        if let Some(last) = self.runs.last_mut() {
            if last.tag == tag {
                last.text.push_str(text);
                return;
            }
        }
        self.runs.push(StyledRun {
            text: text.to_string(),
            tag,
        });
    }

    fn delete_last(&mut self, chars: usize) {
        let clamped = chars.min(self.chars);
        if clamped < chars {
            tracing::warn!(requested = chars, available = self.chars, "render log underflow, clamping");
        }
        // clamped deletions cannot underflow
        let _ = self.try_delete_last(clamped);
    }

    fn clear(&mut self) {
        self.runs.clear();
        self.chars = 0;
    }
}

/// Render log shared between the session task and UI readers
pub type SharedLog = Arc<RwLock<RenderLog>>;

/// Create a new shared, empty render log
pub fn shared_log() -> SharedLog {
    Arc::new(RwLock::new(RenderLog::new()))
}

impl LineRenderer for SharedLog {
    fn append(&mut self, text: &str, tag: TextTag) {
        self.write().append(text, tag);
    }

    fn delete_last(&mut self, chars: usize) {
        self.write().delete_last(chars);
    }

    fn clear(&mut self) {
        self.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_merges_same_tag_runs() {
        let mut log = RenderLog::new();
        log.append("AB", TextTag::Received);
        log.append("CD", TextTag::Received);
        log.append("sent\n", TextTag::Sent);
        assert_eq!(log.runs().len(), 2);
        assert_eq!(log.plain_text(), "ABCDsent\n");
        assert_eq!(log.char_count(), 9);
    }

    #[test]
    fn test_delete_last_spans_runs() {
        let mut log = RenderLog::new();
        log.append("hello", TextTag::Received);
        log.append("!\n", TextTag::Status);
        log.delete_last(3);
        assert_eq!(log.plain_text(), "hell");
        assert_eq!(log.char_count(), 4);
        assert_eq!(log.runs().len(), 1);
    }

    #[test]
    fn test_delete_last_counts_chars_not_bytes() {
        let mut log = RenderLog::new();
        log.append("aé", TextTag::Received);
        log.delete_last(1);
        assert_eq!(log.plain_text(), "a");
        assert_eq!(log.char_count(), 1);
    }

    #[test]
    fn test_try_delete_last_underflow() {
        let mut log = RenderLog::new();
        log.append("ab", TextTag::Received);
        assert!(matches!(
            log.try_delete_last(3),
            Err(RenderError::Underflow { len: 2, requested: 3 })
        ));
        // strict failure leaves the log untouched
        assert_eq!(log.plain_text(), "ab");
    }

    #[test]
    fn test_delete_last_clamps() {
        let mut log = RenderLog::new();
        log.append("ab", TextTag::Received);
        log.delete_last(10);
        assert_eq!(log.char_count(), 0);
        assert_eq!(log.plain_text(), "");
    }

    #[test]
    fn test_clear() {
        let mut log = RenderLog::new();
        log.append("x", TextTag::Status);
        log.clear();
        assert!(log.runs().is_empty());
        assert_eq!(log.char_count(), 0);
    }
}
