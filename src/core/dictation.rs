//! Dictation input
//!
//! A speech-to-text engine (or any other candidate-text producer) feeds the
//! session partial and final recognition results. Partials stage the draft;
//! a final result is either sent immediately (auto-submit) or left staged
//! for the user to review.

/// Candidate text from an external dictation source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictationEvent {
    /// Interim recognition result; replaces the current draft
    Partial(String),
    /// Final recognition result; sent when auto-submit is enabled,
    /// otherwise staged as the draft
    Final(String),
}

impl DictationEvent {
    /// The candidate text carried by this event
    pub fn text(&self) -> &str {
        match self {
            Self::Partial(text) | Self::Final(text) => text,
        }
    }

    /// True for final results
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }
}
