//! Core module containing the session machinery
//!
//! This module provides:
//! - Connection state machine with epoch-guarded async connect results
//! - Streaming codec (text/hex, configurable newline conventions, split-CRLF
//!   splice correction)
//! - Append-only styled render log and the renderer contract
//! - Session loop tying state, codec and transport together
//! - Transport layer (BLE Nordic UART, in-memory loopback)
//! - Dictation input events

pub mod codec;
pub mod dictation;
pub mod render;
pub mod session;
pub mod state;
pub mod transport;
