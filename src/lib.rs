//! # Blueterm Core Library
//!
//! A Bluetooth LE serial terminal core:
//! - Connection state machine (`Disconnected → Connecting → Connected`) with
//!   cancellation-safe connect attempts
//! - Streaming codec: text or hex encoding, configurable line endings, and
//!   correct rendering of CR+LF pairs split across read events
//! - Append-only styled render log any front-end can present
//! - BLE transport speaking the Nordic UART Service
//! - Dictation input with optional auto-submit
//!
//! ## Example
//!
//! ```rust,no_run
//! use blueterm_core::{
//!     BleTransport, BluetoothConfig, Session, SessionEvent, SessionSettings, shared_log,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = BleTransport::new(BluetoothConfig {
//!         device: "HMSoft".to_string(),
//!         ..Default::default()
//!     });
//!     let log = shared_log();
//!     let session = Session::spawn(transport, log.clone(), SessionSettings::default());
//!
//!     let mut rx = session.subscribe();
//!     session.connect();
//!     session.send("AT");
//!     while let Ok(event) = rx.recv().await {
//!         if let SessionEvent::LogAppended(run) = event {
//!             print!("{}", run.text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::config::SessionSettings;
pub use crate::core::codec::{
    decode_batch, encode, BatchOutput, CodecError, DecodeState, Encoded, EncodingMode, NewlineMode,
};
pub use crate::core::dictation::DictationEvent;
pub use crate::core::render::{
    shared_log, LineRenderer, RenderError, RenderLog, SharedLog, StyledRun, TextTag,
};
pub use crate::core::session::{Session, SessionEvent};
pub use crate::core::state::{ConnectionMachine, ConnectionState, StateError};
pub use crate::core::transport::{
    BleServiceConfig, BleTransport, BluetoothConfig, LoopbackPeer, LoopbackTransport, Transport,
    TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
