//! Transport boundary
//!
//! The session core is transport-agnostic: it needs connect, ordered inbound
//! chunk delivery, write, and an idempotent close. BLE (Nordic UART) is the
//! shipped transport; the loopback pair backs tests and the demo mode.

mod ble;
mod loopback;

pub use ble::{BleServiceConfig, BleTransport, BluetoothConfig};
pub use loopback::{LoopbackPeer, LoopbackTransport};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport error types
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection timeout
    #[error("connection timeout after {0} seconds")]
    Timeout(u64),

    /// Not connected
    #[error("not connected")]
    NotConnected,

    /// Write failed
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// I/O error
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-stream transport contract the session core requires
#[async_trait]
pub trait Transport: Send {
    /// Connect to the peer
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Take the inbound chunk channel
    ///
    /// Chunks arrive strictly in receive order; the channel closes when the
    /// link is lost. Available once, after a successful `connect`.
    fn take_inbound(&mut self) -> Option<mpsc::UnboundedReceiver<Bytes>>;

    /// Write bytes to the peer, failing fast on link errors
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Close the connection; idempotent, closing twice is a no-op
    async fn close(&mut self);

    /// Human-readable description of the endpoint
    fn connection_info(&self) -> String;
}
