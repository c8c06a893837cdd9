//! In-memory transport pair
//!
//! Stands in for a real link in tests and in the `--loopback` demo mode:
//! the peer handle injects inbound chunks and observes everything the
//! session writes. Dropping the peer closes the link, which the session
//! sees as connection loss.

use super::{Transport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Peer side of a loopback link
#[derive(Debug)]
pub struct LoopbackPeer {
    inject_tx: mpsc::UnboundedSender<Bytes>,
    written: Arc<Mutex<Vec<Bytes>>>,
}

impl LoopbackPeer {
    /// Deliver a chunk to the session as if the device had sent it
    ///
    /// Chunks arrive in injection order. Returns `false` once the link is
    /// closed.
    pub fn inject(&self, chunk: impl Into<Bytes>) -> bool {
        self.inject_tx.send(chunk.into()).is_ok()
    }

    /// Everything the session has written so far, in write order
    pub fn written(&self) -> Vec<Bytes> {
        self.written.lock().clone()
    }
}

/// Session side of a loopback link
pub struct LoopbackTransport {
    inbound: Option<mpsc::UnboundedReceiver<Bytes>>,
    written: Arc<Mutex<Vec<Bytes>>>,
    connected: bool,
    // present only in echo mode; also keeps the channel open without a peer
    echo_tx: Option<mpsc::UnboundedSender<Bytes>>,
    fail_connect: Option<String>,
    connect_delay: Option<std::time::Duration>,
}

impl LoopbackTransport {
    /// Create a linked transport/peer pair
    ///
    /// Dropping the peer closes the inbound channel, which the session
    /// observes as connection loss.
    pub fn pair() -> (Self, LoopbackPeer) {
        let (inject_tx, inbound) = mpsc::unbounded_channel();
        let written = Arc::new(Mutex::new(Vec::new()));
        let transport = Self {
            inbound: Some(inbound),
            written: written.clone(),
            connected: false,
            echo_tx: None,
            fail_connect: None,
            connect_delay: None,
        };
        let peer = LoopbackPeer { inject_tx, written };
        (transport, peer)
    }

    /// Create an echo device: every write comes straight back as a chunk
    pub fn echo() -> Self {
        let (mut transport, peer) = Self::pair();
        transport.echo_tx = Some(peer.inject_tx.clone());
        transport
    }

    /// Make the next `connect` fail with the given reason (tests only need
    /// this to exercise the connect-error path)
    pub fn fail_connect_with(&mut self, reason: &str) {
        self.fail_connect = Some(reason.to_string());
    }

    /// Delay `connect` completion, leaving a window to cancel the attempt
    pub fn set_connect_delay(&mut self, delay: std::time::Duration) {
        self.connect_delay = Some(delay);
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.fail_connect.take() {
            return Err(TransportError::ConnectionFailed(reason));
        }
        self.connected = true;
        Ok(())
    }

    fn take_inbound(&mut self) -> Option<mpsc::UnboundedReceiver<Bytes>> {
        self.inbound.take()
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let chunk = Bytes::copy_from_slice(data);
        self.written.lock().push(chunk.clone());
        if let Some(echo_tx) = &self.echo_tx {
            let _ = echo_tx.send(chunk);
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.connected = false;
        self.inbound = None;
    }

    fn connection_info(&self) -> String {
        if self.echo_tx.is_some() {
            "loopback (echo)".to_string()
        } else {
            "loopback".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_carries_chunks_in_order() {
        let (mut transport, peer) = LoopbackTransport::pair();
        transport.connect().await.unwrap();
        let mut inbound = transport.take_inbound().unwrap();

        assert!(peer.inject(Bytes::from_static(b"one")));
        assert!(peer.inject(Bytes::from_static(b"two")));
        assert_eq!(inbound.recv().await.unwrap(), Bytes::from_static(b"one"));
        assert_eq!(inbound.recv().await.unwrap(), Bytes::from_static(b"two"));

        transport.write(b"hi").await.unwrap();
        assert_eq!(peer.written(), vec![Bytes::from_static(b"hi")]);
    }

    #[tokio::test]
    async fn test_echo_reflects_writes() {
        let mut transport = LoopbackTransport::echo();
        transport.connect().await.unwrap();
        let mut inbound = transport.take_inbound().unwrap();
        transport.write(b"ping").await.unwrap();
        assert_eq!(inbound.recv().await.unwrap(), Bytes::from_static(b"ping"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut transport, _peer) = LoopbackTransport::pair();
        transport.connect().await.unwrap();
        transport.close().await;
        transport.close().await;
        assert!(transport.write(b"x").await.is_err());
    }
}
