//! Connection state machine
//!
//! Tracks the lifecycle of a single terminal session and gates what the
//! session is allowed to do. Connect results arrive asynchronously, so every
//! attempt is stamped with an epoch; results carrying a stale epoch are
//! dropped instead of resurrecting a cancelled session.

use thiserror::Error;

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected (initial state)
    Disconnected,
    /// Connect attempt in progress
    Connecting,
    /// Connected and operational
    Connected,
}

impl ConnectionState {
    /// Check if state allows sending data (and dictation)
    pub fn can_send(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// State machine errors
#[derive(Debug, Error)]
pub enum StateError {
    /// Transition not allowed from the current state
    #[error("invalid transition from {0}")]
    InvalidTransition(ConnectionState),
}

/// Connection state machine with epoch-guarded async results
///
/// The epoch is bumped on every `begin_connect` and `disconnect`, so a
/// connect result that was in flight when the user cancelled carries a stale
/// epoch and is rejected by `on_connected` / `on_connect_error`.
#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    epoch: u64,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMachine {
    /// Create a new machine in `Disconnected`
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            epoch: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get current connect epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Check if sending is allowed
    pub fn can_send(&self) -> bool {
        self.state.can_send()
    }

    /// Start a connect attempt, returning the epoch stamped on it
    ///
    /// Only valid from `Disconnected`; calling it while connecting or
    /// connected is a caller-ordering bug.
    pub fn begin_connect(&mut self) -> Result<u64, StateError> {
        if self.state != ConnectionState::Disconnected {
            return Err(StateError::InvalidTransition(self.state));
        }
        self.epoch += 1;
        self.state = ConnectionState::Connecting;
        Ok(self.epoch)
    }

    /// Handle a successful connect result
    ///
    /// Returns `false` if the result is stale (epoch mismatch or the attempt
    /// was cancelled); the caller must discard it silently.
    pub fn on_connected(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || self.state != ConnectionState::Connecting {
            tracing::debug!(epoch, current = self.epoch, "dropping stale connect result");
            return false;
        }
        self.state = ConnectionState::Connected;
        true
    }

    /// Handle a failed connect result
    ///
    /// Returns `false` if the result is stale and should be discarded.
    pub fn on_connect_error(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || self.state != ConnectionState::Connecting {
            tracing::debug!(epoch, current = self.epoch, "dropping stale connect error");
            return false;
        }
        self.state = ConnectionState::Disconnected;
        true
    }

    /// Handle an I/O error on an established connection
    pub fn on_io_error(&mut self) {
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Disconnect from any state
    ///
    /// Idempotent; also invalidates any in-flight connect attempt.
    pub fn disconnect(&mut self) {
        self.epoch += 1;
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_lifecycle() {
        let mut m = ConnectionMachine::new();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(!m.can_send());

        let epoch = m.begin_connect().unwrap();
        assert_eq!(m.state(), ConnectionState::Connecting);

        assert!(m.on_connected(epoch));
        assert_eq!(m.state(), ConnectionState::Connected);
        assert!(m.can_send());
    }

    #[test]
    fn test_begin_connect_rejected_when_not_disconnected() {
        let mut m = ConnectionMachine::new();
        let epoch = m.begin_connect().unwrap();

        assert!(m.begin_connect().is_err());
        assert_eq!(m.state(), ConnectionState::Connecting);

        assert!(m.on_connected(epoch));
        assert!(m.begin_connect().is_err());
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_disconnect_idempotent_from_any_state() {
        let mut m = ConnectionMachine::new();
        m.disconnect();
        m.disconnect();
        assert_eq!(m.state(), ConnectionState::Disconnected);

        let epoch = m.begin_connect().unwrap();
        m.disconnect();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        // the cancelled attempt's result is now stale
        assert!(!m.on_connected(epoch));
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_error_returns_to_disconnected() {
        let mut m = ConnectionMachine::new();
        let epoch = m.begin_connect().unwrap();
        assert!(m.on_connect_error(epoch));
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_stale_connect_error_ignored() {
        let mut m = ConnectionMachine::new();
        let first = m.begin_connect().unwrap();
        m.disconnect();
        let second = m.begin_connect().unwrap();
        assert!(!m.on_connect_error(first));
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(m.on_connected(second));
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_io_error_drops_connection() {
        let mut m = ConnectionMachine::new();
        let epoch = m.begin_connect().unwrap();
        m.on_connected(epoch);
        m.on_io_error();
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }
}
