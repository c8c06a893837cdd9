//! Session management
//!
//! A session owns the connection state machine, the decode state and the
//! draft, and funnels every mutation through one task consuming a single
//! serialized event queue: commands from the UI side, link events from the
//! transport side. Failures never propagate to the UI as faults; each one
//! becomes a status-tagged log line plus a state transition.

use crate::config::SessionSettings;
use crate::core::codec::{self, DecodeState};
use crate::core::dictation::DictationEvent;
use crate::core::render::{LineRenderer, StyledRun, TextTag};
use crate::core::state::{ConnectionMachine, ConnectionState};
use crate::core::transport::Transport;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Events broadcast to session observers
///
/// Log events mirror the render operations applied to the renderer, so a
/// remote front-end can reproduce the display without sharing the log.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Connection state changed; sending and dictation are available iff
    /// the new state is `Connected`
    StateChanged(ConnectionState),
    /// A run was appended to the log
    LogAppended(StyledRun),
    /// The last `n` characters were retroactively removed (split-CRLF fix)
    LogTrimmed(usize),
    /// The log was cleared
    LogCleared,
    /// The outbound draft changed
    DraftChanged(String),
}

/// Commands accepted by the session task
enum SessionCommand {
    Connect,
    Disconnect,
    Send(String),
    SendDraft,
    SetDraft(String),
    SetNewline(codec::NewlineMode),
    SetEncoding(codec::EncodingMode),
    SetAutoSubmit(bool),
    Dictation(DictationEvent),
    ClearLog,
}

/// Events from the transport side, serialized into the session queue
enum LinkEvent {
    ConnectResult {
        epoch: u64,
        transport: Box<dyn Transport>,
        result: Result<(), crate::core::transport::TransportError>,
    },
    Data {
        epoch: u64,
        chunk: Bytes,
    },
    Closed {
        epoch: u64,
        reason: String,
    },
}

/// Handle to a running session
pub struct Session {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
    state: Arc<RwLock<ConnectionState>>,
    task: tokio::task::JoinHandle<()>,
}

impl Session {
    /// Spawn a session over the given transport, rendering into `renderer`
    pub fn spawn<T, R>(transport: T, renderer: R, settings: SessionSettings) -> Self
    where
        T: Transport + 'static,
        R: LineRenderer + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(1024);
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));

        let worker = SessionWorker {
            machine: ConnectionMachine::new(),
            decode: DecodeState::default(),
            settings,
            draft: String::new(),
            renderer,
            transport: Some(Box::new(transport)),
            event_tx: event_tx.clone(),
            state: state.clone(),
        };
        let task = tokio::spawn(worker.run(cmd_rx));

        Self {
            cmd_tx,
            event_tx,
            state,
            task,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Check if sending (and dictation) is currently available
    pub fn can_send(&self) -> bool {
        self.state().can_send()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Start a connect attempt
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Connect);
    }

    /// Disconnect; idempotent, safe in any state, cancels an in-flight
    /// connect attempt
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Disconnect);
    }

    /// Submit text for sending
    pub fn send(&self, text: impl Into<String>) {
        let _ = self.cmd_tx.send(SessionCommand::Send(text.into()));
    }

    /// Submit the current draft for sending
    pub fn send_draft(&self) {
        let _ = self.cmd_tx.send(SessionCommand::SendDraft);
    }

    /// Replace the outbound draft
    pub fn set_draft(&self, text: impl Into<String>) {
        let _ = self.cmd_tx.send(SessionCommand::SetDraft(text.into()));
    }

    /// Change the newline convention; takes effect on the next operation
    pub fn set_newline(&self, newline: codec::NewlineMode) {
        let _ = self.cmd_tx.send(SessionCommand::SetNewline(newline));
    }

    /// Switch between text and hex; clears the outbound draft
    pub fn set_encoding(&self, encoding: codec::EncodingMode) {
        let _ = self.cmd_tx.send(SessionCommand::SetEncoding(encoding));
    }

    /// Toggle dictation auto-submit
    pub fn set_auto_submit(&self, enabled: bool) {
        let _ = self.cmd_tx.send(SessionCommand::SetAutoSubmit(enabled));
    }

    /// Feed a dictation result into the session
    pub fn dictation(&self, event: DictationEvent) {
        let _ = self.cmd_tx.send(SessionCommand::Dictation(event));
    }

    /// Clear the render log
    pub fn clear_log(&self) {
        let _ = self.cmd_tx.send(SessionCommand::ClearLog);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct SessionWorker<R: LineRenderer> {
    machine: ConnectionMachine,
    decode: DecodeState,
    settings: SessionSettings,
    draft: String,
    renderer: R,
    // absent while a connect attempt owns it
    transport: Option<Box<dyn Transport>>,
    event_tx: broadcast::Sender<SessionEvent>,
    state: Arc<RwLock<ConnectionState>>,
}

impl<R: LineRenderer> SessionWorker<R> {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>) {
        let (link_tx, mut link_rx) = mpsc::unbounded_channel();
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd, &link_tx).await,
                    // session handle dropped; shut the link down
                    None => break,
                },
                Some(event) = link_rx.recv() => {
                    self.handle_link(event, &mut link_rx, &link_tx).await;
                }
            }
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.close().await;
        }
    }

    async fn handle_command(
        &mut self,
        cmd: SessionCommand,
        link_tx: &mpsc::UnboundedSender<LinkEvent>,
    ) {
        match cmd {
            SessionCommand::Connect => self.begin_connect(link_tx),
            SessionCommand::Disconnect => self.disconnect().await,
            SessionCommand::Send(text) => self.send(&text).await,
            SessionCommand::SendDraft => {
                let draft = self.draft.clone();
                self.send(&draft).await;
            }
            SessionCommand::SetDraft(text) => self.set_draft(text),
            SessionCommand::SetNewline(newline) => {
                self.settings.newline = newline;
            }
            SessionCommand::SetEncoding(encoding) => {
                if self.settings.encoding != encoding {
                    self.settings.encoding = encoding;
                    // a half-typed draft is meaningless in the other mode
                    self.set_draft(String::new());
                }
            }
            SessionCommand::SetAutoSubmit(enabled) => {
                self.settings.auto_submit_dictation = enabled;
            }
            SessionCommand::Dictation(event) => self.dictation(event).await,
            SessionCommand::ClearLog => {
                self.renderer.clear();
                let _ = self.event_tx.send(SessionEvent::LogCleared);
            }
        }
    }

    fn begin_connect(&mut self, link_tx: &mpsc::UnboundedSender<LinkEvent>) {
        let epoch = match self.machine.begin_connect() {
            Ok(epoch) => epoch,
            Err(e) => {
                // caller-ordering bug; ignore rather than fault the UI
                tracing::warn!("connect refused: {e}");
                return;
            }
        };
        let Some(mut transport) = self.transport.take() else {
            tracing::warn!("connect refused: transport busy");
            self.machine.disconnect();
            return;
        };

        self.status("connecting...");
        self.sync_state();

        let link_tx = link_tx.clone();
        tokio::spawn(async move {
            let result = transport.connect().await;
            let _ = link_tx.send(LinkEvent::ConnectResult {
                epoch,
                transport,
                result,
            });
        });
    }

    async fn disconnect(&mut self) {
        self.machine.disconnect();
        if let Some(transport) = self.transport.as_mut() {
            transport.close().await;
        }
        self.sync_state();
    }

    async fn send(&mut self, text: &str) {
        if !self.machine.can_send() {
            self.status("not connected");
            return;
        }
        let encoded = match codec::encode(text, self.settings.encoding, self.settings.newline) {
            Ok(encoded) => encoded,
            Err(e) => {
                // send aborted, draft preserved for correction
                self.status(&e.to_string());
                return;
            }
        };

        self.append(&encoded.echo, TextTag::Sent);
        let write_result = match self.transport.as_mut() {
            Some(transport) => transport.write(&encoded.wire).await,
            None => Err(crate::core::transport::TransportError::NotConnected),
        };
        if let Err(e) = write_result {
            self.io_error(&e.to_string()).await;
        }
    }

    async fn dictation(&mut self, event: DictationEvent) {
        match event {
            DictationEvent::Partial(text) => self.set_draft(text),
            DictationEvent::Final(text) => {
                self.status(&format!("recognized: {text}"));
                self.set_draft(text.clone());
                if self.settings.auto_submit_dictation {
                    self.send(&text).await;
                } else {
                    self.status("dictation staged, press send to transmit");
                }
            }
        }
    }

    async fn handle_link(
        &mut self,
        event: LinkEvent,
        link_rx: &mut mpsc::UnboundedReceiver<LinkEvent>,
        link_tx: &mpsc::UnboundedSender<LinkEvent>,
    ) {
        match event {
            LinkEvent::ConnectResult {
                epoch,
                mut transport,
                result,
            } => {
                if epoch != self.machine.epoch() {
                    // attempt was cancelled while in flight; drop silently
                    transport.close().await;
                    if self.transport.is_none() {
                        self.transport = Some(transport);
                    }
                    return;
                }
                match result {
                    Ok(()) => {
                        let Some(inbound) = transport.take_inbound() else {
                            self.machine.on_connect_error(epoch);
                            self.transport = Some(transport);
                            self.status("connection failed: no inbound channel");
                            self.sync_state();
                            return;
                        };
                        if !self.machine.on_connected(epoch) {
                            transport.close().await;
                            self.transport = Some(transport);
                            return;
                        }
                        self.decode.reset();
                        self.transport = Some(transport);
                        self.status("connected");
                        self.sync_state();
                        spawn_pump(epoch, inbound, link_tx.clone());
                    }
                    Err(e) => {
                        self.transport = Some(transport);
                        if self.machine.on_connect_error(epoch) {
                            self.status(&format!("connection failed: {e}"));
                            self.sync_state();
                        }
                    }
                }
            }
            LinkEvent::Data { epoch, chunk } => {
                if epoch != self.machine.epoch() || !self.machine.can_send() {
                    return;
                }
                // drain whatever else is already queued into one batch so
                // the log gets a single append
                let mut chunks = vec![chunk];
                let mut stashed = None;
                while let Ok(next) = link_rx.try_recv() {
                    match next {
                        LinkEvent::Data {
                            epoch: e,
                            chunk: c,
                        } if e == epoch => chunks.push(c),
                        LinkEvent::Data { .. } => {}
                        other => {
                            stashed = Some(other);
                            break;
                        }
                    }
                }
                self.render_inbound(&chunks);
                if let Some(event) = stashed {
                    Box::pin(self.handle_link(event, link_rx, link_tx)).await;
                }
            }
            LinkEvent::Closed { epoch, reason } => {
                if epoch == self.machine.epoch()
                    && self.machine.state() == ConnectionState::Connected
                {
                    self.io_error(&reason).await;
                }
            }
        }
    }

    fn render_inbound(&mut self, chunks: &[Bytes]) {
        let out = codec::decode_batch(
            chunks,
            self.settings.encoding,
            self.settings.newline,
            &mut self.decode,
        );
        if out.trim_chars > 0 {
            self.renderer.delete_last(out.trim_chars);
            let _ = self.event_tx.send(SessionEvent::LogTrimmed(out.trim_chars));
        }
        if !out.text.is_empty() {
            self.append(&out.text, TextTag::Received);
        }
    }

    async fn io_error(&mut self, reason: &str) {
        self.machine.on_io_error();
        self.status(&format!("connection lost: {reason}"));
        if let Some(transport) = self.transport.as_mut() {
            transport.close().await;
        }
        self.sync_state();
    }

    fn set_draft(&mut self, text: String) {
        self.draft = text;
        let _ = self
            .event_tx
            .send(SessionEvent::DraftChanged(self.draft.clone()));
    }

    fn status(&mut self, message: &str) {
        self.append(&format!("{message}\n"), TextTag::Status);
    }

    fn append(&mut self, text: &str, tag: TextTag) {
        self.renderer.append(text, tag);
        let _ = self.event_tx.send(SessionEvent::LogAppended(StyledRun {
            text: text.to_string(),
            tag,
        }));
    }

    fn sync_state(&mut self) {
        let state = self.machine.state();
        let changed = {
            let mut mirror = self.state.write();
            let changed = *mirror != state;
            *mirror = state;
            changed
        };
        if changed {
            let _ = self.event_tx.send(SessionEvent::StateChanged(state));
        }
    }
}

/// Forward inbound chunks into the session queue, preserving receive order
fn spawn_pump(epoch: u64, mut inbound: mpsc::UnboundedReceiver<Bytes>, link_tx: mpsc::UnboundedSender<LinkEvent>) {
    tokio::spawn(async move {
        while let Some(chunk) = inbound.recv().await {
            if link_tx.send(LinkEvent::Data { epoch, chunk }).is_err() {
                return;
            }
        }
        let _ = link_tx.send(LinkEvent::Closed {
            epoch,
            reason: "read channel closed".to_string(),
        });
    });
}
