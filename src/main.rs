//! Blueterm - Bluetooth LE serial terminal
//!
//! Connects to a BLE peripheral speaking the Nordic UART Service and mirrors
//! the session log onto the terminal: stdin lines are sent, inbound bytes are
//! rendered with the configured encoding and newline convention.

use anyhow::Result;
use blueterm_core::{
    config, shared_log, BleTransport, BluetoothConfig, ConnectionState, EncodingMode,
    LoopbackTransport, NewlineMode, Session, SessionEvent, SessionSettings, TextTag,
};
use clap::{Parser, ValueEnum};
use std::io::Write;
use tokio::io::AsyncBufReadExt;

/// Line ending style
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LineEnding {
    /// CR+LF (Windows, most modems)
    Crlf,
    /// LF only (Unix)
    Lf,
    /// CR only (old Mac)
    Cr,
    /// No line ending
    None,
}

impl From<LineEnding> for NewlineMode {
    fn from(value: LineEnding) -> Self {
        match value {
            LineEnding::Crlf => NewlineMode::CrLf,
            LineEnding::Lf => NewlineMode::Lf,
            LineEnding::Cr => NewlineMode::Cr,
            LineEnding::None => NewlineMode::None,
        }
    }
}

/// Blueterm CLI
#[derive(Parser, Debug)]
#[command(
    name = "blueterm",
    version,
    about = "Bluetooth LE serial terminal",
    long_about = None
)]
struct Cli {
    /// Device name or address to connect to
    #[arg(short, long, required_unless_present = "loopback")]
    device: Option<String>,

    /// Line ending appended to sends (overrides saved settings)
    #[arg(short, long, value_enum)]
    newline: Option<LineEnding>,

    /// Interpret input and display output as hex digit pairs
    #[arg(long)]
    hex: bool,

    /// Send final dictation results immediately
    #[arg(long)]
    auto_submit: bool,

    /// Talk to an in-memory echo device instead of BLE (demo mode)
    #[arg(long)]
    loopback: bool,
}

fn color(tag: TextTag) -> &'static str {
    match tag {
        TextTag::Sent => "\x1b[32m",
        TextTag::Received => "\x1b[0m",
        TextTag::Status => "\x1b[36m",
    }
}

/// Mirror one session event onto the terminal
fn render_event(event: &SessionEvent, out: &mut impl Write) -> std::io::Result<()> {
    match event {
        SessionEvent::LogAppended(run) => {
            write!(out, "{}{}\x1b[0m", color(run.tag), run.text)?;
        }
        SessionEvent::LogTrimmed(chars) => {
            // backspace-erase so the split-CRLF correction works on a TTY
            for _ in 0..*chars {
                write!(out, "\x08 \x08")?;
            }
        }
        SessionEvent::LogCleared => {
            write!(out, "\x1b[2J\x1b[H")?;
        }
        SessionEvent::StateChanged(_) | SessionEvent::DraftChanged(_) => {}
    }
    out.flush()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    config::init_directories()?;
    let mut settings = SessionSettings::load().unwrap_or_default();
    if let Some(newline) = cli.newline {
        settings.newline = newline.into();
    }
    if cli.hex {
        settings.encoding = EncodingMode::Hex;
    }
    if cli.auto_submit {
        settings.auto_submit_dictation = true;
    }

    let log = shared_log();
    let session = if cli.loopback {
        Session::spawn(LoopbackTransport::echo(), log.clone(), settings)
    } else {
        let device = cli.device.unwrap_or_default();
        tracing::info!(%device, "starting blueterm v{}", env!("CARGO_PKG_VERSION"));
        Session::spawn(
            BleTransport::new(BluetoothConfig {
                device,
                ..Default::default()
            }),
            log.clone(),
            settings,
        )
    };

    let mut events = session.subscribe();
    session.connect();

    let mut stdout = std::io::stdout();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => session.send(line),
                None => {
                    // stdin closed; hang up and stop
                    session.disconnect();
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    render_event(&event, &mut stdout)?;
                    // no event is emitted for the initial state, so any
                    // Disconnected here means the session ended
                    if matches!(event, SessionEvent::StateChanged(ConnectionState::Disconnected)) {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    }

    Ok(())
}
