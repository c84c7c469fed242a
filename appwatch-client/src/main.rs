//! appwatch client — entry point.
//!
//! ```text
//! appwatch-client                          Connect with defaults and watch
//! appwatch-client --server <host:port>     Connect elsewhere
//! appwatch-client -s <a> -s <b>            Watch several servers at once
//! appwatch-client --json                   Print events as JSON lines
//! appwatch-client --key 0x41 --ctrl        Send Ctrl+A to every server, then watch
//! appwatch-client --key 0x53 --ctrl --target notepad.exe
//!                                          Send Ctrl+S to each server whose
//!                                          focused app is notepad.exe
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use appwatch_core::{AppMirror, ChangeEvent, CommandFrame, Modifiers};
use clap::Parser;
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use appwatch_client::config::ClientConfig;
use appwatch_client::connection::{CommandSink, ServerConnection, merge_events, send_command};
use appwatch_client::dispatch::KeyDispatch;
use appwatch_client::display::{OutputFormat, render_event, render_summary};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "appwatch-client", about = "Watch a remote application list")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "appwatch-client.toml")]
    config: PathBuf,

    /// Server address (overrides config); repeat to watch several.
    /// Example: 192.168.1.100:2000
    #[arg(short, long)]
    server: Vec<String>,

    /// Print events as JSON lines.
    #[arg(long)]
    json: bool,

    /// Virtual-key code to send once connected (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_key_code)]
    key: Option<u32>,

    /// Hold Shift while sending `--key`.
    #[arg(long, requires = "key")]
    shift: bool,

    /// Hold Ctrl while sending `--key`.
    #[arg(long, requires = "key")]
    ctrl: bool,

    /// Hold Alt while sending `--key`.
    #[arg(long, requires = "key")]
    alt: bool,

    /// Only send `--key` to servers whose focused application has this
    /// name, once it gets the focus.
    #[arg(long, requires = "key")]
    target: Option<String>,

    /// Log level (overrides config; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn command(&self) -> Option<CommandFrame> {
        let mut modifiers = Modifiers::empty();
        modifiers.set(Modifiers::SHIFT, self.shift);
        modifiers.set(Modifiers::CTRL, self.ctrl);
        modifiers.set(Modifiers::ALT, self.alt);
        self.key.map(|key| CommandFrame::new(modifiers, key))
    }

    fn dispatch(&self) -> Option<KeyDispatch> {
        self.command()
            .map(|frame| KeyDispatch::new(frame, self.target.clone()))
    }

    fn servers(&self, config: &ClientConfig) -> Vec<String> {
        if self.server.is_empty() {
            vec![config.network.server_address.clone()]
        } else {
            self.server.clone()
        }
    }
}

/// One watched server.
struct Remote {
    peer: SocketAddr,
    mirror: AppMirror,
    commands: CommandSink,
    open: bool,
}

impl Remote {
    fn label(&self, labelled: bool) -> Option<String> {
        labelled.then(|| self.peer.to_string())
    }

    /// Hand this server the pending command if it is due.
    async fn offer(&mut self, index: usize, dispatch: &mut Option<KeyDispatch>) {
        let Some(frame) = dispatch.as_mut().and_then(|d| d.take(index, &self.mirror)) else {
            return;
        };
        match send_command(&mut self.commands, frame).await {
            Ok(()) => info!(peer = %self.peer, key_code = frame.key_code, "command sent"),
            Err(e) => warn!(peer = %self.peer, "command not sent: {e}"),
        }
    }
}

fn parse_key_code(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid key code {s:?}: {e}"))
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = ClientConfig::load(&cli.config);
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.output.json |= cli.json;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("appwatch-client v{}", env!("CARGO_PKG_VERSION"));
    let format = OutputFormat::from_json_flag(config.output.json);

    let timeout = Duration::from_millis(config.network.timeout_ms);
    let mut remotes = Vec::new();
    let mut streams = Vec::new();
    for addr in cli.servers(&config) {
        let conn = match ServerConnection::connect(&addr, timeout).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("cannot connect to {addr}: {e}");
                continue;
            }
        };
        info!("connected to {}", conn.peer());
        let peer = conn.peer();
        let (events, commands) = conn.split();
        streams.push(events);
        remotes.push(Remote {
            peer,
            mirror: AppMirror::new(),
            commands,
            open: true,
        });
    }
    if remotes.is_empty() {
        return Err("no server could be reached".into());
    }

    let labelled = remotes.len() > 1;
    let mut dispatch = cli.dispatch();
    for (index, remote) in remotes.iter_mut().enumerate() {
        remote.offer(index, &mut dispatch).await;
    }

    let mut events = merge_events(streams);

    loop {
        let (index, next) = tokio::select! {
            Some(tagged) = events.next() => tagged,
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, disconnecting");
                break;
            }
            else => break,
        };
        let remote = &mut remotes[index];

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                // The framing is lost; ignore the rest of this server's stream.
                warn!(peer = %remote.peer, "change stream broken: {e}");
                remote.open = false;
                continue;
            }
            None => {
                if remote.open {
                    info!(peer = %remote.peer, "server closed the connection");
                    remote.open = false;
                }
                if remotes.iter().all(|r| !r.open) {
                    break;
                }
                continue;
            }
        };
        if !remote.open {
            continue;
        }

        let removed_name = match &event {
            ChangeEvent::Remove { pid } => remote.mirror.get(*pid).map(|app| app.name.clone()),
            _ => None,
        };
        let label = remote.label(labelled);
        println!(
            "{}",
            render_event(&event, removed_name.as_deref(), label.as_deref(), format)
        );
        remote.mirror.apply(event);
        remote.offer(index, &mut dispatch).await;
    }

    if let Some(dispatch) = &dispatch {
        if dispatch.delivered() == 0 {
            match dispatch.target() {
                Some(target) => warn!("no server had {target} focused; command not sent"),
                None => warn!("command not sent"),
            }
        }
    }

    let now = Instant::now();
    for remote in &remotes {
        let label = remote.label(labelled);
        print!("{}", render_summary(&remote.mirror, label.as_deref(), now, format));
        if format == OutputFormat::Json {
            println!();
        }
    }

    Ok(())
}
