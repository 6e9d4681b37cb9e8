//! scalectl - serial weighing scale reader
//!
//! Detects how a scale on a serial port is configured, reads its weight and
//! prints each result as one JSON line on stdout. Diagnostics go to stderr
//! (`RUST_LOG` controls verbosity).
//!
//! Every invocation is its own process, so a connection made by `connect`
//! lives only as long as that command runs. `read <port>` and
//! `read-continuous <port>` connect on their own.

mod output;
mod settings;

use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use scale_detect::{PortScanner, SerialOpener};
use scale_session::{CancelToken, ConnectionManager, PollLoop};
use tracing::{info, warn};

use crate::output::Response;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "scalectl")]
#[command(about = "Detect and read serial weighing scales", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports that may have a scale attached
    ListPorts,

    /// Probe a port for a working configuration and take a first reading
    Connect {
        /// Serial port (e.g. /dev/ttyUSB0, COM3)
        #[arg(required_unless_present = "any", conflicts_with = "any")]
        port: Option<String>,

        /// Try every listed port and keep the first that connects
        #[arg(long)]
        any: bool,
    },

    /// Take one reading, connecting to PORT first when given
    Read {
        port: Option<String>,
    },

    /// Read repeatedly until interrupted (Ctrl-C)
    ReadContinuous {
        port: Option<String>,
    },

    /// Open, read and close a port without keeping a connection
    ReadOnce {
        port: String,

        /// Baud rate to try first (8N1)
        #[arg(long)]
        baud: Option<u32>,

        /// Read timeout in seconds for the preferred baud rate
        #[arg(long, value_parser = parse_seconds)]
        timeout: Option<Duration>,
    },

    /// Close the active connection
    Close,
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value.parse().map_err(|_| format!("not a number: {value}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scalectl=info,scale_detect=info,scale_session=info".into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load();
    let mut manager = ConnectionManager::with_config(SerialOpener, settings.session_config());

    match cli.command {
        Command::ListPorts => list_ports(),
        Command::Connect { port, any } => {
            connect(&mut manager, if any { None } else { port.as_deref() })
        }
        Command::Read { port } => read(&mut manager, port.as_deref()),
        Command::ReadContinuous { port } => {
            read_continuous(&mut manager, port.as_deref(), &settings)
        }
        Command::ReadOnce {
            port,
            baud,
            timeout,
        } => read_once(&mut manager, &port, baud, timeout),
        Command::Close => {
            manager.close();
            Response::closed().emit()
        }
    }
}

fn list_ports() -> anyhow::Result<()> {
    match PortScanner::new().enumerate_ports() {
        Ok(ports) => Response::Ports(ports).emit(),
        Err(e) => Response::failure(&e.into(), None).emit(),
    }
}

/// Connect to `port`, or to the first listed port that connects (`--any`)
fn connect(manager: &mut ConnectionManager<SerialOpener>, port: Option<&str>) -> anyhow::Result<()> {
    let result = match port {
        Some(port) => manager.connect(port),
        None => {
            let ports = match PortScanner::new().enumerate_ports() {
                Ok(ports) => ports,
                Err(e) => return Response::failure(&e.into(), None).emit(),
            };
            manager.connect_first(ports.iter().map(|p| p.device.as_str()))
        }
    };

    match result {
        Ok(outcome) => Response::connected(&outcome).emit(),
        Err(e) => Response::failure(&e, port).emit(),
    }
}

fn read(manager: &mut ConnectionManager<SerialOpener>, port: Option<&str>) -> anyhow::Result<()> {
    match manager.read_port(port) {
        Ok(result) => Response::reading(&result).emit(),
        Err(e) => Response::failure(&e, port).emit(),
    }
}

fn read_continuous(
    manager: &mut ConnectionManager<SerialOpener>,
    port: Option<&str>,
    settings: &Settings,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        if let Err(e) = manager.connect(port) {
            return Response::failure(&e, Some(port)).emit();
        }
    }

    let cancel = CancelToken::new();
    watch_interrupt(cancel.clone());

    let mut write_error = None;
    PollLoop::with_config(settings.poll_config()).run(manager, &cancel, |event| {
        if let Err(e) = Response::poll_event(&event).emit() {
            write_error = Some(e);
            cancel.cancel();
        }
    });

    manager.close();
    write_error.map_or(Ok(()), Err)
}

fn read_once(
    manager: &mut ConnectionManager<SerialOpener>,
    port: &str,
    baud: Option<u32>,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    match manager.read_once(port, baud, timeout) {
        Ok(shot) => Response::one_shot(&shot).emit(),
        Err(e) => Response::failure(&e, Some(port)).emit(),
    }
}

/// Cancel `token` when the process receives Ctrl-C
fn watch_interrupt(token: CancelToken) {
    let spawned = thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Interrupt handling unavailable: {}", e);
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, stopping");
                    token.cancel();
                }
            });
        });

    if let Err(e) = spawned {
        warn!("Failed to start interrupt watcher: {}", e);
    }
}
