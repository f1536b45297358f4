use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use netcomm_frame::Value;
use netcomm_peer::ConnectionConfig;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod demo;
pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a single frame.
    Send(SendArgs),
    /// Listen and print received frames.
    Listen(ListenArgs),
    /// Start an echo server.
    Echo(EchoArgs),
    /// Run the loopback demo: UDP self-cast plus a TCP client and server.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub format: OutputFormat,
    pub connection: ConnectionConfig,
}

pub fn run(command: Command, ctx: &RunContext) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, ctx),
        Command::Listen(args) => listen::run(args, ctx),
        Command::Echo(args) => echo::run(args, ctx),
        Command::Demo(args) => demo::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination address (host:port).
    pub addr: String,
    /// Send one UDP datagram instead of connecting over TCP.
    #[arg(long)]
    pub udp: bool,
    /// Command byte, decimal or 0x-prefixed hex.
    #[arg(long, short = 'c', default_value = "0x88", value_parser = parse_command)]
    pub command: i64,
    /// Typed value as KIND:VALUE (int, float, bool, str, bytes). Repeatable.
    #[arg(long = "arg", short = 'a', value_name = "KIND:VALUE")]
    pub values: Vec<Value>,
    /// Wait for one reply frame and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to listen on (host:port).
    pub addr: String,
    /// Bind a UDP socket instead of a TCP listener.
    #[arg(long)]
    pub udp: bool,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to listen on (host:port).
    pub addr: String,
    /// Echo UDP datagrams back to their sender instead of serving TCP.
    #[arg(long)]
    pub udp: bool,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Host for the UDP socket and the TCP listener.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    /// Port shared by the UDP socket and the TCP listener. 0 picks free ports.
    #[arg(long, default_value_t = 10001)]
    pub port: u16,
    /// Delay between rounds (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Stop after N rounds. Runs until interrupted by default.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a command byte given in decimal or `0x` hex. Range is checked when
/// the frame is encoded.
pub fn parse_command(input: &str) -> Result<i64, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => input.parse::<i64>(),
    };
    parsed.map_err(|_| format!("invalid command '{input}'"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
