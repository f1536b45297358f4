mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;
use netcomm_peer::ConnectionConfig;

use crate::cmd::{parse_duration, Command, RunContext};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "netcomm", version, about = "Framed TCP/UDP messaging CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Time a partially received frame may stall before it is reported.
    #[arg(
        long,
        value_name = "DURATION",
        default_value = "15s",
        env = "NETCOMM_STALL_TIMEOUT",
        global = true
    )]
    stall_timeout: String,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let result = parse_duration(&cli.stall_timeout).and_then(|stall| {
        let ctx = RunContext {
            format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
            connection: ConnectionConfig::default().with_stall_timeout(stall),
        };
        cmd::run(cli.command, &ctx)
    });

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
