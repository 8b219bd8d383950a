use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use filewire_envelope::ByteOrder;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the remote-file RPC service.
    Serve(ServeArgs),
    /// Send a single request or notification.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ByteOrderArg {
    Big,
    Little,
    Native,
}

impl ByteOrderArg {
    pub fn as_order(self) -> ByteOrder {
        match self {
            ByteOrderArg::Big => ByteOrder::Big,
            ByteOrderArg::Little => ByteOrder::Little,
            ByteOrderArg::Native => ByteOrder::Native,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: IpAddr,
    /// Port to bind. Port 0 picks an ephemeral port.
    #[arg(long, default_value_t = filewire_rpc::DEFAULT_PORT)]
    pub port: u16,
    /// Byte order for wire fields.
    #[arg(long, value_name = "ORDER", default_value = "big")]
    pub byte_order: ByteOrderArg,
    /// Router to serve.
    #[arg(long, default_value = "file")]
    pub router: String,
    /// Compute and enforce CRC16 payload checksums.
    #[arg(long)]
    pub crc16: bool,
    /// Discard unresolved external requests after this long (e.g. 30s).
    #[arg(long, value_name = "DURATION")]
    pub pending_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to (host:port).
    pub addr: String,
    /// Method code.
    #[arg(long, short = 'm')]
    pub method: u8,
    /// Send as a notification instead of a request.
    #[arg(long, conflicts_with = "wait")]
    pub notify: bool,
    /// Raw string arguments.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read argument bytes from a file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Byte order for wire fields.
    #[arg(long, value_name = "ORDER", default_value = "big")]
    pub byte_order: ByteOrderArg,
    /// Wait for the correlated response and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
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
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
