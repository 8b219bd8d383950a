use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use filewire_rpc::Message;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput {
    operation: String,
    method: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<u32>,
    arguments_size: usize,
    arguments: String,
    timestamp: String,
}

pub fn print_message(message: &Message, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                operation: message.operation().to_string(),
                method: message.method(),
                correlation_id: message.correlation_id(),
                arguments_size: message.arguments().len(),
                arguments: arguments_preview(message.arguments()),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Pretty => match message.correlation_id() {
            Some(rid) => println!(
                "{} method={} rid={} size={} arguments={}",
                message.operation(),
                message.method(),
                rid,
                message.arguments().len(),
                arguments_preview(message.arguments())
            ),
            None => println!(
                "{} method={} size={} arguments={}",
                message.operation(),
                message.method(),
                message.arguments().len(),
                arguments_preview(message.arguments())
            ),
        },
        OutputFormat::Raw => print_raw(message.arguments()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn arguments_preview(arguments: &[u8]) -> String {
    match std::str::from_utf8(arguments) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", arguments.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
