use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use netcomm_frame::{Frame, Value};
use netcomm_transport::Protocol;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput {
    protocol: &'static str,
    remote: Option<String>,
    command: u8,
    values: Vec<ValueOutput>,
    timestamp: String,
}

#[derive(Serialize)]
struct ValueOutput {
    kind: &'static str,
    value: serde_json::Value,
}

impl From<&Value> for ValueOutput {
    fn from(value: &Value) -> Self {
        let json = match value {
            Value::Bytes(bytes) => serde_json::Value::String(hex(bytes)),
            Value::Text(text) => serde_json::Value::String(text.clone()),
            Value::Boolean(flag) => serde_json::Value::Bool(*flag),
            Value::Float(v) => serde_json::Number::from_f64(v.get())
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Integer(v) => serde_json::Value::from(v.get()),
        };
        Self {
            kind: value.kind().as_str(),
            value: json,
        }
    }
}

pub fn print_frame(frame: &Frame, remote: Option<SocketAddr>, protocol: Protocol, format: OutputFormat) {
    let remote_text = remote.map(|addr| addr.to_string());
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                protocol: protocol.as_str(),
                remote: remote_text,
                command: frame.command,
                values: frame.values.iter().map(ValueOutput::from).collect(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PROTOCOL", "REMOTE", "COMMAND", "VALUES"])
                .add_row(vec![
                    protocol.as_str().to_string(),
                    remote_text.unwrap_or_else(|| "-".to_string()),
                    format!("0x{:02X}", frame.command),
                    values_preview(&frame.values),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "[{}] {} => {}",
                protocol,
                remote_text.unwrap_or_else(|| "-".to_string()),
                frame
            );
        }
        OutputFormat::Raw => match frame.encode() {
            Ok(bytes) => print_raw(&bytes),
            Err(err) => tracing::warn!(error = %err, "failed to re-encode frame"),
        },
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn values_preview(values: &[Value]) -> String {
    values
        .iter()
        .map(|value| format!("{}:{value}", value.kind()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_output_json_shapes() {
        let bytes = ValueOutput::from(&Value::bytes(vec![0x41, 0x42, 0x43]));
        assert_eq!(bytes.kind, "bytes");
        assert_eq!(bytes.value, serde_json::json!("414243"));

        let int = ValueOutput::from(&Value::integer(-256));
        assert_eq!(int.kind, "int");
        assert_eq!(int.value, serde_json::json!(-256));

        let nan = ValueOutput::from(&Value::float(f64::NAN));
        assert_eq!(nan.value, serde_json::Value::Null);
    }

    #[test]
    fn values_preview_is_typed() {
        let preview = values_preview(&[Value::Boolean(true), Value::text("Hello")]);
        assert_eq!(preview, "bool:true\nstr:Hello");
    }
}
