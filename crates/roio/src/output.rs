use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use roio_wire::Message;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
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
struct DeliveryOutput {
    kind: &'static str,
    channel: u8,
    transaction_id: u32,
    timestamp_ms: u64,
    size: usize,
    payload: String,
}

impl DeliveryOutput {
    fn new(msg: &Message) -> Self {
        Self {
            kind: "delivery",
            channel: msg.channel_id,
            transaction_id: msg.transaction_id,
            timestamp_ms: msg.timestamp_ms,
            size: msg.body.len(),
            payload: msg.body_preview(),
        }
    }
}

#[derive(Serialize)]
struct PublishOutput<'a> {
    kind: &'static str,
    channel: u16,
    size: usize,
    acknowledged: bool,
    mode: &'a str,
}

/// Render one delivered publish.
pub fn render_delivery(msg: &Message, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Json => {
            let out = DeliveryOutput::new(msg);
            let mut line = serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string());
            line.push('\n');
            line.into_bytes()
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "TID", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    msg.channel_id.to_string(),
                    msg.transaction_id.to_string(),
                    msg.body.len().to_string(),
                    msg.body_preview(),
                ]);
            format!("{table}\n").into_bytes()
        }
        OutputFormat::Pretty => format!(
            "[ch {}] {} ({} bytes, tid={})\n",
            msg.channel_id,
            msg.body_preview(),
            msg.body.len(),
            msg.transaction_id
        )
        .into_bytes(),
        OutputFormat::Raw => msg.body.to_vec(),
    }
}

pub fn print_delivery(msg: &Message, format: OutputFormat) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(&render_delivery(msg, format));
    let _ = out.flush();
}

pub fn print_publish(
    channel: u16,
    size: usize,
    acknowledged: bool,
    no_ack: bool,
    format: OutputFormat,
) {
    let mode = if no_ack { "fire-and-forget" } else { "acknowledged" };
    match format {
        OutputFormat::Json => {
            let out = PublishOutput {
                kind: "publish",
                channel,
                size,
                acknowledged,
                mode,
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
                .set_header(vec!["CHANNEL", "SIZE", "MODE", "ACKNOWLEDGED"])
                .add_row(vec![
                    channel.to_string(),
                    size.to_string(),
                    mode.to_string(),
                    acknowledged.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let verdict = if acknowledged { "ok" } else { "not acknowledged" };
            println!("publish to channel {channel} ({size} bytes): {verdict}");
        }
        OutputFormat::Raw => {}
    }
}
