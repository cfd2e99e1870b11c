//! histfetch: log in through a TDLib bridge and dump one chat's history.
//!
//! Usage:
//!   histfetch <chat_id> [secrets.json]
//!
//! Messages are written to stdout, one JSON object per line, newest first.
//! Login codes and device confirmations are asked of the operator `user_id`
//! through the bot `bot_token`; reply to the bot's message to answer.
//!
//! Press Ctrl+C, or create the stop marker (`data/stop` by default), to stop.

use std::io::{self, Write};

use histfetch_client::relay::{self, Relay, RelaySettings};
use histfetch_client::{Config, Fetcher, HistorySink, HttpBotApi, ProcessChannel};
use histfetch_types::Message;
use serde_json::json;

const DEFAULT_SECRETS: &str = "data/secrets.json";
const DEFAULT_LOG_FILTER: &str = "histfetch=info,histfetch_client=info";

#[tokio::main]
async fn main() {
    // Logs go to stderr; RUST_LOG overrides the default filter.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER)).init();

    if let Err(e) = run().await {
        eprintln!("✗ {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let chat_id: i64 = match args.next() {
        Some(raw) => raw.parse().map_err(|e| format!("invalid chat id {raw:?}: {e}"))?,
        None      => return Err("usage: histfetch <chat_id> [secrets.json]".into()),
    };
    let secrets = args.next().unwrap_or_else(|| DEFAULT_SECRETS.to_owned());

    let config = Config::load(&secrets)?;
    log::info!("[histfetch] Loaded {secrets}: {config:?}");

    let channel = ProcessChannel::spawn(&config.bridge)?;
    let api     = HttpBotApi::new(&config.bot_api_base, &config.bot_token)?;

    let (prompter, inbox) = relay::prompt_channel();
    let relay = Relay::new(api, RelaySettings::from(&config), inbox).spawn();

    let mut fetcher = Fetcher::new(config, channel, prompter, NdjsonSink::default());

    let shutdown = fetcher.shutdown_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("[histfetch] Ctrl+C received, stopping");
            shutdown.request();
        }
    });

    fetcher.run(chat_id, relay).await;
    Ok(())
}

// ─── NDJSON output ────────────────────────────────────────────────────────────

#[derive(Default)]
struct NdjsonSink {
    broken: bool,
}

impl HistorySink for NdjsonSink {
    fn on_message(&mut self, m: &Message) {
        if let Err(e) = writeln!(io::stdout().lock(), "{}", ndjson_line(m)) {
            if !self.broken {
                log::warn!("[histfetch] Cannot write to stdout: {e}");
                self.broken = true;
            }
        }
    }
}

/// One compact JSON object describing `m`, without the trailing newline.
fn ndjson_line(m: &Message) -> String {
    json!({
        "id":                m.id,
        "chat_id":           m.chat_id,
        "date":              m.date,
        "edit_date":         m.edit_date,
        "message_thread_id": m.message_thread_id,
        "sender":            m.sender_id,
        "reply_to":          m.reply_to,
        "content":           m.content,
    })
    .to_string()
}
