use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use notify_dlq::{get_entry, list_entries, replay_entries, DlqEntry};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(author, version, about = "Notification dead-letter inspection CLI")]
struct Cli {
    /// Emit JSON output
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List dead-lettered notifications
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show a dead-letter entry by stream sequence id
    Show {
        #[arg()]
        sequence: u64,
    },
    /// Replay dead-lettered notifications back onto their channel's queue
    Replay {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Serialize)]
struct ListEntry {
    sequence: u64,
    channel: String,
    user_id: String,
    msg_id: String,
    code: String,
    retries: u32,
    ts: String,
}

#[derive(Serialize)]
struct ShowEntry<'a> {
    sequence: u64,
    record: &'a notify_dlq::DlqRecord,
}

#[derive(Serialize)]
struct ReplayResult {
    processed: Vec<ListEntry>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let nats_url = std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".into());
    let client = async_nats::connect(nats_url).await?;

    match cli.command {
        Commands::List { limit } => {
            let entries = list_entries(&client, limit).await?;
            if cli.json {
                let payload: Vec<_> = entries.iter().map(list_entry).collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if entries.is_empty() {
                println!("No dead-lettered notifications");
            } else {
                print_table(&entries);
            }
        }
        Commands::Show { sequence } => {
            let Some(entry) = get_entry(&client, sequence).await? else {
                bail!("dead-letter entry {sequence} not found");
            };
            if cli.json {
                let payload = ShowEntry { sequence, record: &entry.record };
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("sequence: {}", sequence);
                println!("code    : {}", entry.record.error.code);
                println!("message : {}", entry.record.error.message);
                println!("timestamp: {}", entry.record.ts);
                match &entry.record.message {
                    Some(message) => {
                        println!("channel : {}", message.channel);
                        println!("user_id : {}", message.user_id);
                        println!("msg_id  : {}", message.id);
                        println!("retries : {}", message.retry_count);
                        println!("payload : {}", serde_json::to_string_pretty(&message.payload)?);
                    }
                    None => {
                        println!("channel : <undecodable delivery, no message>");
                        println!("raw     : {}", entry.record.raw.as_deref().unwrap_or(""));
                    }
                }
            }
        }
        Commands::Replay { limit } => {
            let processed = replay_entries(&client, limit).await?;
            if cli.json {
                let payload = ReplayResult { processed: processed.iter().map(list_entry).collect() };
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if processed.is_empty() {
                println!("No dead-letter entries to replay");
            } else {
                println!("Replayed {} entries", processed.len());
                print_table(&processed);
            }
        }
    }

    Ok(())
}

fn list_entry(entry: &DlqEntry) -> ListEntry {
    match &entry.record.message {
        Some(message) => ListEntry {
            sequence: entry.sequence,
            channel: message.channel.to_string(),
            user_id: message.user_id.clone(),
            msg_id: message.id.to_string(),
            code: entry.record.error.code.clone(),
            retries: message.retry_count,
            ts: entry.record.ts.clone(),
        },
        None => ListEntry {
            sequence: entry.sequence,
            channel: "?".into(),
            user_id: "?".into(),
            msg_id: "<undecodable>".into(),
            code: entry.record.error.code.clone(),
            retries: 0,
            ts: entry.record.ts.clone(),
        },
    }
}

fn print_table(entries: &[DlqEntry]) {
    println!("{:<8} {:<8} {:<10} {:<36} {:<14} {:<6} {:<}", "SEQ", "CHANNEL", "USER", "MSG_ID", "CODE", "RETRY", "TS");
    for entry in entries {
        let row = list_entry(entry);
        println!(
            "{:<8} {:<8} {:<10} {:<36} {:<14} {:<6} {}",
            row.sequence, row.channel, row.user_id, row.msg_id, row.code, row.retries, row.ts
        );
    }
}
