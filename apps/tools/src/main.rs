use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::domain::SessionId;
use storage::{SessionStore, Slot, Storage};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/rooftop.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored sessions, most recently updated first.
    Sessions,
    /// Print every slot of a session.
    Show { session: String },
    /// Delete every slot of a session.
    Clear { session: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Sessions => {
            let sessions = storage.list_sessions().await?;
            if sessions.is_empty() {
                println!("no sessions");
            }
            for summary in sessions {
                let slots: Vec<&str> = summary.slots.iter().map(|slot| slot.key()).collect();
                println!(
                    "{}  updated {}  [{}]",
                    summary.session_id,
                    summary.updated_at.to_rfc3339(),
                    slots.join(", ")
                );
            }
        }
        Command::Show { session } => {
            let store = storage.session(SessionId::parse(&session)?);
            for slot in Slot::ALL {
                match store.get(slot).await? {
                    Some(payload) => println!("{slot}:\n{}", pretty(&payload)),
                    None => println!("{slot}: -"),
                }
            }
        }
        Command::Clear { session } => {
            let session_id = SessionId::parse(&session)?;
            let removed = storage.delete_session(&session_id).await?;
            println!("cleared session {session_id} ({removed} slots)");
        }
    }

    Ok(())
}

fn pretty(payload: &str) -> String {
    serde_json::from_str::<serde_json::Value>(payload)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or_else(|_| format!("(unreadable) {payload}"))
}
