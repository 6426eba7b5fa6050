use crate::agent::create_agent;
use crate::chatlog::{ChatLogEntry, LogStore};
use crate::config::Config;
use crate::settings::{AppSettings, DESCRIPTION_KEY, SettingsStore, TITLE_KEY};
use crate::summary;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

mod chat;

/// Teaching and learning companion with persisted chat logs.
#[derive(Parser)]
#[command(name = "chergpt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "CHERGPT_CONFIG", default_value = "config.toml")]
    pub config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat
    Chat {
        /// Continue an existing conversation
        #[arg(long)]
        conversation_id: Option<String>,
    },
    /// Create the tables if they do not exist
    Init,
    /// Print every chat log
    List {
        /// Print as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Print chat logs from the last few hours
    Recent {
        /// Window size, at most a century
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..=876_000))]
        hours: i64,
    },
    /// Export every chat log as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Delete every chat log
    DeleteAll,
    /// Drop the chat log table
    DropSchema,
    /// Summarize each conversation and print the report
    Summarize,
    /// Ask the model how students could ask better questions
    Insights,
    /// Show or edit the displayed title, description and instructions
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Print the current settings
    Show,
    SetTitle { title: String },
    SetDescription { description: String },
    SetInstructions { instructions: String },
}

pub(crate) fn default_settings(config: &Config) -> AppSettings {
    AppSettings {
        title: config.title.clone(),
        description: config.description.clone(),
        instructions: None,
    }
}

/// Creates any missing tables. Runs before every subcommand.
async fn init_storage(store: &LogStore, settings: &SettingsStore) -> Result<()> {
    store
        .ensure_schema()
        .await
        .context("Failed to initialize chat log table")?;
    settings
        .ensure_schema()
        .await
        .context("Failed to initialize settings table")?;
    Ok(())
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let store = LogStore::new(&config.database_url, config.timezone);
    let settings = SettingsStore::new(&config.database_url);
    init_storage(&store, &settings).await?;

    match cli.command {
        Commands::Chat { conversation_id } => {
            let agent = create_agent(config.clone()).await?;
            chat::run(&config, agent.as_ref(), &store, &settings, conversation_id.as_deref())
                .await?;
        }
        Commands::Init => info!("Database initialized"),
        Commands::List { json } => print_entries(&store.fetch_all().await?, json)?,
        Commands::Recent { hours } => {
            let entries = store.fetch_recent(chrono::Duration::hours(hours)).await?;
            print_entries(&entries, false)?;
        }
        Commands::Export { output } => {
            let bytes = store.export_csv().await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path))?;
                    info!("Exported chat logs to {}", path);
                }
                None => {
                    use tokio::io::AsyncWriteExt;
                    tokio::io::stdout().write_all(&bytes).await?;
                }
            }
        }
        Commands::DeleteAll => {
            let deleted = store.delete_all().await?;
            println!("Deleted {} chat logs", deleted);
        }
        Commands::DropSchema => {
            store.drop_schema().await?;
            println!("Chat log table dropped");
        }
        Commands::Summarize => {
            let agent = create_agent(config.clone()).await?;
            let batches = summary::batch_by_conversation(&store).await?;
            let summaries = summary::summarize(&batches, agent.as_ref()).await;
            print!("{}", summary::compile(&summaries));
        }
        Commands::Insights => {
            let agent = create_agent(config.clone()).await?;
            let entries = store.fetch_all().await?;
            if entries.is_empty() {
                println!("No chat logs yet.");
            } else {
                println!("{}", summary::generate_insights(&entries, agent.as_ref()).await);
            }
        }
        Commands::Admin { action } => run_admin(action, &config, &settings).await?,
    }

    Ok(())
}

async fn run_admin(action: AdminAction, config: &Config, settings: &SettingsStore) -> Result<()> {
    match action {
        AdminAction::Show => {
            let current = settings.load(&default_settings(config)).await?;
            println!("Title: {}", current.title);
            println!("Description: {}", current.description);
            println!(
                "Instructions: {}",
                current.instructions.as_deref().unwrap_or("(default)")
            );
        }
        AdminAction::SetTitle { title } => settings.set(TITLE_KEY, &title).await?,
        AdminAction::SetDescription { description } => {
            settings.set(DESCRIPTION_KEY, &description).await?
        }
        AdminAction::SetInstructions { instructions } => {
            settings.update_instructions(&instructions).await?
        }
    }
    Ok(())
}

fn print_entries(entries: &[ChatLogEntry], json: bool) -> Result<()> {
    if entries.is_empty() {
        println!("No chat logs.");
        return Ok(());
    }

    for entry in entries {
        if json {
            let line = serde_json::json!({
                "id": entry.id,
                "timestamp": entry.timestamp.to_rfc3339(),
                "prompt": entry.prompt,
                "response": entry.response,
                "conversation_id": entry.conversation_id.to_string(),
            });
            println!("{}", serde_json::to_string(&line)?);
        } else {
            println!(
                "[{}] #{} ({})\n{}\n",
                entry.format_timestamp(),
                entry.id,
                entry.conversation_id,
                entry.format_for_context()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite_url;

    #[tokio::test]
    async fn storage_init_survives_repeated_runs() {
        let dir = tempfile::tempdir().unwrap();
        let url = sqlite_url(&dir.path().join("chergpt.db"));
        let store = LogStore::new(&url, chrono_tz::Asia::Singapore);
        let settings = SettingsStore::new(&url);

        init_storage(&store, &settings).await.unwrap();
        store.insert("hello", "world", None).await.unwrap();
        init_storage(&store, &settings).await.unwrap();

        assert_eq!(store.fetch_all().await.unwrap().len(), 1);
    }

    #[test]
    fn recent_hours_are_bounded() {
        let parsed = Cli::try_parse_from(["chergpt", "recent", "--hours", "48"]);
        assert!(matches!(
            parsed.map(|cli| cli.command),
            Ok(Commands::Recent { hours: 48 })
        ));

        assert!(Cli::try_parse_from(["chergpt", "recent", "--hours", "3000000000000"]).is_err());
        assert!(Cli::try_parse_from(["chergpt", "recent", "--hours", "0"]).is_err());
    }
}
