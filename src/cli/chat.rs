use super::default_settings;
use crate::agent::{Agent, StreamEvent};
use crate::chatlog::LogStore;
use crate::config::Config;
use crate::session::ChatSession;
use crate::settings::SettingsStore;
use crate::summary;
use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error};

const HELP: &str = "Commands: /new, /id, /history, /login <password>, /logout, /quit\n\
                    Admin: /export <file>, /summary, /clear";

enum Command<'a> {
    Quit,
    New,
    Id,
    History,
    Help,
    Login(&'a str),
    Logout,
    Export(&'a str),
    Summary,
    Clear,
}

/// Slash commands. Unrecognized `/` lines are ordinary prompts.
fn parse_command(line: &str) -> Option<Command<'_>> {
    let rest = line.strip_prefix('/')?;
    let (name, arg) = rest
        .split_once(char::is_whitespace)
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((rest, ""));

    let command = match name {
        "quit" | "exit" => Command::Quit,
        "new" => Command::New,
        "id" => Command::Id,
        "history" => Command::History,
        "help" => Command::Help,
        "login" => Command::Login(arg),
        "logout" => Command::Logout,
        "export" => Command::Export(arg),
        "summary" => Command::Summary,
        "clear" => Command::Clear,
        _ => return None,
    };
    Some(command)
}

pub async fn run(
    config: &Config,
    agent: &dyn Agent,
    store: &LogStore,
    settings: &SettingsStore,
    conversation_id: Option<&str>,
) -> Result<()> {
    let mut session = ChatSession::resume(conversation_id);
    let app = match settings.load(&default_settings(config)).await {
        Ok(app) => app,
        Err(e) => {
            error!("Falling back to default settings: {}", e);
            default_settings(config)
        }
    };

    println!("{}\n{}\n", app.title, app.description);
    println!("{}\n", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = parse_command(line) {
            match command {
                Command::Quit => break,
                Command::New => {
                    session.reset();
                    println!("Started conversation {}", session.conversation_id());
                }
                Command::Id => println!("{}", session.conversation_id()),
                Command::History => {
                    for message in session.messages() {
                        println!("{}: {}", message.role, message.content);
                    }
                }
                Command::Help => println!("{}", HELP),
                Command::Login(password) => {
                    if session.login(password, config.admin_password.as_deref()) {
                        println!("Admin mode enabled.");
                    } else {
                        println!("Wrong password.");
                    }
                }
                Command::Logout => {
                    session.logout();
                    println!("Admin mode disabled.");
                }
                Command::Export(_) | Command::Summary | Command::Clear if !session.is_admin() => {
                    println!("Admin only. Use /login first.");
                }
                Command::Export("") => println!("Usage: /export <file>"),
                Command::Export(path) => match store.export_csv().await {
                    Ok(bytes) => match tokio::fs::write(path, bytes).await {
                        Ok(()) => println!("Exported chat logs to {}", path),
                        Err(e) => println!("Export failed: {}", e),
                    },
                    Err(e) => println!("Export failed: {}", e),
                },
                Command::Summary => match summary::batch_by_conversation(store).await {
                    Ok(batches) => {
                        let summaries = summary::summarize(&batches, agent).await;
                        println!("{}", summary::compile(&summaries));
                    }
                    Err(e) => println!("Could not read chat logs: {}", e),
                },
                Command::Clear => match store.delete_all().await {
                    Ok(n) => println!("Deleted {} chat logs", n),
                    Err(e) => println!("Delete failed: {}", e),
                },
            }
            continue;
        }

        // Instructions may have been edited by an admin since the last turn.
        let instructions = settings.latest_instructions().await.unwrap_or_default();

        let (tx, mut rx) = mpsc::channel(128);
        let printer = tokio::spawn(async move {
            let mut stdout = std::io::stdout();
            while let Some(event) = rx.recv().await {
                match event {
                    StreamEvent::TextDelta(text) => {
                        let _ = write!(stdout, "{}", text);
                        let _ = stdout.flush();
                    }
                    StreamEvent::Done => break,
                    StreamEvent::Error(e) => {
                        debug!("Stream ended early: {}", e);
                        break;
                    }
                }
            }
        });

        let result = session
            .respond(line, agent, store, instructions.as_deref(), tx)
            .await;
        let _ = printer.await;

        match result {
            Ok(_) => println!("\n"),
            Err(e) => {
                error!("Completion failed: {}", e);
                println!("\n[error] {}\n", e);
            }
        }
    }

    Ok(())
}
