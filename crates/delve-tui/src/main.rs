use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use delve_core::{render_message, ApiClient, BackendHealth, Config};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod message_view;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "delve")]
#[command(about = "Terminal chat client for an LLM assistant backend", version)]
struct Cli {
    /// Backend base URL (overrides config and DELVE_BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// User id sent with every request (overrides config and DELVE_USER_ID)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat client (default)
    Chat,
    /// Check whether the backend is reachable
    Health,
    /// Send one prompt and print the reply
    Ask {
        /// Your question
        prompt: String,
        /// Continue an existing conversation
        #[arg(short, long)]
        conversation: Option<String>,
    },
    /// Print the admin dashboard, or one user's conversations
    Admin {
        /// Show sessions for this user
        user_id: Option<String>,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration (including overrides) to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Could not read config, using defaults: {}", e);
        Config::new()
    });
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }
    if let Some(user) = cli.user {
        config.user_id = user;
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            init_file_logging();
            run_tui(config).await
        }
        Commands::Health => {
            init_stderr_logging();
            print_health(&config).await
        }
        Commands::Ask {
            prompt,
            conversation,
        } => {
            init_stderr_logging();
            ask(&config, &prompt, conversation.as_deref()).await
        }
        Commands::Admin { user_id } => {
            init_stderr_logging();
            print_admin(&config, user_id.as_deref()).await
        }
        Commands::Config { save } => {
            init_stderr_logging();
            show_config(&config, save)
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// The TUI owns the terminal, so logs go to `<data_local_dir>/delve/delve.log`
fn init_file_logging() {
    let Some(dir) = dirs::data_local_dir().map(|d| d.join("delve")) else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("delve.log"))
    {
        Ok(file) => file,
        Err(_) => return,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

async fn run_tui(config: Config) -> Result<()> {
    info!(
        backend = %config.backend_url,
        user = %config.user_id,
        "delve v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(&config, events.sender());
    app.start();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            if let Some(event) = events.next().await {
                handler::handle_event(&mut app, event)?;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

async fn print_health(config: &Config) -> Result<()> {
    let client = ApiClient::from_config(config);
    println!("Checking {}", client.health_url());

    match client.check_health().await {
        BackendHealth::Online { detail } => match detail {
            Some(detail) => println!("online ({})", detail),
            None => println!("online"),
        },
        BackendHealth::Offline { detail } => anyhow::bail!("offline: {}", detail),
    }
    Ok(())
}

async fn ask(config: &Config, prompt: &str, conversation: Option<&str>) -> Result<()> {
    let client = ApiClient::from_config(config);
    let completion = client
        .send_message(prompt, &config.user_id, conversation)
        .await
        .context("Assistant request failed")?;

    for message in &completion.messages {
        println!("{}:", message.role.display_name());
        for line in render_message(message).plain_lines() {
            println!("  {}", line);
        }
        println!();
    }

    match completion.conversation_id {
        Some(id) => println!("conversation: {}", id),
        None => warn!("backend did not return a conversation id"),
    }
    Ok(())
}

async fn print_admin(config: &Config, user_id: Option<&str>) -> Result<()> {
    let client = ApiClient::from_config(config);

    if let Some(user_id) = user_id {
        let sessions = client.fetch_admin_user_conversations(user_id).await?;
        println!("Conversations for {}", user_id);
        println!(
            "{} conversations, {} tokens",
            sessions.len(),
            delve_core::admin::total_tokens(&sessions)
        );
        for session in &sessions {
            let title = if session.title.is_empty() {
                &session.session_id
            } else {
                &session.title
            };
            println!(
                "  {:<32} {:>6} msgs {:>8} tokens  {}",
                title, session.message_count, session.tokens_used, session.updated_at
            );
        }
        return Ok(());
    }

    let dashboard = client.fetch_admin_dashboard().await?;
    println!("Total users:       {}", dashboard.total_users);
    println!("Active users:      {}", dashboard.active_users);
    println!("Total sessions:    {}", dashboard.total_sessions);
    println!("Total tokens used: {}", dashboard.total_tokens);
    println!();
    for user in &dashboard.users {
        println!(
            "  {:<20} {:>4} sessions {:>8} tokens  {:<8} {}",
            user.user_id,
            user.session_count,
            user.total_tokens,
            if user.is_active { "active" } else { "inactive" },
            user.last_active.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn show_config(config: &Config, save: bool) -> Result<()> {
    let path = Config::get_config_path()?;
    println!("Config file: {}", path.display());
    println!("backend_url: {}", config.backend_url);
    println!(
        "health_url:  {}",
        config.health_url.as_deref().unwrap_or("(derived from backend_url)")
    );
    println!("user_id:     {}", config.user_id);

    if save {
        config.save().context("Failed to save config")?;
        info!(path = %path.display(), "saved configuration");
        println!("Saved.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_chat() {
        let cli = Cli::try_parse_from(["delve"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.backend_url.is_none());
    }

    #[test]
    fn test_cli_ask_with_global_flags() {
        let cli = Cli::try_parse_from([
            "delve",
            "ask",
            "hello there",
            "--conversation",
            "c-1",
            "--backend-url",
            "http://remote:9000",
            "--user",
            "sam",
        ])
        .unwrap();

        assert_eq!(cli.backend_url.as_deref(), Some("http://remote:9000"));
        assert_eq!(cli.user.as_deref(), Some("sam"));
        match cli.command {
            Some(Commands::Ask {
                prompt,
                conversation,
            }) => {
                assert_eq!(prompt, "hello there");
                assert_eq!(conversation.as_deref(), Some("c-1"));
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_cli_admin_optional_user() {
        let cli = Cli::try_parse_from(["delve", "admin", "jane doe"]).unwrap();
        match cli.command {
            Some(Commands::Admin { user_id }) => assert_eq!(user_id.as_deref(), Some("jane doe")),
            _ => panic!("expected admin"),
        }
    }

    #[test]
    fn test_cli_config_save_flag() {
        let cli = Cli::try_parse_from(["delve", "config", "--save", "--user", "sam"]).unwrap();
        assert_eq!(cli.user.as_deref(), Some("sam"));
        assert!(matches!(cli.command, Some(Commands::Config { save: true })));

        let cli = Cli::try_parse_from(["delve", "config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Config { save: false })));
    }
}
