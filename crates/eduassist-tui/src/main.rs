use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eduassist_core::{CompletionGateway, Config, Credentials, GatewayConfig, Session};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use logging::LogTarget;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "eduassist", version)]
#[command(about = "Brief, bullet-pointed answers for TBI and spinal cord injury patients")]
struct Cli {
    /// Settings file (defaults to <config dir>/eduassist/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
    },
    /// Show the resolved settings
    Config {
        /// Write a default settings file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load_from(&config_path)?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            logging::init(config.log_level(), LogTarget::File(logging::default_log_path()))?;
            let session = build_session(&config)?;
            run_chat(session).await
        }
        Commands::Ask { question } => {
            logging::init(config.log_level(), LogTarget::Stderr)?;
            let session = build_session(&config)?;
            ask(session, &question).await
        }
        Commands::Config { init } => show_config(&config_path, &config, init),
    }
}

/// Resolve credentials and settings up front so a bad setup fails before the first question
fn build_session(config: &Config) -> Result<Session> {
    let credentials = Credentials::from_env()
        .context("AWS credentials are required: set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY")?;
    let gateway_config = GatewayConfig::resolve(config, credentials).context("invalid settings")?;
    Ok(Session::new(CompletionGateway::new(gateway_config)))
}

async fn run_chat(session: Session) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(session, events.sender());

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    app.cancel();
    tui::restore()?;
    log::info!("Session ended after {} turns", app.session.transcript().len());
    result
}

async fn ask(mut session: Session, question: &str) -> Result<()> {
    match session.submit(question).await {
        Some(Ok(answer)) => {
            println!("{}", answer);
            Ok(())
        }
        Some(Err(e)) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        None => anyhow::bail!("question is empty"),
    }
}

fn show_config(path: &Path, config: &Config, init: bool) -> Result<()> {
    if init {
        if path.exists() {
            println!("Settings file already exists: {}", path.display());
        } else {
            Config::new().save_to(path)?;
            println!("Wrote default settings to {}", path.display());
        }
    }

    println!("Settings file: {}{}", path.display(), if path.exists() { "" } else { " (not present)" });
    println!("  region:    {}", config.region());
    println!("  model_id:  {}", config.model_id());
    println!("  endpoint:  {}", config.endpoint());
    println!("  log_level: {}", config.log_level());
    match Credentials::from_env() {
        Ok(credentials) => println!("Credentials: {:?}", credentials),
        Err(e) => println!("Credentials: {}", e),
    }
    Ok(())
}
