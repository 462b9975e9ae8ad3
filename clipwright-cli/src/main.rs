use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clipwright_core::types::Command;
use clipwright_engine::controller::SessionController;
use clipwright_engine::traits::{InputDriver, NotificationSink};
use clipwright_platform::StdoutNotifier;
use clipwright_platform::test::MemoryDriver;
use clipwright_runtime::config_store::ConfigStore;
use clipwright_runtime::secrets::{SecretKey, delete_secret, set_secret};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clipwright", about = "Collect clipboard snippets, ask a model, type the answer back")]
struct Cli {
    /// Config file (defaults to the per-user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand)]
enum Action {
    /// Run an interactive session reading command names from stdin.
    Run {
        /// Use the in-memory clipboard/keyboard even when the desktop backend is built in.
        #[arg(long)]
        headless: bool,
    },
    /// Write the default config file if none exists, then print its path.
    InitConfig,
    /// Store the provider API key in the OS keyring.
    SetKey { key: String },
    /// Remove the stored provider API key.
    DeleteKey,
}

fn config_store(cli: &Cli) -> anyhow::Result<ConfigStore> {
    match &cli.config {
        Some(p) => Ok(ConfigStore::at_path(p)),
        None => ConfigStore::at_default_location(),
    }
}

#[cfg(feature = "desktop")]
fn input_driver(headless: bool) -> anyhow::Result<Arc<dyn InputDriver>> {
    if headless {
        return Ok(Arc::new(MemoryDriver::echoing()));
    }
    Ok(Arc::new(clipwright_platform::DesktopDriver::new()?))
}

#[cfg(not(feature = "desktop"))]
fn input_driver(headless: bool) -> anyhow::Result<Arc<dyn InputDriver>> {
    if !headless {
        log::warn!("built without the desktop backend; using the in-memory clipboard");
    }
    Ok(Arc::new(MemoryDriver::echoing()))
}

fn print_help() {
    println!("commands:");
    for c in Command::ALL {
        println!("  {c}");
    }
    println!("  help");
}

async fn run_repl(controller: SessionController) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    print_help();
    while controller.is_running() {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        // EOF or Ctrl-C
        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("help") {
            print_help();
            continue;
        }

        match Command::from_str(input) {
            Ok(cmd) => match controller.handle(cmd).await {
                Ok(done) => println!("{}", done.message),
                Err(rejected) => println!("rejected: {}", rejected.reason),
            },
            Err(e) => println!("{e} (type `help` for the list)"),
        }
    }

    if controller.is_running() {
        controller.exit().await.ok();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.action {
        Some(Action::SetKey { ref key }) => {
            set_secret(SecretKey::ProviderApiKey, key.trim())?;
            println!("API key stored");
        }
        Some(Action::DeleteKey) => {
            delete_secret(SecretKey::ProviderApiKey)?;
            println!("API key removed");
        }
        Some(Action::InitConfig) => {
            let store = config_store(&cli)?;
            if !store.path().exists() {
                store.save(&store.load_or_default()?)?;
            }
            println!("{}", store.path().display());
        }
        Some(Action::Run { headless }) => run(&cli, headless).await?,
        None => run(&cli, false).await?,
    }
    Ok(())
}

async fn run(cli: &Cli, headless: bool) -> anyhow::Result<()> {
    let store = config_store(cli)?;
    let cfg = store.load_or_default()?;

    let driver = input_driver(headless)?;
    let notifier: Arc<dyn NotificationSink> = Arc::new(StdoutNotifier);
    let controller =
        clipwright_runtime::build_controller_from_config(&cfg, driver, notifier)?;

    log::info!("config: {}", store.path().display());
    run_repl(controller).await
}
