use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use montool::alerts::{LogNotifier, Notifier};
use montool::config::read_config_file;
use montool::engine::Engine;
use montool::executor::SshExecutor;
use montool::monitors::TcpProbe;
use montool::storage;
use montool::telegram::TelegramNotifier;
use montool::util::get_bot_token;
use montool::vault::{Secret, Vault};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroize;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Server health monitoring engine")]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Manage login secrets for the CRUD collaborators
    Vault {
        #[command(subcommand)]
        action: VaultAction,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum VaultAction {
    /// Print a fresh base64 key for ENCRYPTION_KEY
    Keygen,

    /// Read a secret from stdin and print its ciphertext
    Encrypt,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("montool", level),
        ("engine", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    if let Some(Command::Vault { action }) = args.command {
        init(LevelFilter::WARN);
        return run_vault(action);
    }

    let Some(file) = args.file else {
        bail!("a configuration file is required: montool -f <config.json>");
    };

    let config = read_config_file(&file)?;
    init(LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::INFO));
    trace!("started with config file {file}");

    let vault = Vault::from_env().context("ENCRYPTION_KEY must hold a base64 encoded 32 byte key")?;
    let stores = storage::open(&config.storage)
        .await
        .context("cannot open storage")?;

    let engine = Engine::new(
        stores,
        Arc::new(vault),
        Arc::new(SshExecutor::new(config.executor.clone())),
        config.poller.clone(),
    );

    let notifier: Arc<dyn Notifier> = match get_bot_token() {
        Some(token) => Arc::new(
            TelegramNotifier::new(&config.telegram, token)
                .context("cannot build the Telegram client")?,
        ),
        None => {
            warn!("TOKEN is not set, offline alerts are only logged");
            Arc::new(LogNotifier)
        }
    };
    let probe = Arc::new(TcpProbe::new(config.prober.port, config.prober.timeout()));
    let prober = engine.spawn_prober(probe, notifier, &config.prober);

    #[cfg(feature = "api")]
    {
        use montool::api::{ApiState, spawn_api_server};
        use montool::util::get_api_token;

        spawn_api_server(&config.api, get_api_token(), ApiState::new(engine.clone())).await?;
    }

    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for ctrl-c")?;

    info!("shutting down");
    prober.shutdown().await;

    Ok(())
}

fn run_vault(action: VaultAction) -> anyhow::Result<()> {
    match action {
        VaultAction::Keygen => println!("{}", Vault::generate_key()),
        VaultAction::Encrypt => {
            let vault = Vault::from_env().context("ENCRYPTION_KEY is required to encrypt")?;

            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("cannot read secret from stdin")?;
            let secret = Secret::new(line.trim_end_matches(['\r', '\n']));
            line.zeroize();

            if secret.expose().is_empty() {
                bail!("empty secret on stdin");
            }

            println!("{}", vault.encrypt(secret.expose().as_bytes())?);
        }
    }

    Ok(())
}
