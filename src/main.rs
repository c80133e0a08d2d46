//! Mintguard - Solana token risk analysis engine
//!
//! Scores a token mint across on-chain authority state, holder
//! concentration, liquidity lock status, market structure, and external
//! security reports. Wallets behind dangerous launches accumulate
//! persistent reputation labels across runs.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

// Use the library crate
use mintguard::cli::commands;
use mintguard::config::Config;

/// Solana token risk analysis engine
#[derive(Parser)]
#[command(name = "mintguard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a token and print its risk assessment
    Analyze {
        /// Token mint address
        token: String,

        /// Emit the assessment as pretty-printed JSON
        #[arg(long)]
        json: bool,
    },

    /// Show flagged wallets
    Blacklist {
        /// Limit output to one wallet, with evidence detail
        wallet: Option<String>,
    },

    /// Record an admin-confirmed rug pull for a token
    ConfirmRug {
        /// Token mint address
        token: String,

        /// Reviewer recording the confirmation
        #[arg(long)]
        reviewer: String,

        /// Estimated number of victims
        #[arg(long)]
        victims: Option<u32>,

        /// Estimated losses in USD
        #[arg(long)]
        losses: Option<f64>,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Exchange wallet registry commands
    Exchange {
        #[command(subcommand)]
        action: ExchangeAction,
    },

    /// Check system health (RPC, data providers, stores)
    Check,

    /// Show current configuration (secrets masked)
    Config,
}

#[derive(Subcommand)]
enum ExchangeAction {
    /// Register an exchange wallet
    Add {
        /// Wallet address
        wallet: String,

        /// Exchange name
        #[arg(long)]
        name: Option<String>,
    },

    /// List registered exchange wallets
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mintguard=info".parse().unwrap()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Perform startup checks
    if let Err(e) = startup_checks(&config).await {
        error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    // Execute command
    let result = match cli.command {
        Commands::Analyze { token, json } => commands::analyze(&config, &token, json).await,
        Commands::Blacklist { wallet } => commands::blacklist(&config, wallet).await,
        Commands::ConfirmRug {
            token,
            reviewer,
            victims,
            losses,
            yes,
        } => commands::confirm_rug(&config, &token, &reviewer, victims, losses, yes).await,
        Commands::Exchange { action } => match action {
            ExchangeAction::Add { wallet, name } => {
                commands::exchange_add(&config, &wallet, name).await
            }
            ExchangeAction::List => commands::exchange_list(&config).await,
        },
        Commands::Check => commands::check(&config).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Ensure store directories exist before any command touches them
async fn startup_checks(config: &Config) -> Result<()> {
    info!("Performing startup checks...");

    for path in [
        &config.reputation.labels_path,
        &config.reputation.history_path,
        &config.exchanges.file_path,
    ] {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow::anyhow!("Cannot create data directory {}: {}", parent.display(), e)
                })?;
                info!("Created data directory: {}", parent.display());
            }
        }
    }

    info!("Startup checks passed");
    Ok(())
}
