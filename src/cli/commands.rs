//! CLI command implementations

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use dialoguer::Confirm;
use tracing::info;

use crate::analysis::{AnalysisEngine, RiskAssessment};
use crate::config::Config;
use crate::exchanges::{ExchangeDirectory, ExchangeRegistry};
use crate::reputation::{JsonFileStore, ReputationEngine, ReputationStore};
use crate::sources::{LedgerConnector, LpReportConnector, MarketConnector, SecurityFlagsConnector};

/// Analyze one token and print the assessment
pub async fn analyze(config: &Config, token: &str, json: bool) -> Result<()> {
    info!("Initializing source connectors...");
    let ledger = Arc::new(LedgerConnector::new(&config.rpc));
    let market = Arc::new(MarketConnector::new(&config.sources));
    let security = Arc::new(SecurityFlagsConnector::new(&config.sources));
    let lp_report = Arc::new(LpReportConnector::new(&config.sources));

    let exchanges = Arc::new(ExchangeDirectory::new(&config.exchanges));
    exchanges.load().await?;

    let reputation = Arc::new(open_reputation(config).await?);

    let engine = AnalysisEngine::new(
        ledger,
        market,
        security,
        lp_report,
        exchanges,
        config.clone(),
    )
    .with_reputation(reputation);

    let assessment = engine.analyze(token).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
    } else {
        print_assessment(&assessment);
    }

    Ok(())
}

fn print_assessment(assessment: &RiskAssessment) {
    println!("\n=== TOKEN RISK ASSESSMENT ===\n");
    println!("Token: {}", assessment.token);
    println!(
        "Analyzed: {}",
        assessment.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Safety Score: {}", assessment.score);
    println!("Risk Level: {}", assessment.level);

    if let Some(authorities) = &assessment.authorities {
        println!("\nAuthorities:");
        println!("  Mint:   {}", describe_authority(authorities.mint.address()));
        println!("  Freeze: {}", describe_authority(authorities.freeze.address()));
    }

    if !assessment.analysis_failed {
        println!(
            "\nHolders ({} accounts, source: {:?}):",
            assessment.holder_count, assessment.holder_source
        );
        for record in assessment.top_holders.iter().take(10) {
            println!(
                "  {:<44} {:>7.2}%  [{}]",
                record.address, record.pct_of_supply, record.tag
            );
        }

        let filtering = &assessment.holder_filtering;
        println!(
            "  Organic: {} wallets holding {:.2}%",
            filtering.organic_count, filtering.organic_pct
        );
        for category in &filtering.excluded {
            println!(
                "  Excluded ({}): {} wallets holding {:.2}%",
                category.tag, category.count, category.total_pct
            );
        }

        if let Some(bundles) = filtering
            .bundled_detection
            .as_ref()
            .filter(|b| b.detected())
        {
            println!(
                "\nBundles: {} group(s), {} wallets holding {:.2}% of supply",
                bundles.groups.len(),
                bundles.bundled_count,
                bundles.bundled_pct
            );
            for group in &bundles.groups {
                println!(
                    "  {:?} confidence via {:?}: {} wallets, {:.2}%",
                    group.confidence,
                    group.strategy,
                    group.members.len(),
                    group.total_pct
                );
            }
        }

        let lp = &assessment.liquidity_pool;
        println!("\nLiquidity: {}", lp.status);
        if lp.exists {
            println!(
                "  Burned: {:.2}%  Locked: {}",
                lp.burn_percentage,
                if lp.is_locked { "yes" } else { "no" }
            );
        } else {
            println!("  No pool located");
        }

        if let Some(market) = &assessment.market {
            println!("\nMarket:");
            if let Some(price) = market.price_usd {
                println!("  Price: ${:.8}", price);
            }
            if let Some(liquidity) = market.liquidity_usd {
                println!("  Liquidity: ${:.0}", liquidity);
            }
            if let Some(mc) = market.market_cap_usd {
                println!("  Market Cap: ${:.0}", mc);
            }
            if let Some(volume) = market.volume_24h_usd {
                println!("  24h Volume: ${:.0}", volume);
            }
        }

        println!("\nScore Components:");
        print_component("Authority", assessment.breakdown.authority);
        print_component("Holders", assessment.breakdown.holders);
        print_component("Liquidity", assessment.breakdown.liquidity);
        print_component("Market", assessment.breakdown.market);
        print_component("Bundles", assessment.breakdown.bundles);
        print_component("Security", assessment.breakdown.security);
    }

    if assessment.red_flags.is_empty() {
        println!("\nRed Flags: none");
    } else {
        println!("\nRed Flags ({}):", assessment.red_flags.len());
        for flag in &assessment.red_flags {
            println!("  [{}] {}: {}", flag.severity, flag.title, flag.description);
        }
    }

    println!();
}

fn describe_authority(address: Option<&str>) -> String {
    match address {
        Some(address) => format!("ACTIVE ({})", address),
        None => "revoked".to_string(),
    }
}

fn print_component(name: &str, value: Option<f64>) {
    match value {
        Some(v) => println!("  {:<10} {:>6.1}", name, v),
        None => println!("  {:<10} {:>6}", name, "n/a"),
    }
}

/// Show flagged wallets: all active labels, or every label for one wallet
pub async fn blacklist(config: &Config, wallet: Option<String>) -> Result<()> {
    let reputation = open_reputation(config).await?;

    let labels = match &wallet {
        Some(wallet) => reputation.labels_for(wallet).await?,
        None => reputation.blacklist().await?,
    };

    if labels.is_empty() {
        match wallet {
            Some(wallet) => println!("No labels recorded for {}", wallet),
            None => println!("No active labels recorded."),
        }
        return Ok(());
    }

    println!("\n=== FLAGGED WALLETS ===\n");
    println!(
        "{:<44} {:<20} {:>8} {:>5} {:>10} {:>7}",
        "WALLET", "TYPE", "SEVERITY", "RUGS", "CONFIDENCE", "ACTIVE"
    );
    println!("{}", "-".repeat(100));

    for label in &labels {
        println!(
            "{:<44} {:<20} {:>8} {:>5} {:>10.2} {:>7}",
            label.wallet,
            label.label_type.to_string(),
            label.severity,
            label.rug_count,
            label.confidence,
            if label.active { "yes" } else { "no" }
        );
    }

    // Per-label evidence detail when a single wallet was requested
    if wallet.is_some() {
        for label in &labels {
            println!("\n{} evidence:", label.label_type);
            for (text, first_seen) in &label.evidence {
                println!("  [{}] {}", first_seen.format("%Y-%m-%d"), text);
            }
            for confirmation in &label.confirmations {
                println!(
                    "  Rug of {} confirmed by {} on {}",
                    confirmation.token,
                    confirmation.reviewer,
                    confirmation.confirmed_at.format("%Y-%m-%d")
                );
            }
        }
    }

    println!();
    Ok(())
}

/// Record an admin-confirmed rug pull against the token's deployer
pub async fn confirm_rug(
    config: &Config,
    token: &str,
    reviewer: &str,
    victims: Option<u32>,
    losses_usd: Option<f64>,
    yes: bool,
) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Confirm rug pull for token {}? This escalates the deployer's label",
                token
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let reputation = open_reputation(config).await?;
    let label = reputation
        .confirm_rug(token, reviewer, victims, losses_usd)
        .await?;

    println!("\n=== RUG CONFIRMED ===\n");
    println!("Wallet: {}", label.wallet);
    println!("Label: {}", label.label_type);
    println!("Severity: {}", label.severity);
    println!("Rug Count: {}", label.rug_count);

    Ok(())
}

/// Register an exchange wallet so its balance is excluded from concentration
pub async fn exchange_add(config: &Config, wallet: &str, name: Option<String>) -> Result<()> {
    if wallet.parse::<solana_sdk::pubkey::Pubkey>().is_err() {
        anyhow::bail!("Invalid wallet address: {}", wallet);
    }

    let registry = ExchangeDirectory::new(&config.exchanges);
    registry.load().await?;

    let added = registry.add(wallet.to_string(), name).await?;
    if added {
        println!("Registered exchange wallet {}", wallet);
    } else {
        println!("Wallet {} was already registered", wallet);
    }

    Ok(())
}

/// List every registered exchange wallet
pub async fn exchange_list(config: &Config) -> Result<()> {
    let registry = ExchangeDirectory::new(&config.exchanges);
    registry.load().await?;

    println!("\n=== EXCHANGE WALLETS ===\n");
    println!("{:<44} {:<12} {}", "WALLET", "EXCHANGE", "SOURCE");
    println!("{}", "-".repeat(70));

    for entry in registry.entries() {
        println!(
            "{:<44} {:<12} {}",
            entry.wallet,
            entry.exchange.as_deref().unwrap_or("-"),
            if entry.builtin { "builtin" } else { "added" }
        );
    }

    println!();
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check system health
pub async fn check(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    let mut all_healthy = true;

    print!("RPC Endpoint... ");
    match check_rpc(config).await {
        Ok((slot, latency)) => println!("OK (slot {}, {}ms)", slot, latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Market Data API... ");
    match check_http(&config.sources.market_base_url).await {
        Ok(latency) => println!("OK ({}ms)", latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Security Flags API... ");
    match check_http(&config.sources.security_base_url).await {
        Ok(latency) => println!("OK ({}ms)", latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("LP Report API... ");
    match check_http(&config.sources.lp_report_base_url).await {
        Ok(latency) => println!("OK ({}ms)", latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Reputation Store... ");
    match check_store(config).await {
        Ok(labels) => println!("OK ({} active labels)", labels),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Exchange Registry... ");
    match check_exchanges(config).await {
        Ok(count) => println!("OK ({} wallets)", count),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    println!();
    if all_healthy {
        println!("All systems healthy!");
    } else {
        println!("Some systems are unhealthy. Check the errors above.");
    }

    Ok(())
}

async fn open_reputation(config: &Config) -> Result<ReputationEngine> {
    let store = Arc::new(JsonFileStore::new(
        config.reputation.labels_path.clone(),
        config.reputation.history_path.clone(),
    ));
    store.load().await?;
    Ok(ReputationEngine::new(store, config.reputation.clone()))
}

async fn check_rpc(config: &Config) -> Result<(u64, u64)> {
    let ledger = LedgerConnector::new(&config.rpc);

    let start = Instant::now();
    let slot = ledger.health_check().await?;
    let latency = start.elapsed().as_millis() as u64;

    Ok((slot, latency))
}

async fn check_http(base_url: &str) -> Result<u64> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let start = Instant::now();
    // Any HTTP response proves reachability; routing errors are fine here
    client.get(base_url).send().await?;
    let latency = start.elapsed().as_millis() as u64;

    Ok(latency)
}

async fn check_store(config: &Config) -> Result<usize> {
    let store = JsonFileStore::new(
        config.reputation.labels_path.clone(),
        config.reputation.history_path.clone(),
    );
    store.load().await?;
    Ok(store.list_active().await?.len())
}

async fn check_exchanges(config: &Config) -> Result<usize> {
    let registry = ExchangeDirectory::new(&config.exchanges);
    registry.load().await?;
    Ok(registry.entries().len())
}
