use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tradepost::commands;
use tradepost::config::AppConfig;
use tradepost::coordinator::{LogNotifier, TradeCoordinator};
use tradepost::domain::{CurrencyKind, Party};
use tradepost::error::Result;
use tradepost::ledger::{MemoryContainer, MemoryLedger};
use tradepost::persistence::{HistoryStore, TransactionJournal};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Interactive demo shell for the trade engine. Each line is
/// `<player> trade <args>`; balances and containers are in-memory.
#[derive(Parser)]
#[command(name = "tradepost", version, about)]
struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Data directory for history and journal (overrides config paths)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Starting coin balance for every player
    #[arg(long, default_value_t = 1_000)]
    starting_coins: u64,

    /// Starting gem balance for every player
    #[arg(long, default_value_t = 100)]
    starting_gems: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config_dir)?;
    init_logging(&config.logging.level);
    if let Some(data_dir) = &cli.data_dir {
        config.history.path = data_dir.join("history.jsonl");
        config.journal.dir = data_dir.join("journal");
    }
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("config error: {}", error);
        }
        return Err(tradepost::error::TradeError::Internal(
            "invalid configuration".to_string(),
        ));
    }

    let ledger = Arc::new(MemoryLedger::new());
    let container = Arc::new(MemoryContainer::default());
    let history = Arc::new(HistoryStore::new(
        config.history.path.clone(),
        config.history.cache_size,
    ));
    history.load().await?;
    let journal = Arc::new(TransactionJournal::new(config.journal.dir.clone()));

    let coordinator = Arc::new(TradeCoordinator::new(
        config.trade.clone(),
        ledger.clone(),
        container.clone(),
        Arc::new(LogNotifier),
        history,
        journal,
    ));
    let sweeper = TradeCoordinator::spawn_sweeper(coordinator.clone());

    info!("tradepost demo ready; type '<player> trade <args>' or 'quit'");
    println!("{}", commands::USAGE);

    let mut seeded = std::collections::HashSet::new();
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        let Some((player, args)) = commands::split_line(line) else {
            println!("{}", commands::USAGE);
            continue;
        };

        let caller = Party::new(player.to_lowercase(), player);
        // First sight of a player seeds their demo balances
        if seeded.insert(caller.id.clone()) {
            ledger.set_balance(&caller.id, CurrencyKind::Coins, cli.starting_coins);
            ledger.set_balance(&caller.id, CurrencyKind::Gems, cli.starting_gems);
        }

        match commands::parse(args) {
            Ok(command) => {
                let reply = commands::dispatch(&coordinator, &caller, &command).await;
                println!("{}", reply);
            }
            Err(usage) => println!("{}", usage),
        }
    }

    sweeper.abort();
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tradepost=debug", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
