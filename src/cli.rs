//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::adapters::csv_quote_feed::CsvQuoteFeed;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::PapertraderError;
use crate::domain::quote_cache::QuoteCache;
use crate::domain::settings::GameSettings;
use crate::engine::{SharedStore, TradingEngine};
use crate::ports::config_port::ConfigPort;
use crate::runtime::{spawn_quote_poller, spawn_valuation_timer, SharedQuoteFeed};

#[derive(Parser, Debug)]
#[command(name = "papertrader", about = "Single-player simulated stock trading game")]
pub struct Cli {
    /// Path to the INI configuration file
    #[arg(short, long, default_value = "papertrader.ini")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the game database and seed the player account
    Init,
    /// Buy shares at the latest quoted price
    Buy { symbol: String, quantity: i64 },
    /// Sell shares at the latest quoted price
    Sell { symbol: String, quantity: i64 },
    /// Show cash and holdings marked to market
    Portfolio,
    /// Show the latest market quotes
    Market,
    /// Show the recorded equity curve
    History,
    /// Record one valuation snapshot now
    Snapshot,
    /// Interactive session with live quote polling
    Play,
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    match dispatch(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn dispatch(cli: &Cli) -> Result<(), PapertraderError> {
    match &cli.command {
        Command::Init => run_init(&cli.config),
        Command::Buy { symbol, quantity } => run_trade(&cli.config, symbol, *quantity, true),
        Command::Sell { symbol, quantity } => run_trade(&cli.config, symbol, *quantity, false),
        Command::Portfolio => run_portfolio(&cli.config),
        Command::Market => run_market(&cli.config),
        Command::History => run_history(&cli.config),
        Command::Snapshot => run_snapshot(&cli.config),
        Command::Play => run_play(&cli.config),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PapertraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| PapertraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

struct Game {
    engine: TradingEngine,
    settings: GameSettings,
    config: FileConfigAdapter,
}

impl Game {
    fn load(config_path: &Path) -> Result<Self, PapertraderError> {
        let config = load_config(config_path)?;
        let settings = GameSettings::from_config(&config)?;
        let store = open_store(&config, &settings)?;
        let engine = TradingEngine::new(store, Arc::new(QuoteCache::new()), &settings);
        Ok(Game {
            engine,
            settings,
            config,
        })
    }

    fn feed(&self) -> Result<SharedQuoteFeed, PapertraderError> {
        Ok(Arc::new(CsvQuoteFeed::from_config(&self.config)?))
    }

    /// Fetch one snapshot from the feed into the cache.
    fn refresh_quotes(&self) -> Result<(), PapertraderError> {
        let quotes = self.feed()?.fetch_quotes()?;
        self.engine.update_quotes(quotes);
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
fn open_store(
    config: &dyn ConfigPort,
    settings: &GameSettings,
) -> Result<SharedStore, PapertraderError> {
    let store = crate::adapters::sqlite_store::SqliteStore::from_config(config)?;
    store.initialize_schema(settings.starting_cash)?;
    Ok(Arc::new(store))
}

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
fn open_store(
    config: &dyn ConfigPort,
    settings: &GameSettings,
) -> Result<SharedStore, PapertraderError> {
    let store = crate::adapters::postgres_store::PostgresStore::from_config(config)?;
    store.initialize_schema(settings.starting_cash)?;
    Ok(Arc::new(store))
}

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
fn open_store(
    _config: &dyn ConfigPort,
    _settings: &GameSettings,
) -> Result<SharedStore, PapertraderError> {
    Err(PapertraderError::ConfigInvalid {
        section: "storage".into(),
        key: "backend".into(),
        reason: "built without a storage backend; enable the `sqlite` or `postgres` feature".into(),
    })
}

fn run_init(config_path: &Path) -> Result<(), PapertraderError> {
    let game = Game::load(config_path)?;
    let account = game.engine.account()?;
    println!(
        "game database ready; cash balance {:.2} (starting cash {:.2})",
        account.cash, game.settings.starting_cash
    );
    Ok(())
}

fn run_trade(
    config_path: &Path,
    symbol: &str,
    quantity: i64,
    is_buy: bool,
) -> Result<(), PapertraderError> {
    let game = Game::load(config_path)?;
    game.refresh_quotes()?;

    let receipt = if is_buy {
        game.engine.buy(symbol, quantity)?
    } else {
        game.engine.sell(symbol, quantity)?
    };
    println!("{receipt}");
    Ok(())
}

fn run_portfolio(config_path: &Path) -> Result<(), PapertraderError> {
    let game = Game::load(config_path)?;
    // Display is best-effort: without fresh quotes, positions show at cost.
    if let Err(e) = game.refresh_quotes() {
        warn!(error = %e, "could not refresh quotes; showing last known prices");
    }
    print_portfolio(&game.engine)
}

fn run_market(config_path: &Path) -> Result<(), PapertraderError> {
    let game = Game::load(config_path)?;
    game.refresh_quotes()?;
    print_market(&game.engine);
    Ok(())
}

fn run_history(config_path: &Path) -> Result<(), PapertraderError> {
    let game = Game::load(config_path)?;
    print_history(&game.engine)
}

fn run_snapshot(config_path: &Path) -> Result<(), PapertraderError> {
    let game = Game::load(config_path)?;
    if let Err(e) = game.refresh_quotes() {
        warn!(error = %e, "could not refresh quotes; valuing at last known prices");
    }
    let point = game.engine.valuation().snapshot()?;
    println!(
        "recorded net worth {:.2} at {}",
        point.total_value,
        point.timestamp.format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

fn run_play(config_path: &Path) -> Result<(), PapertraderError> {
    let game = Game::load(config_path)?;
    let feed = game.feed()?;

    let poller = spawn_quote_poller(
        feed,
        game.engine.quote_cache(),
        Duration::from_secs(game.settings.feed_interval_secs as u64),
    );
    let valuer = spawn_valuation_timer(
        game.engine.valuation(),
        Duration::from_secs(game.settings.valuation_interval_secs as u64),
    );

    println!("papertrader session started; type `help` for commands");
    let stdin = io::stdin();
    prompt();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if !handle_session_command(&game.engine, line.trim()) {
            break;
        }
        prompt();
    }

    poller.stop();
    valuer.stop();
    println!("session closed");
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

/// Returns false when the session should end.
fn handle_session_command(engine: &TradingEngine, line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [] => {}
        ["quit"] | ["exit"] => return false,
        ["help"] => {
            println!("commands: buy SYMBOL QTY | sell SYMBOL QTY | portfolio | market | history | quit");
        }
        ["portfolio"] => {
            if let Err(e) = print_portfolio(engine) {
                println!("error: {e}");
            }
        }
        ["market"] => print_market(engine),
        ["history"] => {
            if let Err(e) = print_history(engine) {
                println!("error: {e}");
            }
        }
        [side @ ("buy" | "sell"), symbol, quantity] => match quantity.parse::<i64>() {
            Ok(quantity) => {
                let result = if *side == "buy" {
                    engine.buy(symbol, quantity)
                } else {
                    engine.sell(symbol, quantity)
                };
                match result {
                    Ok(receipt) => println!("{receipt}"),
                    Err(e) => println!("error: {e}"),
                }
            }
            Err(_) => println!("quantity must be a whole number, got {quantity}"),
        },
        _ => println!("unrecognized command; type `help`"),
    }
    true
}

fn print_portfolio(engine: &TradingEngine) -> Result<(), PapertraderError> {
    let portfolio = engine.portfolio()?;
    let cache = engine.quote_cache();

    println!("cash: {:.2}", portfolio.cash);
    if portfolio.positions.is_empty() {
        println!("no open positions");
    } else {
        println!(
            "{:<8} {:>8} {:>10} {:>10} {:>12} {:>12}",
            "symbol", "qty", "avg cost", "last", "value", "p&l"
        );
        for pos in &portfolio.positions {
            let price = cache.last_price(&pos.symbol).unwrap_or(pos.average_cost);
            println!(
                "{:<8} {:>8} {:>10.2} {:>10.2} {:>12.2} {:>+12.2}",
                pos.symbol,
                pos.quantity,
                pos.average_cost,
                price,
                pos.market_value(price),
                pos.unrealized_pnl(price)
            );
        }
    }

    let total = portfolio.total_value(|symbol| cache.last_price(symbol));
    println!("total net worth: {total:.2}");
    Ok(())
}

fn print_market(engine: &TradingEngine) {
    let quotes = engine.market();
    if quotes.is_empty() {
        println!("no quotes yet");
        return;
    }
    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>10} {:>8}",
        "symbol", "last", "high", "low", "average", "chg%"
    );
    for quote in quotes {
        println!(
            "{:<8} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>+8.2}",
            quote.symbol,
            quote.last_price,
            quote.high,
            quote.low,
            quote.average,
            quote.percent_change
        );
    }
}

fn print_history(engine: &TradingEngine) -> Result<(), PapertraderError> {
    let history = engine.history()?;
    if history.is_empty() {
        println!("no valuation history yet");
        return Ok(());
    }
    for point in history {
        println!(
            "{}  {:>12.2}",
            point.timestamp.format("%Y-%m-%d %H:%M:%S"),
            point.total_value
        );
    }
    Ok(())
}
