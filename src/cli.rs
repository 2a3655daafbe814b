//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

use crate::adapters::csv_bars::CsvBarSource;
use crate::adapters::ini_config::{self, BotConfig};
use crate::adapters::log_journal::LogJournal;
use crate::adapters::paper_gateway::PaperGateway;
use crate::adapters::price_board::PriceBoard;
use crate::domain::cycle::CycleOrchestrator;
use crate::domain::error::EngineError;

#[derive(Parser, Debug)]
#[command(name = "minuteman", about = "Intraday signal evaluation and position lifecycle engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the trading loop against a bot config
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many cycles instead of running until killed
        #[arg(long)]
        cycles: Option<u64>,
        /// Worker threads for indicator evaluation
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Parse and validate a bot config, then exit
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    match cli.command {
        Command::Run {
            config,
            cycles,
            threads,
        } => run_loop(&config, cycles, threads),
        Command::Check { config } => run_check(&config),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("minuteman=info"));
    // Ignore the error if a subscriber is already installed (tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: &PathBuf) -> Result<BotConfig, ExitCode> {
    ini_config::load_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn run_loop(config_path: &PathBuf, cycles: Option<u64>, threads: Option<usize>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Some(n) = threads
        && let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(n).build_global()
    {
        let err = EngineError::ConfigInvalid {
            section: "run".to_string(),
            key: "threads".to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        return ExitCode::from(&err);
    }

    let board = PriceBoard::new();
    let bars = CsvBarSource::new(&config.run.data_dir).with_board(board.clone());
    let gateway = PaperGateway::new(board, config.run.fill_model);
    let journal = LogJournal;

    let mut orchestrator = match CycleOrchestrator::new(
        bars,
        gateway,
        journal,
        config.strategies,
        config.run.universe,
        config.run.risk_per_trade_pct,
    ) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    let interval = Duration::from_secs(config.run.cycle_minutes as u64 * 60);
    let mut completed: u64 = 0;
    loop {
        let now = chrono::Local::now().naive_local();
        let report = orchestrator.run_cycle(now);
        println!(
            "cycle {}: {} entries, {} exits, {} errors",
            report.cycle, report.entries, report.exits, report.errors
        );

        completed += 1;
        if let Some(limit) = cycles
            && completed >= limit
        {
            break;
        }
        std::thread::sleep(interval);
    }
    info!(cycles = completed, "run finished");
    ExitCode::SUCCESS
}

fn run_check(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    println!("config ok: {}", config_path.display());
    println!(
        "universe: {} symbols ({})",
        config.run.universe.len(),
        config.run.universe.join(", ")
    );
    for strategy in &config.strategies {
        let indicators = strategy.indicator_ids();
        println!(
            "strategy {}: {} max positions, {} indicators, session end {}",
            strategy.id, strategy.max_positions, indicators.len(), strategy.session_end
        );
        println!("  entry: {:?}", strategy.entry);
        println!("  exit: {:?}", strategy.exit_signal);
        if let Some(filter) = &strategy.trend_filter {
            println!("  trend filter: {:?}", filter);
        }
    }
    for symbol in &config.run.universe {
        let path = config.run.data_dir.join(format!("{}.csv", symbol));
        if !path.exists() {
            println!("warning: no data file for {} at {}", symbol, path.display());
        }
    }
    ExitCode::SUCCESS
}
