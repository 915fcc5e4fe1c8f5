//! Backreach CLI
//!
//! Command-line driver for backward reachability over the ACAS Xu closed loop.
//!
//! # Commands
//!
//! - `backreach single` - Search one scenario (explicit fields or a grid index)
//! - `backreach all` - Search every scenario of the configured grid in parallel
//! - `backreach replay` - Search one scenario and replay its counterexample forward

use anyhow::{bail, Context, Result};
use backreach_core::{Command, ScenarioParams};
use backreach_dynamics::DubinsDynamics;
use backreach_nnet::NetworkBank;
use backreach_search::{
    replay_witness, run_all, run_index, BackreachConfig, BackreachResult, BackreachSearch,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "backreach")]
#[command(about = "Backward reachability search for neural-network collision avoidance")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON configuration file (defaults apply to missing fields)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the five networks (defaults to $BACKREACH_NNET_DIR)
    #[arg(long, global = true)]
    nnet_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a single scenario
    Single {
        #[command(flatten)]
        scenario: ScenarioArgs,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search every scenario of the configured grid
    All {
        /// First grid index to run
        #[arg(long, default_value = "0")]
        start_index: usize,
        /// Run at most this many scenarios
        #[arg(long)]
        limit: Option<usize>,
        /// Worker threads (overrides the config file)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search a single scenario and replay its counterexample forward
    Replay {
        #[command(flatten)]
        scenario: ScenarioArgs,
    },
}

/// One scenario, by grid index or by explicit fields.
#[derive(Args)]
struct ScenarioArgs {
    /// Grid index; overrides the explicit fields below
    #[arg(long)]
    index: Option<usize>,
    /// Initial advisory code (0 = clear, 1 = weak left, 2 = weak right, 3 = strong left, 4 = strong right)
    #[arg(long = "cmd", default_value = "4")]
    initial_command: u8,
    /// Own x interval, lower end (position quanta)
    #[arg(long, default_value_t = -3, allow_negative_numbers = true)]
    x_lo: i64,
    /// Own x interval, upper end
    #[arg(long, default_value_t = -2, allow_negative_numbers = true)]
    x_hi: i64,
    /// Own y interval, lower end
    #[arg(long, default_value_t = -4, allow_negative_numbers = true)]
    y_lo: i64,
    /// Own y interval, upper end
    #[arg(long, default_value_t = -3, allow_negative_numbers = true)]
    y_hi: i64,
    /// Own heading level
    #[arg(long, default_value = "152")]
    qtheta1: i64,
    /// Own speed level
    #[arg(long, default_value = "2")]
    qv_own: i64,
    /// Intruder speed level
    #[arg(long, default_value = "7")]
    qv_int: i64,
}

impl ScenarioArgs {
    fn params(&self) -> Result<ScenarioParams> {
        let initial_command = match Command::try_from(self.initial_command) {
            Ok(cmd) => cmd,
            Err(_) => bail!("--cmd must be an advisory code 0..=4, got {}", self.initial_command),
        };
        let params = ScenarioParams {
            initial_command,
            x_own: (self.x_lo, self.x_hi),
            y_own: (self.y_lo, self.y_hi),
            qtheta1: self.qtheta1,
            qv_own: self.qv_own,
            qv_int: self.qv_int,
        };
        params.validate()?;
        Ok(params)
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<BackreachConfig> {
    match path {
        Some(path) => {
            let config = BackreachConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(BackreachConfig::default()),
    }
}

fn run_scenario(
    search: &BackreachSearch<'_>,
    config: &BackreachConfig,
    scenario: &ScenarioArgs,
) -> Result<BackreachResult> {
    match scenario.index {
        Some(index) => {
            let space = config.grid.space(&config.quanta)?;
            Ok(run_index(search, &space, index)?)
        }
        None => Ok(search.run(0, scenario.params()?)?),
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    let dir = NetworkBank::resolve_dir(cli.nnet_dir.as_deref())
        .context("no network directory (pass --nnet-dir or set BACKREACH_NNET_DIR)")?;
    let bank = NetworkBank::load_dir(&dir, config.quanta.clone())
        .with_context(|| format!("loading networks from {}", dir.display()))?;
    let dynamics = DubinsDynamics::new(config.quanta.clone());

    match cli.command {
        Commands::Single { scenario, json } => {
            let search = BackreachSearch::new(&dynamics, &bank, &config.quanta, &config.search);
            let result = run_scenario(&search, &config, &scenario)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result.to_summary()?)?);
            } else {
                println!("{}", result.summary());
                if let Some(state) = &result.counterexample {
                    println!("Counterexample: {}", state);
                }
            }
        }
        Commands::All {
            start_index,
            limit,
            threads,
            json,
        } => {
            if threads.is_some() {
                config.parallel.max_threads = threads;
                config.validate().context("invalid --threads")?;
            }
            let search = BackreachSearch::new(&dynamics, &bank, &config.quanta, &config.search);
            let space = config.grid.space(&config.quanta)?;
            let report = run_all(&search, space, start_index, limit, &config.parallel)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.summary());
            }
        }
        Commands::Replay { scenario } => {
            let search = BackreachSearch::new(&dynamics, &bank, &config.quanta, &config.search);
            let result = run_scenario(&search, &config, &scenario)?;
            println!("{}", result.summary());
            match &result.counterexample {
                Some(state) => {
                    println!("{}", state.replay_header());
                    let report = replay_witness(state, &bank, &dynamics, &config.quanta)
                        .with_context(|| format!("replaying {}", state))?;
                    println!("{}", report);
                }
                None => println!("No counterexample to replay"),
            }
        }
    }

    bank.log_cache_stats();
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
