use std::path::PathBuf;

use anyhow::{Context, Result};
use catalyst_app::{render_summary, run_headless, HeadlessOptions};
use catalyst_core::TickRate;
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "catalyst",
    version,
    about = "Run a headless three-faction catalyst territory match"
)]
struct Cli {
    /// Maximum number of ticks to simulate.
    #[arg(long, default_value_t = 3_600)]
    ticks: u64,
    /// RNG seed; overrides the seed in the config file.
    #[arg(long, env = "CATALYST_SEED")]
    seed: Option<u64>,
    /// JSON arena configuration file.
    #[arg(long, env = "CATALYST_CONFIG")]
    config: Option<PathBuf>,
    /// Frame pacing.
    #[arg(long, value_enum, default_value_t = RateArg::Normal)]
    rate: RateArg,
    /// Ticks per frame when running fast.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    fast_multiplier: u32,
    /// Log a territory report every N ticks (0 disables).
    #[arg(long, default_value_t = 300)]
    report_every: u64,
    /// Print the final report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RateArg {
    Slow,
    Normal,
    Fast,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let rate = match cli.rate {
        RateArg::Slow => TickRate::Slow,
        RateArg::Normal => TickRate::Normal,
        RateArg::Fast => TickRate::Fast(cli.fast_multiplier),
    };
    let options = HeadlessOptions {
        ticks: cli.ticks,
        seed: cli.seed,
        config_path: cli.config,
        rate,
        report_every: cli.report_every,
    };

    let report = run_headless(&options)?;
    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{json}");
    } else {
        print!("{}", render_summary(&report));
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
