//! tradegym CLI — download, run, and cache management commands.
//!
//! Commands:
//! - `download` — fetch daily bars + adjustment factors and cache them as CSV
//! - `run` — play one episode from a TOML config file or flags
//! - `cache status` — report cached instruments and their date ranges
//!
//! The Tushare provider needs an account token in `TUSHARE_TOKEN`.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tradegym_core::data::{BarProvider, CsvCache, TushareProvider};
use tradegym_env::{load_history, make_env, EpisodeConfig, LoadOptions, Scenario};

#[derive(Parser)]
#[command(
    name = "tradegym",
    about = "Restricted-liquidity exchange simulator over daily bars"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily bars and adjustment factors, caching them as CSV.
    Download {
        /// Instrument codes (e.g. 000001.SZ 600000.SH).
        #[arg(required = true)]
        codes: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to 2019-01-01.
        #[arg(long, default_value = "2019-01-01")]
        start: String,

        /// End date (YYYY-MM-DD). Defaults to 2020-01-01.
        #[arg(long, default_value = "2020-01-01")]
        end: String,

        /// Re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Cache directory.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Play one episode and print the day-by-day account summary.
    Run {
        /// Path to a TOML episode config; flags below are ignored if set.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Instrument codes.
        #[arg(long)]
        codes: Vec<String>,

        /// Scenario: simple, average, or multi_vol.
        #[arg(long, default_value = "simple")]
        scenario: String,

        /// Initial cash.
        #[arg(long, default_value_t = 100_000.0)]
        investment: f64,

        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = "2019-01-01")]
        start: String,

        /// End date (YYYY-MM-DD).
        #[arg(long, default_value = "2020-01-01")]
        end: String,

        /// Policy: "random" bids, or "hold" (mark-to-market only).
        #[arg(long, default_value = "random")]
        policy: String,

        /// Seed for the random policy.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Offline mode: no network access.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Use synthetic data when real data is unavailable.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Cache directory.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached instruments, row counts, and date ranges.
    Status {
        /// Cache directory.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Download {
            codes,
            start,
            end,
            force,
            cache_dir,
        } => run_download(codes, &start, &end, force, cache_dir),
        Commands::Run {
            config,
            codes,
            scenario,
            investment,
            start,
            end,
            policy,
            seed,
            offline,
            synthetic,
            cache_dir,
        } => {
            let episode = match config {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    EpisodeConfig::from_toml(&text)
                        .with_context(|| format!("parsing {}", path.display()))?
                }
                None => build_config(codes, &scenario, investment, &start, &end)?,
            };
            run_episode(episode, &policy, seed, offline, synthetic, cache_dir)
        }
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(cache_dir),
        },
    }
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{text}', expected YYYY-MM-DD"))
}

fn provider_from_env() -> Option<TushareProvider> {
    std::env::var("TUSHARE_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
        .map(TushareProvider::new)
}

fn build_config(
    codes: Vec<String>,
    scenario: &str,
    investment: f64,
    start: &str,
    end: &str,
) -> Result<EpisodeConfig> {
    if codes.is_empty() {
        bail!("pass at least one --codes instrument or a --config file");
    }
    let Some(scenario) = Scenario::from_name(scenario) else {
        bail!("unknown scenario '{scenario}' (expected simple, average, or multi_vol)");
    };
    let mut config = EpisodeConfig::new(codes, parse_date(start)?, parse_date(end)?);
    config.scenario = scenario;
    config.investment = investment;
    Ok(config)
}

fn run_download(
    codes: Vec<String>,
    start: &str,
    end: &str,
    force: bool,
    cache_dir: PathBuf,
) -> Result<()> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    let cache = CsvCache::new(&cache_dir);
    let Some(provider) = provider_from_env() else {
        bail!("downloading requires a Tushare token in TUSHARE_TOKEN");
    };

    let total = codes.len();
    let mut failed = 0usize;
    for (i, code) in codes.iter().enumerate() {
        println!("[{}/{total}] Fetching {code}...", i + 1);
        if !force && cache.contains(code) {
            println!("  cached, skipping (use --force to re-download)");
            continue;
        }
        match provider.fetch(code, start, end) {
            Ok(fetched) => {
                cache.write(code, &fetched.bars)?;
                println!("  OK: {} bars", fetched.bars.len());
            }
            Err(e) => {
                failed += 1;
                println!("  FAIL: {e}");
            }
        }
    }
    println!("\nDownload complete: {}/{total} succeeded", total - failed);
    if failed > 0 {
        bail!("{failed} of {total} downloads failed");
    }
    Ok(())
}

fn run_episode(
    config: EpisodeConfig,
    policy: &str,
    seed: u64,
    offline: bool,
    synthetic: bool,
    cache_dir: PathBuf,
) -> Result<()> {
    let only_update = match policy {
        "random" => false,
        "hold" => true,
        other => bail!("unknown policy '{other}' (expected random or hold)"),
    };

    let cache = CsvCache::new(&cache_dir);
    let provider = provider_from_env();
    let loaded = load_history(
        &config.codes,
        &cache,
        provider.as_ref().map(|p| p as &dyn BarProvider),
        &LoadOptions {
            start: config.start,
            end: config.end,
            offline,
            synthetic,
            force: false,
        },
    )?;
    if loaded.dropped_bars > 0 {
        eprintln!("WARNING: dropped {} insane bars on ingest", loaded.dropped_bars);
    }

    println!(
        "episode {} | scenario {} | {} instruments | dataset {}",
        &config.config_id()[..12],
        config.scenario.name(),
        config.codes.len(),
        &loaded.dataset_hash[..12],
    );
    if loaded.has_synthetic {
        println!("NOTE: running on synthetic data");
    }

    let investment = config.investment;
    let mut env = make_env(config, loaded.store)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut days = 0usize;
    let mut trades = 0usize;

    loop {
        let action = if only_update {
            Vec::new()
        } else {
            env.random_action(&mut rng)
        };
        let t = env.step(&action, only_update)?;
        days += 1;
        trades += t.info.fills.len();
        for fill in &t.info.fills {
            println!(
                "{} {:?} {} x{} @ {:.2} ({:+.1})",
                t.info.date, fill.side, fill.code, fill.volume, fill.clearing_price, fill.cash_delta
            );
        }
        if t.done {
            break;
        }
    }

    let final_value = env.portfolio_value();
    println!("\n{days} days, {trades} fills");
    println!("final portfolio value: {final_value:.1}");
    println!(
        "total P&L: {:+.1} ({:+.2}%)",
        final_value - investment,
        (final_value / investment - 1.0) * 100.0
    );
    println!("total reward: {:.3}", env.total_reward());
    Ok(())
}

fn run_cache_status(cache_dir: PathBuf) -> Result<()> {
    let cache = CsvCache::new(&cache_dir);
    let entries = cache.status()?;
    if entries.is_empty() {
        println!("cache at {} is empty", cache_dir.display());
        return Ok(());
    }
    println!("{} cached instruments in {}:", entries.len(), cache_dir.display());
    for entry in entries {
        let range = match (entry.first, entry.last) {
            (Some(first), Some(last)) => format!("{first} → {last}"),
            _ => "(empty)".to_string(),
        };
        println!("  {:<12} {:>6} rows  {range}", entry.code, entry.rows);
    }
    Ok(())
}
