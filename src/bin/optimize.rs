//! Workflow Optimizer Binary
//!
//! Searches the variant catalog for the workflow with the best walk-forward
//! win rate on one or more instruments.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stratflow::application::catalog::{Toolbox, VariantCatalog};
use stratflow::application::session::{OptimizationSession, Services};
use stratflow::config::{LlmEnvConfig, OptimizerSettings};
use stratflow::domain::evaluation::EvaluationResult;
use stratflow::domain::outcomes::{BatchReport, InstrumentOutcome, OptimizationResult};
use stratflow::domain::ports::{
    GenerationConstraints, MarketDataFeed, NewsFeed, SeriesSource, TextGenerationService,
};
use stratflow::infrastructure::market_data::{CsvBarFeed, ResilientDataFeed, YahooChartFeed};
use stratflow::infrastructure::news::{
    LexiconSentimentScorer, MockNewsFeed, ResilientNewsFeed, RssNewsFeed,
};
use stratflow::infrastructure::{OpenAiCompatibleClient, TtlCache};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Workflow search and optimization", long_about = None)]
struct Cli {
    /// Synthetic bars and canned headlines only, no network access
    #[arg(long, global = true)]
    offline: bool,

    /// TOML settings file (defaults and STRATFLOW_* overrides still apply)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Directory of `<INSTRUMENT>.csv` bar files used instead of the remote feed
    #[arg(long, global = true)]
    csv_dir: Option<PathBuf>,

    /// Print Prometheus metrics when done
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize a single instrument
    Run {
        #[arg(short, long, default_value = "AAPL")]
        instrument: String,

        /// Number of rounds (overrides the settings file)
        #[arg(short, long)]
        rounds: Option<usize>,

        /// Directory for JSON run artifacts
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Optimize several instruments in batches
    Batch {
        /// Comma-separated list of instruments
        #[arg(short, long, default_value = "AAPL,MSFT,TSLA")]
        instruments: String,

        #[arg(short, long)]
        max_concurrent: Option<usize>,

        #[arg(short, long)]
        rounds: Option<usize>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Backtest one catalog variant on one instrument
    Evaluate {
        #[arg(short, long, default_value = "AAPL")]
        instrument: String,

        #[arg(short, long, default_value = "technical")]
        variant: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(stdout_layer)
        .init();

    let cli = Cli::parse();
    let mut settings = OptimizerSettings::load(cli.settings.as_deref())?;

    match &cli.command {
        Commands::Run { rounds, output, .. } => {
            apply_overrides(&mut settings, *rounds, None, output.clone());
        }
        Commands::Batch {
            rounds,
            max_concurrent,
            output,
            ..
        } => {
            apply_overrides(&mut settings, *rounds, *max_concurrent, output.clone());
        }
        Commands::Evaluate { .. } => {}
    }

    let services = build_services(&cli, &settings)?;
    let session = OptimizationSession::create(settings, services)
        .await
        .context("Invalid optimizer configuration")?;

    let stop = session.stop_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, finishing rounds in flight");
            stop.stop();
        }
    });

    match &cli.command {
        Commands::Run { instrument, .. } => {
            let result = session.run_single(instrument).await?;
            print_run(&result);
        }
        Commands::Batch { instruments, .. } => {
            let list: Vec<String> = instruments
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            let report = session.run_batch(&list).await?;
            print_batch(&report);
        }
        Commands::Evaluate {
            instrument,
            variant,
        } => {
            let result = session.evaluate(instrument, variant).await?;
            print_evaluation(&result);
        }
    }

    if cli.metrics {
        println!("{}", session.metrics().render());
    }

    Ok(())
}

fn apply_overrides(
    settings: &mut OptimizerSettings,
    rounds: Option<usize>,
    max_concurrent: Option<usize>,
    output: Option<PathBuf>,
) {
    if let Some(rounds) = rounds {
        settings.max_rounds = rounds;
    }
    if let Some(max_concurrent) = max_concurrent {
        settings.max_concurrent = max_concurrent;
    }
    if output.is_some() {
        settings.artifacts_dir = output;
    }
}

fn build_services(cli: &Cli, settings: &OptimizerSettings) -> Result<Services> {
    let ttl = Duration::from_secs(settings.cache_ttl_secs);
    let fetch_timeout = Duration::from_millis(settings.fetch_timeout_ms);
    let data_seed = settings.seed.unwrap_or_else(rand::random);

    let bar_cache = Arc::new(TtlCache::new(ttl));
    let series: Arc<dyn SeriesSource> = if cli.offline {
        info!("Offline mode: synthetic bars and canned headlines");
        Arc::new(ResilientDataFeed::offline(bar_cache, data_seed))
    } else {
        let primary: Arc<dyn MarketDataFeed> = match &cli.csv_dir {
            Some(dir) => Arc::new(CsvBarFeed::new(dir.clone())),
            None => Arc::new(YahooChartFeed::new(fetch_timeout)),
        };
        Arc::new(ResilientDataFeed::new(
            primary,
            bar_cache,
            fetch_timeout,
            data_seed,
        ))
    };

    let news: Arc<dyn NewsFeed> = if cli.offline {
        Arc::new(MockNewsFeed::new())
    } else {
        Arc::new(ResilientNewsFeed::new(
            vec![Arc::new(RssNewsFeed::new(fetch_timeout))],
            Arc::new(TtlCache::new(ttl)),
            fetch_timeout,
        ))
    };

    let toolbox = Arc::new(Toolbox::new(news, Arc::new(LexiconSentimentScorer::new())));
    let catalog = Arc::new(VariantCatalog::with_builtins(toolbox)?);
    let services = Services::new(catalog, series);

    if cli.offline {
        return Ok(services);
    }

    let llm = LlmEnvConfig::from_env();
    if !llm.is_configured() {
        info!("No LLM API key set, candidates come from search and preferences");
        return Ok(services);
    }
    let client = OpenAiCompatibleClient::from_config(
        &llm,
        Duration::from_millis(settings.generation_timeout_ms),
    )?;
    let constraints = GenerationConstraints {
        temperature: llm.temperature,
        ..GenerationConstraints::default()
    };
    info!("LLM generation enabled ({} at {})", llm.model, llm.base_url);
    Ok(services.with_generation(
        Arc::new(client) as Arc<dyn TextGenerationService>,
        constraints,
    ))
}

fn print_run(result: &OptimizationResult) {
    println!("{}", "=".repeat(80));
    println!("OPTIMIZATION RESULT: {}", result.instrument);
    println!(
        "Start: {} ({:.4})  ->  Best: {} ({:.4})",
        result.initial_variant, result.initial_score, result.best_variant.id, result.best_score
    );
    println!(
        "Rounds: {} ({} accepted, {} failed)",
        result.history.len(),
        result.accepted_rounds(),
        result.failed_rounds()
    );
    if let Some(evaluation) = &result.best_evaluation {
        println!(
            "Trades: {}  Win rate: {:.1}%  Sharpe: {:.3}{}",
            evaluation.total_trades,
            evaluation.win_rate * 100.0,
            evaluation.sharpe_ratio,
            if evaluation.synthetic_data {
                "  (synthetic data)"
            } else {
                ""
            }
        );
    }
    println!("{}", "=".repeat(80));
}

fn print_batch(report: &BatchReport) {
    println!("{}", "=".repeat(80));
    println!(
        "BATCH RESULT: {}/{} succeeded in {} ms, average best {:.4}",
        report.succeeded, report.total, report.duration_ms, report.average_score
    );
    for (instrument, outcome) in &report.results {
        match outcome {
            InstrumentOutcome::Succeeded { result } => println!(
                "  {:<10} {:<40} {:.4}",
                instrument, result.best_variant.id, result.best_score
            ),
            InstrumentOutcome::Failed { reason } => {
                println!("  {:<10} FAILED: {}", instrument, reason)
            }
        }
    }
    if let Some(best) = &report.global_best {
        println!(
            "Global best: {} on {} ({:.4})",
            best.variant.id, best.instrument, best.score
        );
    }
    println!("{}", "=".repeat(80));
}

fn print_evaluation(result: &EvaluationResult) {
    println!("{}", "=".repeat(80));
    println!("BACKTEST: {} on {}", result.variant_id, result.instrument);
    println!(
        "Score: {:.4}  Trades: {} ({} wins)  Return: {:.2}%  Sharpe: {:.3}",
        result.score,
        result.total_trades,
        result.wins,
        result.total_return * 100.0,
        result.sharpe_ratio
    );
    if let Some(fallback) = &result.fallback {
        println!("Fallback: {:?}", fallback);
    }
    for trade in &result.trades {
        println!(
            "  {}  {:?}  conf {:.2}  actual {:+.2}%  {}",
            trade.date,
            trade.signal,
            trade.confidence,
            trade.actual_return * 100.0,
            if trade.correct { "ok" } else { "-" }
        );
    }
    println!("{}", "=".repeat(80));
}
