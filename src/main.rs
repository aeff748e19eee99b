use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::*;
use eyre::{Context, Result};
use log::info;

use warpsim::agents::RandomPolicy;
use warpsim::config::EngineConfig;
use warpsim::dispatch::LogSink;
use warpsim::domain::{Priority, WorkItem};
use warpsim::engine::Engine;
use warpsim::record::CompletionLog;

#[derive(Parser)]
#[command(name = "warpsim", about = "Time-dilated multi-agent work simulation engine")]
struct Cli {
    /// Path to a configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine until Ctrl-C
    Run {
        /// Speed level to activate at startup
        #[arg(long)]
        speed: Option<u8>,

        /// Stop automatically after this many wall seconds
        #[arg(long)]
        for_secs: Option<u64>,

        /// Submit a demo work item on every status interval
        #[arg(long)]
        feed: bool,
    },
    /// Validate the configuration and print the agent roster
    Check,
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warpsim")
}

fn setup_logging() -> Result<()> {
    let log_dir = data_dir().join("logs");
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("warpsim.log");
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    let cli = Cli::parse();

    let config = EngineConfig::load(cli.config.as_ref())?;

    if cli.verbose {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match cli.command {
        None | Some(Commands::Check) => check_config(&config),
        Some(Commands::Run { speed, for_secs, feed }) => {
            run_engine(config, speed, for_secs, feed).await
        }
    }
}

fn check_config(config: &EngineConfig) -> Result<()> {
    config.validate()?;
    println!("{}", "Configuration OK".green());
    println!(
        "  speed levels: {}",
        config
            .speed_levels
            .levels()
            .iter()
            .map(|l| format!("{}x", l.multiplier))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  cycle length: {} sim seconds", config.cycle.length_sim_secs);
    println!(
        "  rate limit: {}/min, {}/hour",
        config.rate_limit.per_minute, config.rate_limit.per_hour
    );
    println!("  agents:");
    for agent in &config.agents {
        println!(
            "    {} [{}] x{}{}",
            agent.id.cyan(),
            agent.capability_tags.join(", "),
            agent.speed_multiplier,
            if agent.auto_respond { " (auto-respond)" } else { "" }
        );
    }
    Ok(())
}

async fn run_engine(
    config: EngineConfig,
    speed: Option<u8>,
    for_secs: Option<u64>,
    feed: bool,
) -> Result<()> {
    let recorder = Arc::new(CompletionLog::open(data_dir().join("completions.jsonl"))?);
    println!("Completion log: {}", recorder.path().display());

    let mut engine = Engine::new(config, Arc::new(RandomPolicy), Arc::new(LogSink), recorder)?;
    engine.start();

    if let Some(level) = speed {
        engine.set_speed(level)?;
    }

    println!("{}", "Engine running, Ctrl-C to stop".cyan());
    let started = std::time::Instant::now();
    let mut feed_counter: usize = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(2)) => {
                if feed {
                    submit_demo_item(&engine, &mut feed_counter);
                }
                print_status(&engine);
                if let Some(secs) = for_secs
                    && started.elapsed() >= Duration::from_secs(secs)
                {
                    break;
                }
            }
        }
    }

    engine.shutdown().await;
    println!("{}", "Engine stopped".cyan());
    print_status(&engine);
    Ok(())
}

/// Submit one demo item per interval, rotating through the roster's tags
/// and priority classes.
fn submit_demo_item(engine: &Engine, counter: &mut usize) {
    let roster = engine.roster();
    if roster.is_empty() {
        return;
    }
    let priority = Priority::ALL[*counter % Priority::ALL.len()];
    let profile = roster[*counter % roster.len()];
    let tag = profile.capability_tags[*counter % profile.capability_tags.len()].clone();
    *counter += 1;

    let item = WorkItem::new(&format!("demo item {}", counter), vec![tag], priority);
    match engine.submit(item) {
        Ok(agent_id) => info!("demo item routed to {}", agent_id),
        Err(e) => info!("demo item not routed: {}", e),
    }
}

fn print_status(engine: &Engine) {
    let status = engine.status();
    println!(
        "{} {}x | sim {:.0}s | cycle {} | {}",
        if status.paused { "paused".yellow() } else { "running".green() },
        status.multiplier,
        status.sim_elapsed_secs,
        status.cycle_number,
        status
            .agents
            .iter()
            .map(|a| format!(
                "{}: q{} ok{} fail{} esc{}",
                a.agent_id, a.queue_depth, a.stats.processed, a.stats.failed, a.stats.escalated
            ))
            .collect::<Vec<_>>()
            .join(" | ")
    );
}
