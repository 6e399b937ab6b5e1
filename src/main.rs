use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use serp_layout::db::{self, SqliteStore};
use serp_layout::pipeline::{self, KeywordJob};
use serp_layout::serp::render_layout_stack;

#[derive(Parser)]
#[command(name = "serp_layout", about = "SERP layout tracking, stability scoring and intent alerts")]
struct Cli {
    /// SQLite database path
    #[arg(long, env = "SERP_DB_PATH", default_value = db::DEFAULT_DB_PATH, global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema (read commands need it; `process` runs it too)
    Init,
    /// Create the schema if missing, then parse, score and persist a batch of SERP responses
    Process {
        /// JSON file: array of {keyword_id, keyword, items}
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Show layout history for a keyword
    History {
        #[arg(short = 'k', long)]
        keyword_id: i64,
        /// Max snapshots to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show recent intent alerts
    Alerts {
        #[arg(short = 'k', long)]
        keyword_id: Option<i64>,
        /// Max alerts to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show row counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let store = SqliteStore::open(&cli.db)?;

    match cli.command {
        Commands::Init => {
            store.init_schema()?;
            println!("Schema ready at {}", cli.db.display());
        }
        Commands::Process { input } => {
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let jobs: Vec<KeywordJob> = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", input.display()))?;
            if jobs.is_empty() {
                println!("No keywords in {}.", input.display());
                return Ok(());
            }

            store.init_schema()?;
            println!("Processing {} keywords...", jobs.len());
            let pb = ProgressBar::new(jobs.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
                    .progress_chars("#>-"),
            );
            let mut tick = |done: usize, _total: usize| pb.set_position(done as u64);
            let summary = pipeline::process_batch(&store, &jobs, Some(&mut tick)).await;
            pb.finish_and_clear();

            println!(
                "Processed {} keywords ({} failed), {} alerts.",
                summary.processed, summary.failed, summary.alerts_generated
            );
        }
        Commands::History { keyword_id, limit } => {
            let rows = store
                .fetch_snapshot_history(keyword_id, limit)
                .context("failed to read snapshots (has `init` been run?)")?;
            if rows.is_empty() {
                println!("No snapshots for keyword {}.", keyword_id);
                return Ok(());
            }

            println!(
                "{:>5} | {:<19} | {:>5} | {:>7} | {}",
                "#", "Captured", "Score", "Organic", "Layout"
            );
            println!("{}", "-".repeat(90));
            for r in &rows {
                println!(
                    "{:>5} | {:<19} | {:>5} | {:>7} | {}",
                    r.id,
                    r.captured_at.format("%Y-%m-%d %H:%M:%S"),
                    r.stability_score,
                    r.organic_start_position,
                    render_layout_stack(&r.layout_stack)
                );
            }
        }
        Commands::Alerts { keyword_id, limit } => {
            let rows = store
                .fetch_recent_alerts(keyword_id, limit)
                .context("failed to read alerts (has `init` been run?)")?;
            if rows.is_empty() {
                println!("No alerts.");
                return Ok(());
            }

            println!(
                "{:>5} | {:>7} | {:<19} | {:<6} | {}",
                "#", "Keyword", "Type", "Sev", "Title"
            );
            println!("{}", "-".repeat(90));
            for r in &rows {
                println!(
                    "{:>5} | {:>7} | {:<19} | {:<6} | {}",
                    r.id,
                    r.keyword_id,
                    truncate(&r.alert_type, 19),
                    r.severity,
                    r.title
                );
            }
        }
        Commands::Stats => {
            let s = store.get_stats().context("failed to read stats (has `init` been run?)")?;
            println!("Keywords:  {}", s.keywords);
            println!("Snapshots: {}", s.snapshots);
            println!("Items:     {}", s.items);
            println!("Presences: {}", s.presences);
            println!("Citations: {}", s.citations);
            println!("Alerts:    {}", s.alerts);
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
