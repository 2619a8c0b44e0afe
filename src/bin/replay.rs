//! Backfill tool
//!
//! Replays a JSON-lines event file into the configured database.
//!
//! Run with: cargo run --bin replay --release -- --file events.jsonl [--skip-malformed]

use std::sync::Arc;
use std::time::Instant;

use payroll_indexer::engine::AggregationEngine;
use payroll_indexer::ingest::{BatchReport, Ingestor, JsonLinesSource, ReplayError};
use payroll_indexer::store::SqliteStore;
use payroll_indexer::{db, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payroll_indexer=warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let path = args
        .iter()
        .position(|a| a == "--file")
        .and_then(|i| args.get(i + 1))
        .ok_or_else(|| anyhow::anyhow!("usage: replay --file <events.jsonl> [--skip-malformed]"))?;
    let skip_malformed = args.iter().any(|a| a == "--skip-malformed");

    let config = Config::from_env()?;

    println!("Replaying {}", path);
    println!("Connecting to database...");

    let pool = db::connect(&config.database_url, config.database_max_connections).await?;
    db::migrate(&pool).await?;

    let engine = AggregationEngine::new(Arc::new(SqliteStore::new(pool.clone())));
    let ingestor = Ingestor::new(engine);
    let mut source = JsonLinesSource::open(path).await?;

    let start = Instant::now();
    let result = ingestor.ingest_source(&mut source, skip_malformed).await;
    let seconds = start.elapsed().as_secs_f64();
    pool.close().await;

    match result {
        Ok(report) => {
            print_summary(&report, seconds);
            Ok(())
        }
        Err(ReplayError::Halted(halted)) => {
            eprintln!("line {}: {}", halted.index, halted.source);
            print_summary(&halted.report, seconds);
            Err(anyhow::anyhow!("replay halted at line {}", halted.index))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_summary(report: &BatchReport, seconds: f64) {
    let rate = report.applied as f64 / seconds.max(f64::EPSILON);

    for rejection in &report.rejected {
        eprintln!("line {}: skipped malformed event: {}", rejection.index, rejection.reason);
    }

    println!("\n=== Replay Results ===");
    println!("Applied: {}", report.applied);
    println!("Duplicates: {}", report.duplicates);
    println!("Skipped (malformed): {}", report.rejected.len());
    println!("Time: {:.2}s", seconds);
    println!("Rate: {:.0} events/sec", rate);
}
