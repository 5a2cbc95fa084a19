use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use footy_xref::config::PipelineConfig;
use footy_xref::ingest::load_records;
use footy_xref::lookup::WikipediaLookup;
use footy_xref::persist;
use footy_xref::pipeline::{PipelineInput, run_pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("footy_xref=info".parse()?))
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let clubs_path = path_arg(&args, "--clubs").ok_or_else(|| anyhow!("missing --clubs <path>"))?;
    let players_path =
        path_arg(&args, "--players").ok_or_else(|| anyhow!("missing --players <path>"))?;
    let db_path = path_arg(&args, "--db")
        .or_else(persist::default_db_path)
        .context("unable to resolve sqlite path")?;

    let mut config = PipelineConfig::from_env();
    if args.iter().any(|arg| arg == "--no-lookup") {
        config.external_lookup = false;
    }

    let started_at = Utc::now();
    let input = PipelineInput {
        clubs: load_records(&clubs_path)?,
        players: load_records(&players_path)?,
    };
    let lookup = WikipediaLookup::from_config(&config)?;
    let output = run_pipeline(&input, &config, &lookup).await?;

    let mut conn = persist::open_db(&db_path)?;
    let saved = persist::save_tables(
        &mut conn,
        &db_path,
        &output.tables,
        &output.report,
        &config.sources,
        started_at,
    )?;

    let report = &output.report;
    println!("Cross-reference complete");
    println!("DB: {} (run {})", saved.db_path.display(), saved.run_id);
    println!(
        "Clubs: {} ({} complete, {} partial)",
        report.clubs_total,
        report.clubs_complete,
        report.clubs_partial()
    );
    println!(
        "Players: {} ({} exact, {} cascade, {} partial)",
        report.players_total(),
        report.players_exact,
        report.players_cascade_complete,
        report.players_partial
    );
    println!(
        "Lookups: {} issued, {} failed, {} with alternates",
        report.lookups_issued, report.lookups_failed, report.lookups_with_alternates
    );
    for (heuristic, count) in &report.filled_by {
        println!("  {:<15} {count}", heuristic.as_str());
    }
    if !report.gaps.is_empty() {
        println!("Gaps: {}", report.gaps.len());
        for (kind, count) in report.gap_counts() {
            println!("  {kind:?}: {count}");
        }
        for gap in report.gaps.iter().take(12) {
            println!("   - {:?} {} [{}] {}", gap.kind, gap.site, gap.group, gap.name);
        }
    }

    Ok(())
}

fn path_arg(args: &[String], flag: &str) -> Option<PathBuf> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix(prefix.as_str()) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
