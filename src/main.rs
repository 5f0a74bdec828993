// src/main.rs

use anyhow::{Context, Result};
use blsingest::{
    config::PipelineConfig,
    extract::TableKind,
    pipeline,
    store::{rankings::RANKED, DuckStore, OccupationStore},
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "blsingest")]
#[command(about = "Load BLS occupational workbooks into a queryable DuckDB store")]
struct Cli {
    /// YAML config; flags below override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Default)]
struct StoreArgs {
    /// DuckDB file, or `:memory:`
    #[arg(long)]
    database: Option<String>,
}

#[derive(Args, Clone, Default)]
struct SourceArgs {
    /// Workbook (.xlsx, .zip of CSVs, or a CSV directory)
    #[arg(long)]
    workbook: Option<PathBuf>,

    /// Only process sheets whose name matches this regex
    #[arg(long)]
    sheet_filter: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Load the occupation taxonomy into `occupations`
    Taxonomy {
        #[arg(long)]
        taxonomy: Option<PathBuf>,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Run the full pipeline
    Ingest {
        #[arg(long)]
        taxonomy: Option<PathBuf>,
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        store: StoreArgs,
        /// Year used when a sheet carries none
        #[arg(long)]
        default_data_year: Option<i32>,
        /// Write the run summary as JSON here
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Recompute ranking views and print the top entries
    Rankings {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Show how each sheet would be read, without a store
    Inspect {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// List recent ingest runs
    Runs {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn apply_store(cfg: &mut PipelineConfig, args: &StoreArgs) {
    if let Some(db) = &args.database {
        cfg.database = db.clone();
    }
}

fn apply_source(cfg: &mut PipelineConfig, args: &SourceArgs) {
    if let Some(w) = &args.workbook {
        cfg.workbook = Some(w.clone());
    }
    if let Some(f) = &args.sheet_filter {
        cfg.sheet_filter = Some(f.clone());
    }
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,blsingest=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) config: defaults < YAML < flags ──────────────────────────
    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };

    // ─── 3) run the requested stage ──────────────────────────────────
    match cli.command {
        Command::Taxonomy { taxonomy, store } => {
            apply_store(&mut cfg, &store);
            if taxonomy.is_some() {
                cfg.taxonomy = taxonomy;
            }
            let db = DuckStore::open(&cfg.database)?;
            let (tax, report) = pipeline::load_taxonomy(&cfg, &db)?;
            info!(
                detailed = tax.detailed_count(),
                rows = report.occupations,
                failed = report.failed,
                "taxonomy loaded"
            );
        }
        Command::Ingest {
            taxonomy,
            source,
            store,
            default_data_year,
            summary,
        } => {
            apply_store(&mut cfg, &store);
            apply_source(&mut cfg, &source);
            if taxonomy.is_some() {
                cfg.taxonomy = taxonomy;
            }
            if default_data_year.is_some() {
                cfg.default_data_year = default_data_year;
            }
            if summary.is_some() {
                cfg.summary_path = summary;
            }
            let db = DuckStore::open(&cfg.database)?;
            let run = pipeline::ingest(&cfg, &db)?;
            println!("{}", run.to_json().context("encoding run summary")?);
        }
        Command::Rankings { store, top } => {
            apply_store(&mut cfg, &store);
            let db = DuckStore::open(&cfg.database)?;
            db.refresh_rankings()?;
            for kind in RANKED {
                print_ranking(&db, kind, top)?;
            }
        }
        Command::Inspect { source } => {
            apply_source(&mut cfg, &source);
            let reports = pipeline::inspect(&cfg)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&reports).context("encoding sheet reports")?
            );
        }
        Command::Runs { store, limit } => {
            apply_store(&mut cfg, &store);
            let db = DuckStore::open(&cfg.database)?;
            for run in db.runs(limit)? {
                println!(
                    "{}  {}  processed={} persisted={} skipped={} orphans={}",
                    run.run_id, run.workbook, run.processed, run.persisted, run.skipped, run.orphans
                );
            }
        }
    }
    Ok(())
}

fn print_ranking(db: &DuckStore, kind: TableKind, top: usize) -> Result<()> {
    let entries = db.ranking(kind, top)?;
    println!("== {} ({} entries)", kind.display_name(), entries.len());
    for e in entries {
        println!("{:>4}  {}  {:>12.1}  ({})", e.rank_order, e.occupation_code, e.value, e.data_year);
    }
    Ok(())
}
