use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use esg_kpi_backend::BackendClient;
use esg_kpi_core::{
    above_threshold, analyze_file, check_threshold, companies, company_profile, compare,
    compute_benchmark, dashboard, deduplicate, load_records, select_for_export, statistics,
    validate_batch, write_csv, AnalyticsConfig, ExportSelection, GroupBy, KpiRecord, RadarMetric,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "esgkpi", version = VERSION, about = "Analytics over extracted ESG KPI results")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// Results file (.json, .jsonl, .csv) or a directory of them.
    input: PathBuf,
    #[arg(long = "min-confidence")]
    min_confidence: Option<f64>,
    /// Keep only the most confident occurrence of each KPI per company.
    #[arg(long, action = ArgAction::SetTrue)]
    dedup: bool,
    #[arg(long = "json-out")]
    json_out: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Analyze {
        #[command(flatten)]
        input: InputArgs,
    },
    Benchmark {
        #[command(flatten)]
        input: InputArgs,
    },
    Compare {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, value_delimiter = ',')]
        companies: Vec<String>,
        #[arg(long = "group-by")]
        group_by: Option<String>,
        #[arg(long)]
        metric: Option<String>,
    },
    Dashboard {
        #[command(flatten)]
        input: InputArgs,
    },
    Company {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        name: String,
    },
    Stats {
        #[command(flatten)]
        input: InputArgs,
    },
    Export {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        company: Option<String>,
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },
    /// Pull the results table, or its dashboard, from the extraction backend.
    Fetch {
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
        #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["companies", "health"])]
        dashboard: bool,
        /// List the company ids the backend knows about.
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "health")]
        companies: bool,
        #[arg(long, action = ArgAction::SetTrue)]
        health: bool,
        #[arg(long = "min-confidence")]
        min_confidence: Option<f64>,
        #[arg(long = "json-out")]
        json_out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let cfg = AnalyticsConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { input } => {
            let records = load_input(&input)?;
            let analysis = analyze_file(&records);
            let s = &analysis.summary;
            println!(
                "kpis={} topics={} avg_confidence={:.2} high={} medium={} low={}",
                s.total_kpis,
                s.unique_topics,
                s.avg_confidence,
                s.high_confidence_kpis,
                s.medium_confidence_kpis,
                s.low_confidence_kpis
            );
            if let Some(path) = input.json_out.as_deref() {
                write_json(&analysis, path)?;
            }
        }
        Commands::Benchmark { input } => {
            let min_confidence = resolve_threshold(&input, &cfg)?;
            let records = load_input(&input)?;
            let rows = compute_benchmark(&records, min_confidence)?;
            for row in &rows {
                println!(
                    "{} mean={:.3} median={:.3} min={:.3} max={:.3} std={:.3} count={}",
                    row.source_id, row.mean, row.median, row.min, row.max, row.std, row.count
                );
            }
            if let Some(path) = input.json_out.as_deref() {
                write_json(&rows, path)?;
            }
        }
        Commands::Compare {
            input,
            companies,
            group_by,
            metric,
        } => {
            let min_confidence = resolve_threshold(&input, &cfg)?;
            let mut ctx = cfg.filter_context().with_companies(companies);
            ctx.min_confidence = min_confidence;
            if let Some(raw) = group_by {
                ctx = ctx.with_group_by(
                    GroupBy::from_str(&raw)
                        .ok_or_else(|| anyhow!("unknown group-by '{raw}'. choose topic|kpi_name"))?,
                );
            }
            if let Some(raw) = metric {
                ctx = ctx.with_metric(
                    RadarMetric::from_str(&raw)
                        .ok_or_else(|| anyhow!("unknown metric '{raw}'. choose value|confidence"))?,
                );
            }
            let records = load_input(&input)?;
            let comparison = compare(&records, &ctx)?;
            println!(
                "average_similarity={:.3}",
                comparison.similarity.average_similarity
            );
            for score in &comparison.scores {
                println!("{} score={:.3}", score.company, score.score);
            }
            emit(&comparison, input.json_out.as_deref())?;
        }
        Commands::Dashboard { input } => {
            let min_confidence = resolve_threshold(&input, &cfg)?;
            let records = load_input(&input)?;
            emit(
                &dashboard(&records, min_confidence)?,
                input.json_out.as_deref(),
            )?;
        }
        Commands::Company { input, name } => {
            let min_confidence = resolve_threshold(&input, &cfg)?;
            let records = load_input(&input)?;
            let profile = company_profile(&records, &name, min_confidence)?.ok_or_else(|| {
                anyhow!("no records for '{name}' at confidence >= {min_confidence}")
            })?;
            emit(&profile, input.json_out.as_deref())?;
        }
        Commands::Stats { input } => {
            let records = load_input(&input)?;
            let stats = statistics(&records);
            println!(
                "kpis={} companies={} topics={} last_extraction={}",
                stats.total_kpis,
                stats.companies,
                stats.unique_topics,
                stats.last_extraction.as_deref().unwrap_or("unknown")
            );
            for name in companies(&records) {
                println!("{name}");
            }
            if let Some(path) = input.json_out.as_deref() {
                write_json(&stats, path)?;
            }
        }
        Commands::Export {
            input,
            company,
            out,
        } => {
            let records = load_input(&input)?;
            let records = match input.min_confidence {
                Some(min) => {
                    check_threshold(min)?;
                    above_threshold(&records, min).into_iter().cloned().collect()
                }
                None => records,
            };
            let selection = company.map_or(ExportSelection::All, ExportSelection::Company);
            let rows = select_for_export(&records, &selection);
            if rows.is_empty() {
                return Err(anyhow!("nothing to export"));
            }
            let out = out.unwrap_or_else(|| PathBuf::from(selection.file_name()));
            export_csv(&rows, &out)?;
        }
        Commands::Fetch {
            out,
            dashboard,
            companies,
            health,
            min_confidence,
            json_out,
        } => {
            let client = BackendClient::from_config(&cfg.backend)?;
            if health {
                let rt = Runtime::new().context("failed to create tokio runtime")?;
                let status = rt.block_on(client.health())?;
                println!(
                    "{} status={} message={}",
                    client.base_url(),
                    status.status,
                    status.message.as_deref().unwrap_or("-")
                );
                if !status.is_healthy() {
                    return Err(anyhow!(
                        "backend at {} is {}",
                        client.base_url(),
                        status.status
                    ));
                }
                return Ok(());
            }
            if companies {
                let rt = Runtime::new().context("failed to create tokio runtime")?;
                let names = rt.block_on(client.companies())?;
                info!(companies = names.len(), "fetched company list");
                match json_out.as_deref() {
                    Some(path) => write_json(&names, path)?,
                    None => names.iter().for_each(|name| println!("{name}")),
                }
                return Ok(());
            }
            if dashboard {
                let min_confidence =
                    check_threshold(min_confidence.unwrap_or(cfg.analytics.min_confidence))?;
                let rt = Runtime::new().context("failed to create tokio runtime")?;
                let remote = rt.block_on(client.dashboard(min_confidence))?;
                emit(&remote.into_dashboard(min_confidence), json_out.as_deref())?;
                return Ok(());
            }
            let raws = client.export_records_blocking()?;
            let batch = validate_batch(&raws);
            if !batch.is_clean() {
                warn!(rejected = batch.rejected.len(), "skipped invalid records");
            }
            let rows = batch.records.iter().collect::<Vec<_>>();
            let out = out.unwrap_or_else(|| PathBuf::from(ExportSelection::All.file_name()));
            export_csv(&rows, &out)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn resolve_threshold(input: &InputArgs, cfg: &AnalyticsConfig) -> Result<f64> {
    let value = input
        .min_confidence
        .unwrap_or(cfg.analytics.min_confidence);
    Ok(check_threshold(value)?)
}

fn load_input(args: &InputArgs) -> Result<Vec<KpiRecord>> {
    let batch = load_records(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    if !batch.is_clean() {
        warn!(
            path = %args.input.display(),
            rejected = batch.rejected.len(),
            "skipped invalid records"
        );
    }
    if args.dedup {
        return Ok(deduplicate(&batch.records, 0.0)?);
    }
    Ok(batch.records)
}

fn export_csv(rows: &[&KpiRecord], out: &Path) -> Result<()> {
    ensure_parent(out)?;
    let file = File::create(out).with_context(|| format!("failed to create {}", out.display()))?;
    write_csv(BufWriter::new(file), rows)?;
    info!(path = %out.display(), rows = rows.len(), "exported kpi records");
    Ok(())
}

fn emit<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => write_json(value, path),
        None => {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(())
        }
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote json");
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
