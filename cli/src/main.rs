mod config;
mod output;
mod replace;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use skinmatch_core::{CollectionMatchTask, MatchReport, ReportAggregator, TreeWalker};
use skinmatch_oracle::OracleKind;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::MatchConfig;
use crate::output::{OutputFormat, ReportWriter};

const DEFAULT_CONFIG_PATH: &str = "skinmatch.yaml";

#[derive(Debug, Parser)]
#[command(name = "skinmatch", version)]
#[command(about = "Match UI images against a pool of new art and report the results")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Match every query image against the candidate trees and write a report.
    Run(RunArgs),
    /// List the images a run would consider under the given roots.
    Scan(ScanArgs),
    /// Write a default configuration file.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// YAML configuration file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directories holding the images to be replaced.
    #[arg(long, num_args = 1..)]
    query: Vec<PathBuf>,
    /// Android res directory; its drawable and mipmap folders become query roots.
    #[arg(long)]
    res_dir: Option<PathBuf>,
    /// Directories holding the replacement art.
    #[arg(long, num_args = 1..)]
    candidates: Vec<PathBuf>,
    /// Comma-separated image extensions (e.g. png,jpg).
    #[arg(long)]
    ext: Option<String>,
    /// Similar candidates kept per query.
    #[arg(long)]
    capacity: Option<usize>,
    /// Number of worker threads across queries.
    #[arg(long)]
    jobs: Option<usize>,
    /// Compare each query against its candidates in parallel.
    #[arg(long)]
    parallel_candidates: bool,
    /// Comparison strategy.
    #[arg(long)]
    oracle: Option<OracleKind>,
    /// Per-comparison timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Report format.
    #[arg(long)]
    format: Option<OutputFormat>,
    /// Report file; stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Copy trusted matches over their query images.
    #[arg(long)]
    replace: bool,
    /// With --replace, only log what would be copied.
    #[arg(long, requires = "replace")]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// Directories to scan.
    #[arg(required = true)]
    roots: Vec<PathBuf>,
    /// Comma-separated image extensions (e.g. png,jpg).
    #[arg(long)]
    ext: Option<String>,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    /// Destination of the configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    output: PathBuf,
    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Run(args) => run_match(args),
        Command::Scan(args) => run_scan(args),
        Command::InitConfig(args) => run_init_config(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Layers command-line overrides onto the loaded (or default) config.
fn resolve_config(args: &RunArgs) -> Result<MatchConfig, String> {
    let mut config = match &args.config {
        Some(path) => MatchConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => MatchConfig::default(),
    };

    if !args.query.is_empty() {
        config.query_roots = args.query.clone();
    }
    if args.res_dir.is_some() {
        config.res_dir = args.res_dir.clone();
    }
    if !args.candidates.is_empty() {
        config.candidate_roots = args.candidates.clone();
    }
    if let Some(ext) = &args.ext {
        config.extensions = parse_csv(ext);
    }
    if let Some(capacity) = args.capacity {
        config.matching.capacity = capacity;
    }
    if args.jobs.is_some() {
        config.matching.jobs = args.jobs;
    }
    if args.parallel_candidates {
        config.matching.parallel_candidates = true;
    }
    if let Some(kind) = args.oracle {
        config.oracle.kind = kind;
    }
    if args.timeout_ms.is_some() {
        config.oracle.timeout_ms = args.timeout_ms;
    }
    if let Some(format) = args.format {
        config.report.format = format;
    }
    if args.output.is_some() {
        config.report.output = args.output.clone();
    }

    config.validate()?;
    Ok(config)
}

fn run_match(args: RunArgs) -> Result<(), String> {
    let config = resolve_config(&args)?;

    let query_roots = config.resolved_query_roots().map_err(|e| e.to_string())?;
    if let Some(res_dir) = &config.res_dir {
        info!(
            res_dir = %res_dir.display(),
            roots = query_roots.len() - config.query_roots.len(),
            "Discovered resource folders"
        );
    }
    let queries = TreeWalker::with_extensions(&query_roots, &config.extensions)
        .map_err(|e| e.to_string())?;
    let candidates = TreeWalker::with_extensions(&config.candidate_roots, &config.extensions)
        .map_err(|e| e.to_string())?;

    info!(
        oracle = %config.oracle.kind,
        timeout_ms = ?config.oracle.timeout_ms,
        format = ?config.report.format,
        "Configured run"
    );

    let oracle = config.oracle.kind.build(config.timeout());
    let task = CollectionMatchTask::new(queries, candidates, oracle, config.match_options());
    let mut writer = ReportWriter::new(config.report.format, config.report.output.clone());
    let report = task
        .run_into(ReportAggregator::new(), &mut writer)
        .map_err(|e| e.to_string())?;

    print_summary(&report);
    if let Some(path) = &config.report.output {
        eprintln!("Wrote report to '{}'.", path.display());
    }

    if args.replace {
        let planned = replace::plan(&report);
        let written = replace::apply(&planned, args.dry_run)?;
        if args.dry_run {
            eprintln!("Dry run: {} file(s) would be replaced.", planned.len());
        } else {
            eprintln!("Replaced {written} file(s).");
        }
    }

    Ok(())
}

fn print_summary(report: &MatchReport) {
    let breakdown: Vec<String> = report
        .groups
        .iter()
        .map(|group| format!("{} {}", group.rows.len(), group.name()))
        .collect();
    eprintln!(
        "Matched {} query image(s): {}, {} unmatched; {} filename conflict(s).",
        report.total_queries,
        breakdown.join(", "),
        report.unmatched,
        report.total_conflicts()
    );
}

fn run_scan(args: ScanArgs) -> Result<(), String> {
    let walker = match &args.ext {
        Some(ext) => TreeWalker::with_extensions(&args.roots, parse_csv(ext)),
        None => TreeWalker::new(&args.roots),
    }
    .map_err(|e| e.to_string())?;

    let mut count = 0usize;
    for path in walker.walk() {
        println!("{}", path.display());
        count += 1;
    }
    eprintln!("Found {count} image(s).");
    Ok(())
}

fn run_init_config(args: InitConfigArgs) -> Result<(), String> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "'{}' already exists (use --force to overwrite)",
            args.output.display()
        ));
    }

    MatchConfig::default()
        .save(&args.output)
        .map_err(|err| format!("Failed to write '{}': {err}", args.output.display()))?;
    println!("Wrote default configuration to '{}'.", args.output.display());
    Ok(())
}
