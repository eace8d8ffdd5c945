use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use strata_core::config::{Config, CONFIG_FILE_NAME};
use strata_core::pipeline::{AnalysisPipeline, ProjectAnalysis};
use strata_core::ranking::{append_entry, load_entries, rank, RankedEntry};
use strata_core::types::ProjectInput;
use strata_core::{ComplexityAnalyzer, StructuralExtractor};

use strata_c::CExtractor;
use strata_cpp::CppExtractor;
use strata_java::JavaExtractor;
use strata_python::{PythonComplexityAnalyzer, PythonExtractor};
use strata_report::{json, text};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Score projects on architecture, quality, maturity and algorithmic awareness")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze and score a project described by a JSON manifest
    Score {
        /// Path to the project manifest (name, files, hygiene signals)
        manifest: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Config file path (defaults to .strata.toml next to the manifest or above)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Append the score to this history file for later ranking
        #[arg(long)]
        record: Option<PathBuf>,
        /// Show per-file complexity findings
        #[arg(short, long)]
        verbose: bool,
        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },
    /// Rank recorded analyses, keeping the best entry per project
    Rank {
        /// History file written by `strata score --record`
        history: PathBuf,
        /// Number of projects to show
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },
    /// Create a default .strata.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Score {
            manifest,
            format,
            config,
            record,
            verbose,
            compact,
        } => cmd_score(
            &manifest,
            config.as_deref(),
            record.as_deref(),
            format,
            verbose,
            compact,
        ),
        Commands::Rank {
            history,
            limit,
            format,
            compact,
        } => cmd_rank(&history, limit, format, compact),
        Commands::Init { force } => cmd_init(force),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(2);
    }
}

fn cmd_score(
    manifest: &Path,
    config_path: Option<&Path>,
    record: Option<&Path>,
    format: OutputFormat,
    verbose: bool,
    compact: bool,
) -> Result<()> {
    let base = manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let input = load_manifest(manifest)?;
    let config = load_config(base, config_path)?;
    let analysis = run_analysis(&input, base, config)?;

    if let Some(history) = record {
        let entry = RankedEntry::new(
            &analysis.project_name,
            &analysis.project_path,
            analysis.score.clone(),
        );
        append_entry(history, &entry)?;
        info!(history = %history.display(), "recorded score");
    }

    let report = match format {
        OutputFormat::Text => text::format_analysis(&analysis, verbose),
        OutputFormat::Json => json::format_analysis(&analysis, compact)?,
    };
    print!("{report}");
    if matches!(format, OutputFormat::Json) {
        println!();
    }
    Ok(())
}

fn cmd_rank(history: &Path, limit: usize, format: OutputFormat, compact: bool) -> Result<()> {
    let entries = load_entries(history)?;
    let ranking = rank(&entries, limit);
    match format {
        OutputFormat::Text => print!("{}", text::format_ranking(&ranking)),
        OutputFormat::Json => println!("{}", json::format_ranking(&ranking, compact)?),
    }
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from(CONFIG_FILE_NAME);
    if target.exists() && !force {
        anyhow::bail!("{CONFIG_FILE_NAME} already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml())
        .with_context(|| format!("failed to write {CONFIG_FILE_NAME}"))?;
    println!("Created {CONFIG_FILE_NAME} with default configuration.");
    Ok(())
}

/// Read a manifest. File paths are kept as written; relative ones are read
/// from the manifest's directory by the pipeline.
fn load_manifest(manifest: &Path) -> Result<ProjectInput> {
    let content = std::fs::read_to_string(manifest)
        .with_context(|| format!("failed to read manifest '{}'", manifest.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse manifest '{}'", manifest.display()))
}

fn load_config(base: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default(base)),
    }
}

fn run_analysis(input: &ProjectInput, base: &Path, config: Config) -> Result<ProjectAnalysis> {
    let extractors: Vec<Box<dyn StructuralExtractor>> = vec![
        Box::new(PythonExtractor::new()),
        Box::new(JavaExtractor::new().context("failed to initialize Java extractor")?),
        Box::new(CExtractor::new().context("failed to initialize C extractor")?),
        Box::new(CppExtractor::new().context("failed to initialize C++ extractor")?),
    ];
    let complexity: Vec<Box<dyn ComplexityAnalyzer>> =
        vec![Box::new(PythonComplexityAnalyzer::new())];

    let pipeline = AnalysisPipeline::new(extractors, complexity, config).with_source_root(base);
    Ok(pipeline.analyze(input))
}
