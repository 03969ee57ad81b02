use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use animal_scan_core::{
    client_from_settings, render_report, FileImageSource, OutputFormat, ScanWorkflow,
    StageTimings, VisionOverrides, VisionSettings,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "animal-scan",
    author,
    version,
    about = "Animal Scan Report CLI"
)]
struct Cli {
    /// Optional TOML config file layered over environment settings
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one capture-to-report scan against an image file
    Scan {
        /// Path to the still image standing in for the camera capture
        image: PathBuf,
        /// Emit the parsed report as JSON instead of the human summary
        #[arg(long)]
        json: bool,
        /// Skip the cosmetic preview/processing stage delays
        #[arg(long)]
        fast: bool,
        /// Override the vision model name
        #[arg(long)]
        model: Option<String>,
    },
}

/// Shape of the optional `--config` TOML file.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    vision: VisionOverrides,
    #[serde(default)]
    stages: StageConfig,
}

#[derive(Debug, Default, Deserialize)]
struct StageConfig {
    preview_ms: Option<u64>,
    processing_ms: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Scan {
            image,
            json,
            fast,
            model,
        } => scan(cli.config.as_deref(), &image, json, fast, model).await?,
    }
    Ok(())
}

async fn scan(
    config: Option<&Path>,
    image: &Path,
    json: bool,
    fast: bool,
    model: Option<String>,
) -> Result<()> {
    let file_config = load_file_config(config)?;
    let mut overrides = file_config.vision;
    if model.is_some() {
        overrides.model = model;
    }
    let settings = VisionSettings::from_env_with(overrides)?;
    let client = client_from_settings(&settings)?;

    let timings = if fast {
        StageTimings::immediate()
    } else {
        stage_timings(&file_config.stages)
    };
    let source = Arc::new(FileImageSource::new(image));
    let mut workflow = ScanWorkflow::new(source, client).with_timings(timings);

    workflow
        .capture()
        .await
        .with_context(|| format!("capture failed for {}", image.display()))?;
    workflow.run_to_completion().await?;

    // A failed or empty request renders the same as a sparse success.
    let report = workflow.session().report().cloned().unwrap_or_default();
    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    println!("{}", render_report(&report, format)?);
    workflow.dismiss();
    Ok(())
}

fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let settings = config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()))
        .build()
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    settings
        .try_deserialize()
        .context("invalid config file structure")
}

fn stage_timings(stages: &StageConfig) -> StageTimings {
    let defaults = StageTimings::default();
    StageTimings {
        preview: stages
            .preview_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.preview),
        processing: stages
            .processing_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.processing),
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
