use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use admission_features::inference::{InferenceEngine, PredictionRequest, PredictionResponse};
use admission_features::utils::io::OutputFormat;
use admission_features::{Config, RunInputs, TrainingRunner};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

#[derive(Parser, Debug)]
#[command(about = "ED admission feature engineering and scoring", version)]
struct Cli {
    /// YAML configuration file
    #[arg(long, short, value_name = "FILE", global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit encoders and scalers on training files and write the processed tables
    Fit(RunArgs),
    /// Apply persisted encoders and scalers to files
    Transform(RunArgs),
    /// Score one JSON request with the bucketed models
    Predict {
        /// Request file with seh_data, lab_data and vital_data
        #[arg(long = "request", value_name = "FILE")]
        request: PathBuf,
        /// Response file; stdout when absent
        #[arg(long = "out", value_name = "FILE")]
        out: Option<PathBuf>,
        /// Scoring time (`YYYY-MM-DD HH:MM:SS`); now when absent
        #[arg(long = "now", value_parser = parse_now)]
        now: Option<NaiveDateTime>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long = "lab", value_name = "FILE")]
    lab: Option<PathBuf>,
    #[arg(long = "vitals", value_name = "FILE")]
    vitals: Option<PathBuf>,
    #[arg(long = "seh", value_name = "FILE")]
    seh: Option<PathBuf>,
    #[arg(long = "rad", value_name = "FILE")]
    rad: Option<PathBuf>,
    /// Output directory; overrides the configuration
    #[arg(long = "out-dir", value_name = "DIR")]
    out_dir: Option<PathBuf>,
    #[arg(long = "format", value_enum)]
    format: Option<OutputFormat>,
}

impl RunArgs {
    fn inputs(&self) -> RunInputs {
        RunInputs {
            lab: self.lab.clone(),
            vitals: self.vitals.clone(),
            visits: self.seh.clone(),
            radiology: self.rad.clone(),
        }
    }
}

fn parse_now(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_yaml_file(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    let codebook = config.load_codebook().context("Failed to load codebook")?;

    match cli.command {
        Command::Fit(args) => {
            let runner = training_runner(&config, &codebook, &args);
            let summary = runner.fit(&args.inputs()).context("Fit run failed")?;
            log::info!("Fit run wrote {} files", summary.outputs.len());
        }
        Command::Transform(args) => {
            let runner = training_runner(&config, &codebook, &args);
            let summary = runner
                .transform(&args.inputs())
                .context("Transform run failed")?;
            log::info!("Transform run wrote {} files", summary.outputs.len());
        }
        Command::Predict { request, out, now } => {
            let engine = InferenceEngine::load(&config.serving, codebook)
                .context("Failed to load serving state")?;
            let request = PredictionRequest::from_json_file(&request)
                .with_context(|| format!("Failed to read request {}", request.display()))?;
            let now = now.unwrap_or_else(|| Local::now().naive_local());

            let result = engine.predict(request, now).context("Request failed")?;
            write_response(&PredictionResponse { result }, out.as_deref())?;
        }
    }

    Ok(())
}

fn training_runner<'a>(
    config: &Config,
    codebook: &'a admission_features::CodeBook,
    args: &RunArgs,
) -> TrainingRunner<'a> {
    let mut training = config.training.clone();
    if let Some(dir) = &args.out_dir {
        training = training.with_output_dir(dir);
    }
    if let Some(format) = args.format {
        training = training.with_output_format(format);
    }
    TrainingRunner::new(codebook, training, config.serving.clone())
}

fn write_response(response: &PredictionResponse, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, response)?;
            writer.flush()?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, response)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}
