#![forbid(unsafe_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use headline_tournament::gateway::{ProviderGateway, TracingUsageSink};
use headline_tournament::{
    AppConfig, JsonlTraceSink, Pipeline, StaticWordBank, StoryInput, TextGateway, WordBank,
};

#[derive(Parser)]
#[command(name = "newsroom", version, about = "Satirical headline newsroom")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an edition: every input story through brainstorm, generate and tournament
    Run {
        /// JSON array of `{headline, article}` inputs
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON word bank keyed by category; built-in words when omitted
        #[arg(long)]
        words: Option<PathBuf>,
        /// Edition JSON; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
        /// Per-comparison JSONL audit trace
        #[arg(long)]
        trace: Option<PathBuf>,
    },
    /// Validate configuration and print the judge-independence report
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("headline_tournament=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            config,
            words,
            out,
            trace,
        } => {
            let app = AppConfig::load(config.as_deref())?;
            let pipeline_config = app.pipeline_config()?;

            let gateway: Arc<dyn TextGateway> = Arc::new(ProviderGateway::from_env(
                Arc::new(TracingUsageSink),
                app.gateway_config(),
            )?);
            let words: Arc<dyn WordBank> = match words {
                Some(path) => Arc::new(StaticWordBank::from_json_file(&path)?),
                None => Arc::new(StaticWordBank::builtin()),
            };

            let mut pipeline = Pipeline::new(gateway, words, pipeline_config)?;
            let mut worker = None;
            if let Some(path) = trace {
                let (sink, trace_worker) = JsonlTraceSink::new(&path)?;
                pipeline = pipeline.with_observer(Arc::new(sink));
                worker = Some(trace_worker);
            }

            let inputs: Vec<StoryInput> = read_json(&input)?;
            info!(stories = inputs.len(), "running edition");
            let edition = pipeline
                .run_edition(inputs, app.leaderboard.capacity)
                .await;
            info!(
                complete = edition.stories.len(),
                aborted = edition.aborted.len(),
                "edition finished"
            );

            // The pipeline holds the last trace sender; drop it so the worker drains.
            drop(pipeline);
            if let Some(worker) = worker {
                worker.join()?;
            }

            match out {
                Some(path) => write_json(&path, &edition)?,
                None => println!("{}", serde_json::to_string_pretty(&edition)?),
            }
        }
        Commands::CheckConfig { config } => {
            let app = AppConfig::load(config.as_deref())?;
            let pipeline_config = app.pipeline_config()?;
            pipeline_config.validate()?;
            let report = pipeline_config.judge_independence();
            println!("brainstorm: {}", pipeline_config.routes.brainstorm);
            println!("generate:   {}", pipeline_config.routes.generate);
            println!("tournament: {}", pipeline_config.routes.tournament);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
