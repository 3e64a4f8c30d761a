use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use tessera_config::{EngineConfig, PipelineDef};
use tessera_orchestrator::{Engine, Pipeline, RunRequest, resolve_pipeline};

/// Tessera - runs graphs of LLM analysis tasks into one structured report
#[derive(Parser)]
#[command(name = "tessera")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.tessera)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a pipeline; reads {"input", "preferences"} from stdin
  Run {
    /// Path to the pipeline definition (JSON)
    pipeline_file: PathBuf,

    /// Path to the engine configuration (default: <data-dir>/engine.json)
    #[arg(long)]
    engine: Option<PathBuf>,
  },

  /// Check a pipeline definition and print its batch plan
  Validate {
    /// Path to the pipeline definition (JSON)
    pipeline_file: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".tessera"),
  };

  match cli.command {
    Some(Commands::Run {
      pipeline_file,
      engine,
    }) => {
      let engine_file = engine.unwrap_or_else(|| data_dir.join("engine.json"));
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_pipeline(&pipeline_file, &engine_file))?;
    }
    Some(Commands::Validate { pipeline_file }) => {
      validate_pipeline(&pipeline_file)?;
    }
    None => {
      println!("tessera - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_pipeline(pipeline_file: &Path, config: &EngineConfig) -> Result<Pipeline> {
  let def = PipelineDef::load(pipeline_file)
    .with_context(|| format!("failed to load pipeline: {}", pipeline_file.display()))?;
  resolve_pipeline(&def, config)
    .with_context(|| format!("invalid pipeline: {}", pipeline_file.display()))
}

async fn run_pipeline(pipeline_file: &Path, engine_file: &Path) -> Result<()> {
  let config = EngineConfig::load(engine_file)
    .with_context(|| format!("failed to load engine config: {}", engine_file.display()))?;
  let pipeline = load_pipeline(pipeline_file, &config)?;

  eprintln!(
    "Loaded pipeline: {} ({} tasks, up to {} passes)",
    pipeline.name,
    pipeline.graph.len(),
    pipeline.max_iterations
  );

  let request = read_request_from_stdin()?;

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      on_interrupt.cancel();
    }
  });

  let outcome = Engine::from_config(&config)
    .run(&pipeline, request, cancel)
    .await
    .context("pipeline run failed")?;

  eprintln!("Run completed: {} ({} passes)", outcome.run_id, outcome.passes);
  println!("{}", serde_json::to_string_pretty(&outcome)?);

  Ok(())
}

fn validate_pipeline(pipeline_file: &Path) -> Result<()> {
  let pipeline = load_pipeline(pipeline_file, &EngineConfig::default())?;

  println!("{} ({})", pipeline.name, pipeline.pipeline_id);
  for (index, batch) in pipeline.graph.batches().iter().enumerate() {
    println!("  batch {}: {}", index, batch.join(", "));
  }
  let (terminal, entries) = pipeline.graph.back_edge();
  println!(
    "  loop: {} -> {} (max {} passes, threshold {}%)",
    terminal,
    entries.join(", "),
    pipeline.max_iterations,
    pipeline.quality_threshold
  );

  Ok(())
}

fn read_request_from_stdin() -> Result<RunRequest> {
  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read from stdin")?;

  if input.trim().is_empty() {
    anyhow::bail!("expected a JSON request on stdin: {{\"input\": \"...\"}}");
  }

  serde_json::from_str(&input).context("failed to parse request from stdin")
}
