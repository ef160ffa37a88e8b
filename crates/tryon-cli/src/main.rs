//! Tryon - closed-loop try-on dataset generation CLI
//!
//! The `tryon` command drives the generate/evaluate/retry pipeline over a
//! batch of person/cloth pairs.
//!
//! ## Commands
//!
//! - `run`: process a batch and file results into outcome buckets
//! - `scan`: list the pairs a run would process, in processing order

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use tryon_core::http_adapter::{HttpEvaluator, HttpGenerator};
use tryon_core::{
    BatchRunner, Cohort, FeedbackLoop, FeedbackRevision, LoopConfig, ResultSink, SampleSource,
    SinkConfig, SourceConfig, DEFAULT_MAX_ITERATIONS,
};
use tryon_store::{BlobStore, FsBlobStore, HttpBlobStore};

#[derive(Parser)]
#[command(name = "tryon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Closed-loop virtual try-on dataset generator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Local directory holding the input pairs
    #[arg(long, conflicts_with = "base_url")]
    root: Option<PathBuf>,

    /// Base URL of a remote blob host holding the input pairs
    #[arg(long, env = "TRYON_BASE_URL")]
    base_url: Option<String>,

    /// Cohorts to process
    #[arg(long, value_delimiter = ',', default_value = "males,females")]
    cohort: Vec<Cohort>,

    /// Maximum pairs to process in this run
    #[arg(long, default_value_t = 100)]
    limit: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a batch of pairs through the feedback loop
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory for result buckets
        #[arg(short, long, default_value = "out")]
        out: PathBuf,

        /// Also upload results to the remote blob host
        #[arg(long, requires = "base_url")]
        mirror: bool,

        /// Override the generate+evaluate cycle cap per pair
        #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
        max_iterations: u32,

        /// Override the default generation instruction
        #[arg(long)]
        instruction: Option<String>,

        /// Generator inference endpoint
        #[arg(long, env = "TRYON_GENERATOR_URL", default_value = "http://127.0.0.1:8090")]
        generator_url: String,

        /// Evaluator inference endpoint
        #[arg(long, env = "TRYON_EVALUATOR_URL", default_value = "http://127.0.0.1:8091")]
        evaluator_url: String,

        /// Generator model selection string (passed through unmodified)
        #[arg(long, env = "TRYON_GENERATOR_MODEL", default_value = "flux.2-klein-9b")]
        generator_model: String,

        /// Evaluator model selection string (passed through unmodified)
        #[arg(long, env = "TRYON_EVALUATOR_MODEL", default_value = "qwen3-vl-8b-instruct")]
        evaluator_model: String,
    },

    /// List the pairs a run would process, in processing order
    Scan {
        #[command(flatten)]
        source: SourceArgs,
    },
}

fn input_store(args: &SourceArgs) -> Result<Arc<dyn BlobStore>> {
    match (&args.root, &args.base_url) {
        (Some(root), _) => Ok(Arc::new(
            FsBlobStore::new(root).context("failed to open input directory")?,
        )),
        (None, Some(base_url)) => Ok(Arc::new(HttpBlobStore::new(base_url.clone()))),
        (None, None) => bail!("either --root or --base-url is required"),
    }
}

fn sample_source(args: &SourceArgs) -> Result<SampleSource> {
    let store = input_store(args)?;
    Ok(SampleSource::new(
        store,
        SourceConfig {
            cohorts: args.cohort.clone(),
            batch_limit: args.limit,
            ..SourceConfig::default()
        },
    ))
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    source_args: SourceArgs,
    out: PathBuf,
    mirror: bool,
    max_iterations: u32,
    instruction: Option<String>,
    generator_url: String,
    evaluator_url: String,
    generator_model: String,
    evaluator_model: String,
) -> Result<()> {
    let source = sample_source(&source_args)?;

    let mut loop_config = LoopConfig {
        max_iterations,
        ..LoopConfig::default()
    };
    if let Some(instruction) = instruction {
        loop_config.default_instruction = instruction;
    }

    let feedback_loop = FeedbackLoop::new(
        Arc::new(HttpGenerator::new(generator_url, generator_model)),
        Arc::new(HttpEvaluator::new(evaluator_url, evaluator_model)),
        Box::new(FeedbackRevision::new(loop_config.default_instruction.clone())),
        loop_config,
    );

    let out_store =
        Arc::new(FsBlobStore::new(&out).context("failed to open output directory")?);
    let mut sink = ResultSink::new(out_store, SinkConfig::default());
    if mirror {
        match &source_args.base_url {
            Some(base_url) => {
                sink = sink.with_mirror(Arc::new(HttpBlobStore::new(base_url.clone())));
            }
            None => bail!("--mirror requires --base-url"),
        }
    }
    info!(run_id = %sink.run_id(), out = %out.display(), "starting batch run");

    let runner = BatchRunner::new(source, feedback_loop, sink);

    // Stop before the next pair on Ctrl-C; never mid-attempt.
    let cancel = runner.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current pair");
            cancel.cancel();
        }
    });

    let summary = runner
        .run()
        .await
        .context("cannot enumerate the backing store")?;
    print!("{}", summary.render());
    Ok(())
}

async fn cmd_scan(source_args: SourceArgs) -> Result<()> {
    let source = sample_source(&source_args)?;
    let listings = source
        .scan()
        .await
        .context("cannot enumerate the backing store")?;

    for listing in &listings {
        println!(
            "{}\t{}\t{} + {}",
            listing.cohort, listing.key, listing.person, listing.cloth
        );
    }
    println!("{} pair(s)", listings.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tryon_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            source,
            out,
            mirror,
            max_iterations,
            instruction,
            generator_url,
            evaluator_url,
            generator_model,
            evaluator_model,
        } => {
            cmd_run(
                source,
                out,
                mirror,
                max_iterations,
                instruction,
                generator_url,
                evaluator_url,
                generator_model,
                evaluator_model,
            )
            .await
        }
        Commands::Scan { source } => cmd_scan(source).await,
    }
}
