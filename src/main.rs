use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use attune::{
    attach_audio_clips, execute_classify, execute_evaluate, http_client, load_results,
    load_terminal_keys, merge_features_file, parse_segments_file, render_report, write_analysis,
    ClassifyConfig, EmpathyScale, Modality, RatingConfig, ResultStatus, ResultWriter,
};

#[derive(Parser)]
#[command(name = "attune")]
#[command(author, version, about = "Empathy rating pipeline: classify segments across modalities and score against ground truth", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify segments under the requested modalities
    Classify {
        /// Segments file (JSON array with id, time range, transcript, ground truth)
        #[arg(short, long)]
        segments: PathBuf,

        /// Optional standalone audio-features file (JSON), merged by segment id
        #[arg(long)]
        features: Option<PathBuf>,

        /// Directory of per-segment WAV clips named <segment_id>.wav
        #[arg(long)]
        audio_dir: Option<PathBuf>,

        /// Result table to append to (JSON Lines)
        #[arg(short, long)]
        output: PathBuf,

        /// Comma-separated modalities to run
        #[arg(long, default_value = "transcript,audio_features,combined,raw_audio")]
        modalities: String,

        /// Maximum simultaneous in-flight service calls
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// Maximum service calls per (segment, modality) pair
        #[arg(long, default_value = "3")]
        max_attempts: u32,

        /// Lower bound of the empathy scale
        #[arg(long, default_value = "1")]
        scale_min: i64,

        /// Upper bound of the empathy scale
        #[arg(long, default_value = "5")]
        scale_max: i64,

        /// Reclassify pairs already present in the result table
        #[arg(long)]
        no_resume: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compare a result table to ground truth
    Evaluate {
        /// Result table produced by the classify command (JSON Lines)
        #[arg(short, long)]
        results: PathBuf,

        /// Segments file carrying the ground truth labels
        #[arg(short, long)]
        segments: PathBuf,

        /// Optional analysis table output (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Lower bound of the empathy scale
        #[arg(long, default_value = "1")]
        scale_min: i64,

        /// Upper bound of the empathy scale
        #[arg(long, default_value = "5")]
        scale_max: i64,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify {
            segments,
            features,
            audio_dir,
            output,
            modalities,
            concurrency,
            max_attempts,
            scale_min,
            scale_max,
            no_resume,
            verbose,
        } => {
            setup_logging(verbose);
            classify(
                segments,
                features,
                audio_dir,
                output,
                modalities,
                concurrency,
                max_attempts,
                scale_min,
                scale_max,
                no_resume,
            )
            .await
        }
        Commands::Evaluate {
            results,
            segments,
            output,
            scale_min,
            scale_max,
            verbose,
        } => {
            setup_logging(verbose);
            evaluate(results, segments, output, scale_min, scale_max)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn parse_modalities(input: &str) -> Result<Vec<Modality>> {
    let modalities: Vec<Modality> = input
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(Modality::from_str)
        .collect::<Result<_, _>>()
        .map_err(|e| anyhow::anyhow!(e))?;
    if modalities.is_empty() {
        anyhow::bail!("no modalities requested");
    }
    Ok(modalities)
}

async fn classify(
    segments_path: PathBuf,
    features: Option<PathBuf>,
    audio_dir: Option<PathBuf>,
    output: PathBuf,
    modalities: String,
    concurrency: usize,
    max_attempts: u32,
    scale_min: i64,
    scale_max: i64,
    no_resume: bool,
) -> Result<()> {
    // Configuration problems are fatal before any service call is made
    let scale = EmpathyScale::new(scale_min, scale_max)?;
    let modalities = parse_modalities(&modalities)?;

    info!("Loading segments from {:?}", segments_path);
    let mut segments =
        parse_segments_file(&segments_path).context("Failed to load segments")?;
    info!("Loaded {} segments", segments.len());

    if let Some(features_path) = &features {
        let merged = merge_features_file(&mut segments, features_path)
            .context("Failed to load audio features")?;
        info!("Merged audio features for {} segments", merged);
    }
    if let Some(dir) = &audio_dir {
        let attached = attach_audio_clips(&mut segments, dir);
        info!("Attached {} audio clips from {:?}", attached, dir);
    }

    let done = if no_resume {
        HashSet::new()
    } else {
        let keys = load_terminal_keys(&output).context("Failed to read prior result table")?;
        if !keys.is_empty() {
            info!("Resuming: {} pairs already classified", keys.len());
        }
        keys
    };

    let mut rating_config = RatingConfig::from_env(scale)?;
    rating_config.max_attempts = max_attempts;
    let client = Arc::new(http_client(rating_config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; in-flight calls will finish, nothing new starts");
            shutdown_tx.send(true).ok();
        }
    });

    let mut writer = ResultWriter::open_append(&output)?;
    let run_config = ClassifyConfig {
        modalities,
        concurrency,
        scale,
    };

    let mut rx = execute_classify(client, segments, run_config, done, shutdown_rx);

    let mut ok = 0usize;
    let mut parse_errors = 0usize;
    let mut service_errors = 0usize;
    let mut skipped = 0usize;

    while let Some(result) = rx.recv().await {
        writer.write(&result)?;
        match result.status {
            ResultStatus::Ok => {
                ok += 1;
                info!(
                    "{} [{}]: rated {} ({} attempt(s))",
                    result.segment_id,
                    result.modality,
                    result.predicted_label.unwrap_or_default(),
                    result.attempt_count
                );
            }
            ResultStatus::ParseError => {
                parse_errors += 1;
                warn!(
                    "{} [{}]: response kept but no label parsed",
                    result.segment_id, result.modality
                );
            }
            ResultStatus::ServiceError => {
                service_errors += 1;
                warn!(
                    "{} [{}]: service failed after {} attempt(s)",
                    result.segment_id, result.modality, result.attempt_count
                );
            }
            ResultStatus::SkippedMissingInput => {
                skipped += 1;
            }
        }
    }

    info!(
        "Complete: {} rated, {} parse errors, {} service errors, {} skipped -> {:?}",
        ok, parse_errors, service_errors, skipped, output
    );

    Ok(())
}

fn evaluate(
    results_path: PathBuf,
    segments_path: PathBuf,
    output: Option<PathBuf>,
    scale_min: i64,
    scale_max: i64,
) -> Result<()> {
    let scale = EmpathyScale::new(scale_min, scale_max)?;

    info!("Loading results from {:?}", results_path);
    let results = load_results(&results_path).context("Failed to load result table")?;
    info!("Loading segments from {:?}", segments_path);
    let segments = parse_segments_file(&segments_path).context("Failed to load segments")?;

    let records = execute_evaluate(&results, &segments, scale);
    if records.is_empty() {
        warn!("Result table contains no rows to evaluate");
        return Ok(());
    }

    print!("{}", render_report(&records));

    if let Some(output) = output {
        write_analysis(&output, &records)?;
        info!("Analysis written to {:?}", output);
    }

    Ok(())
}
