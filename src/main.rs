use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use scrivener::io::{batch_summary_path, file_stamp, format_distribution};
use scrivener::parser::FormatVotes;
use scrivener::{
    execute_stage0, find_transcript_files, read_transcript, BatchConfig, BatchCorrector,
    BatchSummary, CorrectionService, GlmClient, GlmConfig, Heuristics, MethodCounts,
    OutputConfig, Pipeline, PipelineConfig, TranscriptParser,
};

#[derive(Parser)]
#[command(name = "scrivener")]
#[command(author, version, about = "Homophone and typo correction for dialogue transcripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Correct one or more transcripts and write reports
    Process {
        /// Transcript files or directories containing .txt transcripts
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Directory for reports and corrected transcripts
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Only write the corrected transcript, no report
        #[arg(long)]
        only_correct: bool,

        /// Also dump corrected segments as JSON
        #[arg(long)]
        json: bool,

        /// Segments per remote request
        #[arg(long, default_value = "25")]
        batch_size: usize,

        /// Files processed concurrently
        #[arg(long, default_value = "1")]
        parallel: usize,

        /// Keep processing other files after a failure
        #[arg(long)]
        continue_on_error: bool,

        /// List the files that would be processed and exit
        #[arg(long)]
        dry_run: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Inspect a transcript without calling the correction service
    Analyze {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check that the correction service is reachable and answering
    TestConnection {
        /// Text to send through the single-text correction path
        #[arg(long, default_value = "我们明天在讨论一下这个方案吧")]
        text: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            inputs,
            recursive,
            output_dir,
            only_correct,
            json,
            batch_size,
            parallel,
            continue_on_error,
            dry_run,
            verbose,
        } => {
            setup_logging(verbose);
            let config = PipelineConfig {
                batch: BatchConfig {
                    batch_size: batch_size.max(1),
                    ..Default::default()
                },
                output: OutputConfig {
                    output_dir,
                    write_report: !only_correct,
                    write_json: json,
                },
                parallel: parallel.max(1),
                continue_on_error,
            };
            process_transcripts(inputs, recursive, dry_run, config).await
        }
        Commands::Analyze { input, verbose } => {
            setup_logging(verbose);
            analyze_transcript(input)
        }
        Commands::TestConnection { text, verbose } => {
            setup_logging(verbose);
            test_connection(&text).await
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn connect() -> Result<GlmClient> {
    let config = GlmConfig::from_env()?;
    info!(
        "Using model {} at {} (key {})",
        config.model,
        config.endpoint(),
        config.masked_key()
    );
    GlmClient::new(config)
}

async fn process_transcripts(
    inputs: Vec<PathBuf>,
    recursive: bool,
    dry_run: bool,
    config: PipelineConfig,
) -> Result<()> {
    let files = find_transcript_files(&inputs, recursive)?;
    if files.is_empty() {
        bail!("No transcript files found in {:?}", inputs);
    }

    info!("Found {} files to process", files.len());
    for (i, file) in files.iter().enumerate() {
        info!("  {}. {}", i + 1, file.display());
    }

    if dry_run {
        info!("Dry run: nothing processed");
        return Ok(());
    }

    let client = connect()?;
    let output_dir = config.output.output_dir.clone();
    let pipeline = Arc::new(Pipeline::new(Arc::new(client), config));

    let run = pipeline.process_files(&files).await;

    if files.len() > 1 {
        let now = Local::now();
        let path = batch_summary_path(&output_dir, &file_stamp(&now));
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
        BatchSummary::new(&run, now).write_file(&path)?;
        info!("Batch summary written to {:?}", path);
    }

    let totals = run.totals();
    info!(
        "Complete: {} files, {} failed, {} skipped",
        run.outcomes.len(),
        run.failures.len(),
        run.skipped.len()
    );
    info!(
        "Segments: {} total, {} corrected ({:.1}%), {} unchanged, {} failed",
        totals.total(),
        totals.corrected(),
        totals.correction_rate(),
        totals.unchanged(),
        totals.failed()
    );
    for outcome in &run.outcomes {
        for path in outcome.written() {
            info!("Wrote {:?}", path);
        }
    }

    if !run.is_success() {
        bail!("{} of {} files failed", run.failures.len(), files.len());
    }

    Ok(())
}

fn analyze_transcript(input: PathBuf) -> Result<()> {
    info!("Analyzing transcript from {:?}", input);
    let content = read_transcript(&input).context("Failed to read input transcript")?;

    let votes = FormatVotes::count(&content);
    let segments = TranscriptParser::default().parse(&content);
    let triage = execute_stage0(&segments, &Heuristics::default());
    let local = MethodCounts::from_results(triage.resolved.iter().flatten());

    println!("Transcript Analysis");
    println!("===================");
    println!(
        "Format: {} (speaker headers: {}, bracketed timestamps: {})",
        votes.winner(),
        votes.speaker_timestamp,
        votes.timestamp_speaker
    );
    println!("Segments: {}", segments.len());

    let mut speakers: Vec<&str> = segments.iter().map(|s| s.speaker.as_str()).collect();
    speakers.sort_unstable();
    speakers.dedup();
    println!("Speakers: {}", speakers.join(", "));
    println!();

    println!("Local Resolution");
    println!("----------------");
    print!("{}", format_distribution(&local));
    println!("  queued for remote correction: {}", triage.queued.len());

    let batch_size = BatchConfig::default().batch_size;
    println!(
        "Estimated requests: {} (batch size {})",
        triage.queued.len().div_ceil(batch_size),
        batch_size
    );

    Ok(())
}

async fn test_connection(text: &str) -> Result<()> {
    let client = Arc::new(connect()?);

    let reply = client
        .call("你好", 20)
        .await
        .context("Correction service did not answer")?;
    info!("Service answered: {}", reply);

    let corrector = BatchCorrector::new(client, BatchConfig::default());
    let result = corrector.correct_single(text, &Heuristics::default()).await;

    println!("Connection OK");
    println!("Input:  {}", result.original_text);
    println!("Output: {}", result.corrected_text);
    println!("Method: {}", result.method);

    Ok(())
}
