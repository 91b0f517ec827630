use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::heuristics::Heuristics;
use crate::llm::CorrectionService;
use crate::models::{CorrectionMethod, CorrectionResult, EnrichedSegment, MethodCounts, Segment};
use crate::parser::TranscriptParser;
use crate::stages::{
    execute_stage0, execute_stage2, BatchConfig, BatchCorrector, OutputConfig,
};

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch: BatchConfig,
    pub output: OutputConfig,
    /// Files processed concurrently (1 = sequential)
    pub parallel: usize,
    /// Keep going after a file fails
    pub continue_on_error: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            output: OutputConfig::default(),
            parallel: 1,
            continue_on_error: false,
        }
    }
}

/// Corrected segments of one transcript
#[derive(Debug)]
pub struct PipelineOutput {
    /// One entry per input segment, in input order
    pub segments: Vec<EnrichedSegment>,
    pub counts: MethodCounts,
    pub batches_sent: usize,
    pub batches_failed: usize,
}

/// What was produced for one input file
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub counts: MethodCounts,
    pub report_path: Option<PathBuf>,
    pub corrected_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
    pub elapsed: Duration,
}

impl FileOutcome {
    /// Paths of every file written for this input
    pub fn written(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.report_path, &self.corrected_path, &self.json_path]
            .into_iter()
            .flatten()
    }
}

/// Outcome of a multi-file run, in input order
#[derive(Debug, Default)]
pub struct BatchRun {
    pub outcomes: Vec<FileOutcome>,
    /// `(input, error chain)`
    pub failures: Vec<(PathBuf, String)>,
    /// Inputs never started because an earlier file failed
    pub skipped: Vec<PathBuf>,
}

impl BatchRun {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Counts summed over every processed file
    pub fn totals(&self) -> MethodCounts {
        let mut totals = MethodCounts::default();
        for outcome in &self.outcomes {
            totals.merge(&outcome.counts);
        }
        totals
    }
}

enum FileStatus {
    Done(FileOutcome),
    Failed(String),
    Skipped,
}

/// Parser, local tiers and remote tier wired together.
///
/// Only holds read-only state, so one pipeline can serve several files at
/// once.
pub struct Pipeline {
    parser: TranscriptParser,
    heuristics: Heuristics,
    corrector: BatchCorrector,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(service: Arc<dyn CorrectionService>, config: PipelineConfig) -> Self {
        Self {
            parser: TranscriptParser::default(),
            heuristics: Heuristics::default(),
            corrector: BatchCorrector::new(service, config.batch.clone()),
            config,
        }
    }

    /// Replace the local tiers (custom dictionary or thresholds)
    pub fn with_heuristics(mut self, heuristics: Heuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn heuristics(&self) -> &Heuristics {
        &self.heuristics
    }

    pub fn corrector(&self) -> &BatchCorrector {
        &self.corrector
    }

    /// Correct every segment and merge the results back in input order
    pub async fn run(&self, segments: Vec<Segment>) -> PipelineOutput {
        let triage = execute_stage0(&segments, &self.heuristics);
        let remote = self.corrector.correct_batch(&triage.queued).await;

        let mut slots = triage.resolved;
        for (idx, result) in remote.results {
            if let Some(slot) = slots.get_mut(idx) {
                *slot = Some(result);
            }
        }

        let mut counts = MethodCounts::default();
        let enriched: Vec<EnrichedSegment> = segments
            .into_iter()
            .zip(slots)
            .map(|(segment, slot)| {
                let result = slot.unwrap_or_else(|| {
                    warn!("Line {}: no correction result, keeping text", segment.line_number);
                    CorrectionResult::unchanged(segment.text.trim(), CorrectionMethod::ApiError)
                });
                counts.record(&result);
                EnrichedSegment::new(segment, result)
            })
            .collect();

        PipelineOutput {
            segments: enriched,
            counts,
            batches_sent: remote.batches_sent,
            batches_failed: remote.batches_failed,
        }
    }

    /// Parse, correct and write the outputs for one transcript file
    pub async fn process_file(&self, path: &Path) -> Result<FileOutcome> {
        let start = Instant::now();

        let segments = self.parser.parse_file(path)?;
        info!("{:?}: parsed {} segments", path, segments.len());

        let output = self.run(segments).await;
        let written = execute_stage2(
            path,
            &output.segments,
            &output.counts,
            &self.config.output,
            Local::now(),
        )?;

        let counts = output.counts;
        info!(
            "{:?}: {} segments, {} corrected ({:.1}%), {} failed, {} batches",
            path,
            counts.total(),
            counts.corrected(),
            counts.correction_rate(),
            counts.failed(),
            output.batches_sent
        );

        Ok(FileOutcome {
            input: path.to_path_buf(),
            counts,
            report_path: written.report_path,
            corrected_path: written.corrected_path,
            json_path: written.json_path,
            elapsed: start.elapsed(),
        })
    }

    /// Process many files, sequentially or on a bounded pool.
    ///
    /// Without `continue_on_error`, files not yet started when a failure is
    /// seen are skipped; files already in flight finish.
    pub async fn process_files(self: &Arc<Self>, files: &[PathBuf]) -> BatchRun {
        let statuses = if self.config.parallel > 1 {
            self.process_pooled(files).await
        } else {
            self.process_sequential(files).await
        };

        let mut run = BatchRun::default();
        for (path, status) in files.iter().zip(statuses) {
            match status {
                FileStatus::Done(outcome) => run.outcomes.push(outcome),
                FileStatus::Failed(e) => run.failures.push((path.clone(), e)),
                FileStatus::Skipped => run.skipped.push(path.clone()),
            }
        }
        run
    }

    async fn process_sequential(&self, files: &[PathBuf]) -> Vec<FileStatus> {
        let mut statuses = Vec::with_capacity(files.len());
        let mut stopped = false;

        for (i, path) in files.iter().enumerate() {
            if stopped {
                statuses.push(FileStatus::Skipped);
                continue;
            }

            info!("[{}/{}] Processing {:?}", i + 1, files.len(), path);
            let status = self.process_one(path).await;
            if matches!(status, FileStatus::Failed(_)) && !self.config.continue_on_error {
                warn!("Stopping after failure (use --continue-on-error to keep going)");
                stopped = true;
            }
            statuses.push(status);
        }

        statuses
    }

    async fn process_pooled(self: &Arc<Self>, files: &[PathBuf]) -> Vec<FileStatus> {
        info!("Processing {} files, {} at a time", files.len(), self.config.parallel);

        let permits = Arc::new(Semaphore::new(self.config.parallel));
        let stop = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for (i, path) in files.iter().cloned().enumerate() {
            let pipeline = Arc::clone(self);
            let permits = Arc::clone(&permits);
            let stop = Arc::clone(&stop);

            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (i, FileStatus::Skipped);
                };
                if stop.load(Ordering::SeqCst) {
                    return (i, FileStatus::Skipped);
                }

                let status = pipeline.process_one(&path).await;
                if matches!(status, FileStatus::Failed(_)) && !pipeline.config.continue_on_error {
                    stop.store(true, Ordering::SeqCst);
                }
                (i, status)
            });
        }

        let mut slots: Vec<Option<FileStatus>> = files.iter().map(|_| None).collect();
        let mut done = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, status)) => {
                    done += 1;
                    info!("Progress: {}/{} files", done, files.len());
                    slots[i] = Some(status);
                }
                Err(e) => error!("File task did not complete: {}", e),
            }
        }

        slots
            .into_iter()
            .map(|s| s.unwrap_or_else(|| FileStatus::Failed("task did not complete".to_string())))
            .collect()
    }

    async fn process_one(&self, path: &Path) -> FileStatus {
        match self.process_file(path).await {
            Ok(outcome) => FileStatus::Done(outcome),
            Err(e) => {
                error!("{:?} failed: {:#}", path, e);
                FileStatus::Failed(format!("{:#}", e))
            }
        }
    }
}
