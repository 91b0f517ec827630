use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::models::{CorrectionMethod, EnrichedSegment, MethodCounts};
use crate::pipeline::BatchRun;

const WIDE_RULE: usize = 70;
const NARROW_RULE: usize = 50;

/// `YYYYmmdd_HHMMSS`, used in output file names
pub fn file_stamp(at: &DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

fn display_time(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// File stem of the input, used to name its outputs
pub fn input_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transcript".to_string())
}

/// `{dir}/{stem}_correction_report_{stamp}.txt`
pub fn report_path(dir: &Path, input: &Path, stamp: &str) -> PathBuf {
    dir.join(format!("{}_correction_report_{}.txt", input_stem(input), stamp))
}

/// `{dir}/{stem}_corrected_{stamp}.txt`
pub fn corrected_path(dir: &Path, input: &Path, stamp: &str) -> PathBuf {
    dir.join(format!("{}_corrected_{}.txt", input_stem(input), stamp))
}

/// `{dir}/{stem}_segments_{stamp}.json`
pub fn json_path(dir: &Path, input: &Path, stamp: &str) -> PathBuf {
    dir.join(format!("{}_segments_{}.json", input_stem(input), stamp))
}

/// `{dir}/batch_summary_{stamp}.txt`
pub fn batch_summary_path(dir: &Path, stamp: &str) -> PathBuf {
    dir.join(format!("batch_summary_{}.txt", stamp))
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write file: {:?}", path))
}

/// Per-file report: summary, method distribution, then every segment
pub struct CorrectionReport<'a> {
    source: &'a Path,
    segments: &'a [EnrichedSegment],
    counts: &'a MethodCounts,
    generated_at: DateTime<Local>,
}

impl<'a> CorrectionReport<'a> {
    pub fn new(
        source: &'a Path,
        segments: &'a [EnrichedSegment],
        counts: &'a MethodCounts,
        generated_at: DateTime<Local>,
    ) -> Self {
        Self {
            source,
            segments,
            counts,
            generated_at,
        }
    }

    pub fn format(&self) -> String {
        let mut out = String::new();
        let wide = "=".repeat(WIDE_RULE);
        let counts = self.counts;

        let _ = writeln!(out, "{}", wide);
        let _ = writeln!(out, "Transcript Correction Report");
        let _ = writeln!(out, "{}", wide);
        let _ = writeln!(out, "Input file: {}", self.source.display());
        let _ = writeln!(out, "Processed at: {}", display_time(&self.generated_at));
        let _ = writeln!(out, "Total segments: {}", counts.total());
        let _ = writeln!(out, "Corrected segments: {}", counts.corrected());
        let _ = writeln!(out, "Correction rate: {:.2}%", counts.correction_rate());
        if counts.failed() > 0 {
            let _ = writeln!(out, "Failed segments: {}", counts.failed());
        }

        out.push_str("\nProcessing method distribution:\n");
        out.push_str(&format_distribution(counts));

        let _ = writeln!(out, "\n{}", wide);
        let _ = writeln!(out, "Detailed corrections");
        let _ = writeln!(out, "{}\n", wide);

        for (i, enriched) in self.segments.iter().enumerate() {
            format_segment(&mut out, i + 1, enriched);
        }

        out
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        write_text(path, &self.format())
    }
}

/// `  method: n (x.x%)` for every method that occurred
pub fn format_distribution(counts: &MethodCounts) -> String {
    let mut out = String::new();
    for method in CorrectionMethod::ALL {
        let n = counts.get(method);
        if n > 0 {
            let _ = writeln!(out, "  {}: {} ({:.1}%)", method, n, counts.percent(n));
        }
    }
    out
}

fn format_segment(out: &mut String, index: usize, enriched: &EnrichedSegment) {
    let segment = &enriched.segment;
    let correction = &enriched.correction;

    let _ = writeln!(out, "[Segment {}]", index);
    let _ = writeln!(out, "Line: {}", segment.line_number);
    let _ = writeln!(out, "Time: {}", segment.timestamp);
    let _ = writeln!(out, "Speaker: {}", segment.speaker);
    let _ = writeln!(out, "Method: {}", correction.method);

    if correction.method.is_failure() {
        let _ = writeln!(out, "Remote correction failed, text kept");
        let _ = writeln!(out, "Original: {}", segment.text);
    } else if correction.has_errors {
        let _ = writeln!(out, "Corrected");
        let _ = writeln!(out, "Original: {}", correction.original_text);
        let _ = writeln!(out, "Fix: {}", correction.corrected_text);
        let _ = writeln!(out, "Confidence: {:.2}", correction.confidence);
        out.push_str("Error details:\n");
        for (j, error) in correction.errors.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {}: '{}' → '{}'",
                j + 1,
                error.error_type,
                error.original,
                error.corrected
            );
            if let Some(reason) = &error.reason {
                let _ = writeln!(out, "     Reason: {}", reason);
            }
        }
    } else {
        let _ = writeln!(out, "No correction needed");
        let _ = writeln!(out, "Text: {}", segment.text);
    }

    let _ = writeln!(out, "\n{}\n", "-".repeat(NARROW_RULE));
}

/// The transcript with corrections applied, one `speaker timestamp` block per
/// segment
pub struct CorrectedTranscript<'a> {
    source: &'a Path,
    segments: &'a [EnrichedSegment],
    generated_at: DateTime<Local>,
}

impl<'a> CorrectedTranscript<'a> {
    pub fn new(
        source: &'a Path,
        segments: &'a [EnrichedSegment],
        generated_at: DateTime<Local>,
    ) -> Self {
        Self {
            source,
            segments,
            generated_at,
        }
    }

    pub fn format(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "{} - corrected\n", input_stem(self.source));
        let _ = writeln!(out, "Corrected at: {}", display_time(&self.generated_at));
        let _ = writeln!(out, "Original file: {}", self.source.display());
        let _ = writeln!(out, "{}\n", "=".repeat(NARROW_RULE));

        for enriched in self.segments {
            let text = enriched.display_text();
            if text.trim().is_empty() {
                continue;
            }
            let _ = writeln!(
                out,
                "{} {}\n{}\n",
                enriched.segment.speaker, enriched.segment.timestamp, text
            );
        }

        out
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        write_text(path, &self.format())
    }
}

/// Machine-readable dump of the enriched segments
#[derive(Debug, Serialize)]
pub struct SegmentDump<'a> {
    pub source: String,
    pub generated_at: String,
    pub counts: &'a MethodCounts,
    pub segments: &'a [EnrichedSegment],
}

impl<'a> SegmentDump<'a> {
    pub fn new(
        source: &Path,
        segments: &'a [EnrichedSegment],
        counts: &'a MethodCounts,
        generated_at: DateTime<Local>,
    ) -> Self {
        Self {
            source: source.display().to_string(),
            generated_at: generated_at.to_rfc3339(),
            counts,
            segments,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        serde_json::to_writer_pretty(file, self).context("Failed to write JSON")?;
        Ok(())
    }
}

/// Summary of a multi-file run
pub struct BatchSummary<'a> {
    run: &'a BatchRun,
    generated_at: DateTime<Local>,
}

impl<'a> BatchSummary<'a> {
    pub fn new(run: &'a BatchRun, generated_at: DateTime<Local>) -> Self {
        Self { run, generated_at }
    }

    pub fn format(&self) -> String {
        let mut out = String::new();
        let wide = "=".repeat(WIDE_RULE);
        let run = self.run;

        let _ = writeln!(out, "{}", wide);
        let _ = writeln!(out, "Batch Correction Summary");
        let _ = writeln!(out, "{}", wide);
        let _ = writeln!(out, "Processed at: {}", display_time(&self.generated_at));
        let _ = writeln!(out, "Files processed: {}", run.outcomes.len());
        let _ = writeln!(out, "Files failed: {}", run.failures.len());
        if !run.skipped.is_empty() {
            let _ = writeln!(out, "Files skipped: {}", run.skipped.len());
        }
        let totals = run.totals();
        let _ = writeln!(out, "Total segments: {}", totals.total());
        let _ = writeln!(
            out,
            "Corrected segments: {} ({:.2}%)",
            totals.corrected(),
            totals.correction_rate()
        );

        if !run.outcomes.is_empty() {
            out.push_str("\nProcessed files:\n");
            for outcome in &run.outcomes {
                let _ = writeln!(
                    out,
                    "  {}: {} segments, {} corrected, {} failed ({:.1}s)",
                    outcome.input.display(),
                    outcome.counts.total(),
                    outcome.counts.corrected(),
                    outcome.counts.failed(),
                    outcome.elapsed.as_secs_f64()
                );
                for path in outcome.written() {
                    let _ = writeln!(out, "    -> {}", path.display());
                }
            }
        }

        if !run.failures.is_empty() {
            out.push_str("\nFailed files:\n");
            for (path, error) in &run.failures {
                let _ = writeln!(out, "  {}: {}", path.display(), error);
            }
        }

        if !run.skipped.is_empty() {
            out.push_str("\nSkipped files:\n");
            for path in &run.skipped {
                let _ = writeln!(out, "  {}", path.display());
            }
        }

        out
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        write_text(path, &self.format())
    }
}
