use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::info;

use crate::io::{
    corrected_path, file_stamp, json_path, report_path, CorrectedTranscript, CorrectionReport,
    SegmentDump,
};
use crate::models::{EnrichedSegment, MethodCounts};

/// Configuration for Stage 2 rendering
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Directory receiving every output file
    pub output_dir: PathBuf,
    /// Whether to generate the correction report
    pub write_report: bool,
    /// Whether to dump enriched segments as JSON
    pub write_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            write_report: true,
            write_json: false,
        }
    }
}

/// Result of Stage 2 rendering
#[derive(Debug, Default)]
pub struct Stage2Result {
    pub report_path: Option<PathBuf>,
    pub corrected_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
}

/// Execute Stage 2: Rendering
///
/// Always writes the corrected transcript; the report and the JSON dump
/// follow the config. File names carry the input stem and `generated_at`.
pub fn execute_stage2(
    input: &Path,
    segments: &[EnrichedSegment],
    counts: &MethodCounts,
    config: &OutputConfig,
    generated_at: DateTime<Local>,
) -> Result<Stage2Result> {
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory: {:?}", config.output_dir)
    })?;

    let stamp = file_stamp(&generated_at);
    let mut result = Stage2Result::default();

    if config.write_report {
        let path = report_path(&config.output_dir, input, &stamp);
        info!("Writing correction report to {:?}", path);
        CorrectionReport::new(input, segments, counts, generated_at).write_file(&path)?;
        result.report_path = Some(path);
    }

    let path = corrected_path(&config.output_dir, input, &stamp);
    info!("Writing corrected transcript to {:?}", path);
    CorrectedTranscript::new(input, segments, generated_at).write_file(&path)?;
    result.corrected_path = Some(path);

    if config.write_json {
        let path = json_path(&config.output_dir, input, &stamp);
        info!("Writing segment dump to {:?}", path);
        SegmentDump::new(input, segments, counts, generated_at).write_json(&path)?;
        result.json_path = Some(path);
    }

    Ok(result)
}
