use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Error type label for dictionary substitutions
pub const QUICK_FIX_ERROR: &str = "快速修正";
/// Error type label for corrections returned by a batch request
pub const BATCH_API_ERROR: &str = "批量API修正";
/// Error type label for corrections returned by a single-text request
pub const API_ERROR: &str = "API修正";

/// Which pipeline stage resolved a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    /// Segment had no text
    Empty,
    /// Resolved by the lexical dictionary
    QuickFix,
    /// Skipped by the relevance filter
    PreFilter,
    /// Corrected by a batch request
    BatchApi,
    /// Sent in a batch, reply kept the text (or was unusable)
    BatchApiNoChange,
    /// Batch request exhausted its retries
    ApiFailed,
    /// Batch processing failed unexpectedly
    ApiError,
    /// Corrected by a single-text request
    ApiCorrection,
    /// Single-text request made no change
    NoChange,
}

impl CorrectionMethod {
    pub const ALL: [CorrectionMethod; 9] = [
        CorrectionMethod::Empty,
        CorrectionMethod::QuickFix,
        CorrectionMethod::PreFilter,
        CorrectionMethod::BatchApi,
        CorrectionMethod::BatchApiNoChange,
        CorrectionMethod::ApiFailed,
        CorrectionMethod::ApiError,
        CorrectionMethod::ApiCorrection,
        CorrectionMethod::NoChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionMethod::Empty => "empty",
            CorrectionMethod::QuickFix => "quick_fix",
            CorrectionMethod::PreFilter => "pre_filter",
            CorrectionMethod::BatchApi => "batch_api",
            CorrectionMethod::BatchApiNoChange => "batch_api_no_change",
            CorrectionMethod::ApiFailed => "api_failed",
            CorrectionMethod::ApiError => "api_error",
            CorrectionMethod::ApiCorrection => "api_correction",
            CorrectionMethod::NoChange => "no_change",
        }
    }

    /// The remote service could not be used for this segment
    pub fn is_failure(&self) -> bool {
        matches!(self, CorrectionMethod::ApiFailed | CorrectionMethod::ApiError)
    }
}

impl fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected error within a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub original: String,
    pub corrected: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl CorrectionError {
    pub fn new(
        error_type: impl Into<String>,
        original: impl Into<String>,
        corrected: impl Into<String>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            original: original.into(),
            corrected: corrected.into(),
            reason: None,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Outcome of running one segment through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionResult {
    pub original_text: String,
    pub corrected_text: String,
    pub has_errors: bool,
    /// 0.9 for corrections, 1.0 when the text is left alone
    pub confidence: f64,
    pub errors: Vec<CorrectionError>,
    pub method: CorrectionMethod,
}

impl CorrectionResult {
    /// Text left as-is by the given stage
    pub fn unchanged(text: &str, method: CorrectionMethod) -> Self {
        Self {
            original_text: text.to_string(),
            corrected_text: text.to_string(),
            has_errors: false,
            confidence: 1.0,
            errors: vec![],
            method,
        }
    }

    /// A correction; degrades to `unchanged` when the text did not actually
    /// change or no error was recorded.
    pub fn corrected(
        original: &str,
        corrected: String,
        errors: Vec<CorrectionError>,
        method: CorrectionMethod,
    ) -> Self {
        if corrected == original || errors.is_empty() {
            return Self::unchanged(original, method);
        }

        Self {
            original_text: original.to_string(),
            corrected_text: corrected,
            has_errors: true,
            confidence: 0.9,
            errors,
            method,
        }
    }
}

/// Aggregate counts per resolution method
#[derive(Debug, Clone, Default, Serialize)]
pub struct MethodCounts {
    counts: HashMap<CorrectionMethod, usize>,
    total: usize,
    corrected: usize,
}

impl MethodCounts {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a CorrectionResult>) -> Self {
        let mut counts = Self::default();
        for result in results {
            counts.record(result);
        }
        counts
    }

    pub fn record(&mut self, result: &CorrectionResult) {
        *self.counts.entry(result.method).or_insert(0) += 1;
        self.total += 1;
        if result.has_errors {
            self.corrected += 1;
        }
    }

    /// Fold another file's counts into these
    pub fn merge(&mut self, other: &MethodCounts) {
        for (method, n) in &other.counts {
            *self.counts.entry(*method).or_insert(0) += n;
        }
        self.total += other.total;
        self.corrected += other.corrected;
    }

    pub fn get(&self, method: CorrectionMethod) -> usize {
        self.counts.get(&method).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn corrected(&self) -> usize {
        self.corrected
    }

    /// Segments the remote service could not handle
    pub fn failed(&self) -> usize {
        self.get(CorrectionMethod::ApiFailed) + self.get(CorrectionMethod::ApiError)
    }

    /// Segments that are neither corrected nor failed
    pub fn unchanged(&self) -> usize {
        self.total - self.corrected - self.failed()
    }

    /// Percentage of `count` over the total (0 when empty)
    pub fn percent(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }

    pub fn correction_rate(&self) -> f64 {
        self.percent(self.corrected)
    }
}
