pub mod heuristics;
pub mod io;
pub mod llm;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod stages;

pub use heuristics::{Heuristics, HeuristicsOutcome, LexicalFixer, RelevanceConfig, RelevanceFilter};
pub use io::{find_transcript_files, read_transcript, BatchSummary, CorrectedTranscript, CorrectionReport};
pub use llm::{CorrectionService, GlmClient, GlmConfig, RetryPolicy, ServiceError};
pub use models::{
    CorrectionError, CorrectionMethod, CorrectionResult, EnrichedSegment, MethodCounts, Segment,
};
pub use parser::{detect_format, parse, TranscriptFormat, TranscriptParser};
pub use pipeline::{BatchRun, FileOutcome, Pipeline, PipelineConfig, PipelineOutput};
pub use stages::{
    execute_stage0, execute_stage2, BatchConfig, BatchCorrector, OutputConfig, Stage0Result,
    Stage1Result, Stage2Result,
};
