use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::heuristics::{Heuristics, HeuristicsOutcome};
use crate::llm::{
    batch_token_budget, build_batch_prompt, build_single_prompt, call_with_retry, flatten_lines,
    parse_numbered_reply, sanitize_correction, CorrectionService, RetryPolicy, ServiceError,
    SINGLE_MAX_TOKENS,
};
use crate::models::{
    CorrectionError, CorrectionMethod, CorrectionResult, API_ERROR, BATCH_API_ERROR,
};

/// Configuration for Stage 1
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Texts per remote call
    pub batch_size: usize,
    /// Fixed part of the token budget
    pub base_tokens: u32,
    /// Budget added per text in the group
    pub tokens_per_text: u32,
    /// Hard cap on the token budget of one call
    pub max_tokens_per_request: u32,
    pub retry: RetryPolicy,
    /// Pause between consecutive groups
    pub inter_batch_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            base_tokens: 200,
            tokens_per_text: 40,
            max_tokens_per_request: 1200,
            retry: RetryPolicy::default(),
            inter_batch_delay: Duration::from_millis(200),
        }
    }
}

/// A group of queued texts sent in one call
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// `(original_index, text)`
    pub entries: Vec<(usize, String)>,
}

impl BatchRequest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, t)| t.as_str()).collect()
    }
}

/// Result of Stage 1
#[derive(Debug, Default)]
pub struct Stage1Result {
    /// `(original_index, result)` in the order the texts were queued
    pub results: Vec<(usize, CorrectionResult)>,
    pub batches_sent: usize,
    /// Groups whose call never produced a reply
    pub batches_failed: usize,
}

/// Remote tier: sends queued texts in bounded groups and maps the replies
/// back by position.
pub struct BatchCorrector {
    service: Arc<dyn CorrectionService>,
    config: BatchConfig,
}

impl BatchCorrector {
    pub fn new(service: Arc<dyn CorrectionService>, config: BatchConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Split queued texts into groups of at most `batch_size`
    pub fn plan(&self, queued: &[(usize, String)]) -> Vec<BatchRequest> {
        queued
            .chunks(self.config.batch_size.max(1))
            .map(|chunk| BatchRequest {
                entries: chunk.to_vec(),
            })
            .collect()
    }

    /// Execute Stage 1: correct every queued text.
    ///
    /// Always returns exactly one result per queued entry. A failing group
    /// falls back to its original texts and does not affect other groups.
    pub async fn correct_batch(&self, queued: &[(usize, String)]) -> Stage1Result {
        let batches = self.plan(queued);
        let total = batches.len();
        let mut result = Stage1Result {
            results: Vec::with_capacity(queued.len()),
            ..Default::default()
        };

        if total > 0 {
            info!(
                "Stage 1: {} segments in {} batches (batch size {})",
                queued.len(),
                total,
                self.config.batch_size
            );
        }

        for (i, batch) in batches.iter().enumerate() {
            if i > 0 && !self.config.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.config.inter_batch_delay).await;
            }

            debug!("Batch {}/{}: {} segments", i + 1, total, batch.len());
            result.batches_sent += 1;

            match self.send(batch).await {
                Ok(reply) => {
                    let corrections = map_reply(batch, &reply);
                    let corrected = corrections.iter().filter(|(_, r)| r.has_errors).count();
                    info!("Batch {}/{}: {} corrections", i + 1, total, corrected);
                    result.results.extend(corrections);
                }
                Err(e) => {
                    let method = failure_method(&e);
                    warn!("Batch {}/{} failed ({}): {}", i + 1, total, method, e);
                    result.batches_failed += 1;
                    result.results.extend(
                        batch
                            .entries
                            .iter()
                            .map(|(idx, text)| (*idx, CorrectionResult::unchanged(text, method))),
                    );
                }
            }
        }

        result
    }

    async fn send(&self, batch: &BatchRequest) -> Result<String, ServiceError> {
        let prompt = build_batch_prompt(&batch.texts());
        let max_tokens = batch_token_budget(
            batch.len(),
            self.config.base_tokens,
            self.config.tokens_per_text,
            self.config.max_tokens_per_request,
        );
        call_with_retry(self.service.as_ref(), &prompt, max_tokens, &self.config.retry).await
    }

    /// Correct one text outside the batch flow: local tiers first, then a
    /// single-text request.
    pub async fn correct_single(&self, text: &str, heuristics: &Heuristics) -> CorrectionResult {
        if let HeuristicsOutcome::Resolved(result) = heuristics.apply(text) {
            return result;
        }

        let text = text.trim();
        let prompt = build_single_prompt(text);
        match call_with_retry(
            self.service.as_ref(),
            &prompt,
            SINGLE_MAX_TOKENS,
            &self.config.retry,
        )
        .await
        {
            Ok(reply) => match sanitize_correction(&reply, text) {
                Some(cleaned) if cleaned != text => {
                    let error = CorrectionError::new(API_ERROR, text, cleaned.as_str());
                    CorrectionResult::corrected(
                        text,
                        cleaned,
                        vec![error],
                        CorrectionMethod::ApiCorrection,
                    )
                }
                _ => CorrectionResult::unchanged(text, CorrectionMethod::NoChange),
            },
            Err(e) => {
                warn!("Single correction failed: {}", e);
                CorrectionResult::unchanged(text, CorrectionMethod::NoChange)
            }
        }
    }
}

/// Exhausted retries are `api_failed`; a reply the service itself rejected or
/// that could not be decoded is `api_error`.
fn failure_method(error: &ServiceError) -> CorrectionMethod {
    match error {
        ServiceError::Status { .. } | ServiceError::Parse(_) => CorrectionMethod::ApiError,
        _ => CorrectionMethod::ApiFailed,
    }
}

/// Turn a raw reply into one result per entry of the group.
///
/// Replies are compared with the single-line form the prompt carried, so an
/// echoed multi-line turn keeps its original text and line breaks.
fn map_reply(batch: &BatchRequest, reply: &str) -> Vec<(usize, CorrectionResult)> {
    let mapped = parse_numbered_reply(reply, batch.len());

    batch
        .entries
        .iter()
        .enumerate()
        .map(|(position, (idx, original))| {
            let sent = flatten_lines(original);
            let candidate = mapped
                .get(&(position + 1))
                .filter(|c| c.as_str() != sent)
                .and_then(|c| sanitize_correction(c, &sent))
                .filter(|c| c.as_str() != sent);

            let result = match candidate {
                Some(cleaned) => {
                    let error = CorrectionError::new(BATCH_API_ERROR, original, cleaned.as_str());
                    CorrectionResult::corrected(
                        original,
                        cleaned,
                        vec![error],
                        CorrectionMethod::BatchApi,
                    )
                }
                None => CorrectionResult::unchanged(original, CorrectionMethod::BatchApiNoChange),
            };
            (*idx, result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::retry::testing::ScriptedService;

    fn test_config(batch_size: usize) -> BatchConfig {
        BatchConfig {
            batch_size,
            retry: RetryPolicy::immediate(2),
            inter_batch_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn queue(texts: &[&str]) -> Vec<(usize, String)> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| (i, t.to_string()))
            .collect()
    }

    #[test]
    fn test_batch_config_default() {
        let config = BatchConfig::default();
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.max_tokens_per_request, 1200);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.inter_batch_delay, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_correct_batch_maps_by_position() {
        let service = Arc::new(ScriptedService::new(vec![Ok(
            "1|我觉得好\n2|没问题".to_string()
        )]));
        let corrector = BatchCorrector::new(service.clone(), test_config(25));

        let result = corrector.correct_batch(&queue(&["我觉的好", "没问题"])).await;

        assert_eq!(result.results.len(), 2);
        let (idx, first) = &result.results[0];
        assert_eq!(*idx, 0);
        assert_eq!(first.method, CorrectionMethod::BatchApi);
        assert_eq!(first.corrected_text, "我觉得好");
        assert!(first.has_errors);
        assert_eq!(first.errors[0].error_type, BATCH_API_ERROR);
        assert_eq!(first.confidence, 0.9);

        let (_, second) = &result.results[1];
        assert_eq!(second.method, CorrectionMethod::BatchApiNoChange);
        assert!(!second.has_errors);
        assert_eq!(second.corrected_text, "没问题");

        let prompts = service.prompts.lock().unwrap();
        assert!(prompts[0].0.contains("1|我觉的好\n2|没问题"));
        assert_eq!(prompts[0].1, 280);
    }

    #[tokio::test]
    async fn test_echoed_multiline_text_is_unchanged() {
        let original = "我们明天在讨论一下\n这个方案好不好";
        let service = Arc::new(ScriptedService::new(vec![Ok(
            "1|我们明天在讨论一下 这个方案好不好\n2|我们明天再讨论一下 这个方案好不好".to_string(),
        )]));
        let corrector = BatchCorrector::new(service.clone(), test_config(25));

        let result = corrector.correct_batch(&queue(&[original, original])).await;

        let (_, echoed) = &result.results[0];
        assert_eq!(echoed.method, CorrectionMethod::BatchApiNoChange);
        assert!(!echoed.has_errors);
        assert_eq!(echoed.corrected_text, original);

        let (_, fixed) = &result.results[1];
        assert_eq!(fixed.method, CorrectionMethod::BatchApi);
        assert_eq!(fixed.corrected_text, "我们明天再讨论一下 这个方案好不好");

        let prompts = service.prompts.lock().unwrap();
        assert!(prompts[0].0.contains("1|我们明天在讨论一下 这个方案好不好\n2|"));
    }

    #[tokio::test]
    async fn test_groups_are_bounded() {
        let service = Arc::new(ScriptedService::new(vec![
            Ok("1|甲\n2|乙".to_string()),
            Ok("1|丙\n2|丁".to_string()),
            Ok("1|戊".to_string()),
        ]));
        let corrector = BatchCorrector::new(service.clone(), test_config(2));

        let queued: Vec<(usize, String)> = (0..5).map(|i| (i * 10, format!("文本{}", i))).collect();
        assert_eq!(corrector.plan(&queued).len(), 3);

        let result = corrector.correct_batch(&queued).await;
        assert_eq!(service.calls(), 3);
        assert_eq!(result.batches_sent, 3);
        let indices: Vec<usize> = result.results.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 10, 20, 30, 40]);
        // group-local numbering in the last group
        assert_eq!(result.results[4].1.corrected_text, "戊");
    }

    #[tokio::test]
    async fn test_failed_group_does_not_affect_others() {
        let service = Arc::new(ScriptedService::new(vec![
            Err(ServiceError::Timeout),
            Err(ServiceError::Timeout),
            Ok("1|我们再看看".to_string()),
        ]));
        let corrector = BatchCorrector::new(service, test_config(1));

        let result = corrector
            .correct_batch(&queue(&["我觉的可以吧", "我们在看看"]))
            .await;

        assert_eq!(result.batches_failed, 1);
        let (_, failed) = &result.results[0];
        assert_eq!(failed.method, CorrectionMethod::ApiFailed);
        assert_eq!(failed.corrected_text, failed.original_text);
        assert!(!failed.has_errors);

        let (_, ok) = &result.results[1];
        assert_eq!(ok.method, CorrectionMethod::BatchApi);
        assert_eq!(ok.corrected_text, "我们再看看");
    }

    #[tokio::test]
    async fn test_status_error_is_api_error() {
        let service = Arc::new(ScriptedService::new(vec![Err(ServiceError::Status {
            status: 500,
            body: "internal".to_string(),
        })]));
        let corrector = BatchCorrector::new(service, test_config(25));

        let result = corrector.correct_batch(&queue(&["甲乙丙", "丁戊己"])).await;
        assert!(result
            .results
            .iter()
            .all(|(_, r)| r.method == CorrectionMethod::ApiError && !r.has_errors));
    }

    #[tokio::test]
    async fn test_unusable_replies_keep_original() {
        let service = Arc::new(ScriptedService::new(vec![Ok(
            "1|好\n2|**说明**\n".to_string()
        )]));
        let corrector = BatchCorrector::new(service, test_config(25));

        let result = corrector
            .correct_batch(&queue(&["这是一个比较长的句子", "另外一句话", "第三句没有回复"]))
            .await;

        assert_eq!(result.results.len(), 3);
        for (_, r) in &result.results {
            assert_eq!(r.method, CorrectionMethod::BatchApiNoChange);
            assert_eq!(r.corrected_text, r.original_text);
        }
    }

    #[tokio::test]
    async fn test_positional_reply() {
        let service = Arc::new(ScriptedService::new(vec![Ok(
            "应该这样做\n没问题".to_string()
        )]));
        let corrector = BatchCorrector::new(service, test_config(25));

        let result = corrector.correct_batch(&queue(&["因当这样做", "没问题"])).await;
        assert_eq!(result.results[0].1.corrected_text, "应该这样做");
        assert_eq!(result.results[1].1.method, CorrectionMethod::BatchApiNoChange);
    }

    #[tokio::test]
    async fn test_empty_queue_makes_no_calls() {
        let service = Arc::new(ScriptedService::new(vec![]));
        let corrector = BatchCorrector::new(service.clone(), test_config(25));
        let result = corrector.correct_batch(&[]).await;
        assert!(result.results.is_empty());
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_correct_single() {
        let heuristics = Heuristics::default();

        // quick fix resolves locally
        let service = Arc::new(ScriptedService::new(vec![]));
        let corrector = BatchCorrector::new(service.clone(), test_config(25));
        let result = corrector.correct_single("我觉的很好", &heuristics).await;
        assert_eq!(result.method, CorrectionMethod::QuickFix);
        assert_eq!(service.calls(), 0);

        // remote correction
        let service = Arc::new(ScriptedService::new(vec![Ok(
            "修正：我们明天再讨论一下这个方案吧".to_string()
        )]));
        let corrector = BatchCorrector::new(service.clone(), test_config(25));
        let result = corrector
            .correct_single("我们明天在讨论一下这个方案吧", &heuristics)
            .await;
        assert_eq!(result.method, CorrectionMethod::ApiCorrection);
        assert_eq!(result.corrected_text, "我们明天再讨论一下这个方案吧");
        assert_eq!(result.errors[0].error_type, API_ERROR);
        assert_eq!(service.prompts.lock().unwrap()[0].1, SINGLE_MAX_TOKENS);

        // failure
        let service = Arc::new(ScriptedService::new(vec![
            Err(ServiceError::Timeout),
            Err(ServiceError::Timeout),
        ]));
        let corrector = BatchCorrector::new(service, test_config(25));
        let result = corrector
            .correct_single("我们明天在讨论一下这个方案吧", &heuristics)
            .await;
        assert_eq!(result.method, CorrectionMethod::NoChange);
        assert!(!result.has_errors);
    }
}
