use std::time::Duration;

use tracing::{debug, warn};

use super::{CorrectionService, ServiceError};

/// Bounded retry around a single remote call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed pause after a 429
    pub rate_limit_delay: Duration,
    /// Pause after a transport failure
    pub error_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            rate_limit_delay: Duration::from_secs(2),
            error_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Same attempt count, no sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            rate_limit_delay: Duration::ZERO,
            error_delay: Duration::ZERO,
        }
    }
}

/// Call the service until it returns non-empty text or the policy gives up.
///
/// A 429 sleeps the fixed rate-limit delay; transport failures and empty
/// replies are retried; any other status stops immediately. The last error
/// is returned on failure.
pub async fn call_with_retry(
    service: &dyn CorrectionService,
    prompt: &str,
    max_tokens: u32,
    policy: &RetryPolicy,
) -> Result<String, ServiceError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = ServiceError::EmptyResponse;

    for attempt in 0..attempts {
        if attempt > 0 {
            debug!("Retry {} of {}", attempt, attempts - 1);
        }

        match service.call(prompt, max_tokens).await {
            Ok(content) if !content.trim().is_empty() => return Ok(content),
            Ok(_) => last_error = ServiceError::EmptyResponse,
            Err(ServiceError::RateLimited) => {
                warn!("Rate limited, waiting {:?}", policy.rate_limit_delay);
                last_error = ServiceError::RateLimited;
                pause(policy.rate_limit_delay).await;
            }
            Err(e @ ServiceError::Status { .. }) => {
                warn!("{}", e);
                return Err(e);
            }
            Err(e) => {
                warn!("Remote call failed: {}", e);
                last_error = e;
                if attempt + 1 < attempts {
                    pause(policy.error_delay).await;
                }
            }
        }
    }

    Err(last_error)
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Replays scripted replies in order and records every prompt
    pub struct ScriptedService {
        replies: Mutex<VecDeque<Result<String, ServiceError>>>,
        pub prompts: Mutex<Vec<(String, u32)>>,
    }

    impl ScriptedService {
        pub fn new(replies: Vec<Result<String, ServiceError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CorrectionService for ScriptedService {
        async fn call(&self, prompt: &str, max_tokens: u32) -> Result<String, ServiceError> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), max_tokens));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ServiceError::Request("script exhausted".to_string())))
        }
    }
}
