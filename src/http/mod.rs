// Blocking HTTP plumbing shared by the collaborator clients


use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

pub const USER_AGENT: &str = concat!("docs-rag/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 1000;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// How many times a request is attempted, and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Delay before the second attempt; doubled for each one after
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries
    #[inline]
    pub const fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    #[inline]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt.saturating_sub(2)))
    }
}

#[inline]
pub fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .user_agent(USER_AGENT)
        .build()
        .into()
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("HTTP {status} from {target}")]
    Status { status: u16, target: String },
    #[error("Request to {target} failed: {message}")]
    Transport { target: String, message: String },
    #[error("Request to {target} failed after {attempts} attempts: {message}")]
    Exhausted {
        target: String,
        attempts: u32,
        message: String,
        last_status: Option<u16>,
    },
}

impl RequestError {
    /// HTTP status of the final response, if the server answered at all
    #[inline]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Exhausted { last_status, .. } => *last_status,
            Self::Transport { .. } => None,
        }
    }
}

/// Server errors and transport failures are worth retrying; client errors are not
#[inline]
pub fn is_retryable(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status >= 500 || *status == 429,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    }
}

/// Run `request_fn` until it succeeds, a non-retryable error occurs, or the
/// policy's attempts are used up
#[inline]
pub fn request_with_retry<F>(
    policy: &RetryPolicy,
    target: &str,
    mut request_fn: F,
) -> Result<String, RequestError>
where
    F: FnMut() -> Result<String, ureq::Error>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            let delay = policy.delay_before(attempt);
            debug!("Waiting {:?} before retry", delay);
            std::thread::sleep(delay);
        }
        debug!("HTTP request attempt {}/{} to {}", attempt, attempts, target);

        match request_fn() {
            Ok(response_text) => {
                debug!("Request succeeded on attempt {}", attempt);
                return Ok(response_text);
            }
            Err(error) if is_retryable(&error) => {
                warn!(
                    "Retryable error from {}: {}, attempt {}/{}",
                    target, error, attempt, attempts
                );
                last_error = Some(error);
            }
            Err(ureq::Error::StatusCode(status)) => {
                warn!("Client error (status {}) from {}, not retrying", status, target);
                return Err(RequestError::Status {
                    status,
                    target: target.to_string(),
                });
            }
            Err(error) => {
                warn!("Non-retryable error from {}: {}", target, error);
                return Err(RequestError::Transport {
                    target: target.to_string(),
                    message: error.to_string(),
                });
            }
        }
    }

    error!("All {} attempts failed for request to {}", attempts, target);
    let last_status = match &last_error {
        Some(ureq::Error::StatusCode(status)) => Some(*status),
        _ => None,
    };
    Err(RequestError::Exhausted {
        target: target.to_string(),
        attempts,
        message: last_error.map_or_else(|| "no response".to_string(), |e| e.to_string()),
        last_status,
    })
}
