// =============================================================================
// HTTP Fetch Client — bounded-retry JSON GET for every upstream provider
// =============================================================================
//
// All upstream calls go through this client so the retry discipline lives in
// one place:
//   - HTTP 429: honour Retry-After (capped at the policy ceiling), fall back
//     to 1.5 × attempt when the header is missing or unparseable.
//   - HTTP 5xx / other non-success / transport error: linear backoff,
//     backoff_base × attempt.
//   - Every wait gets up to one extra second of jitter so stacked retries
//     from parallel ladders do not synchronise against the same provider.
// The final failure carries the last underlying error so callers can log a
// useful reason before climbing a fallback ladder.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::FetchPolicy;
use crate::error::EngineError;

/// User agent sent with every request.
const USER_AGENT: &str = "BM20/1.0";

/// Header carrying the market-data provider's API key, when one is set.
const API_KEY_HEADER: &str = "x-cg-pro-api-key";

/// A reqwest wrapper that applies one [`FetchPolicy`] to every call.
#[derive(Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    policy: FetchPolicy,
    api_key: Option<String>,
}

impl FetchClient {
    pub fn new(policy: FetchPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(policy.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .expect("reqwest client builder only fails on TLS backend misconfiguration");
        Self {
            client,
            policy,
            api_key: None,
        }
    }

    /// Attach a provider API key; it is sent with every request this
    /// instance makes.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// GET `url` with `params` and parse the body as JSON, retrying per the
    /// policy. Returns the last failure once the attempt budget is spent.
    pub async fn get_json(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, EngineError> {
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=self.policy.max_attempts {
            let mut request = self.client.get(url).query(params);
            if let Some(key) = &self.api_key {
                request = request.header(API_KEY_HEADER, key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<f64>().ok());
                        let delay = retry_after_delay(retry_after, attempt, &self.policy);
                        warn!(
                            url,
                            attempt,
                            delay_secs = delay.as_secs_f64(),
                            "rate limited (429), backing off"
                        );
                        last_error = format!("HTTP 429 on attempt {attempt}");
                        self.sleep_before_retry(attempt, delay).await;
                        continue;
                    }

                    if !status.is_success() {
                        last_error = format!("HTTP {status}");
                        debug!(url, attempt, %status, "non-success status, retrying");
                        self.sleep_before_retry(attempt, backoff_delay(attempt, &self.policy))
                            .await;
                        continue;
                    }

                    match response.json::<serde_json::Value>().await {
                        Ok(body) => {
                            debug!(url, attempt, "fetch ok");
                            return Ok(body);
                        }
                        Err(e) => {
                            last_error = format!("body parse: {e}");
                            debug!(url, attempt, error = %e, "undecodable body, retrying");
                            self.sleep_before_retry(attempt, backoff_delay(attempt, &self.policy))
                                .await;
                        }
                    }
                }
                Err(e) => {
                    last_error = format!("transport: {e}");
                    debug!(url, attempt, error = %e, "request failed, retrying");
                    self.sleep_before_retry(attempt, backoff_delay(attempt, &self.policy))
                        .await;
                }
            }
        }

        warn!(
            url,
            attempts = self.policy.max_attempts,
            last = %last_error,
            "retry budget exhausted"
        );
        Err(EngineError::Fetch {
            url: url.to_string(),
            attempts: self.policy.max_attempts,
            last: last_error,
        })
    }

    /// Sleep `delay` plus jitter, except after the final attempt where the
    /// caller is about to receive the error anyway.
    async fn sleep_before_retry(&self, attempt: u32, delay: Duration) {
        if attempt >= self.policy.max_attempts {
            return;
        }
        tokio::time::sleep(jittered(delay)).await;
    }
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("policy", &self.policy)
            .field("api_key", &self.api_key.as_deref().map(|_| "<set>"))
            .finish()
    }
}

/// Linear backoff for 5xx/transport failures: `backoff_base × attempt`.
fn backoff_delay(attempt: u32, policy: &FetchPolicy) -> Duration {
    Duration::from_secs_f64(policy.backoff_base_secs * attempt as f64)
}

/// Delay after a 429: the Retry-After value when present and positive,
/// otherwise `1.5 × attempt`, capped either way at the policy ceiling.
fn retry_after_delay(retry_after_secs: Option<f64>, attempt: u32, policy: &FetchPolicy) -> Duration {
    let secs = retry_after_secs
        .filter(|s| *s > 0.0)
        .unwrap_or(1.5 * attempt as f64);
    Duration::from_secs_f64(secs.min(policy.retry_after_cap_secs))
}

/// Add up to one second of uniform jitter to a backoff delay.
fn jittered(base: Duration) -> Duration {
    base + Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..1.0))
}
