//! Blocking waits for services that come up asynchronously.
use super::HttpTransport;
use crate::model::Credential;
use std::time::Duration;
use thiserror::Error;

/// How often to probe and when, if ever, to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// `None` retries forever; the supervising container enforces the outer timeout.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Self::DEFAULT_INTERVAL)
    }
}

/// Only produced by bounded policies.
#[derive(Debug, Error)]
#[error("{url} not ready after {attempts} attempts: {last_failure}")]
pub struct ReadinessError {
    pub url: String,
    pub attempts: u32,
    pub last_failure: String,
}

/// Call `probe` until it succeeds, sleeping a fixed interval between attempts.
///
/// Returns the number of probes made.
pub fn poll_until<P, S>(
    policy: &RetryPolicy,
    url: &str,
    mut probe: P,
    mut sleep: S,
) -> Result<u32, ReadinessError>
where
    P: FnMut() -> Result<(), String>,
    S: FnMut(Duration),
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let reason = match probe() {
            Ok(()) => return Ok(attempt),
            Err(reason) => reason,
        };
        tracing::debug!(url, attempt, reason = %reason, "probe failed");
        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            return Err(ReadinessError {
                url: url.to_string(),
                attempts: attempt,
                last_failure: reason,
            });
        }
        sleep(policy.interval);
    }
}

/// Block until `url` answers with a 2xx status.
pub fn wait_until_ready<S>(
    transport: &dyn HttpTransport,
    url: &str,
    auth: Option<&Credential>,
    policy: &RetryPolicy,
    sleep: S,
) -> Result<u32, ReadinessError>
where
    S: FnMut(Duration),
{
    tracing::info!(url, authenticated = auth.is_some(), "waiting for service");
    let attempts = poll_until(
        policy,
        url,
        || match transport.get(url, auth) {
            Ok(response) if response.is_success() => Ok(()),
            Ok(response) => Err(format!("status {}", response.status)),
            Err(err) => Err(err.to_string()),
        },
        sleep,
    )?;
    tracing::info!(url, attempts, "service ready");
    Ok(attempts)
}

/// Block until a protected endpoint accepts `credential`.
///
/// A just-written password may take a while to be picked up, even after the
/// application has been told to reload.
pub fn wait_until_credentials_recognized<S>(
    transport: &dyn HttpTransport,
    url: &str,
    credential: &Credential,
    policy: &RetryPolicy,
    sleep: S,
) -> Result<u32, ReadinessError>
where
    S: FnMut(Duration),
{
    wait_until_ready(transport, url, Some(credential), policy, sleep)
}
