//! Long-running-operation driver: submit once, then poll until terminal.
//!
//! ## Polling loop
//!
//! ```text
//! submit ──▶ sleep(interval) ──▶ status ──┬─ running   ──▶ sleep(interval) ──▶ …
//!                                         ├─ succeeded ──▶ Ok(analyzeResult)
//!                                         └─ failed    ──▶ Err(AnalysisFailed)
//! ```
//!
//! The first status call also waits one interval: the job has not had time
//! to start right after submission. Only one status request is in flight at
//! a time. Sleeping uses `tokio::time`, so the task yields to the scheduler
//! between polls.
//!
//! ## Ceilings and retries
//!
//! A [`PollPolicy`] bounds the loop by attempt count and wall-clock time;
//! hitting either ends with [`AnalysisError::Timeout`]. A transient transport
//! error on one poll is retried with exponential backoff
//! (`retry_backoff * 2^(n-1)`) without consuming an attempt.
//!
//! ## Cancellation
//!
//! Dropping the future returned by [`await_completion`] cancels it: the
//! pending timer and any in-flight request are dropped with it. The
//! server-side job is unaffected and keeps running.

use crate::backend::AnalysisBackend;
use crate::config::PollPolicy;
use crate::error::AnalysisError;
use crate::model::{AnalysisJob, AnalysisResult, AnalysisStatus, StatusResponse};
use crate::progress::ProgressCallback;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

/// Validate and upload a document, returning the job handle.
///
/// The document must be a non-empty PDF. Exactly one request is sent; no
/// state beyond the returned [`AnalysisJob`] is kept.
pub async fn submit(
    backend: &dyn AnalysisBackend,
    document: &[u8],
) -> Result<AnalysisJob, AnalysisError> {
    if document.is_empty() {
        return Err(AnalysisError::Submission {
            reason: "document is empty".into(),
        });
    }
    if !document.starts_with(b"%PDF") {
        let magic = document.iter().take(4).copied().collect::<Vec<_>>();
        return Err(AnalysisError::Submission {
            reason: format!("document is not a PDF (first bytes: {magic:?})"),
        });
    }

    let handle = backend.submit(document).await?;
    if handle.trim().is_empty() {
        return Err(AnalysisError::Submission {
            reason: "service returned an empty operation handle".into(),
        });
    }
    info!("Submitted {} bytes → {}", document.len(), handle);
    Ok(AnalysisJob::new(handle))
}

/// Poll `job` until it reaches a terminal state or the policy ceiling.
///
/// # Errors
/// * [`AnalysisError::AnalysisFailed`] — the service reported `failed`
/// * [`AnalysisError::Timeout`] — `max_attempts` or `max_duration` reached;
///   `max_duration` is a hard ceiling that also bounds an in-flight poll
/// * [`AnalysisError::Transport`] — a poll kept failing after all retries,
///   or failed with a non-transient error
/// * [`AnalysisError::MalformedResult`] — `succeeded` without a result
pub async fn await_completion(
    backend: &dyn AnalysisBackend,
    job: &AnalysisJob,
    policy: &PollPolicy,
    progress: Option<&ProgressCallback>,
) -> Result<AnalysisResult, AnalysisError> {
    let start = Instant::now();
    let deadline = policy.max_duration.map(|d| start + d);
    let mut attempt: u32 = 0;

    let outcome = loop {
        if policy.max_attempts.is_some_and(|max| attempt >= max)
            || deadline.is_some_and(|d| Instant::now() + policy.poll_interval > d)
        {
            break Err(AnalysisError::Timeout {
                attempts: attempt,
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }

        sleep(policy.poll_interval).await;
        attempt += 1;

        // A status call that hangs (or keeps retrying) past the deadline is
        // cut off there.
        let poll = poll_with_retry(backend, job, attempt, policy, progress);
        let polled = match deadline {
            Some(d) => match timeout_at(d, poll).await {
                Ok(polled) => polled,
                Err(_) => {
                    warn!("Poll {} still in flight at the duration ceiling", attempt);
                    break Err(AnalysisError::Timeout {
                        attempts: attempt,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                }
            },
            None => poll.await,
        };
        let response = match polled {
            Ok(r) => r,
            Err(e) => break Err(e),
        };
        debug!("Poll {}: {:?}", attempt, response.status);
        if let Some(cb) = progress {
            cb.on_poll(attempt, response.status);
        }

        match response.status {
            AnalysisStatus::Running => continue,
            AnalysisStatus::Succeeded => {
                break response.analyze_result.ok_or_else(|| {
                    AnalysisError::MalformedResult(
                        "status is succeeded but analyzeResult is missing".into(),
                    )
                });
            }
            AnalysisStatus::Failed => {
                let (code, message) = match response.error {
                    Some(e) => (e.code, e.message),
                    None => (None, "service reported status failed".to_string()),
                };
                break Err(AnalysisError::AnalysisFailed { code, message });
            }
        }
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;
    match &outcome {
        Ok(result) => info!(
            "Analysis complete after {} polls, {}ms ({} pages, {} documents)",
            attempt,
            elapsed_ms,
            result.pages.len(),
            result.documents.len()
        ),
        Err(e) => warn!("Polling ended after {} polls, {}ms: {}", attempt, elapsed_ms, e),
    }
    if let Some(cb) = progress {
        cb.on_complete(attempt, outcome.is_ok());
    }
    outcome
}

/// One logical poll: a status request retried on transient transport errors.
async fn poll_with_retry(
    backend: &dyn AnalysisBackend,
    job: &AnalysisJob,
    attempt: u32,
    policy: &PollPolicy,
    progress: Option<&ProgressCallback>,
) -> Result<StatusResponse, AnalysisError> {
    let mut retry: u32 = 0;
    loop {
        match backend.status(&job.operation_handle).await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && retry < policy.max_transport_retries => {
                retry += 1;
                let backoff = policy.backoff_for(retry);
                warn!(
                    "Poll {}: retry {}/{} after {}ms — {}",
                    attempt,
                    retry,
                    policy.max_transport_retries,
                    backoff.as_millis(),
                    e
                );
                if let Some(cb) = progress {
                    cb.on_transport_retry(attempt, retry, &e.to_string());
                }
                sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
