//! Polling behaviour against a scripted backend, on a paused clock.

mod common;

use common::*;
use dua_overlay::{
    analyze_bytes, await_completion, submit, AnalysisError, AnalyzerConfig, PollPolicy,
    ProgressCallback,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

fn policy(interval_ms: u64) -> PollPolicy {
    PollPolicy::with_interval(Duration::from_millis(interval_ms))
}

#[tokio::test(start_paused = true)]
async fn two_running_then_succeeded_takes_three_intervals() {
    let backend = ScriptedBackend::new(vec![Ok(running()), Ok(running()), Ok(succeeded(dua_result()))]);
    let job = assert_ok!(submit(&backend, PDF).await);

    let start = Instant::now();
    let result = assert_ok!(await_completion(&backend, &job, &policy(2000), None).await);

    assert!(start.elapsed() >= Duration::from_millis(6000));
    assert_eq!(backend.polls(), 3);
    assert_eq!(result, dua_result());
}

#[tokio::test(start_paused = true)]
async fn first_poll_waits_one_interval() {
    let backend = ScriptedBackend::new(vec![Ok(succeeded(dua_result()))]);
    let job = assert_ok!(submit(&backend, PDF).await);

    let start = Instant::now();
    assert_ok!(await_completion(&backend, &job, &policy(2000), None).await);

    let times = backend.poll_times();
    assert_eq!(times.len(), 1);
    assert!(times[0] - start >= Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn polls_are_spaced_by_the_interval() {
    let backend = ScriptedBackend::new(vec![
        Ok(running()),
        Ok(running()),
        Ok(running()),
        Ok(succeeded(dua_result())),
    ]);
    let job = assert_ok!(submit(&backend, PDF).await);
    assert_ok!(await_completion(&backend, &job, &policy(500), None).await);

    let times = backend.poll_times();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(500));
    }
}

#[tokio::test(start_paused = true)]
async fn failed_status_stops_polling() {
    let backend = ScriptedBackend::new(vec![
        Ok(running()),
        Ok(failed("InvalidContent", "The file is corrupted")),
        Ok(succeeded(dua_result())),
    ]);
    let job = assert_ok!(submit(&backend, PDF).await);

    let err = assert_err!(await_completion(&backend, &job, &policy(2000), None).await);
    match err {
        AnalysisError::AnalysisFailed { code, message } => {
            assert_eq!(code.as_deref(), Some("InvalidContent"));
            assert_eq!(message, "The file is corrupted");
        }
        other => panic!("expected AnalysisFailed, got {other:?}"),
    }
    assert_eq!(backend.polls(), 2);

    // Nothing else is polled after the terminal status.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn attempt_ceiling_yields_timeout() {
    let backend = ScriptedBackend::new(Vec::new());
    let job = assert_ok!(submit(&backend, PDF).await);
    let policy = PollPolicy {
        max_attempts: Some(5),
        max_duration: None,
        ..policy(1000)
    };

    let err = assert_err!(await_completion(&backend, &job, &policy, None).await);
    assert!(matches!(err, AnalysisError::Timeout { attempts: 5, .. }), "got {err:?}");
    assert_eq!(err.kind(), "TIMEOUT");
    assert_eq!(backend.polls(), 5);
}

#[tokio::test(start_paused = true)]
async fn duration_ceiling_yields_timeout_without_overshooting() {
    let backend = ScriptedBackend::new(Vec::new());
    let job = assert_ok!(submit(&backend, PDF).await);
    let policy = PollPolicy {
        max_attempts: None,
        max_duration: Some(Duration::from_secs(10)),
        ..policy(2000)
    };

    let start = Instant::now();
    let err = assert_err!(await_completion(&backend, &job, &policy, None).await);
    assert!(matches!(err, AnalysisError::Timeout { .. }), "got {err:?}");
    assert!(start.elapsed() <= Duration::from_secs(10));
    assert_eq!(backend.polls(), 5);
}

#[tokio::test(start_paused = true)]
async fn hanging_status_call_is_cut_off_at_the_duration_ceiling() {
    let backend = ScriptedBackend::new(vec![Ok(succeeded(dua_result()))])
        .with_status_delay(Duration::from_secs(120));
    let job = assert_ok!(submit(&backend, PDF).await);
    let policy = PollPolicy {
        max_attempts: None,
        max_duration: Some(Duration::from_secs(10)),
        ..policy(2000)
    };

    let start = Instant::now();
    let err = assert_err!(await_completion(&backend, &job, &policy, None).await);
    assert!(
        matches!(err, AnalysisError::Timeout { attempts: 1, .. }),
        "got {err:?}"
    );
    assert_eq!(start.elapsed(), Duration::from_secs(10));
    assert_eq!(backend.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_backoff_does_not_outlive_the_duration_ceiling() {
    let backend = ScriptedBackend::new(vec![Err(transient()), Ok(succeeded(dua_result()))]);
    let job = assert_ok!(submit(&backend, PDF).await);
    let policy = PollPolicy {
        max_attempts: None,
        max_duration: Some(Duration::from_secs(10)),
        retry_backoff: Duration::from_secs(60),
        ..policy(2000)
    };

    let start = Instant::now();
    let err = assert_err!(await_completion(&backend, &job, &policy, None).await);
    assert!(matches!(err, AnalysisError::Timeout { .. }), "got {err:?}");
    assert!(start.elapsed() <= Duration::from_secs(10));
    assert_eq!(backend.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_transport_error_is_retried_without_consuming_an_attempt() {
    let backend = ScriptedBackend::new(vec![Err(transient()), Ok(succeeded(dua_result()))]);
    let job = assert_ok!(submit(&backend, PDF).await);
    let policy = PollPolicy {
        max_attempts: Some(1),
        ..policy(2000)
    };

    let start = Instant::now();
    assert_ok!(await_completion(&backend, &job, &policy, None).await);
    assert_eq!(backend.polls(), 2);
    // interval + first backoff
    assert!(start.elapsed() >= Duration::from_millis(2500));
}

#[tokio::test(start_paused = true)]
async fn transport_retries_are_bounded() {
    let backend = ScriptedBackend::new(vec![
        Err(transient()),
        Err(transient()),
        Err(transient()),
        Ok(succeeded(dua_result())),
    ]);
    let job = assert_ok!(submit(&backend, PDF).await);
    let policy = PollPolicy {
        max_transport_retries: 2,
        ..policy(100)
    };

    let err = assert_err!(await_completion(&backend, &job, &policy, None).await);
    assert!(matches!(err, AnalysisError::Transport { transient: true, .. }), "got {err:?}");
    assert_eq!(backend.polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn permanent_transport_error_is_not_retried() {
    let backend = ScriptedBackend::new(vec![
        Err(AnalysisError::Transport {
            reason: "HTTP 401 Unauthorized".into(),
            transient: false,
        }),
        Ok(succeeded(dua_result())),
    ]);
    let job = assert_ok!(submit(&backend, PDF).await);

    let err = assert_err!(await_completion(&backend, &job, &policy(100), None).await);
    assert!(!err.is_retryable());
    assert_eq!(backend.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn succeeded_without_result_is_malformed() {
    let mut empty = succeeded(dua_result());
    empty.analyze_result = None;
    let backend = ScriptedBackend::new(vec![Ok(empty)]);
    let job = assert_ok!(submit(&backend, PDF).await);

    let err = assert_err!(await_completion(&backend, &job, &policy(100), None).await);
    assert_eq!(err.kind(), "MALFORMED_RESULT");
}

#[tokio::test(start_paused = true)]
async fn missing_handle_fails_before_any_poll() {
    let backend = ScriptedBackend::without_handle();
    let config = AnalyzerConfig::builder().poll_interval_ms(100).build().unwrap();

    let err = assert_err!(analyze_bytes(&backend, PDF, &config).await);
    assert_eq!(err.kind(), "SUBMISSION_ERROR");
    assert_eq!(backend.submits(), 1);
    assert_eq!(backend.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn non_pdf_is_rejected_before_upload() {
    let backend = ScriptedBackend::new(Vec::new());
    let err = assert_err!(submit(&backend, b"\x89PNG\r\n").await);
    assert_eq!(err.kind(), "SUBMISSION_ERROR");
    assert_eq!(backend.submits(), 0);
}

#[tokio::test(start_paused = true)]
async fn progress_callback_sees_every_event() {
    let counter = Arc::new(CountingCallback::default());
    let config = AnalyzerConfig::builder()
        .poll_interval_ms(1000)
        .progress_callback(counter.clone() as ProgressCallback)
        .build()
        .unwrap();
    let backend = ScriptedBackend::new(vec![
        Ok(running()),
        Err(transient()),
        Ok(succeeded(dua_result())),
    ]);

    let (job, result) = assert_ok!(analyze_bytes(&backend, PDF, &config).await);
    assert_eq!(job.operation_handle, HANDLE);
    assert_eq!(result.pages.len(), 1);

    assert_eq!(counter.submitted.load(Ordering::SeqCst), 1);
    assert_eq!(counter.polls.load(Ordering::SeqCst), 2);
    assert_eq!(counter.retries.load(Ordering::SeqCst), 1);
    assert_eq!(*counter.completed.lock().unwrap(), Some((2, true)));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_future_stops_polling() {
    let backend = ScriptedBackend::new(Vec::new());
    let job = assert_ok!(submit(&backend, PDF).await);
    let unbounded = PollPolicy {
        max_attempts: None,
        max_duration: None,
        ..policy(2000)
    };

    let cancelled = tokio::time::timeout(
        Duration::from_millis(4500),
        await_completion(&backend, &job, &unbounded, None),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(backend.polls(), 2);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.polls(), 2);
}
