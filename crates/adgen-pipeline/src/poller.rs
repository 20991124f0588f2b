//! Polling loop for submitted video jobs.
//!
//! One submitted job is polled at a fixed interval until the service
//! reports a terminal state or the local deadline elapses. A timeout only
//! stops local tracking; the remote job is never cancelled. There is no
//! automatic resubmission at this layer.

use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use adgen_ai::{JobHandle, JobPoll, VideoGenerator};

use crate::error::PipelineResult;

/// Consecutive poll errors tolerated before giving up on a job.
const MAX_POLL_ERRORS: u32 = 3;

/// How a tracked job ended, from the local pipeline's point of view.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Service reported completion
    Succeeded { output_location: String },
    /// Service reported terminal failure
    Failed { reason: String },
    /// Deadline elapsed while the job was still running
    TimedOut,
}

/// Polling cadence and deadline.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

/// Poll `handle` until terminal or the deadline passes.
///
/// Transient poll errors are tolerated up to [`MAX_POLL_ERRORS`] in a row;
/// beyond that the error propagates.
pub async fn await_completion(
    generator: &dyn VideoGenerator,
    handle: &JobHandle,
    policy: &PollPolicy,
) -> PipelineResult<PollOutcome> {
    let deadline = Instant::now() + policy.max_wait;
    let mut consecutive_errors = 0u32;

    loop {
        tokio::time::sleep(policy.interval).await;

        match generator.poll(handle).await {
            Ok(JobPoll::Completed { output_location }) => {
                return Ok(PollOutcome::Succeeded { output_location });
            }
            Ok(JobPoll::Failed { reason }) => {
                return Ok(PollOutcome::Failed { reason });
            }
            Ok(JobPoll::Running) => {
                consecutive_errors = 0;
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_POLL_ERRORS {
                    return Err(e.into());
                }
                warn!(
                    "Poll error for {} ({}/{}): {}",
                    handle, consecutive_errors, MAX_POLL_ERRORS, e
                );
            }
        }

        if Instant::now() >= deadline {
            return Ok(PollOutcome::TimedOut);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adgen_ai::{AiError, AiResult, VideoGenRequest};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Generator that replays a script of poll results.
    struct ScriptedGenerator {
        script: Mutex<Vec<AiResult<JobPoll>>>,
    }

    impl ScriptedGenerator {
        fn new(script: Vec<AiResult<JobPoll>>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl VideoGenerator for ScriptedGenerator {
        async fn submit(&self, _request: &VideoGenRequest) -> AiResult<JobHandle> {
            Ok(JobHandle("scripted".into()))
        }

        async fn poll(&self, _handle: &JobHandle) -> AiResult<JobPoll> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(JobPoll::Running)
            } else {
                script.remove(0)
            }
        }
    }

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_wait: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_completes_after_running() {
        let generator = ScriptedGenerator::new(vec![
            Ok(JobPoll::Running),
            Ok(JobPoll::Running),
            Ok(JobPoll::Completed {
                output_location: "s3://b/out/".into(),
            }),
        ]);

        let outcome = await_completion(&generator, &JobHandle("j".into()), &fast_policy())
            .await
            .unwrap();
        match outcome {
            PollOutcome::Succeeded { output_location } => {
                assert_eq!(output_location, "s3://b/out/");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_is_terminal() {
        let generator = ScriptedGenerator::new(vec![
            Ok(JobPoll::Running),
            Ok(JobPoll::Failed {
                reason: "content policy".into(),
            }),
        ]);

        let outcome = await_completion(&generator, &JobHandle("j".into()), &fast_policy())
            .await
            .unwrap();
        assert!(matches!(outcome, PollOutcome::Failed { reason } if reason == "content policy"));
    }

    #[tokio::test]
    async fn test_deadline_yields_timeout() {
        // Script is empty, so every poll reports Running.
        let generator = ScriptedGenerator::new(vec![]);
        let policy = PollPolicy {
            interval: Duration::from_millis(1),
            max_wait: Duration::from_millis(10),
        };

        let outcome = await_completion(&generator, &JobHandle("j".into()), &policy)
            .await
            .unwrap();
        assert!(matches!(outcome, PollOutcome::TimedOut));
    }

    #[tokio::test]
    async fn test_transient_errors_tolerated() {
        let generator = ScriptedGenerator::new(vec![
            Err(AiError::request_failed("blip")),
            Err(AiError::request_failed("blip")),
            Ok(JobPoll::Completed {
                output_location: "s3://b/out/".into(),
            }),
        ]);

        let outcome = await_completion(&generator, &JobHandle("j".into()), &fast_policy())
            .await
            .unwrap();
        assert!(matches!(outcome, PollOutcome::Succeeded { .. }));
    }

    #[tokio::test]
    async fn test_persistent_errors_propagate() {
        let generator = ScriptedGenerator::new(vec![
            Err(AiError::request_failed("down")),
            Err(AiError::request_failed("down")),
            Err(AiError::request_failed("down")),
        ]);

        let result = await_completion(&generator, &JobHandle("j".into()), &fast_policy()).await;
        assert!(result.is_err());
    }
}
