//! Retryable iteration over multi-page extraction routines.
//!
//! An extraction routine traverses several pages and yields records as it
//! goes. When a transient failure interrupts it mid-traversal, the only
//! safe way to resynchronize with a stateful site is to replay the whole
//! routine from scratch. [`ResumableStream`] makes that replay invisible
//! to the consumer: it re-derives the records already emitted, verifies
//! each against what was previously delivered, and resumes emission from
//! the cut point. A replay that disagrees with history fails loudly —
//! serving possibly-wrong merged data is worse than failing.
//!
//! The consumer-facing invariant: every record is seen exactly once, in
//! the order the site originally produced it, across any number of
//! retries.

use async_trait::async_trait;
use std::fmt::Debug;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::retry::RetryPolicy;

// ============================================================================
// Producer
// ============================================================================

/// A lazy sequence of records built by one pass of a navigation routine.
///
/// Producers are recreated from scratch by the factory on each retry;
/// they need no resumption support of their own, only a deterministic
/// order: the same session and site state must yield the same records in
/// the same order on every pass.
#[async_trait]
pub trait Producer<T>: Send {
    /// Pulls the next record; `Ok(None)` signals end-of-data.
    async fn next(&mut self) -> Result<Option<T>, SessionError>;
}

/// Rebuilds the underlying traversal from scratch.
pub type ProducerFactory<T> = Box<dyn FnMut() -> Box<dyn Producer<T> + Send> + Send>;

// ============================================================================
// Resumable Stream
// ============================================================================

/// A lazy record sequence with transparent retry-and-resume.
///
/// Wraps a producer factory; on transient failure the current producer is
/// discarded (one unit of retry budget burnt) and a fresh one is created
/// on the next pull, fast-forwarded through the already-emitted prefix
/// with structural-equality checking.
pub struct ResumableStream<T> {
    factory: ProducerFactory<T>,
    current: Option<Box<dyn Producer<T> + Send>>,
    emitted: Vec<T>,
    remaining: u32,
    policy: RetryPolicy,
}

impl<T> ResumableStream<T>
where
    T: Clone + PartialEq + Debug + Send,
{
    /// Creates a stream over `factory` with the given policy.
    ///
    /// The budget counts producer creations, the first pass included: a
    /// policy of 4 attempts allows at most 3 mid-traversal recreations.
    pub fn new(
        policy: RetryPolicy,
        factory: impl FnMut() -> Box<dyn Producer<T> + Send> + Send + 'static,
    ) -> Self {
        let remaining = policy.max_attempts;
        Self {
            factory: Box::new(factory),
            current: None,
            emitted: Vec::new(),
            remaining,
            policy,
        }
    }

    /// Pulls the next record, retrying and replaying as needed.
    ///
    /// # Errors
    ///
    /// - [`SessionError::ExhaustedRetries`] once the budget is spent;
    /// - [`SessionError::InconsistentRetry`] when a replay disagrees with
    ///   an already-emitted record;
    /// - [`SessionError::ShortReplay`] when a replay ends before covering
    ///   the emitted prefix;
    /// - any non-transient error from the underlying routine, unchanged.
    pub async fn next(&mut self) -> Result<Option<T>, SessionError> {
        loop {
            if self.current.is_none() {
                if self.remaining == 0 {
                    return Err(SessionError::ExhaustedRetries {
                        attempts: self.policy.max_attempts,
                    });
                }
                self.remaining -= 1;
                let mut producer = (self.factory)();

                match self.replay(producer.as_mut()).await {
                    Ok(()) => self.current = Some(producer),
                    Err(error) if self.policy.is_transient(&error) => {
                        debug!(error = %error, "Transient failure during replay, retrying");
                        continue;
                    }
                    Err(error) => return Err(error),
                }
            }

            let producer = self.current.as_mut().expect("producer installed above");
            match producer.next().await {
                Ok(Some(record)) => {
                    self.emitted.push(record.clone());
                    return Ok(Some(record));
                }
                Ok(None) => return Ok(None),
                Err(error) if self.policy.is_transient(&error) => {
                    debug!(error = %error, "Transient failure, recreating producer");
                    self.current = None;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Fast-forwards a fresh producer through the emitted prefix.
    ///
    /// Replayed records are compared by structural equality against what
    /// the consumer already holds; they are consumed, never re-emitted.
    async fn replay(&mut self, producer: &mut (dyn Producer<T> + Send)) -> Result<(), SessionError> {
        for (position, sent) in self.emitted.iter().enumerate() {
            match producer.next().await? {
                Some(ref new) if new == sent => {}
                Some(new) => {
                    warn!(position, "Replay mismatch, refusing to resume");
                    return Err(SessionError::InconsistentRetry {
                        position,
                        expected: format!("{sent:?}"),
                        found: format!("{new:?}"),
                    });
                }
                None => {
                    warn!(
                        replayed = position,
                        expected = self.emitted.len(),
                        "Replay ended early, refusing to resume"
                    );
                    return Err(SessionError::ShortReplay {
                        replayed: position,
                        expected: self.emitted.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Drains the stream into a vector.
    pub async fn try_collect(mut self) -> Result<Vec<T>, SessionError> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        Ok(records)
    }
}

impl<T> ResumableStream<T>
where
    T: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    /// Adapts the pull interface to a [`futures::Stream`].
    ///
    /// The stream ends after the first error; a permanent failure is the
    /// final item.
    pub fn into_stream(self) -> impl futures::Stream<Item = Result<T, SessionError>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut stream = state?;
            match stream.next().await {
                Ok(Some(record)) => Some((Ok(record), Some(stream))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedRuns, Step};
    use futures::StreamExt;

    fn rec(s: &str) -> String {
        s.to_string()
    }

    #[tokio::test]
    async fn test_plain_iteration_no_failures() {
        let runs = ScriptedRuns::new(vec![vec![
            Step::Yield(rec("A")),
            Step::Yield(rec("B")),
            Step::Yield(rec("C")),
        ]]);
        let stream = ResumableStream::new(RetryPolicy::default(), runs.factory());

        assert_eq!(stream.try_collect().await.unwrap(), vec!["A", "B", "C"]);
        assert_eq!(runs.invocations(), 1);
    }

    #[tokio::test]
    async fn test_resume_after_mid_traversal_failure() {
        // Attempt 1 yields A, B then fails; attempt 2 replays A, B and
        // continues with C, D. The consumer sees A, B, C, D exactly once.
        let runs = ScriptedRuns::new(vec![
            vec![
                Step::Yield(rec("A")),
                Step::Yield(rec("B")),
                Step::fail(|| SessionError::SessionExpired),
            ],
            vec![
                Step::Yield(rec("A")),
                Step::Yield(rec("B")),
                Step::Yield(rec("C")),
                Step::Yield(rec("D")),
            ],
        ]);
        let stream = ResumableStream::new(RetryPolicy::default(), runs.factory());

        assert_eq!(stream.try_collect().await.unwrap(), vec!["A", "B", "C", "D"]);
        assert_eq!(runs.invocations(), 2);
    }

    #[tokio::test]
    async fn test_failures_at_arbitrary_points_no_duplication() {
        // Three transient failures at different cut points within a
        // 4-attempt budget; order and uniqueness must survive all of them.
        let runs = ScriptedRuns::new(vec![
            vec![Step::fail(|| SessionError::SessionExpired)],
            vec![
                Step::Yield(rec("A")),
                Step::fail(|| SessionError::BrokenPage("popup".into())),
            ],
            vec![
                Step::Yield(rec("A")),
                Step::Yield(rec("B")),
                Step::Yield(rec("C")),
                Step::fail(|| SessionError::SessionExpired),
            ],
            vec![
                Step::Yield(rec("A")),
                Step::Yield(rec("B")),
                Step::Yield(rec("C")),
            ],
        ]);
        let stream = ResumableStream::new(RetryPolicy::default(), runs.factory());

        assert_eq!(stream.try_collect().await.unwrap(), vec!["A", "B", "C"]);
        assert_eq!(runs.invocations(), 4);
    }

    #[tokio::test]
    async fn test_inconsistent_replay_fails_permanently() {
        // Consumer already holds A, B; the replay answers X at position 0.
        let runs = ScriptedRuns::new(vec![
            vec![
                Step::Yield(rec("A")),
                Step::Yield(rec("B")),
                Step::fail(|| SessionError::SessionExpired),
            ],
            vec![Step::Yield(rec("X")), Step::Yield(rec("B"))],
        ]);
        let mut stream = ResumableStream::new(RetryPolicy::default(), runs.factory());

        assert_eq!(stream.next().await.unwrap(), Some(rec("A")));
        assert_eq!(stream.next().await.unwrap(), Some(rec("B")));
        let err = stream.next().await.unwrap_err();
        match err {
            SessionError::InconsistentRetry { position, .. } => assert_eq!(position, 0),
            other => panic!("expected InconsistentRetry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_short_replay_fails_permanently() {
        let runs = ScriptedRuns::new(vec![
            vec![
                Step::Yield(rec("A")),
                Step::Yield(rec("B")),
                Step::Yield(rec("C")),
                Step::fail(|| SessionError::SessionExpired),
            ],
            vec![Step::Yield(rec("A"))],
        ]);
        let mut stream = ResumableStream::new(RetryPolicy::default(), runs.factory());

        for _ in 0..3 {
            stream.next().await.unwrap();
        }
        let err = stream.next().await.unwrap_err();
        match err {
            SessionError::ShortReplay { replayed, expected } => {
                assert_eq!(replayed, 1);
                assert_eq!(expected, 3);
            }
            other => panic!("expected ShortReplay, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        // Every attempt fails immediately; after 4 producer creations the
        // stream reports exhaustion and the consumer holds nothing beyond
        // the true prefix (here, nothing).
        let runs: ScriptedRuns<String> = ScriptedRuns::new(vec![
            vec![Step::fail(|| SessionError::SessionExpired)],
            vec![Step::fail(|| SessionError::SessionExpired)],
            vec![Step::fail(|| SessionError::SessionExpired)],
            vec![Step::fail(|| SessionError::SessionExpired)],
        ]);
        let mut stream = ResumableStream::new(RetryPolicy::default(), runs.factory());

        let err = stream.next().await.unwrap_err();
        assert!(matches!(err, SessionError::ExhaustedRetries { attempts: 4 }));
        assert_eq!(runs.invocations(), 4);
    }

    #[tokio::test]
    async fn test_failure_during_replay_burns_budget_and_retries() {
        // Attempt 2 fails while re-deriving the prefix; attempt 3
        // completes the replay and the traversal.
        let runs = ScriptedRuns::new(vec![
            vec![
                Step::Yield(rec("A")),
                Step::fail(|| SessionError::SessionExpired),
            ],
            vec![Step::fail(|| SessionError::SessionExpired)],
            vec![Step::Yield(rec("A")), Step::Yield(rec("B"))],
        ]);
        let stream = ResumableStream::new(RetryPolicy::default(), runs.factory());

        assert_eq!(stream.try_collect().await.unwrap(), vec!["A", "B"]);
        assert_eq!(runs.invocations(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_propagates_unchanged() {
        let runs = ScriptedRuns::new(vec![vec![
            Step::Yield(rec("A")),
            Step::fail(|| SessionError::Parse("bad payload".into())),
        ]]);
        let mut stream = ResumableStream::new(RetryPolicy::default(), runs.factory());

        assert_eq!(stream.next().await.unwrap(), Some(rec("A")));
        let err = stream.next().await.unwrap_err();
        assert!(matches!(err, SessionError::Parse(_)));
        assert_eq!(runs.invocations(), 1);
    }

    #[tokio::test]
    async fn test_into_stream_adapter() {
        let runs = ScriptedRuns::new(vec![
            vec![
                Step::Yield(rec("A")),
                Step::fail(|| SessionError::SessionExpired),
            ],
            vec![Step::Yield(rec("A")), Step::Yield(rec("B"))],
        ]);
        let stream = ResumableStream::new(RetryPolicy::default(), runs.factory());

        let items: Vec<_> = stream.into_stream().collect().await;
        let values: Vec<_> = items.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let runs = ScriptedRuns::new(vec![
            vec![
                Step::Yield(rec("A")),
                Step::fail(|| SessionError::SessionExpired),
            ],
            vec![Step::Yield(rec("A")), Step::Yield(rec("B"))],
        ]);
        let mut stream = ResumableStream::new(RetryPolicy::no_retry(), runs.factory());

        assert_eq!(stream.next().await.unwrap(), Some(rec("A")));
        let err = stream.next().await.unwrap_err();
        assert!(matches!(err, SessionError::ExhaustedRetries { attempts: 1 }));
        assert_eq!(runs.invocations(), 1);
    }
}
