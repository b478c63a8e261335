//! Unread-count poller.
//!
//! Pulls the conversation list on a fixed interval, folds the per-conversation
//! unread counters into one total, and publishes each outcome over a watch
//! channel. There is no push channel and no persistence: the badge host owns
//! the displayed value, this task is its only writer.
//!
//! Each request carries a sequence number. A tick that fires while a request
//! is still outstanding is skipped, and a result whose sequence is not newer
//! than the last applied one is dropped, so a stale response can never
//! overwrite a fresher total.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::feed::{unread_total, ConversationFeed, FeedError};
use crate::session::SessionContext;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of one aggregation request.
/// Failures are published rather than swallowed so hosts and tests can observe
/// them; the badge keeps its previous total when it sees one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Updated(u64),
    Failed(String),
}

struct PollResult {
    seq: u64,
    outcome: Result<u64, FeedError>,
}

/// Handle to a running poller. Dropping the handle does not stop the task;
/// call [`PollerHandle::shutdown`].
pub struct PollerHandle {
    updates: watch::Receiver<Option<PollOutcome>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Subscribes to poll outcomes. The value is `None` until the first poll
    /// resolves.
    pub fn updates(&self) -> watch::Receiver<Option<PollOutcome>> {
        self.updates.clone()
    }

    /// Stops the timer. An in-flight request is not aborted; its result is
    /// discarded when it resolves.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Waits for the polling task to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawns the polling task. With an `Absent` session the task exits at once
/// without touching the network, and the watch value stays `None`.
pub fn spawn(
    feed: Arc<dyn ConversationFeed>,
    session: SessionContext,
    interval: Duration,
) -> PollerHandle {
    let (updates_tx, updates_rx) = watch::channel(None);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run(feed, session, interval, updates_tx, shutdown_rx));
    PollerHandle {
        updates: updates_rx,
        shutdown: shutdown_tx,
        task,
    }
}

async fn run(
    feed: Arc<dyn ConversationFeed>,
    session: SessionContext,
    interval: Duration,
    updates: watch::Sender<Option<PollOutcome>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let SessionContext::Active(credentials) = session else {
        info!("No active session; notification polling disabled");
        return;
    };

    // First tick fires immediately, then every `interval`.
    let mut ticker = tokio::time::interval(interval);
    let (results_tx, mut results_rx) = mpsc::channel::<PollResult>(8);

    let mut next_seq: u64 = 0;
    let mut in_flight: Option<u64> = None;
    let mut last_applied: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if in_flight.is_some() {
                    debug!("Previous poll still in flight; skipping tick");
                    continue;
                }
                next_seq += 1;
                in_flight = Some(next_seq);

                let feed = Arc::clone(&feed);
                let token = credentials.token.clone();
                let results = results_tx.clone();
                let seq = next_seq;
                tokio::spawn(async move {
                    let outcome = feed
                        .conversations(&token)
                        .await
                        .map(|list| unread_total(&list));
                    // A closed receiver means the poller shut down while this
                    // request was in flight; the result goes nowhere.
                    let _ = results.send(PollResult { seq, outcome }).await;
                });
            }
            Some(result) = results_rx.recv() => {
                if in_flight == Some(result.seq) {
                    in_flight = None;
                }
                if result.seq <= last_applied {
                    debug!("Discarding stale poll result (seq {})", result.seq);
                    continue;
                }
                match result.outcome {
                    Ok(total) => {
                        last_applied = result.seq;
                        let _ = updates.send(Some(PollOutcome::Updated(total)));
                    }
                    Err(e) => {
                        // No backoff and no faster retry; the next tick fires
                        // on schedule and the previous total stays on display.
                        warn!("Unread poll failed: {e}");
                        let _ = updates.send(Some(PollOutcome::Failed(e.to_string())));
                    }
                }
            }
        }
    }

    debug!("Notification poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ConversationSummary;
    use crate::session::{SessionCredentials, SessionUser};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    enum Script {
        Counts(Vec<u32>),
        Error(u16),
        /// Sleep for the given seconds before responding with the counts.
        Delayed(u64, Vec<u32>),
    }

    struct ScriptedFeed {
        script: Mutex<VecDeque<Script>>,
        calls: AtomicUsize,
    }

    impl ScriptedFeed {
        fn new(script: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConversationFeed for ScriptedFeed {
        async fn conversations(
            &self,
            _token: &str,
        ) -> Result<Vec<ConversationSummary>, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Script::Counts(Vec::new()));
            match next {
                Script::Counts(counts) => Ok(summaries(&counts)),
                Script::Error(status) => Err(FeedError::Status(status)),
                Script::Delayed(secs, counts) => {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    Ok(summaries(&counts))
                }
            }
        }
    }

    fn summaries(counts: &[u32]) -> Vec<ConversationSummary> {
        counts
            .iter()
            .map(|&unread_count| ConversationSummary {
                id: Uuid::new_v4(),
                unread_count,
            })
            .collect()
    }

    fn active_session() -> SessionContext {
        SessionContext::Active(SessionCredentials {
            token: "test-token".to_string(),
            user: SessionUser {
                id: Uuid::new_v4(),
                email: "ada@example.com".to_string(),
                username: "ada".to_string(),
            },
        })
    }

    async fn next_outcome(rx: &mut watch::Receiver<Option<PollOutcome>>) -> PollOutcome {
        rx.changed().await.expect("poller dropped the channel");
        rx.borrow_and_update().clone().expect("outcome missing")
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_session_never_polls() {
        let feed = ScriptedFeed::new(vec![]);
        let handle = spawn(feed.clone(), SessionContext::Absent, DEFAULT_POLL_INTERVAL);

        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(feed.calls(), 0);
        assert!(handle.updates().borrow().is_none());
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_is_immediate_then_interval() {
        let feed = ScriptedFeed::new(vec![Script::Counts(vec![3]), Script::Counts(vec![5])]);
        let handle = spawn(feed.clone(), active_session(), Duration::from_secs(30));
        let mut rx = handle.updates();

        assert_eq!(next_outcome(&mut rx).await, PollOutcome::Updated(3));
        assert_eq!(feed.calls(), 1);

        assert_eq!(next_outcome(&mut rx).await, PollOutcome::Updated(5));
        assert_eq!(feed.calls(), 2);

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_is_sum_over_conversations() {
        let feed = ScriptedFeed::new(vec![Script::Counts(vec![3, 0, 97])]);
        let handle = spawn(feed.clone(), active_session(), DEFAULT_POLL_INTERVAL);
        let mut rx = handle.updates();

        assert_eq!(next_outcome(&mut rx).await, PollOutcome::Updated(100));

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_list_totals_zero() {
        let feed = ScriptedFeed::new(vec![Script::Counts(vec![])]);
        let handle = spawn(feed.clone(), active_session(), DEFAULT_POLL_INTERVAL);
        let mut rx = handle.updates();

        assert_eq!(next_outcome(&mut rx).await, PollOutcome::Updated(0));

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_published_and_loop_survives() {
        let feed = ScriptedFeed::new(vec![
            Script::Counts(vec![2]),
            Script::Error(500),
            Script::Counts(vec![4]),
        ]);
        let handle = spawn(feed.clone(), active_session(), Duration::from_secs(30));
        let mut rx = handle.updates();

        assert_eq!(next_outcome(&mut rx).await, PollOutcome::Updated(2));
        assert!(matches!(next_outcome(&mut rx).await, PollOutcome::Failed(_)));

        // The failed poll does not change the cadence: the next one still
        // fires and succeeds.
        assert_eq!(next_outcome(&mut rx).await, PollOutcome::Updated(4));
        assert_eq!(feed.calls(), 3);

        handle.shutdown();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_timer() {
        let feed = ScriptedFeed::new(vec![Script::Counts(vec![1])]);
        let handle = spawn(feed.clone(), active_session(), Duration::from_secs(30));
        let mut rx = handle.updates();

        assert_eq!(next_outcome(&mut rx).await, PollOutcome::Updated(1));
        assert_eq!(feed.calls(), 1);

        handle.shutdown();
        handle.join().await;

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_after_shutdown_updates_nothing() {
        let feed = ScriptedFeed::new(vec![Script::Delayed(60, vec![9])]);
        let handle = spawn(feed.clone(), active_session(), Duration::from_secs(30));
        let rx = handle.updates();

        // Let the first request start, then tear down while it is in flight.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(feed.calls(), 1);
        handle.shutdown();
        handle.join().await;

        // The request resolves at t=60 into a closed channel.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.borrow().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_with_outstanding_request_is_skipped() {
        // First response hangs for 70 s, past two scheduled ticks.
        let feed = ScriptedFeed::new(vec![
            Script::Delayed(70, vec![1]),
            Script::Counts(vec![2]),
        ]);
        let handle = spawn(feed.clone(), active_session(), Duration::from_secs(30));
        let mut rx = handle.updates();

        assert_eq!(next_outcome(&mut rx).await, PollOutcome::Updated(1));
        // Ticks at t=30 and t=60 were skipped while the request was out.
        assert_eq!(feed.calls(), 1);

        assert_eq!(next_outcome(&mut rx).await, PollOutcome::Updated(2));
        assert_eq!(feed.calls(), 2);

        handle.shutdown();
        handle.join().await;
    }
}
