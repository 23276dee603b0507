//! # Reconnect-Aware Subscription
//!
//! One `Subscription` wraps one logical publish/subscribe stream from a
//! station backend. It owns at most one transport connection at a time,
//! tracks a five-state lifecycle, retries failed connections with capped
//! exponential backoff, and republishes inbound frames on a broadcast
//! stream that any number of listeners can tap.
//!
//! ## Lifecycle:
//!
//! ```text
//!               subscribe_to_url()
//! Unsubscribed ------------------> Subscribing --(opened)--> Subscribed
//!      ^                               ^  |                      |
//!      |  unsubscribe() (any state)    |  +--(closed)--+         | (closed)
//!      +-------------------------------+               v         v
//!                       retry timer fires /     Waiting or Failed
//!                       retry_now() / refresh()
//! ```
//!
//! A closed connection goes to `Failed` when no retry interval was supplied
//! and to `Waiting` when one was; in `Waiting` a timer is scheduled and
//! `retry_time_ms` tells the UI when it will fire.
//!
//! ## Correctness under churn:
//!
//! `subscribe_to_url` and `refresh` can be called while a previous
//! transport's callbacks are still in flight. Every connection attempt is
//! stamped with a generation number, and events carrying a stale generation
//! are dropped on the floor. This is the only guard the machine needs: a
//! superseded transport cannot flip the state or trigger retry logic, no
//! matter how late its callbacks arrive.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::core::transport::{Connector, Frame, TransportEvent, TransportHandle};

/// Frames buffered per listener before the slowest one starts lagging.
const STREAM_CAPACITY: usize = 1000;

const LOCK_POISONED: &str = "Subscription lock poisoned";

/// Lifecycle of one reconnect-aware stream handle. Exactly one value is
/// active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// No transport attempt has been made, or the caller tore one down.
    Unsubscribed,
    /// A connection attempt is in flight, not yet confirmed open.
    Subscribing,
    /// The transport opened; the message stream is active.
    Subscribed,
    /// The last attempt failed and no auto-retry is configured. Terminal
    /// until `refresh()` or `subscribe_to_url()`.
    Failed,
    /// The last attempt failed and a retry is scheduled.
    Waiting,
}

/// Caller-supplied reconnect policy, saved alongside the URL so `refresh()`
/// and the retry timer can reopen identically.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base retry delay. `None` disables auto-retry entirely: a lost
    /// connection parks the subscription in `Failed`.
    pub retry_ms: Option<u64>,
    /// Multiplier applied to the previous delay on each consecutive
    /// failure. Must be >= 1; 1.0 means a fixed interval.
    pub backoff: f64,
    /// Upper bound on the computed delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_ms: None,
            backoff: 1.0,
            max_delay_ms: u64::MAX,
        }
    }
}

impl RetryPolicy {
    /// Fixed-interval retry every `ms` milliseconds.
    pub fn every(ms: u64) -> Self {
        Self {
            retry_ms: Some(ms),
            ..Self::default()
        }
    }

    /// Grows the delay by `factor` on each consecutive failure.
    pub fn with_backoff(mut self, factor: f64) -> Self {
        self.backoff = factor;
        self
    }

    /// Caps the grown delay at `ms` milliseconds.
    pub fn with_max_delay(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }
}

/// Caller lifecycle bugs. These are not recoverable internally; the calling
/// code asked for a transition the machine cannot honor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    /// `refresh()` was called with nothing subscribed.
    #[error("refresh() requires an active subscription")]
    NotSubscribed,
    /// `retry_now()` was called while no retry was scheduled.
    #[error("retry_now() is only valid while a retry is scheduled")]
    NotWaiting,
}

struct SavedParams {
    url: String,
    retry: RetryPolicy,
}

struct Inner {
    state: SubscriptionState,
    /// Monotonic id of the transport currently owned. Events stamped with
    /// any older id belong to a superseded transport and are ignored.
    generation: u64,
    current: Option<Box<dyn TransportHandle>>,
    retry_cancel: Option<CancellationToken>,
    retry_time_ms: Option<i64>,
    /// Backoff accumulator. `None` until the first failure after a
    /// successful open; grown by `backoff` on each consecutive failure.
    current_delay_ms: Option<f64>,
    saved: Option<SavedParams>,
}

struct Shared {
    connector: Arc<dyn Connector>,
    messages: broadcast::Sender<Frame>,
    inner: Mutex<Inner>,
}

/// The reconnect-aware handle around one logical publish/subscribe stream.
///
/// All public operations complete synchronously with respect to the machine
/// state; waiting (for a transport to open, for a retry timer) happens on
/// spawned tasks, so every method must be called from within a tokio
/// runtime. The caller is responsible for `unsubscribe()` before discarding
/// the handle, which cancels any pending retry timer.
pub struct Subscription {
    shared: Arc<Shared>,
}

impl Subscription {
    /// Creates an idle subscription in the `Unsubscribed` state.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let (messages, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                connector,
                messages,
                inner: Mutex::new(Inner {
                    state: SubscriptionState::Unsubscribed,
                    generation: 0,
                    current: None,
                    retry_cancel: None,
                    retry_time_ms: None,
                    current_delay_ms: None,
                    saved: None,
                }),
            }),
        }
    }

    /// Opens (or replaces) the subscription.
    ///
    /// Any transport currently owned is torn down silently, without
    /// tripping the retry logic, before the new attempt starts. The
    /// parameters are saved so `refresh()` and the retry timer can reopen
    /// identically. The broadcast stream is untouched: listeners attached
    /// before this call keep receiving after reconnection.
    pub fn subscribe_to_url(&self, url: &str, retry: RetryPolicy) {
        let mut st = self.shared.lock();
        Shared::teardown(&mut st, true);
        st.saved = Some(SavedParams {
            url: url.to_string(),
            retry,
        });
        self.shared.open_transport(&mut st);
    }

    /// Cancels any pending retry, closes the owned transport, resets the
    /// backoff accumulator and parks the machine in `Unsubscribed`. Saved
    /// parameters are kept. No-op when nothing is owned.
    pub fn unsubscribe(&self) {
        let mut st = self.shared.lock();
        Shared::teardown(&mut st, true);
        st.state = SubscriptionState::Unsubscribed;
    }

    /// Manually reopens the stream using the saved parameters, bypassing
    /// any backoff delay.
    ///
    /// No-op while an attempt is already in flight, so calling this
    /// repeatedly cannot race duplicate connections. Fails with
    /// [`SubscriptionError::NotSubscribed`] when nothing was subscribed.
    pub fn refresh(&self) -> Result<(), SubscriptionError> {
        let mut st = self.shared.lock();
        match st.state {
            SubscriptionState::Unsubscribed => Err(SubscriptionError::NotSubscribed),
            // An attempt is already in flight; opening another would race it.
            SubscriptionState::Subscribing => Ok(()),
            _ => {
                Shared::teardown(&mut st, false);
                self.shared.open_transport(&mut st);
                Ok(())
            }
        }
    }

    /// Fires the scheduled retry immediately instead of waiting for its
    /// timer. The already-computed backoff value is kept for the next
    /// failure. Fails with [`SubscriptionError::NotWaiting`] outside the
    /// `Waiting` state.
    pub fn retry_now(&self) -> Result<(), SubscriptionError> {
        let mut st = self.shared.lock();
        if st.state != SubscriptionState::Waiting {
            return Err(SubscriptionError::NotWaiting);
        }
        Shared::cancel_retry(&mut st);
        self.shared.open_transport(&mut st);
        Ok(())
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        self.shared.lock().state
    }

    /// True while a connection attempt is in flight.
    pub fn is_subscribing(&self) -> bool {
        self.state() == SubscriptionState::Subscribing
    }

    /// True while the last attempt failed, whether or not a retry is
    /// scheduled.
    pub fn has_error(&self) -> bool {
        matches!(
            self.state(),
            SubscriptionState::Failed | SubscriptionState::Waiting
        )
    }

    /// Wall-clock epoch milliseconds at which the pending retry will fire,
    /// or `None` outside the `Waiting` state. UIs derive their countdown
    /// from this.
    pub fn retry_time_ms(&self) -> Option<i64> {
        let st = self.shared.lock();
        if st.state == SubscriptionState::Waiting {
            st.retry_time_ms
        } else {
            None
        }
    }

    /// Attaches a new listener to the broadcast stream. Frames delivered
    /// before the listener attached are not replayed.
    pub fn messages(&self) -> broadcast::Receiver<Frame> {
        self.shared.messages.subscribe()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect(LOCK_POISONED)
    }

    fn cancel_retry(st: &mut Inner) {
        if let Some(token) = st.retry_cancel.take() {
            token.cancel();
        }
        st.retry_time_ms = None;
    }

    /// Silent teardown: pending timer cancelled, owned transport closed,
    /// in-flight callbacks orphaned via the generation bump. Does not
    /// touch `state` or the saved parameters.
    fn teardown(st: &mut Inner, reset_backoff: bool) {
        Self::cancel_retry(st);
        if let Some(mut handle) = st.current.take() {
            handle.close();
        }
        st.generation += 1;
        if reset_backoff {
            st.current_delay_ms = None;
        }
    }

    /// Starts a connection attempt for the saved parameters and takes
    /// ownership of the resulting transport.
    fn open_transport(self: &Arc<Self>, st: &mut Inner) {
        let Some(saved) = st.saved.as_ref() else {
            return;
        };
        let url = saved.url.clone();
        st.generation += 1;
        let generation = st.generation;
        let (tx, mut rx) = mpsc::unbounded_channel();
        log::debug!("opening transport #{} to {}", generation, url);
        st.current = Some(self.connector.connect(&url, tx));
        st.state = SubscriptionState::Subscribing;

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                shared.handle_event(generation, event);
            }
        });
    }

    fn handle_event(self: &Arc<Self>, generation: u64, event: TransportEvent) {
        let mut st = self.lock();
        if generation != st.generation {
            // Stale transport; it was superseded while this event was in flight.
            log::trace!("dropping event from superseded transport #{}", generation);
            return;
        }
        match event {
            TransportEvent::Opened => {
                st.current_delay_ms = None;
                st.state = SubscriptionState::Subscribed;
                if let Some(saved) = st.saved.as_ref() {
                    log::info!("subscribed to {}", saved.url);
                }
            }
            TransportEvent::Message(frame) => {
                // Err here means no listeners are attached right now; frames
                // are not replayed, so there is nothing to do with it.
                let _ = self.messages.send(frame);
            }
            TransportEvent::Closed => {
                // A duplicate close from the same transport must not
                // schedule a second timer.
                if st.current.is_some() {
                    self.handle_close(&mut st);
                }
            }
        }
    }

    /// A failed open and a dropped connection land here alike. The
    /// transport already closed itself; we only give up ownership.
    fn handle_close(self: &Arc<Self>, st: &mut Inner) {
        st.current = None;
        let Some(saved) = st.saved.as_ref() else {
            st.state = SubscriptionState::Failed;
            return;
        };
        let url = saved.url.clone();
        let Some(base_ms) = saved.retry.retry_ms else {
            st.state = SubscriptionState::Failed;
            log::warn!("connection to {} lost; no retry configured", url);
            return;
        };

        let max = saved.retry.max_delay_ms as f64;
        let delay_ms = match st.current_delay_ms {
            None => (base_ms as f64).min(max),
            Some(prev) => (prev * saved.retry.backoff).min(max),
        };
        st.current_delay_ms = Some(delay_ms);

        let delay = Duration::from_millis(delay_ms.round() as u64);
        st.retry_time_ms = Some(chrono::Utc::now().timestamp_millis() + delay.as_millis() as i64);
        let cancel = CancellationToken::new();
        st.retry_cancel = Some(cancel.clone());
        st.state = SubscriptionState::Waiting;
        log::warn!("connection to {} lost; retrying in {}ms", url, delay.as_millis());

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep(delay) => {
                    let mut st = shared.lock();
                    // Re-check under the lock: the timer may have been
                    // cancelled between waking and acquiring it.
                    if st.state == SubscriptionState::Waiting && !cancel.is_cancelled() {
                        Shared::cancel_retry(&mut st);
                        shared.open_transport(&mut st);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::mock::MockConnector;

    /// Lets the driver and timer tasks run on the current-thread test
    /// runtime without advancing the clock.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance_ms(ms: u64) {
        tokio::time::advance(Duration::from_millis(ms)).await;
        settle().await;
    }

    fn fresh() -> (Arc<MockConnector>, Subscription) {
        let connector = MockConnector::new();
        let sub = Subscription::new(connector.clone());
        (connector, sub)
    }

    #[tokio::test]
    async fn initial_state_is_unsubscribed() {
        let (_, sub) = fresh();
        assert_eq!(sub.state(), SubscriptionState::Unsubscribed);
        assert!(!sub.is_subscribing());
        assert!(!sub.has_error());
        assert_eq!(sub.retry_time_ms(), None);
    }

    #[tokio::test]
    async fn open_transitions_to_subscribed() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url("ws://h1:1/sub/station", RetryPolicy::default());
        assert!(sub.is_subscribing());
        assert_eq!(connector.url_of(0), "ws://h1:1/sub/station");

        connector.last().fire_open();
        settle().await;
        assert_eq!(sub.state(), SubscriptionState::Subscribed);
        assert!(!sub.is_subscribing());
        assert!(!sub.has_error());
    }

    #[tokio::test(start_paused = true)]
    async fn close_without_retry_is_terminal() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url("ws://h1:1/sub/station", RetryPolicy::default());
        let attempt = connector.last();
        attempt.fire_close();
        settle().await;

        assert_eq!(sub.state(), SubscriptionState::Failed);
        assert!(sub.has_error());
        assert!(!sub.is_subscribing());
        // The transport closed on its own; the subscription must not close
        // it a second time.
        assert!(!attempt.was_closed());

        // No timer anywhere: nothing reopens however long we wait.
        advance_ms(60_000).await;
        assert_eq!(connector.open_count(), 1);
        assert_eq!(sub.state(), SubscriptionState::Failed);

        // Manual refresh is the way out.
        sub.refresh().unwrap();
        assert_eq!(connector.open_count(), 2);
        assert!(sub.is_subscribing());
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_per_consecutive_failure() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url(
            "ws://h1:1/sub/station",
            RetryPolicy::every(100).with_backoff(2.5),
        );
        connector.last().fire_close();
        settle().await;
        assert_eq!(sub.state(), SubscriptionState::Waiting);

        // First failure: base delay, verbatim.
        advance_ms(99).await;
        assert_eq!(connector.open_count(), 1);
        advance_ms(2).await;
        assert_eq!(connector.open_count(), 2);

        // Second consecutive failure: 100 * 2.5, not 100 again.
        connector.last().fire_close();
        settle().await;
        advance_ms(249).await;
        assert_eq!(connector.open_count(), 2);
        advance_ms(2).await;
        assert_eq!(connector.open_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_resets_after_successful_open() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url(
            "ws://h1:1/sub/station",
            RetryPolicy::every(100).with_backoff(2.5),
        );
        connector.last().fire_close();
        settle().await;
        advance_ms(101).await;
        assert_eq!(connector.open_count(), 2);

        connector.last().fire_open();
        settle().await;
        assert_eq!(sub.state(), SubscriptionState::Subscribed);

        // The accumulator was cleared, so this failure starts over at the
        // base delay rather than continuing at 250.
        connector.last().fire_close();
        settle().await;
        advance_ms(99).await;
        assert_eq!(connector.open_count(), 2);
        advance_ms(2).await;
        assert_eq!(connector.open_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_is_clamped_to_max_delay() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url(
            "ws://h1:1/sub/station",
            RetryPolicy::every(100).with_backoff(10.0).with_max_delay(250),
        );
        connector.last().fire_close();
        settle().await;
        advance_ms(101).await;
        assert_eq!(connector.open_count(), 2);

        // 100 * 10 would be 1000; the cap holds it at 250.
        connector.last().fire_close();
        settle().await;
        advance_ms(249).await;
        assert_eq!(connector.open_count(), 2);
        advance_ms(2).await;
        assert_eq!(connector.open_count(), 3);
    }

    #[tokio::test]
    async fn refresh_is_idempotent_while_subscribing() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url("ws://h1:1/sub/station", RetryPolicy::default());
        assert!(sub.is_subscribing());

        sub.refresh().unwrap();
        sub.refresh().unwrap();
        sub.refresh().unwrap();
        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test]
    async fn refresh_from_unsubscribed_is_a_usage_error() {
        let (_, sub) = fresh();
        assert_eq!(sub.refresh(), Err(SubscriptionError::NotSubscribed));
    }

    #[tokio::test]
    async fn refresh_replaces_a_live_connection() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url("ws://h1:1/sub/station", RetryPolicy::default());
        let first = connector.last();
        first.fire_open();
        settle().await;

        sub.refresh().unwrap();
        assert_eq!(connector.open_count(), 2);
        assert!(sub.is_subscribing());
        // Caller-triggered teardown closes the superseded transport.
        assert!(first.was_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_callbacks_are_ignored() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url("ws://h1:1/sub/station", RetryPolicy::every(100));
        let stale = connector.attempt(0);

        // Supersede transport A with B before A's callbacks fire.
        sub.subscribe_to_url("ws://h2:2/sub/station", RetryPolicy::every(100));
        assert_eq!(connector.open_count(), 2);

        stale.fire_open();
        settle().await;
        assert_eq!(sub.state(), SubscriptionState::Subscribing);

        stale.fire_close();
        settle().await;
        assert_eq!(sub.state(), SubscriptionState::Subscribing);

        // And no retry was scheduled on A's behalf.
        advance_ms(10_000).await;
        assert_eq!(connector.open_count(), 2);
    }

    #[tokio::test]
    async fn retry_now_requires_waiting() {
        let (connector, sub) = fresh();
        assert_eq!(sub.retry_now(), Err(SubscriptionError::NotWaiting));
        assert_eq!(sub.state(), SubscriptionState::Unsubscribed);

        sub.subscribe_to_url("ws://h1:1/sub/station", RetryPolicy::every(100));
        assert_eq!(sub.retry_now(), Err(SubscriptionError::NotWaiting));

        connector.last().fire_open();
        settle().await;
        assert_eq!(sub.retry_now(), Err(SubscriptionError::NotWaiting));
        assert_eq!(sub.state(), SubscriptionState::Subscribed);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_now_fires_immediately_and_keeps_backoff() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url(
            "ws://h1:1/sub/station",
            RetryPolicy::every(100).with_backoff(2.5),
        );
        connector.last().fire_close();
        settle().await;
        assert_eq!(sub.state(), SubscriptionState::Waiting);

        sub.retry_now().unwrap();
        assert_eq!(connector.open_count(), 2);
        assert!(sub.is_subscribing());

        // The cancelled timer must stay dead.
        advance_ms(10_000).await;
        assert_eq!(connector.open_count(), 2);

        // The next failure continues the backoff sequence: 100 * 2.5.
        connector.last().fire_close();
        settle().await;
        advance_ms(249).await;
        assert_eq!(connector.open_count(), 2);
        advance_ms(2).await;
        assert_eq!(connector.open_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_schedules_a_retry_at_the_advertised_time() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url(
            "ws://h1:1/sub/station",
            RetryPolicy::every(100).with_max_delay(1000),
        );
        connector.last().fire_close();
        settle().await;

        assert_eq!(sub.state(), SubscriptionState::Waiting);
        assert!(sub.has_error());
        let advertised = sub.retry_time_ms().expect("retry time while waiting");
        let drift = advertised - chrono::Utc::now().timestamp_millis() - 100;
        assert!(drift.abs() <= 50, "retry time off by {}ms", drift);

        advance_ms(99).await;
        assert_eq!(sub.state(), SubscriptionState::Waiting);
        assert_eq!(connector.open_count(), 1);

        advance_ms(2).await;
        assert_eq!(connector.open_count(), 2);
        assert!(sub.is_subscribing());
        assert_eq!(sub.retry_time_ms(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_cancels_the_pending_retry() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url("ws://h1:1/sub/station", RetryPolicy::every(100));
        connector.last().fire_close();
        settle().await;
        assert_eq!(sub.state(), SubscriptionState::Waiting);

        sub.unsubscribe();
        assert_eq!(sub.state(), SubscriptionState::Unsubscribed);
        assert_eq!(sub.retry_time_ms(), None);

        // Past the would-be retry point: nothing reopens.
        advance_ms(10_000).await;
        assert_eq!(connector.open_count(), 1);
        assert_eq!(sub.state(), SubscriptionState::Unsubscribed);
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_owned_transport() {
        let (connector, sub) = fresh();
        sub.subscribe_to_url("ws://h1:1/sub/station", RetryPolicy::default());
        let attempt = connector.last();
        attempt.fire_open();
        settle().await;

        sub.unsubscribe();
        assert!(attempt.was_closed());
        assert_eq!(sub.state(), SubscriptionState::Unsubscribed);
    }

    #[tokio::test]
    async fn messages_fan_out_in_order() {
        let (connector, sub) = fresh();
        let mut rx_a = sub.messages();
        let mut rx_b = sub.messages();

        sub.subscribe_to_url("ws://h1:1/sub/station", RetryPolicy::default());
        let attempt = connector.last();
        attempt.fire_open();
        attempt.fire_message("one");
        attempt.fire_message("two");
        settle().await;

        assert_eq!(&*rx_a.try_recv().unwrap(), "one");
        assert_eq!(&*rx_a.try_recv().unwrap(), "two");
        assert_eq!(&*rx_b.try_recv().unwrap(), "one");
        assert_eq!(&*rx_b.try_recv().unwrap(), "two");

        // A listener attached late sees only what comes after it.
        let mut rx_late = sub.messages();
        attempt.fire_message("three");
        settle().await;
        assert_eq!(&*rx_late.try_recv().unwrap(), "three");
        assert!(rx_late.try_recv().is_err());
    }

    #[tokio::test]
    async fn stream_survives_resubscription() {
        let (connector, sub) = fresh();
        let mut rx = sub.messages();

        sub.subscribe_to_url("ws://h1:1/sub/station", RetryPolicy::default());
        let first = connector.last();
        first.fire_open();
        first.fire_message("from-first");
        settle().await;

        sub.subscribe_to_url("ws://h2:2/sub/station", RetryPolicy::default());
        let second = connector.last();
        second.fire_open();
        second.fire_message("from-second");
        // The superseded transport keeps talking; nothing of it gets through.
        first.fire_message("stale");
        settle().await;

        assert_eq!(&*rx.try_recv().unwrap(), "from-first");
        assert_eq!(&*rx.try_recv().unwrap(), "from-second");
        assert!(rx.try_recv().is_err());
    }
}
