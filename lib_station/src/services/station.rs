//! The per-station data service.
//!
//! Subscribes to one station's `/sub/station` stream and maintains a store
//! of test records keyed by test id. Updates are incremental per test id
//! and never pruned by snapshot. One `Subscription` is reused across
//! targets; switching stations cancels the service's own listener first so
//! the new target's frames are the only ones feeding the store, then clears
//! the store and descriptor cache (records of the old station can never be
//! updated again).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::core::subscription::{RetryPolicy, Subscription, SubscriptionError};
use crate::core::transport::{Connector, Frame};
use crate::models::{PhaseDescriptor, TestState, TestUpdateWire};
use crate::services::descriptors::DescriptorSource;

const LOCK_POISONED: &str = "Station store lock poisoned";

type TestStore = Arc<Mutex<HashMap<String, Arc<Mutex<TestState>>>>>;

/// Maintains one station's test store on top of one `Subscription`.
pub struct StationService {
    subscription: Subscription,
    tests: TestStore,
    descriptors: Option<Arc<dyn DescriptorSource>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    target: Mutex<Option<(String, u16)>>,
}

impl StationService {
    /// Without a descriptor source, not-yet-run phases are simply not
    /// synthesized; everything else works the same.
    pub fn new(
        connector: Arc<dyn Connector>,
        descriptors: Option<Arc<dyn DescriptorSource>>,
    ) -> Self {
        Self {
            subscription: Subscription::new(connector),
            tests: Arc::new(Mutex::new(HashMap::new())),
            descriptors,
            listener: Mutex::new(None),
            target: Mutex::new(None),
        }
    }

    /// Points the service at a station and opens its stream.
    ///
    /// The previous listener is cancelled before the URL switches, and the
    /// store starts empty for the new target.
    pub fn subscribe(&self, host: &str, port: u16, retry: RetryPolicy) {
        let mut listener = self.listener.lock().expect(LOCK_POISONED);
        if let Some(old) = listener.take() {
            old.abort();
        }
        self.tests.lock().expect(LOCK_POISONED).clear();
        *self.target.lock().expect(LOCK_POISONED) = Some((host.to_string(), port));

        let rx = self.subscription.messages();
        let tests = Arc::clone(&self.tests);
        let source = self.descriptors.clone();
        let listener_host = host.to_string();
        *listener = Some(tokio::spawn(listen(rx, tests, source, listener_host, port)));
        drop(listener);

        self.subscription
            .subscribe_to_url(&format!("ws://{}:{}/sub/station", host, port), retry);
    }

    /// The station currently subscribed to, if any.
    pub fn target(&self) -> Option<(String, u16)> {
        self.target.lock().expect(LOCK_POISONED).clone()
    }

    /// Looks up one test record. The returned handle stays live across
    /// updates.
    pub fn test(&self, test_id: &str) -> Option<Arc<Mutex<TestState>>> {
        self.tests.lock().expect(LOCK_POISONED).get(test_id).cloned()
    }

    /// A snapshot of the store, sorted by test id.
    pub fn tests(&self) -> Vec<(String, Arc<Mutex<TestState>>)> {
        let store = self.tests.lock().expect(LOCK_POISONED);
        let mut entries: Vec<_> = store
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    // --- Subscription pass-throughs ---

    /// True while the stream connection attempt is in flight.
    pub fn is_subscribing(&self) -> bool {
        self.subscription.is_subscribing()
    }

    /// True while the stream is down, whether or not a retry is scheduled.
    pub fn has_error(&self) -> bool {
        self.subscription.has_error()
    }

    /// Epoch milliseconds of the pending retry, for countdown rendering.
    pub fn retry_time_ms(&self) -> Option<i64> {
        self.subscription.retry_time_ms()
    }

    /// Manual reconnect, bypassing any backoff delay.
    pub fn refresh(&self) -> Result<(), SubscriptionError> {
        self.subscription.refresh()
    }

    /// Fires the scheduled retry immediately.
    pub fn retry_now(&self) -> Result<(), SubscriptionError> {
        self.subscription.retry_now()
    }

    /// Tears the stream down. The store keeps its last contents.
    pub fn unsubscribe(&self) {
        self.subscription.unsubscribe();
    }

    /// The underlying subscription, for consumers that want the raw stream.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

async fn listen(
    mut rx: broadcast::Receiver<Frame>,
    tests: TestStore,
    source: Option<Arc<dyn DescriptorSource>>,
    host: String,
    port: u16,
) {
    // One fetch per test id; a failed fetch is not cached and retries on
    // the next frame for that id. Cache and listener die together, so a
    // target switch starts clean.
    let mut descriptor_cache: HashMap<String, Vec<PhaseDescriptor>> = HashMap::new();
    loop {
        match rx.recv().await {
            Ok(frame) => {
                handle_frame(
                    &tests,
                    &mut descriptor_cache,
                    source.as_deref(),
                    &host,
                    port,
                    &frame,
                )
                .await
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                log::warn!("station listener lagged; {} updates dropped", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Validate → parse → apply for one test update frame.
async fn handle_frame(
    tests: &TestStore,
    descriptor_cache: &mut HashMap<String, Vec<PhaseDescriptor>>,
    source: Option<&dyn DescriptorSource>,
    host: &str,
    port: u16,
    frame: &str,
) {
    let update: TestUpdateWire = match serde_json::from_str(frame) {
        Ok(u) => u,
        Err(e) => {
            log::warn!("dropping malformed station frame: {}", e);
            return;
        }
    };
    let Some(test_id) = update.test_uid.clone() else {
        log::warn!("dropping station frame without a test id");
        return;
    };

    let descriptors = match descriptor_cache.get(&test_id) {
        Some(cached) => cached.clone(),
        None => match source {
            Some(source) => match source.phase_descriptors(host, port, &test_id).await {
                Ok(fetched) => {
                    descriptor_cache.insert(test_id.clone(), fetched.clone());
                    fetched
                }
                Err(e) => {
                    log::warn!("phase descriptors for '{}' unavailable: {}", test_id, e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        },
    };

    let mut store = tests.lock().expect(LOCK_POISONED);
    if let Some(existing) = store.get(&test_id).cloned() {
        if let Some(wire) = update.state {
            existing
                .lock()
                .expect("Test record lock poisoned")
                .apply_wire(wire, &descriptors);
        }
    } else if let Some(state) = TestState::from_wire(update, &descriptors) {
        log::debug!("test '{}' appeared on {}:{}", test_id, host, port);
        store.insert(test_id, Arc::new(Mutex::new(state)));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::core::transport::mock::MockConnector;
    use crate::models::{PhaseStatus, TestStatus};
    use crate::services::descriptors::RetrieveError;

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    /// Scripted descriptor source: counts fetches, optionally failing the
    /// first `fail_first` of them.
    struct ScriptedSource {
        descriptors: Vec<PhaseDescriptor>,
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl ScriptedSource {
        fn new(descriptors: Vec<PhaseDescriptor>) -> Arc<Self> {
            Arc::new(Self {
                descriptors,
                calls: AtomicUsize::new(0),
                fail_first: 0,
            })
        }

        fn failing_once(descriptors: Vec<PhaseDescriptor>) -> Arc<Self> {
            Arc::new(Self {
                descriptors,
                calls: AtomicUsize::new(0),
                fail_first: 1,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DescriptorSource for ScriptedSource {
        async fn phase_descriptors(
            &self,
            _host: &str,
            _port: u16,
            _test_id: &str,
        ) -> Result<Vec<PhaseDescriptor>, RetrieveError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(RetrieveError::Status(503));
            }
            Ok(self.descriptors.clone())
        }
    }

    fn phase_plan() -> Vec<PhaseDescriptor> {
        vec![
            PhaseDescriptor {
                id: 0,
                name: "setup".into(),
            },
            PhaseDescriptor {
                id: 1,
                name: "main".into(),
            },
        ]
    }

    fn running_frame(test_id: &str) -> String {
        format!(
            r#"{{"test_uid": "{}", "state": {{
                "status": "RUNNING",
                "test_record": {{"phases": [{{"name": "setup", "outcome": "PASS"}}]}}
            }}}}"#,
            test_id
        )
    }

    #[tokio::test]
    async fn frames_populate_the_store_with_synthesized_phases() {
        let connector = MockConnector::new();
        let source = ScriptedSource::new(phase_plan());
        let service = StationService::new(connector.clone(), Some(source.clone()));
        service.subscribe("h1", 1, RetryPolicy::default());
        assert_eq!(connector.url_of(0), "ws://h1:1/sub/station");

        let attempt = connector.last();
        attempt.fire_open();
        attempt.fire_message(&running_frame("t1"));
        settle().await;

        let test = service.test("t1").expect("test in store");
        let test = test.lock().unwrap();
        assert_eq!(test.status, TestStatus::Running);
        let names: Vec<&str> = test.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["setup", "main"]);
        assert_eq!(test.phases[1].status, PhaseStatus::Pending);
    }

    #[tokio::test]
    async fn updates_merge_in_place_and_never_prune() {
        let connector = MockConnector::new();
        let service = StationService::new(connector.clone(), None);
        service.subscribe("h1", 1, RetryPolicy::default());
        let attempt = connector.last();
        attempt.fire_open();

        attempt.fire_message(&running_frame("t1"));
        attempt.fire_message(&running_frame("t2"));
        settle().await;
        let first = service.test("t1").unwrap();

        // A later frame about t2 alone must not evict t1.
        attempt.fire_message(r#"{"test_uid": "t2", "state": {"status": "PASS"}}"#);
        settle().await;
        assert_eq!(service.tests().len(), 2);

        let second = service.test("t1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            service.test("t2").unwrap().lock().unwrap().status,
            TestStatus::Completed
        );
    }

    #[tokio::test]
    async fn descriptors_are_fetched_once_per_test_id() {
        let connector = MockConnector::new();
        let source = ScriptedSource::new(phase_plan());
        let service = StationService::new(connector.clone(), Some(source.clone()));
        service.subscribe("h1", 1, RetryPolicy::default());
        let attempt = connector.last();
        attempt.fire_open();

        attempt.fire_message(&running_frame("t1"));
        attempt.fire_message(&running_frame("t1"));
        attempt.fire_message(&running_frame("t2"));
        settle().await;

        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn failed_descriptor_fetches_retry_on_the_next_frame() {
        let connector = MockConnector::new();
        let source = ScriptedSource::failing_once(phase_plan());
        let service = StationService::new(connector.clone(), Some(source.clone()));
        service.subscribe("h1", 1, RetryPolicy::default());
        let attempt = connector.last();
        attempt.fire_open();

        attempt.fire_message(&running_frame("t1"));
        settle().await;
        // The fetch failed; the frame still landed, just without synthesis.
        let names: Vec<String> = {
            let test = service.test("t1").unwrap();
            let test = test.lock().unwrap();
            test.phases.iter().map(|p| p.name.clone()).collect()
        };
        assert_eq!(names, vec!["setup"]);

        attempt.fire_message(&running_frame("t1"));
        settle().await;
        assert_eq!(source.call_count(), 2);
        let test = service.test("t1").unwrap();
        let test = test.lock().unwrap();
        assert_eq!(test.phases.len(), 2);
    }

    #[tokio::test]
    async fn switching_targets_resets_the_store() {
        let connector = MockConnector::new();
        let service = StationService::new(connector.clone(), None);
        service.subscribe("h1", 1, RetryPolicy::default());
        let first = connector.last();
        first.fire_open();
        first.fire_message(&running_frame("t1"));
        settle().await;
        assert!(service.test("t1").is_some());

        service.subscribe("h2", 2, RetryPolicy::default());
        assert_eq!(connector.url_of(1), "ws://h2:2/sub/station");
        assert_eq!(service.target(), Some(("h2".to_string(), 2)));
        assert!(service.test("t1").is_none());

        let second = connector.last();
        second.fire_open();
        second.fire_message(&running_frame("t9"));
        // The superseded transport keeps talking; nothing of it lands.
        first.fire_message(&running_frame("stale"));
        settle().await;

        assert!(service.test("t9").is_some());
        assert!(service.test("stale").is_none());
        assert_eq!(service.tests().len(), 1);
    }
}
