//! The polling loop: periodic availability checks over the watch list.
//!
//! One long-lived task drives ticks on a fixed interval. Each tick:
//! snapshot the watch list, fan the availability queries out with bounded
//! concurrency and a per-item timeout, then translate results into episode
//! transitions (alert on first availability, reset on unavailability).
//! Failures are isolated per item and feed an exponential backoff so a
//! broken item cannot hammer the upstream service or disturb its neighbors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::engine::{EngineConfig, Shared};
use crate::error::QueryError;
use crate::inventory::Availability;
use crate::status::RunState;
use crate::watch_list::{ItemKey, WatchItem};

/// Per-item exponential backoff for transient query failures.
///
/// A failing item is deferred for `base * 2^(failures-1)`, capped at `cap`.
/// Any successful query (available or not) clears the item's entry; entries
/// for items that left the watch list are pruned each tick.
pub(crate) struct BackoffTracker {
    base: Duration,
    cap: Duration,
    entries: HashMap<ItemKey, BackoffEntry>,
}

struct BackoffEntry {
    failures: u32,
    retry_at: Instant,
}

impl BackoffTracker {
    pub(crate) fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            entries: HashMap::new(),
        }
    }

    fn delay_for(&self, failures: u32) -> Duration {
        // 2^16 ticks past the cap for any sane base; avoids shift overflow
        let exponent = failures.saturating_sub(1).min(16);
        self.base.saturating_mul(1u32 << exponent).min(self.cap)
    }

    pub(crate) fn is_deferred(&self, key: &ItemKey, now: Instant) -> bool {
        self.entries.get(key).is_some_and(|e| e.retry_at > now)
    }

    pub(crate) fn record_failure(&mut self, key: ItemKey, now: Instant) {
        let failures = self.entries.get(&key).map_or(0, |e| e.failures) + 1;
        let retry_at = now + self.delay_for(failures);
        let entry = self.entries.entry(key).or_insert(BackoffEntry {
            failures: 0,
            retry_at,
        });
        entry.failures = failures;
        entry.retry_at = retry_at;
    }

    pub(crate) fn clear(&mut self, key: &ItemKey) {
        self.entries.remove(key);
    }

    pub(crate) fn prune(&mut self, live: &HashSet<ItemKey>) {
        self.entries.retain(|key, _| live.contains(key));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Drive ticks forever. Spawned once by the engine; never returns.
pub(crate) async fn run(shared: Arc<Shared>, config: EngineConfig) {
    let mut backoff = BackoffTracker::new(config.backoff_base, config.backoff_cap);
    let mut interval = tokio::time::interval(config.tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    log::info!(
        "Watch loop started (tick every {:?}, fan-out {})",
        config.tick_interval,
        config.max_concurrent
    );

    loop {
        interval.tick().await;
        // Dispatch tasks are detached; a slow notification channel must not
        // delay the next tick
        let _dispatches = tick(&shared, &config, &mut backoff).await;
    }
}

/// Execute one tick. Returns the detached alert-dispatch tasks so tests can
/// await them for deterministic assertions; the loop drops them.
pub(crate) async fn tick(
    shared: &Arc<Shared>,
    config: &EngineConfig,
    backoff: &mut BackoffTracker,
) -> Vec<JoinHandle<()>> {
    if shared.status.get() != RunState::Running {
        return Vec::new();
    }

    let snapshot = shared.list.items();
    if snapshot.is_empty() {
        return Vec::new();
    }

    let live: HashSet<ItemKey> = snapshot.iter().map(WatchItem::key).collect();
    backoff.prune(&live);

    let now = Instant::now();
    let due: Vec<WatchItem> = snapshot
        .into_iter()
        .filter(|item| {
            let deferred = backoff.is_deferred(&item.key(), now);
            if deferred {
                log::debug!("{} deferred by backoff", item.label());
            }
            !deferred
        })
        .collect();

    let mut dispatches = Vec::new();

    for chunk in due.chunks(config.max_concurrent.max(1)) {
        let mut in_flight = Vec::with_capacity(chunk.len());
        for item in chunk {
            let source = Arc::clone(&shared.inventory);
            let query_item = item.clone();
            in_flight.push((
                item.clone(),
                tokio::task::spawn_blocking(move || source.check(&query_item)),
            ));
        }

        for (item, handle) in in_flight {
            let key = item.key();
            let outcome = match tokio::time::timeout(config.item_timeout, handle).await {
                // The blocking call keeps running; its result is abandoned
                // for this tick and the item is retried later
                Err(_) => Err(QueryError::Timeout),
                Ok(Err(join_err)) => {
                    Err(QueryError::Transport(format!("query task failed: {}", join_err)))
                }
                Ok(Ok(result)) => result,
            };

            match outcome {
                Ok(Availability {
                    available,
                    deep_link,
                }) => {
                    backoff.clear(&key);
                    if available {
                        if shared.memory.first_sighting(key) {
                            let dispatcher = Arc::clone(&shared.dispatcher);
                            let alert_item = item.clone();
                            dispatches.push(tokio::task::spawn_blocking(move || {
                                dispatcher.fire(&alert_item, &deep_link);
                            }));
                        } else {
                            log::debug!("{} still available; alert suppressed", item.label());
                        }
                    } else {
                        shared.memory.reset(&key);
                    }
                }
                Err(e) => {
                    backoff.record_failure(key, Instant::now());
                    log::warn!("Availability query for {} failed: {}", item.label(), e);
                }
            }
        }
    }

    dispatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertDispatcher, AlertMemory, AlertOptions};
    use crate::catalog::Catalog;
    use crate::error::{AudioError, PushError};
    use crate::events::EventLog;
    use crate::inventory::InventorySource;
    use crate::push::{PushMessage, PushSink};
    use crate::sound::SoundPlayer;
    use crate::status::StatusCell;
    use crate::watch_list::WatchList;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Available,
        Unavailable,
        Fail,
    }

    /// Scripted inventory source: pops one step per query for an item and
    /// repeats the final step once the script runs dry.
    struct ScriptedSource {
        scripts: Mutex<HashMap<ItemKey, VecDeque<Step>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn script(self, key: ItemKey, steps: Vec<Step>) -> Self {
            self.scripts.lock().insert(key, steps.into());
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl InventorySource for ScriptedSource {
        fn check(&self, item: &WatchItem) -> Result<Availability, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut scripts = self.scripts.lock();
            let step = scripts
                .get_mut(&item.key())
                .and_then(|queue| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().copied()
                    }
                })
                .unwrap_or(Step::Unavailable);
            match step {
                Step::Available => Ok(Availability {
                    available: true,
                    deep_link: "https://www.apple.com/shop/bag".to_string(),
                }),
                Step::Unavailable => Ok(Availability {
                    available: false,
                    deep_link: "https://www.apple.com/shop/bag".to_string(),
                }),
                Step::Fail => Err(QueryError::Transport("scripted failure".to_string())),
            }
        }
    }

    struct CountingSound {
        plays: AtomicUsize,
    }

    impl SoundPlayer for CountingSound {
        fn play(&self) -> Result<(), AudioError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingPush {
        sends: AtomicUsize,
        fail: bool,
    }

    impl PushSink for CountingPush {
        fn send(&self, _message: &PushMessage, _endpoint: &str) -> Result<(), PushError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PushError::Delivery("scripted push failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        shared: Arc<Shared>,
        source: Arc<ScriptedSource>,
        sound: Arc<CountingSound>,
        push: Arc<CountingPush>,
        config: EngineConfig,
    }

    fn fixture(source: ScriptedSource, push_fails: bool) -> Fixture {
        let source = Arc::new(source);
        let sound = Arc::new(CountingSound {
            plays: AtomicUsize::new(0),
        });
        let push = Arc::new(CountingPush {
            sends: AtomicUsize::new(0),
            fail: push_fails,
        });
        let events = Arc::new(EventLog::new());
        let dispatcher = Arc::new(AlertDispatcher::new(
            Arc::clone(&sound) as Arc<dyn SoundPlayer>,
            Arc::clone(&push) as Arc<dyn PushSink>,
            Arc::clone(&events),
            AlertOptions {
                desktop_notify: false,
                open_deep_link: false,
            },
        ));
        let shared = Arc::new(Shared {
            catalog: Arc::new(Catalog::builtin()),
            list: WatchList::new(),
            memory: AlertMemory::new(),
            status: StatusCell::new(RunState::Running),
            inventory: Arc::clone(&source) as Arc<dyn InventorySource>,
            dispatcher,
            events,
        });
        Fixture {
            shared,
            source,
            sound,
            push,
            config: EngineConfig {
                tick_interval: Duration::from_millis(10),
                max_concurrent: 4,
                item_timeout: Duration::from_secs(5),
                backoff_base: Duration::ZERO,
                backoff_cap: Duration::ZERO,
            },
        }
    }

    fn watch_item(store: &str, endpoint: &str) -> WatchItem {
        WatchItem {
            area_id: "us".into(),
            area_title: "United States".into(),
            store_id: store.into(),
            store_title: format!("Store {}", store),
            product_id: "MYNE3LL/A".into(),
            product_title: "iPhone 16 Pro".into(),
            notify_endpoint: endpoint.into(),
        }
    }

    impl Fixture {
        // Each test owns its backoff state explicitly, as the loop does.
        fn backoff_holder(&self) -> BackoffTracker {
            BackoffTracker::new(self.config.backoff_base, self.config.backoff_cap)
        }
    }

    async fn run_tick_with(
        shared: &Arc<Shared>,
        config: &EngineConfig,
        backoff: &mut BackoffTracker,
    ) {
        for handle in tick(shared, config, backoff).await {
            handle.await.expect("dispatch task panicked");
        }
    }

    #[tokio::test]
    async fn test_paused_tick_issues_no_queries() {
        let item = watch_item("R409", "");
        let fx = fixture(
            ScriptedSource::new().script(item.key(), vec![Step::Available]),
            false,
        );
        fx.shared.list.upsert(item);
        fx.shared.status.set(RunState::Paused);
        let mut backoff = fx.backoff_holder();
        for _ in 0..3 {
            run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        }
        assert_eq!(fx.source.calls(), 0);
        assert_eq!(fx.sound.plays.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unavailable_then_available_alerts_once() {
        let item = watch_item("R409", "");
        let fx = fixture(
            ScriptedSource::new().script(
                item.key(),
                vec![
                    Step::Unavailable,
                    Step::Unavailable,
                    Step::Unavailable,
                    Step::Available,
                ],
            ),
            false,
        );
        fx.shared.list.upsert(item);
        let mut backoff = fx.backoff_holder();

        for _ in 0..3 {
            run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
            assert_eq!(fx.sound.plays.load(Ordering::SeqCst), 0);
        }

        // tick 4: first availability of the episode
        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        assert_eq!(fx.sound.plays.load(Ordering::SeqCst), 1);
        // endpoint is empty: no push may be attempted
        assert_eq!(fx.push.sends.load(Ordering::SeqCst), 0);

        // tick 5: still available, same episode, no second alert
        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        assert_eq!(fx.sound.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restock_fires_second_episode() {
        let item = watch_item("R409", "");
        let fx = fixture(
            ScriptedSource::new().script(
                item.key(),
                vec![Step::Available, Step::Unavailable, Step::Available],
            ),
            false,
        );
        fx.shared.list.upsert(item);
        let mut backoff = fx.backoff_holder();

        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        assert_eq!(fx.sound.plays.load(Ordering::SeqCst), 1);

        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        assert_eq!(fx.sound.plays.load(Ordering::SeqCst), 1);

        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        assert_eq!(fx.sound.plays.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_push_failure_does_not_affect_other_items() {
        let first = watch_item("R409", "https://api.day.app/a");
        let second = watch_item("R033", "https://api.day.app/b");
        let fx = fixture(
            ScriptedSource::new()
                .script(first.key(), vec![Step::Available])
                .script(second.key(), vec![Step::Available]),
            true,
        );
        fx.shared.list.upsert(first);
        fx.shared.list.upsert(second);
        let mut backoff = fx.backoff_holder();

        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;

        // Both pushes were attempted and failed; both sounds still played
        assert_eq!(fx.push.sends.load(Ordering::SeqCst), 2);
        assert_eq!(fx.sound.plays.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_unknown_then_recovers() {
        let item = watch_item("R409", "");
        let fx = fixture(
            ScriptedSource::new().script(item.key(), vec![Step::Fail, Step::Available]),
            false,
        );
        fx.shared.list.upsert(item);
        let mut backoff = fx.backoff_holder();

        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        assert_eq!(fx.sound.plays.load(Ordering::SeqCst), 0);

        // zero backoff base: eligible again immediately
        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        assert_eq!(fx.source.calls(), 2);
        assert_eq!(fx.sound.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_defers_failing_item() {
        let item = watch_item("R409", "");
        let mut fx = fixture(
            ScriptedSource::new().script(item.key(), vec![Step::Fail]),
            false,
        );
        fx.config.backoff_base = Duration::from_secs(3600);
        fx.config.backoff_cap = Duration::from_secs(7200);
        fx.shared.list.upsert(item);
        let mut backoff = BackoffTracker::new(fx.config.backoff_base, fx.config.backoff_cap);

        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        assert_eq!(fx.source.calls(), 1);

        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        assert_eq!(fx.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_list_skips_work() {
        let fx = fixture(ScriptedSource::new(), false);
        let mut backoff = fx.backoff_holder();
        run_tick_with(&fx.shared, &fx.config, &mut backoff).await;
        assert_eq!(fx.source.calls(), 0);
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let tracker = BackoffTracker::new(Duration::from_secs(5), Duration::from_secs(300));
        assert_eq!(tracker.delay_for(1), Duration::from_secs(5));
        assert_eq!(tracker.delay_for(2), Duration::from_secs(10));
        assert_eq!(tracker.delay_for(4), Duration::from_secs(40));
        assert_eq!(tracker.delay_for(10), Duration::from_secs(300));
        assert_eq!(tracker.delay_for(60), Duration::from_secs(300));
    }

    #[test]
    fn test_backoff_clear_and_prune() {
        let mut tracker = BackoffTracker::new(Duration::from_secs(5), Duration::from_secs(300));
        let key_a = watch_item("R1", "").key();
        let key_b = watch_item("R2", "").key();
        let now = Instant::now();
        tracker.record_failure(key_a.clone(), now);
        tracker.record_failure(key_b.clone(), now);
        assert!(tracker.is_deferred(&key_a, now));

        tracker.clear(&key_a);
        assert!(!tracker.is_deferred(&key_a, now));

        let live: HashSet<ItemKey> = HashSet::new();
        tracker.prune(&live);
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_backoff_expires_with_time() {
        let mut tracker = BackoffTracker::new(Duration::from_millis(1), Duration::from_millis(1));
        let key = watch_item("R1", "").key();
        let now = Instant::now();
        tracker.record_failure(key.clone(), now);
        assert!(!tracker.is_deferred(&key, now + Duration::from_millis(5)));
    }
}
