//! The watch engine: one explicitly constructed instance per process.
//!
//! [`WatchEngine`] owns the watch list, alert memory, run state, the alert
//! dispatcher, and the tokio runtime the polling loop lives on. The host UI
//! constructs it once at startup, calls [`WatchEngine::start`] to bring the
//! loop up, and drives everything else through the methods here; there are
//! no process-wide singletons.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::alert::{AlertDispatcher, AlertMemory, AlertOptions};
use crate::catalog::Catalog;
use crate::error::{EngineError, PushError};
use crate::events::EventLog;
use crate::inventory::{FulfillmentClient, InventorySource};
use crate::poller;
use crate::push::BarkPush;
use crate::sound::SoundPlayer;
use crate::status::{RunState, StatusCell};
use crate::watch_list::{WatchItem, WatchList};

/// Tuning knobs for the polling loop.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between ticks.
    pub tick_interval: Duration,
    /// Maximum availability queries in flight at once within a tick.
    pub max_concurrent: usize,
    /// Per-item timeout; a slower item is abandoned for the tick.
    pub item_timeout: Duration,
    /// First backoff delay after a failed query.
    pub backoff_base: Duration,
    /// Upper bound on the per-item backoff delay.
    pub backoff_cap: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(3),
            max_concurrent: 8,
            item_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_secs(5),
            backoff_cap: Duration::from_secs(300),
        }
    }
}

/// State shared between the engine's public surface and the polling loop.
pub(crate) struct Shared {
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) list: WatchList,
    pub(crate) memory: AlertMemory,
    pub(crate) status: StatusCell,
    pub(crate) inventory: Arc<dyn InventorySource>,
    pub(crate) dispatcher: Arc<AlertDispatcher>,
    pub(crate) events: Arc<EventLog>,
}

/// The watch engine. See the module docs for the lifecycle.
pub struct WatchEngine {
    shared: Arc<Shared>,
    config: EngineConfig,
    runtime: tokio::runtime::Runtime,
    started: AtomicBool,
}

impl WatchEngine {
    /// Build an engine from explicit parts. Prefer [`WatchEngine::with_defaults`]
    /// unless you are injecting a custom inventory source or dispatcher.
    pub fn new(
        catalog: Arc<Catalog>,
        inventory: Arc<dyn InventorySource>,
        dispatcher: Arc<AlertDispatcher>,
        events: Arc<EventLog>,
        config: EngineConfig,
    ) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("pickup-watch")
            .enable_all()
            .build()
            .context("failed to start the watch runtime")?;

        Ok(Self {
            shared: Arc::new(Shared {
                catalog,
                list: WatchList::new(),
                memory: AlertMemory::new(),
                status: StatusCell::new(RunState::Paused),
                inventory,
                dispatcher,
                events,
            }),
            config,
            runtime,
            started: AtomicBool::new(false),
        })
    }

    /// An engine wired with the built-in catalog, the fulfillment API
    /// client, the Bark push sink, and the default alert channels.
    pub fn with_defaults() -> anyhow::Result<Self> {
        let catalog = Arc::new(Catalog::builtin());
        let config = EngineConfig::default();
        let events = Arc::new(EventLog::new());
        let inventory = Arc::new(FulfillmentClient::new(
            Arc::clone(&catalog),
            config.item_timeout,
        ));
        let dispatcher = Arc::new(AlertDispatcher::new(
            default_sound(),
            Arc::new(BarkPush::default()),
            Arc::clone(&events),
            AlertOptions::default(),
        ));
        Self::new(catalog, inventory, dispatcher, events, config)
    }

    /// Spawn the polling loop and mark the engine Running.
    ///
    /// Call once at process startup. The loop runs for the process lifetime;
    /// later calls are ignored with a warning. Pause/resume only gate the
    /// work the loop performs, they do not stop it.
    pub fn start(&self) {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::warn!("Watch loop already started; ignoring");
            return;
        }

        self.runtime
            .spawn(poller::run(Arc::clone(&self.shared), self.config.clone()));
        self.shared.status.set(RunState::Running);
        self.shared.events.push("Monitoring started");
    }

    /// Stop issuing availability queries. In-flight queries run to their
    /// timeout; no new ones start until [`WatchEngine::resume`].
    pub fn pause(&self) {
        if self.shared.status.set(RunState::Paused) {
            log::info!("Monitoring paused");
            self.shared.events.push("Monitoring paused");
        }
    }

    /// Resume polling after a pause.
    pub fn resume(&self) {
        if self.shared.status.set(RunState::Running) {
            log::info!("Monitoring resumed");
            self.shared.events.push("Monitoring resumed");
        }
    }

    pub fn status(&self) -> RunState {
        self.shared.status.get()
    }

    /// Observe run-state transitions (UI status label, tests).
    pub fn subscribe_status(&self, callback: impl Fn(RunState) + Send + Sync + 'static) {
        self.shared.status.subscribe(callback);
    }

    /// Resolve the selected titles and add (or update) a watch item.
    ///
    /// An empty or unknown store/product selection is a validation error; an
    /// unknown area title is a not-found error. Neither changes any state.
    pub fn add(
        &self,
        area_title: &str,
        store_title: &str,
        product_title: &str,
        notify_endpoint: &str,
    ) -> Result<WatchItem, EngineError> {
        if store_title.trim().is_empty() || product_title.trim().is_empty() {
            return Err(EngineError::Validation(
                "both a store and a product must be selected".to_string(),
            ));
        }

        let area = self.shared.catalog.resolve_area(area_title)?;
        let store = area.store_by_title(store_title).ok_or_else(|| {
            EngineError::Validation(format!(
                "store '{}' is not in {}",
                store_title, area.title
            ))
        })?;
        let product = area.product_by_title(product_title).ok_or_else(|| {
            EngineError::Validation(format!(
                "product '{}' is not offered in {}",
                product_title, area.title
            ))
        })?;

        let item = WatchItem {
            area_id: area.id.clone(),
            area_title: area.title.clone(),
            store_id: store.id.clone(),
            store_title: store.title.clone(),
            product_id: product.id.clone(),
            product_title: product.title.clone(),
            notify_endpoint: notify_endpoint.trim().to_string(),
        };

        self.shared.list.upsert(item.clone());
        log::info!("Watching {}", item.label());
        self.shared.events.push(format!("Watching {}", item.label()));
        Ok(item)
    }

    /// Empty the watch list and forget all alert episodes. Idempotent.
    pub fn clean(&self) {
        self.shared.list.clear();
        self.shared.memory.clear();
        log::info!("Watch list cleared");
        self.shared.events.push("Watch list cleared");
    }

    /// Snapshot of the monitored items (for display and for the settings
    /// snapshot).
    pub fn listen_items(&self) -> Vec<WatchItem> {
        self.shared.list.items()
    }

    /// Bulk-replace the monitored items (settings restore). Alert episodes
    /// for items that are no longer monitored are dropped.
    pub fn set_listen_items(&self, items: Vec<WatchItem>) {
        self.shared.list.set_items(items);
        let live: std::collections::HashSet<_> = self
            .shared
            .list
            .items()
            .iter()
            .map(WatchItem::key)
            .collect();
        self.shared.memory.retain(&live);
    }

    /// Manual action: play the alert chime once.
    pub fn preview_sound(&self) {
        self.shared.dispatcher.preview_sound();
    }

    /// Manual action: send a test push to the given (possibly unsaved)
    /// endpoint.
    pub fn test_notification(&self, endpoint: &str) -> Result<(), PushError> {
        self.shared.dispatcher.test_notification(endpoint)
    }

    /// Recent activity lines for the UI log panel.
    pub fn recent_events(&self) -> Vec<String> {
        self.shared.events.recent()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.shared.catalog
    }
}

fn default_sound() -> Arc<dyn SoundPlayer> {
    #[cfg(feature = "audio")]
    {
        Arc::new(crate::sound::ChimePlayer::new_or_disabled())
    }
    #[cfg(not(feature = "audio"))]
    {
        Arc::new(crate::sound::NullSound)
    }
}
