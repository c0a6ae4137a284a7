//! Watch engine for Apple retail in-store pickup availability.
//!
//! Monitors a user-selected set of (area, store, product) combinations and
//! alerts — chime, push notification, optional auto-opened cart page — the
//! moment one becomes available for pickup.
//!
//! Provides:
//! - `catalog`: area / store / product reference data and title resolution
//! - `watch_list`: the monitored combinations, with upsert semantics
//! - `status`: observable Running/Paused state gating the loop
//! - `inventory`: the fulfillment-API availability source
//! - `poller`: the tick loop — bounded fan-out, per-item timeout, backoff
//! - `alert`: episode deduplication and multi-channel alert dispatch
//! - `engine`: the explicitly constructed per-process engine instance
//! - `settings`: best-effort settings snapshot persistence
//!
//! The host UI constructs one [`WatchEngine`] at startup, calls
//! [`WatchEngine::start`], and drives adds/cleans/pause/resume from user
//! actions; everything network-facing happens on the engine's own runtime.

pub mod alert;
pub mod catalog;
pub mod desktop;
pub mod engine;
pub mod error;
pub mod events;
pub mod http;
pub mod inventory;
mod poller;
pub mod push;
pub mod settings;
pub mod sound;
pub mod status;
pub mod watch_list;

// Re-export the main types for convenience
pub use alert::{AlertDispatcher, AlertMemory, AlertOptions};
pub use catalog::{Area, Catalog, Product, Store};
pub use engine::{EngineConfig, WatchEngine};
pub use error::{AudioError, EngineError, PushError, QueryError};
pub use events::EventLog;
pub use inventory::{Availability, FulfillmentClient, InventorySource};
pub use push::{BarkPush, PushMessage, PushSink};
#[cfg(feature = "audio")]
pub use sound::ChimePlayer;
pub use sound::{NullSound, SoundPlayer};
pub use settings::Settings;
pub use status::{RunState, StatusCell};
pub use watch_list::{ItemKey, WatchItem, WatchList};
