//! Alert deduplication and dispatch.
//!
//! [`AlertMemory`] tracks which items have already alerted in their current
//! availability episode (the span from a product becoming available until it
//! is next seen unavailable); [`AlertDispatcher`] fans one alert out to its
//! channels — chime, push notification, desktop notification, and optionally
//! the browser. Every channel is independent: a failure is logged and
//! absorbed, and can neither block nor fail the others, nor the watch loop.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::desktop;
use crate::error::PushError;
use crate::events::EventLog;
use crate::push::{PushMessage, PushSink};
use crate::sound::SoundPlayer;
use crate::watch_list::{ItemKey, WatchItem};

/// Default deep link used by the manual "test notification" action.
const TEST_DEEP_LINK: &str = "https://www.apple.com/shop/bag";

const DESKTOP_TIMEOUT_MS: u32 = 5000;

/// Item identities that have already alerted in the current episode.
#[derive(Debug, Default)]
pub struct AlertMemory {
    fired: Mutex<HashSet<ItemKey>>,
}

impl AlertMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` as alerted. Returns `true` exactly when this is the
    /// first sighting of the current episode (i.e. an alert should fire).
    pub fn first_sighting(&self, key: ItemKey) -> bool {
        self.fired.lock().insert(key)
    }

    /// The item was seen unavailable: end its episode so the next
    /// availability fires again.
    pub fn reset(&self, key: &ItemKey) {
        self.fired.lock().remove(key);
    }

    /// Forget everything (watch list was cleared).
    pub fn clear(&self) {
        self.fired.lock().clear();
    }

    /// Drop identities that are no longer monitored.
    pub fn retain(&self, live: &HashSet<ItemKey>) {
        self.fired.lock().retain(|key| live.contains(key));
    }

    pub fn is_empty(&self) -> bool {
        self.fired.lock().is_empty()
    }
}

/// Per-channel switches for the dispatcher.
#[derive(Debug, Clone)]
pub struct AlertOptions {
    /// Show a local desktop notification alongside the push channel.
    pub desktop_notify: bool,
    /// Open the retailer cart page in the default browser on an alert.
    pub open_deep_link: bool,
}

impl Default for AlertOptions {
    fn default() -> Self {
        Self {
            desktop_notify: true,
            open_deep_link: true,
        }
    }
}

/// Fans a single in-stock alert out to all configured channels.
pub struct AlertDispatcher {
    sound: Arc<dyn SoundPlayer>,
    push: Arc<dyn PushSink>,
    events: Arc<EventLog>,
    options: AlertOptions,
}

impl AlertDispatcher {
    pub fn new(
        sound: Arc<dyn SoundPlayer>,
        push: Arc<dyn PushSink>,
        events: Arc<EventLog>,
        options: AlertOptions,
    ) -> Self {
        Self {
            sound,
            push,
            events,
            options,
        }
    }

    /// Fire one alert for `item`. Never fails, never panics; each channel's
    /// error is logged where it happens.
    pub fn fire(&self, item: &WatchItem, deep_link: &str) {
        log::info!("In stock: {}", item.label());
        self.events.push(format!("In stock: {}", item.label()));

        if let Err(e) = self.sound.play() {
            log::warn!("Alert chime failed: {}", e);
        }

        if item.notify_endpoint.is_empty() {
            log::debug!("No push endpoint for {}; skipping push", item.label());
        } else {
            let message = PushMessage {
                title: "Pickup available".to_string(),
                body: item.label(),
                url: deep_link.to_string(),
            };
            if let Err(e) = self.push.send(&message, &item.notify_endpoint) {
                log::warn!("Push notification for {} failed: {}", item.label(), e);
                self.events
                    .push(format!("Push notification failed: {}", e));
            }
        }

        if self.options.desktop_notify {
            desktop::deliver("Pickup available", &item.label(), DESKTOP_TIMEOUT_MS);
        }

        if self.options.open_deep_link {
            if let Err(e) = open::that(deep_link) {
                log::warn!("Failed to open cart page '{}': {}", deep_link, e);
            }
        }
    }

    /// Manual action: play the alert chime once, off the caller's thread.
    pub fn preview_sound(&self) {
        let sound = Arc::clone(&self.sound);
        std::thread::spawn(move || {
            if let Err(e) = sound.play() {
                log::warn!("Sound preview failed: {}", e);
            }
        });
    }

    /// Manual action: send a test push to `endpoint` (the currently entered,
    /// possibly unsaved value). The outcome is surfaced so the UI can show
    /// a confirmation or warning.
    pub fn test_notification(&self, endpoint: &str) -> Result<(), PushError> {
        if endpoint.trim().is_empty() {
            return Err(PushError::InvalidEndpoint(
                "no push endpoint entered".to_string(),
            ));
        }
        let message = PushMessage {
            title: "Pickup alert (test)".to_string(),
            body: "This is a test alert; tapping it opens the cart page".to_string(),
            url: TEST_DEEP_LINK.to_string(),
        };
        self.push.send(&message, endpoint)
    }
}
