//! Availability queries against the retailer's fulfillment API.
//!
//! The poller talks to inventory exclusively through the [`InventorySource`]
//! trait, so tests substitute a scripted source and the production
//! [`FulfillmentClient`] stays a thin HTTP + parse layer. One call checks
//! one (store, part) pair; the payload shape is treated as opaque beyond the
//! single pickup-disposition field we need.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::catalog::Catalog;
use crate::error::QueryError;
use crate::http;
use crate::watch_list::WatchItem;

/// Result of one availability query.
#[derive(Debug, Clone)]
pub struct Availability {
    /// Whether the product can currently be picked up at the store.
    pub available: bool,
    /// Retailer deep link to include in notifications (cart/checkout page).
    pub deep_link: String,
}

/// A source of availability answers for watch items.
///
/// Implementations must be cheap to share across the fan-out; each call is
/// made from a blocking task with the poller's per-item timeout around it.
pub trait InventorySource: Send + Sync {
    fn check(&self, item: &WatchItem) -> Result<Availability, QueryError>;
}

/// Production inventory source: queries the storefront's
/// `/shop/fulfillment-messages` endpoint for one (store, part) pair.
pub struct FulfillmentClient {
    agent: ureq::Agent,
    catalog: Arc<Catalog>,
}

impl FulfillmentClient {
    /// `timeout` bounds each request end to end; it should not exceed the
    /// poller's per-item timeout or abandoned requests will outlive their
    /// tick for no benefit.
    pub fn new(catalog: Arc<Catalog>, timeout: Duration) -> Self {
        Self {
            agent: http::agent(timeout),
            catalog,
        }
    }

    fn query_url(&self, item: &WatchItem) -> Result<Url, QueryError> {
        let area = self
            .catalog
            .area_by_id(&item.area_id)
            .ok_or_else(|| QueryError::Malformed(format!("unknown area id '{}'", item.area_id)))?;
        let mut url = Url::parse(&area.fulfillment_url())
            .map_err(|e| QueryError::Malformed(format!("bad fulfillment URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("pl", "true")
            .append_pair("mts.0", "regular")
            .append_pair("store", &item.store_id)
            .append_pair("parts.0", &item.product_id);
        Ok(url)
    }
}

impl InventorySource for FulfillmentClient {
    fn check(&self, item: &WatchItem) -> Result<Availability, QueryError> {
        let url = self.query_url(item)?;

        let mut body = self
            .agent
            .get(url.as_str())
            .header("User-Agent", "pickup-watch")
            .header("Accept", "application/json")
            .call()
            .map_err(|e| QueryError::Transport(e.to_string()))?
            .into_body();

        let text = body
            .with_config()
            .limit(http::MAX_API_RESPONSE_SIZE)
            .read_to_string()
            .map_err(|e| QueryError::Transport(format!("failed to read response body: {}", e)))?;

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| QueryError::Malformed(format!("response is not JSON: {}", e)))?;

        let available = parse_pickup_availability(&json, &item.product_id)?;

        // area_by_id succeeded in query_url; the deep link reuses it
        let deep_link = self
            .catalog
            .area_by_id(&item.area_id)
            .map(|a| a.bag_url())
            .unwrap_or_else(|| "https://www.apple.com/shop/bag".to_string());

        Ok(Availability {
            available,
            deep_link,
        })
    }
}

/// Extract the pickup disposition for `part` from a fulfillment payload.
///
/// We query a single store, so only the first store entry is consulted.
pub(crate) fn parse_pickup_availability(
    body: &serde_json::Value,
    part: &str,
) -> Result<bool, QueryError> {
    let stores = body
        .get("body")
        .and_then(|b| b.get("content"))
        .and_then(|c| c.get("pickupMessage"))
        .and_then(|p| p.get("stores"))
        .and_then(|s| s.as_array())
        .ok_or_else(|| QueryError::Malformed("missing pickupMessage.stores".to_string()))?;

    let store = stores
        .first()
        .ok_or_else(|| QueryError::Malformed("no store entries in response".to_string()))?;

    let disposition = store
        .get("partsAvailability")
        .and_then(|p| p.get(part))
        .and_then(|a| a.get("pickupDisposition"))
        .and_then(|d| d.as_str())
        .ok_or_else(|| {
            QueryError::Malformed(format!("no pickupDisposition for part '{}'", part))
        })?;

    Ok(disposition.eq_ignore_ascii_case("available"))
}
