//! Retail catalog reference data: areas, stores, and products.
//!
//! The catalog maps each sales area to the retail stores and the product
//! part numbers that can be watched there, and resolves the display titles
//! shown in selection widgets back to the identifiers the inventory API
//! expects. The data is loaded once (built-in dataset embedded at compile
//! time, or caller-supplied JSON) and never mutated afterwards, so it is
//! safe to read concurrently from any thread.

use serde::Deserialize;

use crate::error::EngineError;

/// Built-in catalog dataset shipped with the crate.
const BUILTIN_DATA: &str = include_str!("catalog_data.json");

/// A retail store within an area, identified by its store code (e.g. "R409").
#[derive(Debug, Clone, Deserialize)]
pub struct Store {
    pub id: String,
    pub title: String,
}

/// A purchasable product within an area, identified by its part number
/// (e.g. "MYND3LL/A"). Part numbers are area-specific.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
}

/// A sales area: a storefront locale with its own stores and part numbers.
#[derive(Debug, Clone, Deserialize)]
pub struct Area {
    pub id: String,
    pub title: String,
    /// Path segment inserted after the storefront host, e.g. "/hk-zh".
    /// Empty for the US storefront.
    pub locale_path: String,
    pub stores: Vec<Store>,
    pub products: Vec<Product>,
}

impl Area {
    /// Look up a store in this area by display title.
    pub fn store_by_title(&self, title: &str) -> Option<&Store> {
        self.stores.iter().find(|s| s.title == title)
    }

    /// Look up a product in this area by display title.
    pub fn product_by_title(&self, title: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.title == title)
    }

    /// URL of this area's fulfillment (pickup availability) endpoint.
    pub fn fulfillment_url(&self) -> String {
        format!(
            "https://www.apple.com{}/shop/fulfillment-messages",
            self.locale_path
        )
    }

    /// Deep link to this area's cart page, included in alert notifications.
    pub fn bag_url(&self) -> String {
        format!("https://www.apple.com{}/shop/bag", self.locale_path)
    }
}

/// Read-only catalog of all known areas.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    areas: Vec<Area>,
}

impl Catalog {
    /// The catalog dataset embedded in the crate.
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_DATA).expect("embedded catalog data is valid JSON")
    }

    /// Parse a catalog from caller-supplied JSON.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Ordered area titles for selection widgets.
    pub fn area_titles(&self) -> Vec<String> {
        self.areas.iter().map(|a| a.title.clone()).collect()
    }

    /// Ordered store titles for the given area title.
    ///
    /// Returns an empty list for an unknown area (the UI clears dependent
    /// selectors rather than erroring while the user is mid-selection).
    pub fn store_titles_for(&self, area_title: &str) -> Vec<String> {
        self.resolve_area(area_title)
            .map(|a| a.stores.iter().map(|s| s.title.clone()).collect())
            .unwrap_or_default()
    }

    /// Ordered product titles for the given area title.
    pub fn product_titles_for(&self, area_title: &str) -> Vec<String> {
        self.resolve_area(area_title)
            .map(|a| a.products.iter().map(|p| p.title.clone()).collect())
            .unwrap_or_default()
    }

    /// Resolve an area by display title.
    pub fn resolve_area(&self, title: &str) -> Result<&Area, EngineError> {
        self.areas
            .iter()
            .find(|a| a.title == title)
            .ok_or_else(|| EngineError::NotFound(format!("unknown area '{}'", title)))
    }

    /// Resolve an area by identifier.
    pub fn area_by_id(&self, id: &str) -> Option<&Area> {
        self.areas.iter().find(|a| a.id == id)
    }
}
