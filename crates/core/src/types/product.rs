//! Catalog entities as served by the storefront API.
//!
//! These are read-only snapshots of rows owned by the catalog store. Field
//! names serialize in camelCase to match the JSON contract of the storefront
//! frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{CollectionId, ProductId, VariantId};
use super::price::Price;
use crate::facets::normalize;

/// A single value of a product option (e.g. "Red" for "Color").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValue {
    pub value: String,
}

impl OptionValue {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// A configurable product option such as "Size" or "Color".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    pub title: String,
    #[serde(default)]
    pub values: Vec<OptionValue>,
}

/// One `(option name, option value)` pair carried by a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOption {
    pub name: String,
    pub value: String,
}

/// A purchasable SKU of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: VariantId,
    pub sku: Option<String>,
    pub title: String,
    pub price: Price,
    pub inventory_quantity: i32,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
}

impl Variant {
    /// Whether this variant carries `name = value` (normalized comparison).
    #[must_use]
    pub fn has_option(&self, name: &str, value: &str) -> bool {
        let name = normalize(name);
        let value = normalize(value);
        self.selected_options
            .iter()
            .any(|opt| normalize(&opt.name) == name && normalize(&opt.value) == value)
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    /// Unique, URL-safe slug.
    pub handle: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub price: Price,
    pub compare_at_price: Option<Price>,
    pub inventory_quantity: i32,
    /// `None` when the product was imported without option metadata.
    pub options: Option<Vec<ProductOption>>,
    pub material: Option<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Whether any stock is on hand.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.inventory_quantity > 0
    }

    /// Whether the product is discounted against its compare-at price.
    #[must_use]
    pub fn on_sale(&self) -> bool {
        self.compare_at_price.is_some_and(|compare| compare > self.price)
    }

    /// Find the variant matching every requested `(name, value)` pair.
    ///
    /// Linear scan in variant order; the first full match wins. An empty
    /// selection matches nothing.
    #[must_use]
    pub fn find_variant(&self, selection: &[(String, String)]) -> Option<&Variant> {
        if selection.is_empty() {
            return None;
        }
        self.variants.iter().find(|variant| {
            selection
                .iter()
                .all(|(name, value)| variant.has_option(name, value))
        })
    }
}

/// A merchandised group of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: CollectionId,
    pub handle: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub product_count: i64,
}
