//! Dynamic product filters.
//!
//! Facets are derived on every request from whatever product set the caller
//! is looking at: each option title (except size) becomes a facet, and each
//! distinct option value becomes a facet value with an occurrence count. A
//! `material` facet is synthesized from the products' material field.
//!
//! Everything here is pure and synchronous.
//!
//! # Matching
//!
//! Facet ids, value ids and all comparisons use [`normalize`]: trimmed,
//! lower-cased, runs of whitespace replaced with a single hyphen. Display
//! strings keep the case of their first occurrence.

mod color;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{Price, Product};

pub use color::color_hex;

/// Facet id of the synthesized material facet.
pub const MATERIAL_FACET_ID: &str = "material";

/// Filter ids handled by [`BuiltinFilters`]; dynamic filtering skips them.
pub const BUILTIN_FILTER_IDS: &[&str] = &["price-min", "price-max", "categories", "in-stock", "on-sale"];

/// Option titles that never become facets (after normalization).
const EXCLUDED_OPTION_IDS: &[&str] = &["size"];

/// Option titles rendered as color swatches (after normalization).
const COLOR_OPTION_IDS: &[&str] = &["color", "colour"];

/// Normalize a title or value for ids and comparisons.
#[must_use]
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// How a facet is presented and selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FacetType {
    MultiSelect,
    SingleSelect,
    ColorSwatch,
}

/// One selectable value of a facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetValue {
    pub id: String,
    pub value: String,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_hex: Option<String>,
}

/// A user-filterable attribute derived from a product collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFacet {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FacetType,
    pub values: Vec<FacetValue>,
}

impl FilterFacet {
    const fn is_color(&self) -> bool {
        matches!(self.kind, FacetType::ColorSwatch)
    }
}

/// A shopper's selection for one facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    /// Any of these values (multi-select).
    Many(Vec<String>),
    /// Exactly this value (single-select); `None` means unset.
    One(Option<String>),
}

impl Selection {
    /// Whether the selection constrains nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Many(values) => values.iter().all(|v| v.trim().is_empty()),
            Self::One(value) => value.as_deref().is_none_or(|v| v.trim().is_empty()),
        }
    }

    /// Whether a normalized candidate value satisfies the selection.
    fn accepts(&self, normalized_candidate: &str) -> bool {
        match self {
            Self::Many(values) => values.iter().any(|v| normalize(v) == normalized_candidate),
            Self::One(Some(value)) => normalize(value) == normalized_candidate,
            Self::One(None) => false,
        }
    }
}

/// Facet id to selection, as parsed from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectedFilters(BTreeMap<String, Selection>);

impl SelectedFilters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the selection for a facet id (normalized).
    pub fn insert(&mut self, facet_id: &str, selection: Selection) {
        self.0.insert(normalize(facet_id), selection);
    }

    #[must_use]
    pub fn get(&self, facet_id: &str) -> Option<&Selection> {
        self.0.get(facet_id)
    }

    /// Whether no facet has a non-empty selection.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Selection::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Selection)> {
        self.0.iter().map(|(id, selection)| (id.as_str(), selection))
    }

    /// Drop selections for facet ids that are not in `facets`.
    ///
    /// Returns the ids that were dropped.
    pub fn retain_known(&mut self, facets: &[FilterFacet]) -> Vec<String> {
        let mut dropped = Vec::new();
        self.0.retain(|id, _| {
            let known = facets.iter().any(|facet| &facet.id == id);
            if !known {
                dropped.push(id.clone());
            }
            known
        });
        dropped
    }
}

impl FromIterator<(String, Selection)> for SelectedFilters {
    fn from_iter<I: IntoIterator<Item = (String, Selection)>>(iter: I) -> Self {
        let mut filters = Self::new();
        for (id, selection) in iter {
            filters.insert(&id, selection);
        }
        filters
    }
}

/// Accumulates one facet while scanning products.
struct FacetBuilder {
    facet: FilterFacet,
    value_index: HashMap<String, usize>,
}

impl FacetBuilder {
    fn new(id: String, label: &str, kind: FacetType) -> Self {
        Self {
            facet: FilterFacet {
                id,
                label: label.trim().to_string(),
                kind,
                values: Vec::new(),
            },
            value_index: HashMap::new(),
        }
    }

    fn add(&mut self, raw_value: &str) {
        let id = normalize(raw_value);
        if id.is_empty() {
            return;
        }
        if let Some(&index) = self.value_index.get(&id) {
            if let Some(existing) = self.facet.values.get_mut(index) {
                existing.count += 1;
            }
            return;
        }
        let color_hex = self.facet.is_color().then(|| color_hex(&id));
        self.value_index.insert(id.clone(), self.facet.values.len());
        self.facet.values.push(FacetValue {
            id,
            value: raw_value.trim().to_string(),
            count: 1,
            color_hex,
        });
    }

    fn finish(mut self) -> FilterFacet {
        // Stable: equal counts keep first-seen order.
        self.facet.values.sort_by(|a, b| b.count.cmp(&a.count));
        self.facet
    }
}

#[derive(Default)]
struct FacetSet {
    builders: Vec<FacetBuilder>,
    index: HashMap<String, usize>,
}

impl FacetSet {
    fn builder(&mut self, id: String, label: &str, kind: FacetType) -> Option<&mut FacetBuilder> {
        let position = match self.index.get(&id) {
            Some(&position) => position,
            None => {
                let position = self.builders.len();
                self.index.insert(id.clone(), position);
                self.builders.push(FacetBuilder::new(id, label, kind));
                position
            }
        };
        self.builders.get_mut(position)
    }

    fn finish(self) -> Vec<FilterFacet> {
        let mut facets: Vec<FilterFacet> =
            self.builders.into_iter().map(FacetBuilder::finish).collect();
        facets.sort_by(|a, b| {
            b.is_color()
                .cmp(&a.is_color())
                .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
        });
        facets
    }
}

/// Build the facet list for a product collection.
///
/// Size options are skipped. Color facets come first, the rest are sorted
/// alphabetically by label; values within a facet are sorted by descending
/// count.
#[must_use]
pub fn extract_dynamic_filters(products: &[Product]) -> Vec<FilterFacet> {
    let mut set = FacetSet::default();

    for product in products {
        for option in product.options.iter().flatten() {
            let id = normalize(&option.title);
            if id.is_empty() || EXCLUDED_OPTION_IDS.contains(&id.as_str()) {
                continue;
            }
            let kind = if COLOR_OPTION_IDS.contains(&id.as_str()) {
                FacetType::ColorSwatch
            } else {
                FacetType::MultiSelect
            };
            if let Some(builder) = set.builder(id, &option.title, kind) {
                for value in &option.values {
                    builder.add(&value.value);
                }
            }
        }

        if let Some(material) = product.material.as_deref()
            && let Some(builder) =
                set.builder(MATERIAL_FACET_ID.to_string(), "Material", FacetType::MultiSelect)
        {
            builder.add(material);
        }
    }

    set.finish()
}

/// Whether `product` satisfies the selection for one facet id.
fn product_matches(product: &Product, facet_id: &str, selection: &Selection) -> bool {
    let option_match = product.options.iter().flatten().any(|option| {
        normalize(&option.title) == facet_id
            && option
                .values
                .iter()
                .any(|value| selection.accepts(&normalize(&value.value)))
    });
    if option_match {
        return true;
    }

    facet_id == MATERIAL_FACET_ID
        && product
            .material
            .as_deref()
            .is_some_and(|material| selection.accepts(&normalize(material)))
}

/// Keep the products matching every active selection.
///
/// Empty selections and built-in filter ids are ignored, so an empty
/// `selected` returns `products` unchanged.
#[must_use]
pub fn apply_dynamic_filters(products: Vec<Product>, selected: &SelectedFilters) -> Vec<Product> {
    let active: Vec<(&str, &Selection)> = selected
        .iter()
        .filter(|(id, selection)| !BUILTIN_FILTER_IDS.contains(id) && !selection.is_empty())
        .collect();

    if active.is_empty() {
        return products;
    }

    products
        .into_iter()
        .filter(|product| {
            active
                .iter()
                .all(|(id, selection)| product_matches(product, id, selection))
        })
        .collect()
}

/// The fixed filters every listing supports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltinFilters {
    pub price_min: Option<Price>,
    pub price_max: Option<Price>,
    /// Category names; a product matches if its category is any of them.
    pub categories: Vec<String>,
    pub in_stock: bool,
    pub on_sale: bool,
}

impl BuiltinFilters {
    /// Whether no built-in filter is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.price_min.is_none()
            && self.price_max.is_none()
            && self.categories.is_empty()
            && !self.in_stock
            && !self.on_sale
    }

    fn matches(&self, product: &Product) -> bool {
        if self.price_min.is_some_and(|min| product.price < min)
            || self.price_max.is_some_and(|max| product.price > max)
        {
            return false;
        }
        if self.in_stock && !product.in_stock() {
            return false;
        }
        if self.on_sale && !product.on_sale() {
            return false;
        }
        if !self.categories.is_empty() {
            let Some(category) = product.category.as_deref().map(normalize) else {
                return false;
            };
            return self.categories.iter().any(|c| normalize(c) == category);
        }
        true
    }

    /// Keep the products passing every active built-in filter.
    #[must_use]
    pub fn apply(&self, products: Vec<Product>) -> Vec<Product> {
        if self.is_empty() {
            return products;
        }
        products.into_iter().filter(|p| self.matches(p)).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::{OptionValue, ProductId, ProductOption};

    fn option(title: &str, values: &[&str]) -> ProductOption {
        ProductOption {
            title: title.to_string(),
            values: values.iter().map(|v| OptionValue::new(*v)).collect(),
        }
    }

    fn product(id: i64, options: Option<Vec<ProductOption>>, material: Option<&str>) -> Product {
        Product {
            id: ProductId::new(id),
            handle: format!("product-{id}"),
            title: format!("Product {id}"),
            description: String::new(),
            brand: None,
            category: None,
            price: Price::from_minor(5000),
            compare_at_price: None,
            inventory_quantity: 1,
            options,
            material: material.map(str::to_string),
            variants: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn ids(products: &[Product]) -> Vec<i64> {
        products.iter().map(|p| p.id.as_i64()).collect()
    }

    fn many(values: &[&str]) -> Selection {
        Selection::Many(values.iter().map(|v| (*v).to_string()).collect())
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Navy   Blue "), "navy-blue");
        assert_eq!(normalize("Colour"), "colour");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_color_values_sorted_by_count() {
        let products = vec![product(1, Some(vec![option("Color", &["Red", "Red", "Blue"])]), None)];
        let facets = extract_dynamic_filters(&products);

        assert_eq!(facets.len(), 1);
        let color = &facets[0];
        assert_eq!(color.id, "color");
        assert_eq!(color.kind, FacetType::ColorSwatch);
        let values: Vec<(&str, u32)> =
            color.values.iter().map(|v| (v.value.as_str(), v.count)).collect();
        assert_eq!(values, vec![("Red", 2), ("Blue", 1)]);
        assert_eq!(color.values[0].color_hex.as_deref(), Some("#DC2626"));
    }

    #[test]
    fn test_size_never_becomes_a_facet() {
        let products = vec![product(
            1,
            Some(vec![option(" SIZE ", &["S", "M"]), option("Fit", &["Slim"])]),
            None,
        )];
        let facets = extract_dynamic_filters(&products);
        assert!(facets.iter().all(|f| f.id != "size"));
        assert_eq!(facets.len(), 1);
    }

    #[test]
    fn test_color_facet_is_first_then_alphabetical() {
        let products = vec![
            product(1, Some(vec![option("Pattern", &["Striped"]), option("Fit", &["Slim"])]), Some("Linen")),
            product(2, Some(vec![option("Colour", &["Sage"])]), None),
        ];
        let facets = extract_dynamic_filters(&products);
        let labels: Vec<&str> = facets.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["Colour", "Fit", "Material", "Pattern"]);
        assert_eq!(facets[0].kind, FacetType::ColorSwatch);
    }

    #[test]
    fn test_material_facet_merges_field_and_case() {
        let products = vec![
            product(1, None, Some("Cotton")),
            product(2, None, Some("cotton ")),
            product(3, None, Some("Wool")),
        ];
        let facets = extract_dynamic_filters(&products);
        assert_eq!(facets.len(), 1);
        assert_eq!(facets[0].id, MATERIAL_FACET_ID);
        assert_eq!(facets[0].values[0].value, "Cotton");
        assert_eq!(facets[0].values[0].count, 2);
        assert!(facets[0].values[0].color_hex.is_none());
    }

    #[test]
    fn test_empty_selection_is_identity() {
        let products = vec![
            product(1, Some(vec![option("Color", &["Red"])]), None),
            product(2, None, None),
        ];
        let filtered = apply_dynamic_filters(products.clone(), &SelectedFilters::new());
        assert_eq!(filtered, products);

        let mut selected = SelectedFilters::new();
        selected.insert("color", Selection::Many(Vec::new()));
        selected.insert("fit", Selection::One(None));
        assert_eq!(apply_dynamic_filters(products.clone(), &selected), products);
    }

    #[test]
    fn test_absent_value_excludes_product() {
        let products = vec![
            product(1, Some(vec![option("Color", &["Red"])]), Some("Silk")),
            product(2, Some(vec![option("Color", &["Blue"])]), None),
        ];
        let mut selected = SelectedFilters::new();
        selected.insert("color", many(&["green"]));
        assert!(apply_dynamic_filters(products, &selected).is_empty());
    }

    #[test]
    fn test_multi_select_any_match_and_normalization() {
        let products = vec![
            product(1, Some(vec![option("Color", &["Navy Blue"])]), None),
            product(2, Some(vec![option("Color", &["Red"])]), None),
            product(3, Some(vec![option("Color", &["Olive"])]), None),
        ];
        let mut selected = SelectedFilters::new();
        selected.insert("Color", many(&["navy-blue", "RED"]));
        assert_eq!(ids(&apply_dynamic_filters(products, &selected)), vec![1, 2]);
    }

    #[test]
    fn test_single_select_exact_match() {
        let products = vec![
            product(1, Some(vec![option("Fit", &["Slim"])]), None),
            product(2, Some(vec![option("Fit", &["Slim Tapered"])]), None),
        ];
        let mut selected = SelectedFilters::new();
        selected.insert("fit", Selection::One(Some("slim".to_string())));
        assert_eq!(ids(&apply_dynamic_filters(products, &selected)), vec![1]);
    }

    #[test]
    fn test_filters_compose_conjunctively() {
        let products = vec![
            product(1, Some(vec![option("Color", &["Red"])]), Some("Linen")),
            product(2, Some(vec![option("Color", &["Red"])]), Some("Wool")),
            product(3, Some(vec![option("Color", &["Blue"])]), Some("Linen")),
        ];
        let mut selected = SelectedFilters::new();
        selected.insert("color", many(&["Red"]));
        selected.insert("material", many(&["linen"]));
        assert_eq!(ids(&apply_dynamic_filters(products, &selected)), vec![1]);
    }

    #[test]
    fn test_product_without_options_matches_on_material_only() {
        let products = vec![product(1, None, Some("Cashmere")), product(2, None, None)];

        let mut by_material = SelectedFilters::new();
        by_material.insert("material", many(&["cashmere"]));
        assert_eq!(ids(&apply_dynamic_filters(products.clone(), &by_material)), vec![1]);

        let mut by_color = SelectedFilters::new();
        by_color.insert("color", many(&["Red"]));
        assert!(apply_dynamic_filters(products, &by_color).is_empty());
    }

    #[test]
    fn test_builtin_ids_are_skipped() {
        let products = vec![product(1, None, None)];
        let mut selected = SelectedFilters::new();
        selected.insert("price-min", Selection::One(Some("10".to_string())));
        selected.insert("categories", many(&["dresses"]));
        assert_eq!(apply_dynamic_filters(products.clone(), &selected), products);
    }

    #[test]
    fn test_retain_known_drops_unknown_ids() {
        let products = vec![product(1, Some(vec![option("Color", &["Red"])]), None)];
        let facets = extract_dynamic_filters(&products);
        let mut selected: SelectedFilters = [
            ("color".to_string(), many(&["Red"])),
            ("sleeve".to_string(), many(&["Long"])),
        ]
        .into_iter()
        .collect();

        let dropped = selected.retain_known(&facets);
        assert_eq!(dropped, vec!["sleeve".to_string()]);
        assert!(selected.get("color").is_some());
    }

    #[test]
    fn test_builtin_filters() {
        let mut cheap = product(1, None, None);
        cheap.price = Price::from_minor(1500);
        cheap.category = Some("Tops".to_string());
        let mut sale = product(2, None, None);
        sale.compare_at_price = Some(Price::from_minor(8000));
        sale.category = Some("Dresses".to_string());
        let mut sold_out = product(3, None, None);
        sold_out.inventory_quantity = 0;
        let products = vec![cheap, sale, sold_out];

        let price = BuiltinFilters {
            price_max: Some(Price::from_minor(2000)),
            ..Default::default()
        };
        assert_eq!(ids(&price.apply(products.clone())), vec![1]);

        let flags = BuiltinFilters {
            in_stock: true,
            on_sale: true,
            ..Default::default()
        };
        assert_eq!(ids(&flags.apply(products.clone())), vec![2]);

        let categories = BuiltinFilters {
            categories: vec!["dresses".to_string(), "tops".to_string()],
            ..Default::default()
        };
        assert_eq!(ids(&categories.apply(products.clone())), vec![1, 2]);

        assert_eq!(BuiltinFilters::default().apply(products.clone()), products);
    }
}
