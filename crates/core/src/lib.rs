//! Atelier Core - Shared catalog types and the facet filter engine.
//!
//! This crate provides the types used across the Atelier workspace:
//! - `storefront` - Public JSON API (products, search, collections)
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no caching. Handlers call into [`facets`] after the
//! catalog has been loaded.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, and catalog entities
//! - [`facets`] - Dynamic facet extraction and product filtering

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod facets;
pub mod types;

pub use types::*;
