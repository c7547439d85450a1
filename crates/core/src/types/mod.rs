//! Core types for Atelier.
//!
//! This module provides type-safe wrappers and the catalog entities served
//! by the storefront.

pub mod id;
pub mod price;
pub mod product;
pub mod sort;

pub use id::*;
pub use price::{Price, PriceError};
pub use product::{Collection, OptionValue, Product, ProductOption, SelectedOption, Variant};
pub use sort::{ProductSort, UnknownSort};
