//! Data models for Shopsyra seller entities.
//!
//! - `Seller`, `NewSeller`: seller profile and sign-up payload
//! - `Product`, `NewProduct`, `Variant`: catalog entries and creation payload
//! - `ProductSummary`: dashboard totals for a seller's products

pub mod product;
pub mod seller;

pub use product::{format_inr, owned_by, NewProduct, Product, ProductSummary, ProductsResponse, Variant};
pub use seller::{NewSeller, Seller, SellerEnvelope};

use serde::{Deserialize, Deserializer};

/// Read `null` the same as a missing field. The backend nulls out numbers
/// and flags it has no value for.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
