use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Categories offered by the add-product form
pub const CATEGORIES: &[&str] = &["clothing", "footwear", "accessories", "home", "beauty", "other"];

/// Default category for new products
pub const DEFAULT_CATEGORY: &str = "clothing";

/// Size options offered for variants
pub const SIZE_OPTIONS: &[&str] = &["XS", "S", "M", "L", "XL", "XXL"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", default, deserialize_with = "null_as_default")]
    pub id: String,
    /// ID of the owning seller
    #[serde(default, deserialize_with = "null_as_default")]
    pub seller: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stock: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sold_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub img_urls: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variants: Vec<Variant>,
}

impl Product {
    pub fn revenue(&self) -> f64 {
        self.price * self.sold_count as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stock: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductsResponse {
    #[serde(default)]
    pub products: Vec<Product>,
}

/// Payload for `/product/createProduct`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub seller: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub stock: i64,
    pub variants: Vec<Variant>,
    pub img_urls: Vec<String>,
}

impl NewProduct {
    pub fn validate(&self) -> Result<()> {
        if self.seller.trim().is_empty() {
            bail!("Missing seller - please sign in again");
        }
        if self.name.trim().is_empty() {
            bail!("Product name is required");
        }
        if !self.price.is_finite() || self.price < 0.0 {
            bail!("Price must be a non-negative number");
        }
        if self.stock < 0 {
            bail!("Stock must be a non-negative number");
        }
        Ok(())
    }
}

/// Dashboard totals for one seller's products
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSummary {
    pub total_products: usize,
    pub total_stock: i64,
    pub total_sold: i64,
    pub revenue: f64,
}

impl ProductSummary {
    pub fn from_products(products: &[Product]) -> Self {
        products.iter().fold(Self::default(), |mut acc, p| {
            acc.total_products += 1;
            acc.total_stock += p.stock;
            acc.total_sold += p.sold_count;
            acc.revenue += p.revenue();
            acc
        })
    }
}

/// Keep only the products owned by `seller_id`.
pub fn owned_by<'a>(products: &'a [Product], seller_id: &str) -> Vec<&'a Product> {
    products.iter().filter(|p| p.seller == seller_id).collect()
}

/// Format an amount in rupees with Indian digit grouping, e.g. `₹12,34,567`.
/// Paise are shown only when non-zero.
pub fn format_inr(value: f64) -> String {
    let negative = value < 0.0;
    let paise_total = (value.abs() * 100.0).round() as u64;
    let rupees = paise_total / 100;
    let paise = paise_total % 100;

    let digits = rupees.to_string();
    let grouped = if digits.len() <= 3 {
        digits
    } else {
        let (head, tail) = digits.split_at(digits.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut end = head.len();
        while end > 0 {
            let start = end.saturating_sub(2);
            groups.push(&head[start..end]);
            end = start;
        }
        groups.reverse();
        format!("{},{}", groups.join(","), tail)
    };

    let sign = if negative && paise_total > 0 { "-" } else { "" };
    if paise == 0 {
        format!("{}₹{}", sign, grouped)
    } else {
        format!("{}₹{}.{:02}", sign, grouped, paise)
    }
}
