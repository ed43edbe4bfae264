use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Default account type for sign-ups from the seller app
pub const DEFAULT_USER_TYPE: &str = "seller";

/// Seller profile as returned by `/seller/me` and `/seller/{mobile}`.
///
/// Fields the client does not know about are kept in `extra` so the cached
/// profile round-trips everything the server sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seller {
    #[serde(rename = "_id", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mobile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gst_number: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_verified: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Seller {
    /// Up to two initials from the seller's name, for avatars.
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }

    /// "Member since" date in long form, e.g. "March 5, 2024".
    pub fn member_since(&self) -> Option<String> {
        self.created_at.map(|d| d.format("%B %-d, %Y").to_string())
    }

    pub fn status_display(&self) -> &'static str {
        match (self.is_active, self.is_verified) {
            (true, true) => "Active, verified",
            (true, false) => "Active, unverified",
            (false, _) => "Inactive",
        }
    }
}

/// Response wrapper used by the seller endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct SellerEnvelope {
    #[serde(default)]
    pub seller: Option<Seller>,
}

/// Sign-up payload for `/seller/createSeller`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSeller {
    pub mobile: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub user_type: String,
}

impl NewSeller {
    /// Build a trimmed sign-up payload, dropping blank optional fields.
    pub fn new(mobile: &str, name: &str, email: Option<&str>, address: Option<&str>) -> Self {
        let non_blank = |s: Option<&str>| {
            s.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            mobile: mobile.trim().to_string(),
            name: name.trim().to_string(),
            email: non_blank(email),
            address: non_blank(address),
            user_type: DEFAULT_USER_TYPE.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.mobile.is_empty() {
            bail!("Mobile number is required");
        }
        if self.name.is_empty() {
            bail!("Name is required");
        }
        if let Some(ref email) = self.email {
            if !is_plausible_email(email) {
                bail!("Please enter a valid email");
            }
        }
        Ok(())
    }
}

/// Loose `local@domain.tld` check with no whitespace anywhere.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
