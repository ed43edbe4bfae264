//! API client for the Shopsyra storefront backend.
//!
//! This module provides the `ApiClient` struct for the OTP sign-in flow,
//! seller accounts, the product catalog and image uploads. The bearer
//! credential is read from a shared `RequestAuth` when each request is built.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::{header, multipart, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::otp::{normalize_mobile, validate_otp};
use crate::auth::SessionVerifier;
use crate::config::Config;
use crate::models::{NewProduct, NewSeller, Product, ProductsResponse, Seller, SellerEnvelope};

use super::{ApiError, RequestAuth};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of images attached to one product
pub const MAX_PRODUCT_IMAGES: usize = 6;

/// Multipart field name expected by the upload endpoint
const UPLOAD_FIELD: &str = "image";

#[derive(Debug, Serialize)]
struct SendOtpRequest<'a> {
    mobile: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyOtpRequest<'a> {
    mobile: &'a str,
    otp: &'a str,
}

/// Response from `/otp/send-otp`
#[derive(Debug, Clone, Deserialize)]
pub struct OtpSent {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response from `/otp/verify-otp`
#[derive(Debug, Clone, Deserialize)]
pub struct OtpVerification {
    #[serde(default)]
    pub success: bool,
    /// Bearer token, when the backend issues one on verification
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedProduct {
    #[serde(default)]
    product: Option<Product>,
}

/// API client for the storefront backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling,
/// and clones share the same `RequestAuth`.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: RequestAuth,
}

impl ApiClient {
    /// Create a client from the application config
    pub fn new(config: &Config, auth: RequestAuth) -> Result<Self> {
        Self::with_base_url(&config.api_base_url(), config.request_timeout(), auth)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration, auth: RequestAuth) -> Result<Self> {
        let mut defaults = header::HeaderMap::new();
        defaults.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(defaults)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// The credential handle this client reads from
    pub fn auth(&self) -> &RequestAuth {
        &self.auth
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a GET and return the successful response, unread.
    async fn send_get(&self, url: &str) -> Result<reqwest::Response> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .headers(self.auth.headers()?)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        Self::check_response(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        self.send_get(&url)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let response = self
            .client
            .post(&url)
            .headers(self.auth.headers()?)
            .json(body)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send POST request to {}", url))?;

        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    // ===== OTP Sign-in =====

    /// Request a one-time code for a mobile number
    pub async fn send_otp(&self, mobile: &str) -> Result<OtpSent> {
        let mobile = normalize_mobile(mobile)?;
        let sent: OtpSent = self
            .post("/otp/send-otp", &SendOtpRequest { mobile: &mobile })
            .await?;
        info!(success = sent.success, "OTP requested");
        Ok(sent)
    }

    /// Verify a one-time code for a mobile number
    pub async fn verify_otp(&self, mobile: &str, otp: &str) -> Result<OtpVerification> {
        let mobile = normalize_mobile(mobile)?;
        let otp = validate_otp(otp)?;
        let verification: OtpVerification = self
            .post("/otp/verify-otp", &VerifyOtpRequest { mobile: &mobile, otp: &otp })
            .await?;
        info!(
            success = verification.success,
            issued_token = verification.token.is_some(),
            "OTP verified"
        );
        Ok(verification)
    }

    // ===== Sellers =====

    /// Look up a seller by mobile number. A 404 means no account exists.
    pub async fn find_seller(&self, mobile: &str) -> Result<Option<Seller>> {
        let mobile = normalize_mobile(mobile)?;
        match self.get::<SellerEnvelope>(&format!("/seller/{}", mobile)).await {
            Ok(envelope) => Ok(envelope.seller),
            Err(e) if matches!(e.downcast_ref::<ApiError>(), Some(ApiError::NotFound(_))) => {
                debug!("No seller registered for mobile");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Register a new seller account
    pub async fn create_seller(&self, seller: &NewSeller) -> Result<Option<Seller>> {
        seller.validate()?;
        let envelope: SellerEnvelope = self.post("/seller/createSeller", seller).await?;
        Ok(envelope.seller)
    }

    /// Fetch the profile of the seller the current credential belongs to
    pub async fn fetch_me(&self) -> Result<Option<Seller>> {
        let envelope: SellerEnvelope = self.get("/seller/me").await?;
        Ok(envelope.seller)
    }

    /// Fetch `/seller/me` and return its `seller` object untouched.
    ///
    /// Only the status and the transport can fail this call. A 2xx body that
    /// is not JSON, or that carries no `seller`, yields `None`.
    pub async fn fetch_me_profile(&self) -> Result<Option<serde_json::Value>> {
        let url = self.url("/seller/me");
        let body = self
            .send_get(&url)
            .await?
            .text()
            .await
            .map_err(ApiError::from)
            .context("Failed to read profile response")?;

        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(mut value) => Ok(value
                .get_mut("seller")
                .map(serde_json::Value::take)
                .filter(|seller| !seller.is_null())),
            Err(e) => {
                warn!(error = %e, "Profile response is not JSON");
                Ok(None)
            }
        }
    }

    // ===== Products =====

    pub async fn fetch_products(&self) -> Result<Vec<Product>> {
        let response: ProductsResponse = self.get("/product/getProducts").await?;
        debug!(count = response.products.len(), "Fetched products");
        Ok(response.products)
    }

    pub async fn create_product(&self, product: &NewProduct) -> Result<Option<Product>> {
        product.validate()?;
        let created: CreatedProduct = self.post("/product/createProduct", product).await?;
        info!(name = %product.name, "Product created");
        Ok(created.product)
    }

    // ===== Uploads =====

    /// Upload one image and return its public URL
    pub async fn upload_image(&self, bytes: Vec<u8>, file_name: &str) -> Result<String> {
        let url = self.url("/upload/uploadimage");
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(image_mime(file_name))?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&url)
            .headers(self.auth.headers()?)
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to upload {}", file_name))?;

        let response = Self::check_response(response).await?;
        let uploaded: UploadResponse = response
            .json()
            .await
            .context("Failed to parse upload response")?;

        match uploaded.url {
            Some(url) if !url.is_empty() => Ok(url),
            _ => bail!("Upload succeeded but no image URL returned"),
        }
    }

    /// Upload several images concurrently, preserving order.
    /// Fails as a whole if any upload fails.
    pub async fn upload_images(&self, images: Vec<(String, Vec<u8>)>) -> Result<Vec<String>> {
        if images.len() > MAX_PRODUCT_IMAGES {
            bail!("Max {} images allowed", MAX_PRODUCT_IMAGES);
        }
        let uploads = images
            .into_iter()
            .map(|(name, bytes)| async move { self.upload_image(bytes, &name).await });
        try_join_all(uploads).await
    }
}

#[async_trait]
impl SessionVerifier for ApiClient {
    async fn verify(&self) -> Result<Option<serde_json::Value>> {
        self.fetch_me_profile().await
    }
}

/// Content type for an image file, by extension. Defaults to JPEG.
fn image_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "image/jpeg",
    }
}
