//! REST API client module for the Shopsyra storefront backend.
//!
//! This module provides the `ApiClient` for the OTP sign-in flow, seller
//! accounts, products and image uploads, and `RequestAuth`, the
//! session-scoped bearer credential the client attaches to each request.

pub mod client;
pub mod credential;
pub mod error;

pub use client::{ApiClient, OtpSent, OtpVerification, MAX_PRODUCT_IMAGES};
pub use credential::RequestAuth;
pub use error::ApiError;
