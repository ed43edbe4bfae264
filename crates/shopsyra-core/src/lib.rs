//! Shopsyra seller client core.
//!
//! This crate holds everything the seller client needs below the UI:
//!
//! - `api`: REST client for the storefront backend and the session-scoped
//!   request credential
//! - `auth`: session lifecycle (`SessionManager`), durable stores, OTP input
//!   checks
//! - `navigation`: the gate that keeps the visible screen group in step with
//!   the session
//! - `models`: seller and product types
//! - `config`: client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod navigation;

pub use api::{ApiClient, ApiError, RequestAuth};
pub use auth::{KeyValueStore, RestoreOutcome, Session, SessionManager};
pub use config::Config;
pub use navigation::{NavigationGate, Route};
