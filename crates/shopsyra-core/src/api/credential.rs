//! Session-scoped request credential.
//!
//! A `RequestAuth` is created once per session and handed to both the
//! `SessionManager` (which attaches and clears the bearer token) and the
//! `ApiClient` (which reads it when building each request).

use std::sync::{Arc, RwLock};

use anyhow::Result;
use reqwest::header::{self, HeaderMap, HeaderValue};

/// Shared handle to the bearer credential attached to outgoing requests.
/// Clone is cheap - all clones see the same credential.
#[derive(Clone, Default)]
pub struct RequestAuth {
    bearer: Arc<RwLock<Option<String>>>,
}

impl RequestAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a bearer token to every subsequent request
    pub fn attach(&self, token: &str) {
        let mut guard = self.bearer.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(token.to_string());
    }

    /// Remove the bearer token
    pub fn clear(&self) {
        let mut guard = self.bearer.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    pub fn is_attached(&self) -> bool {
        self.bearer().is_some()
    }

    pub fn bearer(&self) -> Option<String> {
        self.bearer.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Build the `Authorization` header for the current credential, if any.
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.bearer() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

impl std::fmt::Debug for RequestAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAuth")
            .field("attached", &self.is_attached())
            .finish()
    }
}
