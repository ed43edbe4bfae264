//! Session lifecycle: restore at startup, establish after sign-in, sign out.
//!
//! `SessionManager` is the single source of truth for whether this
//! installation is signed in. It keeps the durable store, the request
//! credential and the in-memory `Session` in agreement, and publishes every
//! change on a `watch` channel for the navigation gate and other observers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::KeyValueStore;
use crate::api::RequestAuth;
use crate::models::Seller;

/// Durable store key holding the bearer token
pub const AUTH_TOKEN_KEY: &str = "shopsyra_seller_auth_token";

/// Durable store key holding the cached seller profile (JSON)
pub const SELLER_KEY: &str = "seller";

/// In-memory session state.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    is_loading: bool,
}

impl Session {
    /// State at process start, before the restore attempt finishes
    fn starting() -> Self {
        Self {
            token: None,
            is_loading: true,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("is_loading", &self.is_loading)
            .finish()
    }
}

/// Confirms that the currently attached credential is still accepted.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// Returns the raw seller profile the credential belongs to, if the
    /// server sent one. Any error means the credential is unusable.
    async fn verify(&self) -> Result<Option<serde_json::Value>>;
}

/// How a restore attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing persisted; no network call was made
    NoSavedToken,
    /// Saved token verified and applied
    Restored,
    /// Saved token rejected (or unreadable) and wiped
    Invalidated,
    /// `set_session` or `logout` ran while verification was in flight
    Superseded,
    /// The manager was torn down before the attempt finished
    Discarded,
    /// A restore had already been started for this manager
    AlreadyStarted,
}

struct Shared<S, V> {
    store: S,
    verifier: V,
    auth: RequestAuth,
    session: watch::Sender<Session>,
    /// Bumped by every `set_session` and `logout`. Also serializes all
    /// writes to the store, the credential and the session.
    epoch: Mutex<u64>,
    alive: AtomicBool,
    restore_started: AtomicBool,
}

impl<S: KeyValueStore, V: SessionVerifier> Shared<S, V> {
    async fn restore(&self) -> RestoreOutcome {
        if self.restore_started.swap(true, Ordering::SeqCst) {
            debug!("Restore already started, ignoring");
            return RestoreOutcome::AlreadyStarted;
        }

        let (saved_token, started_epoch) = {
            let epoch = self.epoch.lock().unwrap_or_else(|e| e.into_inner());
            match self.store.get(AUTH_TOKEN_KEY) {
                Ok(Some(token)) if !token.is_empty() => {
                    self.auth.attach(&token);
                    (token, *epoch)
                }
                Ok(_) => {
                    debug!("No saved session");
                    return self.finish(RestoreOutcome::NoSavedToken, None);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read saved session");
                    return self.invalidate();
                }
            }
        };

        debug!("Verifying saved session");
        let verified = self.verifier.verify().await;

        let epoch = self.epoch.lock().unwrap_or_else(|e| e.into_inner());
        if *epoch != started_epoch {
            info!("Session changed during restore, keeping the newer state");
            return self.finish(RestoreOutcome::Superseded, None);
        }

        match verified.and_then(|seller| self.cache_profile(seller.as_ref())) {
            Ok(()) => {
                info!("Saved session restored");
                self.finish(RestoreOutcome::Restored, Some(Some(saved_token)))
            }
            Err(e) => {
                warn!(error = %e, "Saved session rejected, signing out");
                self.invalidate()
            }
        }
    }

    /// Cache the profile exactly as the server sent it.
    fn cache_profile(&self, seller: Option<&serde_json::Value>) -> Result<()> {
        if let Some(seller) = seller {
            self.store
                .set(SELLER_KEY, &seller.to_string())
                .context("Failed to cache seller profile")?;
        }
        Ok(())
    }

    /// Wipe the persisted session after a failed restore. Never fails.
    fn invalidate(&self) -> RestoreOutcome {
        self.auth.clear();
        if let Err(e) = self.store.remove_many(&[AUTH_TOKEN_KEY, SELLER_KEY]) {
            warn!(error = %e, "Failed to clear saved session");
        }
        self.finish(RestoreOutcome::Invalidated, Some(None))
    }

    /// End the loading phase, optionally replacing the token. Skipped
    /// entirely once the owning manager is gone.
    fn finish(&self, outcome: RestoreOutcome, token: Option<Option<String>>) -> RestoreOutcome {
        if !self.alive.load(Ordering::SeqCst) {
            debug!(?outcome, "Manager torn down, discarding restore result");
            return RestoreOutcome::Discarded;
        }
        self.session.send_modify(|session| {
            if let Some(token) = token {
                session.token = token;
            }
            session.is_loading = false;
        });
        outcome
    }
}

/// Owns the authentication token for one running client.
///
/// Dropping the manager marks it torn down: a restore still in flight will
/// not touch the session or notify observers when it completes.
pub struct SessionManager<S, V> {
    shared: Arc<Shared<S, V>>,
}

impl<S, V> SessionManager<S, V>
where
    S: KeyValueStore + 'static,
    V: SessionVerifier + 'static,
{
    /// Create a manager in the loading state. Call `restore` (or use
    /// `start`) to leave it.
    pub fn new(store: S, verifier: V, auth: RequestAuth) -> Self {
        let (session, _) = watch::channel(Session::starting());
        Self {
            shared: Arc::new(Shared {
                store,
                verifier,
                auth,
                session,
                epoch: Mutex::new(0),
                alive: AtomicBool::new(true),
                restore_started: AtomicBool::new(false),
            }),
        }
    }

    /// Create a manager and immediately begin restoring the saved session
    /// in the background.
    pub fn start(store: S, verifier: V, auth: RequestAuth) -> (Self, JoinHandle<RestoreOutcome>) {
        let manager = Self::new(store, verifier, auth);
        let handle = manager.spawn_restore();
        (manager, handle)
    }

    /// Restore the persisted session. Only the first call per manager does
    /// anything; later calls return `AlreadyStarted`.
    pub async fn restore(&self) -> RestoreOutcome {
        self.shared.restore().await
    }

    /// Run `restore` on the tokio runtime.
    pub fn spawn_restore(&self) -> JoinHandle<RestoreOutcome> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.restore().await })
    }

    /// Establish a session after an interactive sign-in.
    ///
    /// The token is persisted, then attached to requests, then published.
    /// A store failure is returned and leaves everything unchanged.
    pub fn set_session(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            bail!("Session token must not be empty");
        }
        let shared = &self.shared;
        let mut epoch = shared.epoch.lock().unwrap_or_else(|e| e.into_inner());
        shared
            .store
            .set(AUTH_TOKEN_KEY, token)
            .context("Failed to persist session token")?;
        shared.auth.attach(token);
        *epoch += 1;
        shared
            .session
            .send_modify(|session| session.token = Some(token.to_string()));
        info!("Session established");
        Ok(())
    }

    /// Sign out. Calling this while already signed out is a no-op with the
    /// same end state.
    pub fn logout(&self) -> Result<()> {
        let shared = &self.shared;
        let mut epoch = shared.epoch.lock().unwrap_or_else(|e| e.into_inner());
        shared
            .store
            .remove_many(&[AUTH_TOKEN_KEY, SELLER_KEY])
            .context("Failed to clear saved session")?;
        shared.auth.clear();
        *epoch += 1;
        let changed = shared.session.send_if_modified(|session| session.token.take().is_some());
        if changed {
            info!("Signed out");
        } else {
            debug!("Logout while already signed out");
        }
        Ok(())
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Session {
        self.shared.session.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.shared.session.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.session.borrow().is_loading()
    }

    /// Observe every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.shared.session.subscribe()
    }

    /// The credential handle shared with the API client
    pub fn request_auth(&self) -> &RequestAuth {
        &self.shared.auth
    }

    /// The cached seller profile written at restore or sign-in
    pub fn cached_seller(&self) -> Result<Option<Seller>> {
        match self.shared.store.get(SELLER_KEY)? {
            Some(json) => {
                let seller = serde_json::from_str(&json).context("Failed to parse cached seller profile")?;
                Ok(Some(seller))
            }
            None => Ok(None),
        }
    }

    /// Cache a seller profile for other screens
    pub fn cache_seller(&self, seller: &Seller) -> Result<()> {
        let json = serde_json::to_string(seller)?;
        self.shared
            .store
            .set(SELLER_KEY, &json)
            .context("Failed to cache seller profile")
    }
}

impl<S, V> Drop for SessionManager<S, V> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::auth::store::MemoryStore;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn seller() -> Seller {
        serde_json::from_str(
            r#"{"_id":"s1","name":"Asha Rao","mobile":"+919876543210","isVerified":true,"isActive":true}"#,
        )
        .unwrap()
    }

    /// Verifier that accepts or rejects, optionally pausing until released.
    struct StubVerifier {
        accept: bool,
        auth: RequestAuth,
        calls: Arc<AtomicUsize>,
        seen_bearer: Arc<Mutex<Option<String>>>,
        pause: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl StubVerifier {
        fn new(accept: bool, auth: &RequestAuth) -> Self {
            Self {
                accept,
                auth: auth.clone(),
                calls: Arc::new(AtomicUsize::new(0)),
                seen_bearer: Arc::new(Mutex::new(None)),
                pause: None,
            }
        }

        /// Returns (entered, release) handles
        fn paused(mut self) -> (Self, Arc<Notify>, Arc<Notify>) {
            let entered = Arc::new(Notify::new());
            let release = Arc::new(Notify::new());
            self.pause = Some((entered.clone(), release.clone()));
            (self, entered, release)
        }
    }

    #[async_trait]
    impl SessionVerifier for StubVerifier {
        async fn verify(&self) -> Result<Option<serde_json::Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_bearer.lock().unwrap() = self.auth.bearer();
            if let Some((entered, release)) = &self.pause {
                entered.notify_one();
                release.notified().await;
            }
            if self.accept {
                Ok(Some(serde_json::to_value(seller())?))
            } else {
                Err(ApiError::Unauthorized.into())
            }
        }
    }

    /// Store whose writes always fail
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            bail!("disk full")
        }
        fn remove_many(&self, _keys: &[&str]) -> Result<()> {
            bail!("disk full")
        }
    }

    fn saved_store(token: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.set(AUTH_TOKEN_KEY, token).unwrap();
        store
    }

    #[test]
    fn test_new_manager_is_loading() {
        let auth = RequestAuth::new();
        let manager = SessionManager::new(MemoryStore::new(), StubVerifier::new(true, &auth), auth);
        assert!(manager.is_loading());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_without_saved_token() {
        let auth = RequestAuth::new();
        let verifier = StubVerifier::new(true, &auth);
        let calls = verifier.calls.clone();
        let manager = SessionManager::new(MemoryStore::new(), verifier, auth);

        assert_eq!(manager.restore().await, RestoreOutcome::NoSavedToken);
        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restore_treats_empty_token_as_absent() {
        let auth = RequestAuth::new();
        let verifier = StubVerifier::new(true, &auth);
        let calls = verifier.calls.clone();
        let manager = SessionManager::new(saved_store(""), verifier, auth);

        assert_eq!(manager.restore().await, RestoreOutcome::NoSavedToken);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restore_with_valid_token() {
        let store = saved_store("saved-token");
        let auth = RequestAuth::new();
        let verifier = StubVerifier::new(true, &auth);
        let seen = verifier.seen_bearer.clone();
        let manager = SessionManager::new(store.clone(), verifier, auth.clone());

        assert_eq!(manager.restore().await, RestoreOutcome::Restored);
        assert!(manager.is_authenticated());
        assert!(!manager.is_loading());
        assert_eq!(manager.session().token(), Some("saved-token"));

        // The verification request carried the saved credential
        assert_eq!(seen.lock().unwrap().as_deref(), Some("saved-token"));
        assert_eq!(auth.bearer().as_deref(), Some("saved-token"));

        let cached = manager.cached_seller().unwrap().unwrap();
        assert_eq!(cached.id, "s1");
    }

    #[tokio::test]
    async fn test_restore_with_rejected_token() {
        let store = saved_store("expired");
        store.set(SELLER_KEY, r#"{"_id":"old"}"#).unwrap();
        let auth = RequestAuth::new();
        let manager = SessionManager::new(store.clone(), StubVerifier::new(false, &auth), auth.clone());

        assert_eq!(manager.restore().await, RestoreOutcome::Invalidated);
        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert!(!auth.is_attached());
        assert_eq!(store.get(AUTH_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(SELLER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_runs_once() {
        let auth = RequestAuth::new();
        let verifier = StubVerifier::new(true, &auth);
        let calls = verifier.calls.clone();
        let manager = SessionManager::new(saved_store("tok"), verifier, auth);

        assert_eq!(manager.restore().await, RestoreOutcome::Restored);
        manager.logout().unwrap();
        assert_eq!(manager.restore().await, RestoreOutcome::AlreadyStarted);
        assert!(!manager.is_authenticated());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_set_session_persists_before_publishing() {
        let store = Arc::new(MemoryStore::new());
        let auth = RequestAuth::new();
        let manager = SessionManager::new(store.clone(), StubVerifier::new(true, &auth), auth.clone());
        manager.restore().await;

        manager.set_session("abc").unwrap();
        assert!(manager.is_authenticated());
        assert_eq!(store.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        assert_eq!(auth.bearer().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_set_session_rejects_empty_token() {
        let auth = RequestAuth::new();
        let manager = SessionManager::new(MemoryStore::new(), StubVerifier::new(true, &auth), auth);
        manager.restore().await;
        assert!(manager.set_session("").is_err());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_set_session_propagates_store_failure() {
        let auth = RequestAuth::new();
        let manager = SessionManager::new(ReadOnlyStore, StubVerifier::new(true, &auth), auth.clone());
        manager.restore().await;

        let err = manager.set_session("abc").unwrap_err();
        assert!(format!("{:#}", err).contains("disk full"));
        assert!(!manager.is_authenticated());
        assert!(!auth.is_attached());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let auth = RequestAuth::new();
        let manager = SessionManager::new(store.clone(), StubVerifier::new(true, &auth), auth.clone());
        manager.restore().await;

        manager.set_session("abc").unwrap();
        manager.cache_seller(&seller()).unwrap();
        let mut rx = manager.subscribe();

        manager.logout().unwrap();
        assert!(!manager.is_authenticated());
        assert!(!auth.is_attached());
        assert!(store.is_empty());
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        manager.logout().unwrap();
        assert!(!manager.is_authenticated());
        assert!(store.is_empty());
        // No notification for a logout that changed nothing
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_logout_propagates_store_failure() {
        let auth = RequestAuth::new();
        let manager = SessionManager::new(ReadOnlyStore, StubVerifier::new(true, &auth), auth);
        manager.restore().await;
        assert!(manager.logout().is_err());
    }

    #[tokio::test]
    async fn test_subscribers_see_restore_result() {
        let auth = RequestAuth::new();
        let manager = SessionManager::new(saved_store("tok"), StubVerifier::new(true, &auth), auth);
        let mut rx = manager.subscribe();
        assert!(rx.borrow().is_loading());

        manager.spawn_restore().await.unwrap();
        rx.changed().await.unwrap();
        let session = rx.borrow_and_update().clone();
        assert!(!session.is_loading());
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_teardown_discards_restore_result() {
        let auth = RequestAuth::new();
        let (verifier, entered, release) = StubVerifier::new(true, &auth).paused();
        let manager = SessionManager::new(saved_store("tok"), verifier, auth);
        let rx = manager.subscribe();

        let handle = manager.spawn_restore();
        entered.notified().await;
        drop(manager);
        release.notify_one();

        assert_eq!(handle.await.unwrap(), RestoreOutcome::Discarded);
        let session = rx.borrow().clone();
        assert!(session.is_loading());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_during_restore_wins() {
        let store = saved_store("tok");
        let auth = RequestAuth::new();
        let (verifier, entered, release) = StubVerifier::new(true, &auth).paused();
        let manager = SessionManager::new(store.clone(), verifier, auth.clone());

        let handle = manager.spawn_restore();
        entered.notified().await;
        manager.logout().unwrap();
        release.notify_one();

        assert_eq!(handle.await.unwrap(), RestoreOutcome::Superseded);
        assert!(!manager.is_authenticated());
        assert!(!manager.is_loading());
        assert!(!auth.is_attached());
        assert_eq!(store.get(SELLER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_in_during_failing_restore_wins() {
        let store = saved_store("stale");
        let auth = RequestAuth::new();
        let (verifier, entered, release) = StubVerifier::new(false, &auth).paused();
        let manager = SessionManager::new(store.clone(), verifier, auth.clone());

        let handle = manager.spawn_restore();
        entered.notified().await;
        manager.set_session("fresh").unwrap();
        release.notify_one();

        assert_eq!(handle.await.unwrap(), RestoreOutcome::Superseded);
        assert_eq!(manager.session().token(), Some("fresh"));
        assert_eq!(store.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("fresh"));
        assert_eq!(auth.bearer().as_deref(), Some("fresh"));
    }

    #[test]
    fn test_session_debug_hides_token() {
        let session = Session {
            token: Some("secret".to_string()),
            is_loading: false,
        };
        let printed = format!("{:?}", session);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("authenticated: true"));
    }
}
