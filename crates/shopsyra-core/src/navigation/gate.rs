//! Keeps the visible screen group consistent with the session.
//!
//! The gate starts in `Loading` and shows a placeholder until the session
//! finishes restoring. After that it redirects between the signed-out and
//! signed-in screen groups whenever the two disagree, and does nothing when
//! they already match.

use tokio::sync::watch;
use tracing::{debug, info};

use crate::auth::Session;

/// A named collection of screens reachable in one authentication state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenGroup {
    Unauthenticated,
    Authenticated,
}

impl ScreenGroup {
    /// Screen a redirect into this group lands on
    pub fn entry(&self) -> Route {
        match self {
            ScreenGroup::Unauthenticated => Route::SignIn,
            ScreenGroup::Authenticated => Route::Home,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    SignUp,
    Home,
    AddProduct,
    Profile,
}

impl Route {
    pub fn group(&self) -> ScreenGroup {
        match self {
            Route::SignIn | Route::SignUp => ScreenGroup::Unauthenticated,
            Route::Home | Route::AddProduct | Route::Profile => ScreenGroup::Authenticated,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::SignIn => "Sign in",
            Route::SignUp => "Sign up",
            Route::Home => "Home",
            Route::AddProduct => "Add product",
            Route::Profile => "Profile",
        }
    }
}

/// Gate state. `Loading` is only ever the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Loading,
    Unauthenticated,
    Authenticated,
}

/// What the gate currently shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateView {
    /// Neutral waiting screen while the session restores
    Placeholder,
    Screen(Route),
}

/// Receives redirects issued by the gate
pub trait Navigator {
    /// Replace the current screen with `route`
    fn replace(&mut self, route: Route);
}

#[derive(Debug)]
pub struct NavigationGate {
    state: GateState,
    current: Route,
}

impl NavigationGate {
    /// Start a gate with `initial` as the current screen
    pub fn new(initial: Route) -> Self {
        Self {
            state: GateState::Loading,
            current: initial,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn current(&self) -> Route {
        self.current
    }

    pub fn view(&self) -> GateView {
        match self.state {
            GateState::Loading => GateView::Placeholder,
            _ => GateView::Screen(self.current),
        }
    }

    /// Re-evaluate against the session. Returns the redirect to perform, if
    /// any; the gate already treats it as the current screen.
    pub fn evaluate(&mut self, session: &Session) -> Option<Route> {
        if self.state == GateState::Loading {
            if session.is_loading() {
                return None;
            }
            debug!(authenticated = session.is_authenticated(), "Session resolved");
        }

        let (state, target_group) = if session.is_authenticated() {
            (GateState::Authenticated, ScreenGroup::Authenticated)
        } else {
            (GateState::Unauthenticated, ScreenGroup::Unauthenticated)
        };
        self.state = state;

        if self.current.group() == target_group {
            return None;
        }

        let route = target_group.entry();
        info!(from = ?self.current, to = ?route, "Redirecting");
        self.current = route;
        Some(route)
    }

    /// User-initiated navigation. The move is applied, then the gate
    /// re-evaluates so a screen outside the allowed group is bounced.
    pub fn navigate(&mut self, route: Route, session: &Session) -> Option<Route> {
        self.current = route;
        self.evaluate(session)
    }

    /// Follow session changes until the publisher goes away, forwarding every
    /// redirect to `navigator`.
    pub async fn follow<N: Navigator>(
        &mut self,
        mut sessions: watch::Receiver<Session>,
        navigator: &mut N,
    ) {
        loop {
            let session = sessions.borrow_and_update().clone();
            if let Some(route) = self.evaluate(&session) {
                navigator.replace(route);
            }
            if sessions.changed().await.is_err() {
                debug!("Session publisher closed, gate stopping");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RequestAuth;
    use crate::auth::{KeyValueStore, MemoryStore, SessionManager, SessionVerifier, AUTH_TOKEN_KEY};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct AcceptAll;

    #[async_trait]
    impl SessionVerifier for AcceptAll {
        async fn verify(&self) -> Result<Option<serde_json::Value>> {
            Ok(None)
        }
    }

    /// Drive a manager through restore and return its session snapshot
    async fn resolved(token: Option<&str>) -> Session {
        let store = Arc::new(MemoryStore::new());
        if let Some(token) = token {
            store.set(AUTH_TOKEN_KEY, token).unwrap();
        }
        let manager = SessionManager::new(store, AcceptAll, RequestAuth::new());
        manager.restore().await;
        manager.session()
    }

    fn loading() -> Session {
        SessionManager::new(MemoryStore::new(), AcceptAll, RequestAuth::new()).session()
    }

    #[test]
    fn test_route_groups() {
        assert_eq!(Route::SignIn.group(), ScreenGroup::Unauthenticated);
        assert_eq!(Route::SignUp.group(), ScreenGroup::Unauthenticated);
        assert_eq!(Route::Profile.group(), ScreenGroup::Authenticated);
        assert_eq!(ScreenGroup::Authenticated.entry(), Route::Home);
        assert_eq!(ScreenGroup::Unauthenticated.entry(), Route::SignIn);
    }

    #[test]
    fn test_no_redirect_while_loading() {
        let mut gate = NavigationGate::new(Route::Home);
        let session = loading();
        assert_eq!(gate.evaluate(&session), None);
        assert_eq!(gate.evaluate(&session), None);
        assert_eq!(gate.state(), GateState::Loading);
        assert_eq!(gate.view(), GateView::Placeholder);
    }

    #[tokio::test]
    async fn test_single_redirect_to_authenticated_group() {
        let mut gate = NavigationGate::new(Route::SignIn);
        assert_eq!(gate.evaluate(&loading()), None);

        let session = resolved(Some("tok")).await;
        assert_eq!(gate.evaluate(&session), Some(Route::Home));
        assert_eq!(gate.state(), GateState::Authenticated);

        // Unchanged state fires nothing further
        assert_eq!(gate.evaluate(&session), None);
        assert_eq!(gate.evaluate(&session), None);
        assert_eq!(gate.view(), GateView::Screen(Route::Home));
    }

    #[tokio::test]
    async fn test_redirect_to_sign_in_when_signed_out() {
        let mut gate = NavigationGate::new(Route::Profile);
        let session = resolved(None).await;
        assert_eq!(gate.evaluate(&session), Some(Route::SignIn));
        assert_eq!(gate.state(), GateState::Unauthenticated);
        assert_eq!(gate.evaluate(&session), None);
    }

    #[tokio::test]
    async fn test_consistent_start_needs_no_redirect() {
        let mut gate = NavigationGate::new(Route::SignUp);
        assert_eq!(gate.evaluate(&resolved(None).await), None);
        assert_eq!(gate.current(), Route::SignUp);
    }

    #[tokio::test]
    async fn test_navigate_bounces_out_of_group() {
        let mut gate = NavigationGate::new(Route::Home);
        let session = resolved(Some("tok")).await;
        assert_eq!(gate.evaluate(&session), None);

        assert_eq!(gate.navigate(Route::Profile, &session), None);
        assert_eq!(gate.current(), Route::Profile);
        assert_eq!(gate.navigate(Route::SignUp, &session), Some(Route::Home));
    }

    #[tokio::test]
    async fn test_loading_is_never_reentered() {
        let mut gate = NavigationGate::new(Route::SignIn);
        gate.evaluate(&resolved(None).await);
        assert_eq!(gate.state(), GateState::Unauthenticated);

        gate.evaluate(&loading());
        assert_ne!(gate.state(), GateState::Loading);
        assert_ne!(gate.view(), GateView::Placeholder);
    }

    /// Navigator that reports each redirect over a channel
    struct ChannelNavigator(tokio::sync::mpsc::UnboundedSender<Route>);

    impl Navigator for ChannelNavigator {
        fn replace(&mut self, route: Route) {
            let _ = self.0.send(route);
        }
    }

    #[tokio::test]
    async fn test_follow_reacts_to_login_and_logout() {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store, AcceptAll, RequestAuth::new());
        let sessions = manager.subscribe();
        let (tx, mut redirects) = tokio::sync::mpsc::unbounded_channel();

        let follower = tokio::spawn(async move {
            let mut gate = NavigationGate::new(Route::Home);
            gate.follow(sessions, &mut ChannelNavigator(tx)).await;
            gate.current()
        });

        manager.restore().await;
        assert_eq!(redirects.recv().await, Some(Route::SignIn));

        manager.set_session("abc").unwrap();
        assert_eq!(redirects.recv().await, Some(Route::Home));

        manager.logout().unwrap();
        assert_eq!(redirects.recv().await, Some(Route::SignIn));

        drop(manager);
        assert_eq!(follower.await.unwrap(), Route::SignIn);
        assert_eq!(redirects.recv().await, None);
    }
}
