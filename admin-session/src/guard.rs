use crate::codec::{check_at, decode, ClaimsError};
use crate::session::Session;
use crate::store::SessionStore;
use time::OffsetDateTime;
use tracing::{debug, warn};

//--------------------------------------------------------------------------------------------------
// Navigation seam
//--------------------------------------------------------------------------------------------------

pub trait Navigator {
    fn redirect(&self, path: &str);
}

impl<T: Navigator + ?Sized> Navigator for &T {
    fn redirect(&self, path: &str) {
        (**self).redirect(path)
    }
}

pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_FORBIDDEN_PATH: &str = "/unauthorized";

//--------------------------------------------------------------------------------------------------
// Guard states
//--------------------------------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardState {
    Unknown,
    Authenticated(Session),
    Unauthenticated,
    /// Valid session, but its role is not one the guard accepts.
    Forbidden(Session),
}

impl GuardState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, GuardState::Unknown)
    }
}

//--------------------------------------------------------------------------------------------------
// Access guard
//--------------------------------------------------------------------------------------------------

/// Decides once per mount whether protected content may render.
///
/// Starts `Unknown` and settles on the first [`AccessGuard::activate`]; later activations are
/// ignored. Only `Authenticated` renders anything, so nothing protected ever shows while the
/// decision is pending or negative.
pub struct AccessGuard<N: Navigator> {
    store: SessionStore,
    navigator: N,
    login_path: String,
    forbidden_path: String,
    required_roles: Vec<String>,
    state: GuardState,
}

impl<N: Navigator> AccessGuard<N> {
    pub fn new(store: SessionStore, navigator: N) -> Self {
        Self {
            store,
            navigator,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            forbidden_path: DEFAULT_FORBIDDEN_PATH.to_string(),
            required_roles: Vec::new(),
            state: GuardState::Unknown,
        }
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_forbidden_path(mut self, path: impl Into<String>) -> Self {
        self.forbidden_path = path.into();
        self
    }

    /// Any one of `roles` is enough. An empty set accepts every role.
    pub fn require_any_role<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn activate(&mut self) -> &GuardState {
        self.activate_at(OffsetDateTime::now_utc())
    }

    pub fn activate_at(&mut self, now: OffsetDateTime) -> &GuardState {
        if self.state.is_settled() {
            return &self.state;
        }

        let claims = self.store.get().and_then(|token| decode(&token));
        self.state = match (check_at(claims.as_ref(), &self.store, now), claims) {
            (Ok(()), Some(claims)) => {
                let session = match self.store.profile_override() {
                    Some(profile) => Session::from_claims(&claims).with_override(&profile),
                    None => Session::from_claims(&claims),
                };
                self.admit(session)
            }
            (result, _) => {
                let reason = result.err().unwrap_or(ClaimsError::Missing);
                warn!("No valid session ({}), redirecting to {}", reason, self.login_path);
                self.store.clear();
                self.navigator.redirect(&self.login_path);
                GuardState::Unauthenticated
            }
        };
        &self.state
    }

    fn admit(&self, session: Session) -> GuardState {
        if self.required_roles.is_empty() || session.has_role(&self.required_roles) {
            debug!("Session admitted for {:?}", session.id);
            return GuardState::Authenticated(session);
        }

        warn!(
            "Session {:?} with role {:?} does not have an acceptable role",
            session.id, session.role
        );
        self.navigator.redirect(&self.forbidden_path);
        GuardState::Forbidden(session)
    }

    /// Runs `view` only when authenticated.
    pub fn render<T, F>(&self, view: F) -> Option<T>
    where
        F: FnOnce(&Session) -> T,
    {
        match &self.state {
            GuardState::Authenticated(session) => Some(view(session)),
            _ => None,
        }
    }
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::encode_payload;
    use crate::store::memory::{MemoryCookies, MemorySlot};
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingNavigator {
        redirects: RefCell<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn redirect(&self, path: &str) {
            self.redirects.borrow_mut().push(path.to_string());
        }
    }

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(MemorySlot::default()), Arc::new(MemoryCookies::default()))
    }

    fn valid_token(role: &str) -> String {
        encode_payload(&json!({
            "sub": "u1",
            "email": "a@b.com",
            "role": role,
            "exp": OffsetDateTime::now_utc().unix_timestamp() + 3600
        }))
    }

    #[test]
    fn starts_unknown_and_renders_nothing() {
        let navigator = RecordingNavigator::default();
        let guard = AccessGuard::new(store(), &navigator);
        assert_eq!(guard.state(), &GuardState::Unknown);
        assert!(guard.render(|_| ()).is_none());
        assert!(navigator.redirects.borrow().is_empty());
    }

    #[test]
    fn no_credential_redirects_once_and_never_renders() {
        let navigator = RecordingNavigator::default();
        let renders = Cell::new(0);
        let mut guard = AccessGuard::new(store(), &navigator);

        guard.activate();
        guard.render(|_| renders.set(renders.get() + 1));
        guard.activate();
        guard.render(|_| renders.set(renders.get() + 1));

        assert_eq!(guard.state(), &GuardState::Unauthenticated);
        assert_eq!(renders.get(), 0);
        assert_eq!(*navigator.redirects.borrow(), vec!["/login".to_string()]);
    }

    #[test]
    fn valid_credential_renders_with_session() {
        let store = store();
        store.set(&valid_token("admin"));
        let navigator = RecordingNavigator::default();
        let mut guard = AccessGuard::new(store, &navigator);

        guard.activate();
        let email = guard.render(|session| session.email.clone());

        assert_eq!(email, Some(Some("a@b.com".to_string())));
        assert!(navigator.redirects.borrow().is_empty());
    }

    #[test]
    fn invalid_credential_is_cleared() {
        let store = store();
        store.set(&encode_payload(&json!({ "name": "Nobody" })));
        let navigator = RecordingNavigator::default();
        let mut guard = AccessGuard::new(store.clone(), &navigator).with_login_path("/sign-in");

        guard.activate();

        assert_eq!(guard.state(), &GuardState::Unauthenticated);
        assert!(store.get().is_none());
        assert_eq!(*navigator.redirects.borrow(), vec!["/sign-in".to_string()]);
    }

    #[test]
    fn state_is_terminal_per_mount() {
        let store = store();
        let navigator = RecordingNavigator::default();
        let mut guard = AccessGuard::new(store.clone(), &navigator);

        guard.activate();
        store.set(&valid_token("admin"));
        guard.activate();

        assert_eq!(guard.state(), &GuardState::Unauthenticated);

        // A fresh mount sees the new credential
        let mut remount = AccessGuard::new(store, &navigator);
        assert!(matches!(remount.activate(), GuardState::Authenticated(_)));
    }

    #[test]
    fn wrong_role_is_forbidden_without_clearing() {
        let store = store();
        store.set(&valid_token("viewer"));
        let navigator = RecordingNavigator::default();
        let mut guard = AccessGuard::new(store.clone(), &navigator)
            .require_any_role(["admin", "superadmin"]);

        guard.activate();

        assert!(matches!(guard.state(), GuardState::Forbidden(_)));
        assert!(guard.render(|_| ()).is_none());
        assert!(store.get().is_some());
        assert_eq!(*navigator.redirects.borrow(), vec!["/unauthorized".to_string()]);
    }

    #[test]
    fn accepted_role_is_authenticated() {
        let store = store();
        store.set(&valid_token("superadmin"));
        let navigator = RecordingNavigator::default();
        let mut guard =
            AccessGuard::new(store, &navigator).require_any_role(["admin", "superadmin"]);

        assert!(matches!(guard.activate(), GuardState::Authenticated(_)));
    }

    #[test]
    fn detached_store_is_unauthenticated() {
        let navigator = RecordingNavigator::default();
        let mut guard = AccessGuard::new(SessionStore::detached(), &navigator);
        assert_eq!(guard.activate(), &GuardState::Unauthenticated);
        assert_eq!(navigator.redirects.borrow().len(), 1);
    }
}
