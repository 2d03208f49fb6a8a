//! Process-wide credential slot.
//!
//! The credential is written to two channels: a persistent key-value slot and a cookie channel,
//! so anything that only sees cookies (server-rendered routes, the HTTP transport) observes the
//! same session. A [`SessionStore::detached`] store stands in where no storage is available and
//! turns every operation into a no-op.

#[cfg(feature = "http")]
pub mod cookie;
pub mod file;
pub mod memory;

use crate::codec::{check_at, decode};
use crate::internal::unixtime::ONE_DAY;
use crate::session::{ProfileOverride, Session};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

//--------------------------------------------------------------------------------------------------
// Storage seams
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage contents are not valid: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait KeyValueSlot: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub trait CookieChannel: Send + Sync {
    fn set_cookie(&self, cookie: &SessionCookie);
    fn cookie(&self, name: &str) -> Option<String>;
    fn expire(&self, name: &str);
}

//--------------------------------------------------------------------------------------------------
// Session cookie
//--------------------------------------------------------------------------------------------------

pub const TOKEN_KEY: &str = "authToken";
pub const PROFILE_OVERRIDE_KEY: &str = "profileOverride";
pub const COOKIE_PATH: &str = "/";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub max_age: u32,
    pub same_site: SameSite,
}

impl SessionCookie {
    pub fn for_token(token: &str) -> Self {
        Self {
            name: TOKEN_KEY.to_string(),
            value: token.to_string(),
            path: COOKIE_PATH.to_string(),
            max_age: ONE_DAY.0,
            same_site: SameSite::Strict,
        }
    }

    /// A cookie that deletes `name` when applied.
    pub fn expired(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: String::new(),
            path: COOKIE_PATH.to_string(),
            max_age: 0,
            same_site: SameSite::Strict,
        }
    }

    /// `Set-Cookie` form.
    pub fn to_header_value(&self) -> String {
        format!(
            "{}={}; Path={}; Max-Age={}; SameSite={}",
            self.name,
            self.value,
            self.path,
            self.max_age,
            self.same_site.as_str()
        )
    }
}

//--------------------------------------------------------------------------------------------------
// Session store
//--------------------------------------------------------------------------------------------------

struct Channels {
    slot: Arc<dyn KeyValueSlot>,
    cookies: Arc<dyn CookieChannel>,
}

/// Cheap to clone; every clone shares the same channels.
#[derive(Clone)]
pub struct SessionStore {
    channels: Option<Arc<Channels>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("detached", &self.channels.is_none())
            .finish()
    }
}

impl SessionStore {
    pub fn new(slot: Arc<dyn KeyValueSlot>, cookies: Arc<dyn CookieChannel>) -> Self {
        Self {
            channels: Some(Arc::new(Channels { slot, cookies })),
        }
    }

    /// Store for contexts with no storage primitives. Reads return `None`, writes do nothing.
    pub fn detached() -> Self {
        Self { channels: None }
    }

    pub fn is_detached(&self) -> bool {
        self.channels.is_none()
    }

    pub fn set(&self, token: &str) {
        let Some(channels) = &self.channels else {
            return;
        };

        if let Err(err) = channels.slot.set(TOKEN_KEY, token) {
            warn!("Failed to persist credential: {}", err);
        }
        channels.cookies.set_cookie(&SessionCookie::for_token(token));
        debug!("Credential stored");
    }

    /// The persistent slot wins; the cookie is the fallback.
    pub fn get(&self) -> Option<String> {
        let channels = self.channels.as_ref()?;

        match channels.slot.get(TOKEN_KEY) {
            Ok(Some(token)) => return Some(token),
            Ok(None) => {}
            Err(err) => warn!("Failed to read persisted credential: {}", err),
        }
        channels.cookies.cookie(TOKEN_KEY)
    }

    /// Removes the credential from both channels along with any profile override.
    pub fn clear(&self) {
        let Some(channels) = &self.channels else {
            return;
        };

        if let Err(err) = channels.slot.remove(TOKEN_KEY) {
            warn!("Failed to remove persisted credential: {}", err);
        }
        if let Err(err) = channels.slot.remove(PROFILE_OVERRIDE_KEY) {
            warn!("Failed to remove profile override: {}", err);
        }
        channels.cookies.expire(TOKEN_KEY);
        debug!("Session cleared");
    }

    //----------------------------------------------------------------------------------------------
    // Profile override
    //----------------------------------------------------------------------------------------------

    pub fn profile_override(&self) -> Option<ProfileOverride> {
        let channels = self.channels.as_ref()?;

        let raw = match channels.slot.get(PROFILE_OVERRIDE_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!("Failed to read profile override: {}", err);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(err) => {
                warn!("Ignoring unreadable profile override: {}", err);
                None
            }
        }
    }

    /// Fields set in `update` replace stored ones; fields left `None` are kept.
    pub fn set_profile_override(&self, update: ProfileOverride) {
        let Some(channels) = &self.channels else {
            return;
        };

        let merged = self.profile_override().unwrap_or_default().merge(update);
        let result = serde_json::to_string(&merged)
            .map_err(StorageError::from)
            .and_then(|raw| channels.slot.set(PROFILE_OVERRIDE_KEY, &raw));
        if let Err(err) = result {
            warn!("Failed to persist profile override: {}", err);
        }
    }

    //----------------------------------------------------------------------------------------------
    // Derived session
    //----------------------------------------------------------------------------------------------

    /// Recomputed on every call; `None` unless the stored credential is valid.
    pub fn session(&self) -> Option<Session> {
        self.session_at(OffsetDateTime::now_utc())
    }

    pub fn session_at(&self, now: OffsetDateTime) -> Option<Session> {
        let claims = self.get().and_then(|token| decode(&token));
        check_at(claims.as_ref(), self, now).ok()?;
        let session = Session::from_claims(claims.as_ref()?);
        Some(match self.profile_override() {
            Some(profile) => session.with_override(&profile),
            None => session,
        })
    }
}

//--------------------------------------------------------------------------------------------------
