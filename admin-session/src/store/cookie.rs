use crate::store::{CookieChannel, SessionCookie};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use std::sync::Arc;

//--------------------------------------------------------------------------------------------------
// Cookie channel backed by the HTTP client's jar
//--------------------------------------------------------------------------------------------------

/// Writes the session cookie into the jar the transport sends from, scoped to the API origin.
#[derive(Debug, Clone)]
pub struct JarCookies {
    jar: Arc<Jar>,
    origin: Url,
}

impl JarCookies {
    pub fn new(jar: Arc<Jar>, origin: Url) -> Self {
        Self { jar, origin }
    }

    pub fn jar(&self) -> &Arc<Jar> {
        &self.jar
    }
}

impl CookieChannel for JarCookies {
    fn set_cookie(&self, cookie: &SessionCookie) {
        self.jar
            .add_cookie_str(&cookie.to_header_value(), &self.origin);
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        let header = header.to_str().ok()?;
        header.split("; ").find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
    }

    fn expire(&self, name: &str) {
        self.set_cookie(&SessionCookie::expired(name));
    }
}

//--------------------------------------------------------------------------------------------------
