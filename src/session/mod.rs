//! Session state carried across requests.
//!
//! The browser apps keep the bearer token and the onboarding flags in
//! cookies. Here the same values sit behind [`SessionStore`], so the HTTP
//! client and the route guard never read cookies ad hoc.

mod file;

pub use file::{get_config_dir, FileSession};

use axum::http::{header, HeaderMap};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Bytes RFC 6265 keeps out of a cookie value, plus `%` itself. `+` and `@`
/// stay literal, as the browser apps write them.
const COOKIE_VALUE: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'%').add(b',').add(b';').add(b'\\');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionCookie {
    AccessToken,
    Email,
    Mobile,
    IsNotOrgSetup,
    IsNotPasswordSet,
    IsInvitedUser,
}

impl SessionCookie {
    pub const ALL: [SessionCookie; 6] = [
        SessionCookie::AccessToken,
        SessionCookie::Email,
        SessionCookie::Mobile,
        SessionCookie::IsNotOrgSetup,
        SessionCookie::IsNotPasswordSet,
        SessionCookie::IsInvitedUser,
    ];

    /// Cookie name used by the browser apps.
    pub fn name(self) -> &'static str {
        match self {
            SessionCookie::AccessToken => "access_token",
            SessionCookie::Email => "email",
            SessionCookie::Mobile => "mobile",
            SessionCookie::IsNotOrgSetup => "isNotOrgSetup",
            SessionCookie::IsNotPasswordSet => "isNotPasswordSet",
            SessionCookie::IsInvitedUser => "is_invited_user",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Typed get/set/clear over the session values.
pub trait SessionStore: Send + Sync {
    fn get(&self, cookie: SessionCookie) -> Option<String>;

    fn set(&self, cookie: SessionCookie, value: &str) -> Result<(), SessionError>;

    fn remove(&self, cookie: SessionCookie) -> Result<(), SessionError>;

    fn clear(&self) -> Result<(), SessionError> {
        for cookie in SessionCookie::ALL {
            self.remove(cookie)?;
        }
        Ok(())
    }

    /// Bearer token, if one is present and non-empty.
    fn token(&self) -> Option<String> {
        self.get(SessionCookie::AccessToken).filter(|t| !t.trim().is_empty())
    }

    fn flag(&self, cookie: SessionCookie) -> bool {
        self.get(cookie).as_deref().map(parse_flag).unwrap_or(false)
    }
}

/// In-process store, used for per-request clients and in tests.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: RwLock<HashMap<SessionCookie, String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::default();
        store.write().insert(SessionCookie::AccessToken, token.into());
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionCookie, String>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionCookie, String>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySession {
    fn get(&self, cookie: SessionCookie) -> Option<String> {
        self.read().get(&cookie).cloned()
    }

    fn set(&self, cookie: SessionCookie, value: &str) -> Result<(), SessionError> {
        self.write().insert(cookie, value.to_string());
        Ok(())
    }

    fn remove(&self, cookie: SessionCookie) -> Result<(), SessionError> {
        self.write().remove(&cookie);
        Ok(())
    }
}

/// Read-only view of one request's session, taken from its `Cookie` headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub is_not_org_setup: bool,
    pub is_not_password_set: bool,
    pub is_invited_user: bool,
}

impl Session {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut session = Session::default();

        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            for pair in raw.split(';') {
                let Some((name, value)) = pair.split_once('=') else { continue };
                if let Some(cookie) = SessionCookie::from_name(name.trim()) {
                    session.apply(cookie, decode_cookie_value(value));
                }
            }
        }

        session
    }

    pub fn from_store(store: &dyn SessionStore) -> Self {
        let mut session = Session::default();
        for cookie in SessionCookie::ALL {
            if let Some(value) = store.get(cookie) {
                session.apply(cookie, value);
            }
        }
        session
    }

    fn apply(&mut self, cookie: SessionCookie, value: String) {
        match cookie {
            SessionCookie::AccessToken => self.access_token = Some(value),
            SessionCookie::Email => self.email = Some(value),
            SessionCookie::Mobile => self.mobile = Some(value),
            SessionCookie::IsNotOrgSetup => self.is_not_org_setup = parse_flag(&value),
            SessionCookie::IsNotPasswordSet => self.is_not_password_set = parse_flag(&value),
            SessionCookie::IsInvitedUser => self.is_invited_user = parse_flag(&value),
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

fn decode_cookie_value(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(raw);
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// `Set-Cookie` value that stores `value` under the cookie's name.
pub fn set_cookie_header(cookie: SessionCookie, value: &str, secure: bool) -> String {
    let encoded = utf8_percent_encode(value, COOKIE_VALUE);
    let mut header = format!("{}={}; Path=/; SameSite=Strict", cookie.name(), encoded);
    if secure {
        header.push_str("; Secure");
    }
    header
}

/// `Set-Cookie` value that expires the cookie in the browser.
pub fn clear_cookie_header(cookie: SessionCookie, secure: bool) -> String {
    let mut header = format!("{}=; Path=/; Max-Age=0; SameSite=Strict", cookie.name());
    if secure {
        header.push_str("; Secure");
    }
    header
}
