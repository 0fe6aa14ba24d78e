//! Persisted session flags.
//!
//! The browser keeps three flags: the durable clinic session and two tab
//! scoped flags set while an admin views a clinic's data. [`SessionStore`]
//! abstracts where they live so the resolver can run against cookies in
//! production and against memory in tests.

use std::collections::HashMap;

use parking_lot::Mutex;
use tower_cookies::{Cookie, Cookies, cookie::time::Duration as CookieDuration};

use super::signing::CookieSigner;
use crate::config::AuthConfig;

/// Serialized clinic session. Survives browser restarts.
pub const CLINIC_SESSION: &str = "clinicaLogada";
/// `"true"` while an admin is viewing a clinic.
pub const FROM_ADMIN: &str = "fromAdmin";
/// Clinic id the admin is viewing.
pub const ADMIN_CLINIC_ID: &str = "adminClinicaId";
/// Signed admin login.
pub const ADMIN_SESSION: &str = "cinebabyAdmin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionScope {
    /// Outlives the browser session.
    Durable,
    /// Dropped when the tab or browser closes.
    Tab,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The stored value was not produced by this server.
    #[error("Session value '{0}' failed verification")]
    Tampered(String),
}

pub trait SessionStore: Send + Sync {
    fn get(&self, scope: SessionScope, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&self, scope: SessionScope, key: &str, value: &str);
    fn clear(&self, scope: SessionScope, key: &str);
}

/// In-process store, one instance per simulated browser.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<(SessionScope, String), String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, scope: SessionScope, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.values.lock().get(&(scope, key.to_string())).cloned())
    }

    fn set(&self, scope: SessionScope, key: &str, value: &str) {
        self.values
            .lock()
            .insert((scope, key.to_string()), value.to_string());
    }

    fn clear(&self, scope: SessionScope, key: &str) {
        self.values.lock().remove(&(scope, key.to_string()));
    }
}

/// Cookie attributes shared by every session cookie.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub secure: bool,
    pub same_site: tower_cookies::cookie::SameSite,
    pub clinic_max_age: CookieDuration,
    pub admin_max_age: CookieDuration,
}

impl From<&AuthConfig> for CookieSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secure: config.secure_cookies,
            same_site: config.same_site.into(),
            clinic_max_age: CookieDuration::days(config.clinic_session_days),
            admin_max_age: CookieDuration::hours(config.admin_session_hours),
        }
    }
}

/// Session flags as signed cookies on the current request/response.
///
/// Durable values get a `Max-Age`; tab values are session cookies.
pub struct CookieSessionStore {
    cookies: Cookies,
    signer: CookieSigner,
    settings: CookieSettings,
}

impl CookieSessionStore {
    pub fn new(cookies: Cookies, signer: CookieSigner, settings: CookieSettings) -> Self {
        Self {
            cookies,
            signer,
            settings,
        }
    }

    fn build(&self, scope: SessionScope, key: &str, value: String) -> Cookie<'static> {
        let mut builder = Cookie::build((key.to_string(), value))
            .path("/")
            .http_only(true)
            .secure(self.settings.secure)
            .same_site(self.settings.same_site);
        if scope == SessionScope::Durable {
            let max_age = if key == ADMIN_SESSION {
                self.settings.admin_max_age
            } else {
                self.settings.clinic_max_age
            };
            builder = builder.max_age(max_age);
        }
        builder.build()
    }
}

impl SessionStore for CookieSessionStore {
    fn get(&self, _scope: SessionScope, key: &str) -> Result<Option<String>, SessionError> {
        match self.cookies.get(key) {
            None => Ok(None),
            Some(cookie) => self
                .signer
                .verify(cookie.value())
                .map(Some)
                .ok_or_else(|| SessionError::Tampered(key.to_string())),
        }
    }

    fn set(&self, scope: SessionScope, key: &str, value: &str) {
        let signed = self.signer.sign(value);
        self.cookies.add(self.build(scope, key, signed));
    }

    fn clear(&self, scope: SessionScope, key: &str) {
        let mut removal = self.build(scope, key, String::new());
        removal.set_max_age(CookieDuration::ZERO);
        self.cookies.remove(removal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CookieSettings {
        CookieSettings {
            secure: true,
            same_site: tower_cookies::cookie::SameSite::Lax,
            clinic_max_age: CookieDuration::days(30),
            admin_max_age: CookieDuration::hours(12),
        }
    }

    fn signer() -> CookieSigner {
        CookieSigner::new("0123456789abcdef0123456789abcdef").unwrap()
    }

    #[test]
    fn test_memory_scopes_are_separate() {
        let store = MemorySessionStore::new();
        store.set(SessionScope::Tab, FROM_ADMIN, "true");

        assert_eq!(
            store.get(SessionScope::Tab, FROM_ADMIN).unwrap().as_deref(),
            Some("true")
        );
        assert_eq!(store.get(SessionScope::Durable, FROM_ADMIN).unwrap(), None);

        store.clear(SessionScope::Tab, FROM_ADMIN);
        assert_eq!(store.get(SessionScope::Tab, FROM_ADMIN).unwrap(), None);
    }

    #[test]
    fn test_cookie_store_signs_values() {
        let cookies = Cookies::default();
        let store = CookieSessionStore::new(cookies.clone(), signer(), settings());

        store.set(SessionScope::Durable, CLINIC_SESSION, r#"{"id":"1"}"#);

        let raw = cookies.get(CLINIC_SESSION).unwrap();
        assert_ne!(raw.value(), r#"{"id":"1"}"#);
        assert_eq!(raw.max_age(), Some(CookieDuration::days(30)));
        assert_eq!(
            store
                .get(SessionScope::Durable, CLINIC_SESSION)
                .unwrap()
                .as_deref(),
            Some(r#"{"id":"1"}"#)
        );
    }

    #[test]
    fn test_cookie_store_tab_values_are_session_cookies() {
        let cookies = Cookies::default();
        let store = CookieSessionStore::new(cookies.clone(), signer(), settings());

        store.set(SessionScope::Tab, FROM_ADMIN, "true");
        assert_eq!(cookies.get(FROM_ADMIN).unwrap().max_age(), None);
    }

    #[test]
    fn test_cookie_store_rejects_forged_value() {
        let cookies = Cookies::default();
        cookies.add(Cookie::new(FROM_ADMIN, "true"));
        let store = CookieSessionStore::new(cookies, signer(), settings());

        assert!(matches!(
            store.get(SessionScope::Tab, FROM_ADMIN),
            Err(SessionError::Tampered(_))
        ));
    }

    #[test]
    fn test_cookie_store_clear() {
        let cookies = Cookies::default();
        let store = CookieSessionStore::new(cookies.clone(), signer(), settings());

        store.set(SessionScope::Durable, CLINIC_SESSION, "x");
        store.clear(SessionScope::Durable, CLINIC_SESSION);
        assert_eq!(store.get(SessionScope::Durable, CLINIC_SESSION).unwrap(), None);
    }
}
