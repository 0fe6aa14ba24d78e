//! Request identity for the data APIs.
//!
//! Navigation uses the resolver; API calls instead require a verified cookie:
//! the admin cookie grants everything, the clinic cookie grants its own
//! clinic's data.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use uuid::Uuid;

use super::{
    AuthError,
    resolver::ClinicSession,
    session_store::{
        ADMIN_SESSION, CLINIC_SESSION, CookieSessionStore, CookieSettings, SessionScope,
        SessionStore,
    },
};
use crate::AppState;

/// Payload of the admin cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminClaims {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Persist an admin login.
pub fn sign_in_admin(
    store: &dyn SessionStore,
    email: &str,
    ttl: Duration,
) -> Result<AdminClaims, AuthError> {
    let claims = AdminClaims {
        email: email.to_string(),
        expires_at: Utc::now() + ttl,
    };
    let payload = serde_json::to_string(&claims).map_err(|e| AuthError::Internal(e.to_string()))?;
    store.set(SessionScope::Durable, ADMIN_SESSION, &payload);
    Ok(claims)
}

pub fn sign_out_admin(store: &dyn SessionStore) {
    store.clear(SessionScope::Durable, ADMIN_SESSION);
}

fn read_json<T: serde::de::DeserializeOwned>(store: &dyn SessionStore, key: &str) -> Option<T> {
    let raw = match store.get(SessionScope::Durable, key) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::debug!(error = %e, key, "Ignoring unverifiable cookie");
            return None;
        }
    };
    serde_json::from_str(&raw).ok()
}

/// Verified caller of an API request.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub admin: Option<AdminClaims>,
    pub clinic: Option<ClinicSession>,
}

impl Caller {
    pub fn from_store(store: &dyn SessionStore, now: DateTime<Utc>) -> Self {
        let admin = read_json::<AdminClaims>(store, ADMIN_SESSION).filter(|c| c.expires_at > now);
        let clinic =
            read_json::<ClinicSession>(store, CLINIC_SESSION).filter(|c| !c.is_expired(now));
        Self { admin, clinic }
    }

    pub fn is_admin(&self) -> bool {
        self.admin.is_some()
    }

    pub fn require_admin(&self) -> Result<&AdminClaims, AuthError> {
        match (&self.admin, &self.clinic) {
            (Some(admin), _) => Ok(admin),
            (None, Some(_)) => Err(AuthError::Forbidden(
                "Admin access required".to_string(),
            )),
            (None, None) => Err(AuthError::Unauthenticated),
        }
    }

    /// Admins may touch any clinic; a clinic only itself.
    pub fn require_clinic_access(&self, clinic_id: Uuid) -> Result<(), AuthError> {
        if self.admin.is_some() {
            return Ok(());
        }
        match &self.clinic {
            Some(clinic) if clinic.id == clinic_id => Ok(()),
            Some(_) => Err(AuthError::Forbidden(
                "Access to this clinic is not allowed".to_string(),
            )),
            None => Err(AuthError::Unauthenticated),
        }
    }

    /// The clinic this caller works on by default: its own, for clinic sessions.
    pub fn own_clinic_id(&self) -> Option<Uuid> {
        self.clinic.as_ref().map(|c| c.id)
    }
}

/// Cookie-backed session store for the current request.
pub struct Sessions(pub CookieSessionStore);

impl FromRequestParts<AppState> for Sessions {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AuthError::Internal(msg.to_string()))?;
        Ok(Sessions(CookieSessionStore::new(
            cookies,
            state.signer.clone(),
            CookieSettings::from(&state.config.auth),
        )))
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Sessions(store) = Sessions::from_request_parts(parts, state).await?;
        Ok(Caller::from_store(&store, Utc::now()))
    }
}
