//! Navigation identity resolution.
//!
//! Given the persisted session flags and the path being visited, decide which
//! actor is in effect and whether the visitor must be redirected. Access rules
//! come from [`AREAS`], a prefix table consumed by [`authorize`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session_store::{
    ADMIN_CLINIC_ID, CLINIC_SESSION, FROM_ADMIN, SessionScope, SessionStore,
};
use crate::models::Clinic;

pub const ROOT_PATH: &str = "/";
pub const CLINIC_DASHBOARD: &str = "/clinica/dashboard";
pub const ADMIN_DASHBOARD: &str = "/admin/dashboard";

/// Who a route prefix is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    Admin,
    Clinic,
    Public,
}

/// Route prefixes and their audience, most specific first.
pub const AREAS: &[(&str, Area)] = &[
    ("/admin", Area::Admin),
    ("/clinica", Area::Clinic),
    ("/paciente", Area::Public),
    ("/print", Area::Public),
    ("/", Area::Public),
];

pub fn area_for(path: &str) -> Area {
    AREAS
        .iter()
        .find(|(prefix, _)| path.starts_with(prefix))
        .map(|(_, area)| *area)
        .unwrap_or(Area::Public)
}

/// The clinic login persisted under `clinicaLogada`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicSession {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub city: String,
    pub address: String,
    pub phone: String,
    pub expires_at: DateTime<Utc>,
}

impl ClinicSession {
    pub fn new(clinic: &Clinic, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: clinic.id,
            name: clinic.name.clone(),
            email: clinic.email.clone(),
            city: clinic.city.clone(),
            address: clinic.address.clone(),
            phone: clinic.phone.clone(),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    Unauthenticated,
    ClinicSession { clinic: ClinicSession },
    AdminSession,
}

/// Check `actor` against the area of `path`. `Err` carries the redirect.
pub fn authorize(actor: &Actor, path: &str) -> Result<(), &'static str> {
    match (area_for(path), actor) {
        (Area::Public, _) => Ok(()),
        (Area::Admin, Actor::AdminSession) => Ok(()),
        (Area::Clinic, Actor::ClinicSession { .. }) => Ok(()),
        (Area::Admin, Actor::ClinicSession { .. }) => Err(CLINIC_DASHBOARD),
        (Area::Admin, Actor::Unauthenticated) => Err(ROOT_PATH),
        (Area::Clinic, _) => Err(ROOT_PATH),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub actor: Actor,
    pub redirect_to: Option<&'static str>,
    pub acting_clinic_id: Option<Uuid>,
}

enum StoredClinic {
    Absent,
    Valid(ClinicSession),
    Corrupt,
}

pub struct Resolver<'a> {
    store: &'a dyn SessionStore,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn SessionStore) -> Self {
        Self { store }
    }

    fn stored_clinic(&self, now: DateTime<Utc>) -> StoredClinic {
        let raw = match self.store.get(SessionScope::Durable, CLINIC_SESSION) {
            Ok(Some(raw)) => raw,
            Ok(None) => return StoredClinic::Absent,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unverifiable clinic session");
                return StoredClinic::Corrupt;
            }
        };

        match serde_json::from_str::<ClinicSession>(&raw) {
            Ok(session) if session.is_expired(now) => {
                tracing::debug!(clinic_id = %session.id, "Clinic session expired");
                self.store.clear(SessionScope::Durable, CLINIC_SESSION);
                StoredClinic::Absent
            }
            Ok(session) => StoredClinic::Valid(session),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed clinic session");
                StoredClinic::Corrupt
            }
        }
    }

    /// Resolve the actor for a visit to `path`.
    pub fn resolve(&self, path: &str) -> Resolution {
        self.resolve_at(path, Utc::now())
    }

    pub fn resolve_at(&self, path: &str, now: DateTime<Utc>) -> Resolution {
        let actor = match self.stored_clinic(now) {
            StoredClinic::Corrupt => {
                self.store.clear(SessionScope::Durable, CLINIC_SESSION);
                return Resolution {
                    actor: Actor::Unauthenticated,
                    redirect_to: Some(ROOT_PATH),
                    acting_clinic_id: None,
                };
            }
            StoredClinic::Valid(clinic) => Actor::ClinicSession { clinic },
            // The admin area trusts any visitor without a clinic session;
            // admin data APIs are gated separately by the admin cookie.
            StoredClinic::Absent if area_for(path) == Area::Admin => Actor::AdminSession,
            StoredClinic::Absent => Actor::Unauthenticated,
        };

        let redirect_to = authorize(&actor, path).err();
        let acting_clinic_id = self.acting_clinic_id(&actor);
        Resolution {
            actor,
            redirect_to,
            acting_clinic_id,
        }
    }

    /// Clinic whose data the actor is working on.
    pub fn acting_clinic_id(&self, actor: &Actor) -> Option<Uuid> {
        match actor {
            Actor::ClinicSession { clinic } => Some(clinic.id),
            Actor::AdminSession => {
                let from_admin = self
                    .store
                    .get(SessionScope::Tab, FROM_ADMIN)
                    .ok()
                    .flatten()
                    .is_some_and(|v| v == "true");
                if !from_admin {
                    return None;
                }
                self.store
                    .get(SessionScope::Tab, ADMIN_CLINIC_ID)
                    .ok()
                    .flatten()
                    .and_then(|id| id.parse().ok())
            }
            Actor::Unauthenticated => None,
        }
    }

    /// Persist a clinic login.
    pub fn login(&self, session: &ClinicSession) -> Result<(), serde_json::Error> {
        let payload = serde_json::to_string(session)?;
        self.store
            .set(SessionScope::Durable, CLINIC_SESSION, &payload);
        Ok(())
    }

    /// Drop the clinic session. Tab flags are left alone.
    pub fn logout(&self) -> &'static str {
        self.store.clear(SessionScope::Durable, CLINIC_SESSION);
        ROOT_PATH
    }

    /// Start viewing `clinic_id` as an admin in this tab.
    pub fn begin_view_as(&self, clinic_id: Uuid) {
        self.store.set(SessionScope::Tab, FROM_ADMIN, "true");
        self.store
            .set(SessionScope::Tab, ADMIN_CLINIC_ID, &clinic_id.to_string());
    }

    pub fn end_view_as(&self) -> &'static str {
        self.store.clear(SessionScope::Tab, FROM_ADMIN);
        self.store.clear(SessionScope::Tab, ADMIN_CLINIC_ID);
        ADMIN_DASHBOARD
    }
}
