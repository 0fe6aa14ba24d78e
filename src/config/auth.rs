use serde::{Deserialize, Serialize};

use super::ConfigError;

const MIN_SECRET_LEN: usize = 32;
/// Upper bounds keep cookie and database expiry arithmetic in range.
pub const MAX_CLINIC_SESSION_DAYS: i64 = 3650;
pub const MAX_ADMIN_SESSION_HOURS: i64 = 8760;

/// Cookie session and admin credential configuration.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Key used to sign session cookies (HMAC-SHA256). At least 32 bytes.
    #[serde(default)]
    pub session_secret: String,

    /// Mark session cookies `Secure` (HTTPS only).
    #[serde(default = "default_true")]
    pub secure_cookies: bool,

    /// SameSite attribute for session cookies.
    #[serde(default)]
    pub same_site: SameSite,

    /// Lifetime of the persistent clinic session, in days.
    #[serde(default = "default_clinic_session_days")]
    pub clinic_session_days: i64,

    /// Lifetime of the admin session cookie, in hours.
    #[serde(default = "default_admin_session_hours")]
    pub admin_session_hours: i64,

    /// Platform admin credentials. Admin login is refused when unset.
    #[serde(default)]
    pub admin: Option<AdminCredentialsConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            secure_cookies: true,
            same_site: SameSite::default(),
            clinic_session_days: default_clinic_session_days(),
            admin_session_hours: default_admin_session_hours(),
            admin: None,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_secret", &"****")
            .field("secure_cookies", &self.secure_cookies)
            .field("same_site", &self.same_site)
            .field("clinic_session_days", &self.clinic_session_days)
            .field("admin_session_hours", &self.admin_session_hours)
            .field("admin", &self.admin)
            .finish()
    }
}

impl AuthConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.session_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Validation(format!(
                "auth.session_secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if !(1..=MAX_CLINIC_SESSION_DAYS).contains(&self.clinic_session_days) {
            return Err(ConfigError::Validation(format!(
                "auth.clinic_session_days must be between 1 and {MAX_CLINIC_SESSION_DAYS}"
            )));
        }
        if !(1..=MAX_ADMIN_SESSION_HOURS).contains(&self.admin_session_hours) {
            return Err(ConfigError::Validation(format!(
                "auth.admin_session_hours must be between 1 and {MAX_ADMIN_SESSION_HOURS}"
            )));
        }
        if let Some(admin) = &self.admin {
            admin.validate()?;
        }
        Ok(())
    }
}

/// Platform admin login.
///
/// Generate `password_hash` with `cinebaby hash-password`.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct AdminCredentialsConfig {
    pub email: String,

    /// Argon2 PHC string.
    pub password_hash: String,
}

impl std::fmt::Debug for AdminCredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentialsConfig")
            .field("email", &self.email)
            .field("password_hash", &"****")
            .finish()
    }
}

impl AdminCredentialsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.email.trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.admin.email cannot be empty".into(),
            ));
        }
        if !self.password_hash.starts_with("$argon2") {
            return Err(ConfigError::Validation(
                "auth.admin.password_hash must be an argon2 hash (see `cinebaby hash-password`)"
                    .into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
    #[default]
    Lax,
    Strict,
    None,
}

impl From<SameSite> for tower_cookies::cookie::SameSite {
    fn from(value: SameSite) -> Self {
        match value {
            SameSite::Lax => tower_cookies::cookie::SameSite::Lax,
            SameSite::Strict => tower_cookies::cookie::SameSite::Strict,
            SameSite::None => tower_cookies::cookie::SameSite::None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_clinic_session_days() -> i64 {
    30
}

fn default_admin_session_hours() -> i64 {
    12
}
