use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Public patient page and printable card settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct PublicConfig {
    /// QR image service. The card links to
    /// `{qr_service_url}?size={n}x{n}&data={patient page url}`.
    #[serde(default = "default_qr_service_url")]
    pub qr_service_url: String,

    /// Edge length of the QR image in pixels.
    #[serde(default = "default_qr_size")]
    pub qr_size: u32,

    /// Name shown when a patient's clinic cannot be found.
    #[serde(default = "default_fallback_clinic_name")]
    pub fallback_clinic_name: String,
}

impl Default for PublicConfig {
    fn default() -> Self {
        Self {
            qr_service_url: default_qr_service_url(),
            qr_size: default_qr_size(),
            fallback_clinic_name: default_fallback_clinic_name(),
        }
    }
}

impl PublicConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.qr_service_url).map_err(|e| {
            ConfigError::Validation(format!("public.qr_service_url is not a valid URL: {e}"))
        })?;
        if !(50..=1000).contains(&self.qr_size) {
            return Err(ConfigError::Validation(
                "public.qr_size must be between 50 and 1000".into(),
            ));
        }
        Ok(())
    }

    /// QR image URL encoding `data`.
    pub fn qr_code_url(&self, data: &str) -> String {
        let size = format!("{0}x{0}", self.qr_size);
        match url::Url::parse_with_params(
            &self.qr_service_url,
            &[("size", size.as_str()), ("data", data)],
        ) {
            Ok(url) => url.to_string(),
            Err(_) => self.qr_service_url.clone(),
        }
    }
}

fn default_qr_service_url() -> String {
    "https://api.qrserver.com/v1/create-qr-code/".to_string()
}

fn default_qr_size() -> u32 {
    200
}

fn default_fallback_clinic_name() -> String {
    "Clínica".to_string()
}
