//! Tamper-evident cookie values.
//!
//! A signed value is `base64url(payload).base64url(hmac_sha256(secret, payload))`.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
#[error("Invalid signing key: {0}")]
pub struct SigningKeyError(String);

#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSigner").finish_non_exhaustive()
    }
}

impl CookieSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SigningKeyError> {
        let mac = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| SigningKeyError(e.to_string()))?;
        Ok(Self { mac })
    }

    pub fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let tag = mac.finalize().into_bytes();
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(tag)
        )
    }

    /// The payload of a correctly signed value, `None` otherwise.
    pub fn verify(&self, signed: &str) -> Option<String> {
        let (payload_b64, tag_b64) = signed.split_once('.')?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let tag = URL_SAFE_NO_PAD.decode(tag_b64).ok()?;

        let mut mac = self.mac.clone();
        mac.update(&payload);
        mac.verify_slice(&tag).ok()?;

        String::from_utf8(payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_verify() {
        let signer = CookieSigner::new("0123456789abcdef0123456789abcdef").unwrap();
        let signed = signer.sign(r#"{"id":"x"}"#);
        assert_eq!(signer.verify(&signed).as_deref(), Some(r#"{"id":"x"}"#));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = CookieSigner::new("0123456789abcdef0123456789abcdef").unwrap();
        let signed = signer.sign("clinic-a");
        let (_, tag) = signed.split_once('.').unwrap();
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode("clinic-b"), tag);
        assert_eq!(signer.verify(&forged), None);
    }

    #[test]
    fn test_other_secret_rejected() {
        let a = CookieSigner::new("0123456789abcdef0123456789abcdef").unwrap();
        let b = CookieSigner::new("fedcba9876543210fedcba9876543210").unwrap();
        assert_eq!(b.verify(&a.sign("payload")), None);
    }

    #[test]
    fn test_garbage_rejected() {
        let signer = CookieSigner::new("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(signer.verify("not-signed"), None);
        assert_eq!(signer.verify("a.b.c"), None);
        assert_eq!(signer.verify(""), None);
    }
}
