mod error;
mod identity;
pub mod password;
pub mod resolver;
pub mod session_store;
mod signing;

pub use error::AuthError;
pub use identity::{AdminClaims, Caller, Sessions, sign_in_admin, sign_out_admin};
pub use password::{PasswordError, hash_password, verify_password};
pub use resolver::{Actor, ClinicSession, Resolution, Resolver, authorize};
pub use session_store::{
    CookieSessionStore, CookieSettings, MemorySessionStore, SessionScope, SessionStore,
};
pub use signing::{CookieSigner, SigningKeyError};
