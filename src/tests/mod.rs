//! Consolidated test modules.
//!
//! End-to-end tests drive the full router (cookies, CORS, body limits) against
//! an in-memory SQLite database and a temporary video directory.

#[cfg(all(test, feature = "database-sqlite"))]
mod app_e2e;
