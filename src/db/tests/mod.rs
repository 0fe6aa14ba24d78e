//! Shared database repository tests.
//!
//! The same test functions run against SQLite and PostgreSQL:
//!
//! - **SQLite**: in-memory, runs with every `cargo test`
//! - **PostgreSQL**: testcontainers, marked `#[ignore]`
//!
//! Each repository module holds shared `pub async fn test_*` functions taking a
//! [`harness::RepoContext`], plus `sqlite_tests` / `postgres_tests` modules that
//! instantiate them through a macro.
//!
//! ```bash
//! cargo test                       # SQLite only
//! cargo test -- --ignored          # PostgreSQL (requires Docker)
//! ```
