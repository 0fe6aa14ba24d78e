use uuid::Uuid;

use crate::db::error::{DbError, DbResult};

/// SQLite stores UUIDs as TEXT; a malformed value means the row was written
/// by something other than this service.
pub fn parse_uuid(s: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::Internal(format!("Invalid UUID '{s}' in database: {e}")))
}
