use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::VideoRepo,
    },
    models::{NewVideo, Video, VideoCursor},
};

pub struct SqliteVideoRepo {
    pool: SqlitePool,
}

impl SqliteVideoRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(super) fn video_from_row(row: &SqliteRow) -> DbResult<Video> {
        Ok(Video {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            patient_id: parse_uuid(&row.get::<String, _>("patient_id"))?,
            clinic_id: parse_uuid(&row.get::<String, _>("clinic_id"))?,
            title: row.get("title"),
            file_url: row.get("file_url"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl VideoRepo for SqliteVideoRepo {
    async fn create(&self, input: NewVideo) -> DbResult<Video> {
        let id = Uuid::new_v4();
        let created_at = input.created_at.unwrap_or_else(Utc::now);

        sqlx::query(
            r#"
            INSERT INTO videos (id, patient_id, clinic_id, title, file_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(input.patient_id.to_string())
        .bind(input.clinic_id.to_string())
        .bind(&input.title)
        .bind(&input.file_url)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::Validation(format!("Patient {} does not exist", input.patient_id))
            }
            _ => DbError::from(e),
        })?;

        Ok(Video {
            id,
            patient_id: input.patient_id,
            clinic_id: input.clinic_id,
            title: input.title,
            file_url: input.file_url,
            created_at,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Video>> {
        let row = sqlx::query(
            r#"
            SELECT id, patient_id, clinic_id, title, file_url, created_at
            FROM videos
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::video_from_row).transpose()
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> DbResult<Vec<Video>> {
        let rows = sqlx::query(
            r#"
            SELECT id, patient_id, clinic_id, title, file_url, created_at
            FROM videos
            WHERE patient_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(patient_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::video_from_row).collect()
    }

    async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn list_created_before(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<VideoCursor>,
        limit: i64,
    ) -> DbResult<Vec<Video>> {
        let rows = match after {
            Some(cursor) => {
                sqlx::query(
                    r#"
                    SELECT id, patient_id, clinic_id, title, file_url, created_at
                    FROM videos
                    WHERE created_at < ? AND (created_at, id) > (?, ?)
                    ORDER BY created_at ASC, id ASC
                    LIMIT ?
                    "#,
                )
                .bind(cutoff)
                .bind(cursor.created_at)
                .bind(cursor.id.to_string())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, patient_id, clinic_id, title, file_url, created_at
                    FROM videos
                    WHERE created_at < ?
                    ORDER BY created_at ASC, id ASC
                    LIMIT ?
                    "#,
                )
                .bind(cutoff)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::video_from_row).collect()
    }
}
