use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::VideoRepo,
    },
    models::{NewVideo, Video, VideoCursor},
};

pub struct PostgresVideoRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresVideoRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }
}

pub(super) fn video_from_row(row: &PgRow) -> Video {
    Video {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        clinic_id: row.get("clinic_id"),
        title: row.get("title"),
        file_url: row.get("file_url"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl VideoRepo for PostgresVideoRepo {
    async fn create(&self, input: NewVideo) -> DbResult<Video> {
        let created_at = input.created_at.unwrap_or_else(Utc::now);

        let row = sqlx::query(
            r#"
            INSERT INTO videos (id, patient_id, clinic_id, title, file_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, patient_id, clinic_id, title, file_url, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.patient_id)
        .bind(input.clinic_id)
        .bind(&input.title)
        .bind(&input.file_url)
        .bind(created_at)
        .fetch_one(&self.write_pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::Validation(format!("Patient {} does not exist", input.patient_id))
            }
            _ => DbError::from(e),
        })?;

        Ok(video_from_row(&row))
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Video>> {
        let row = sqlx::query(
            r#"
            SELECT id, patient_id, clinic_id, title, file_url, created_at
            FROM videos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.read_pool)
        .await?;

        Ok(row.as_ref().map(video_from_row))
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> DbResult<Vec<Video>> {
        let rows = sqlx::query(
            r#"
            SELECT id, patient_id, clinic_id, title, file_url, created_at
            FROM videos
            WHERE patient_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.read_pool)
        .await?;

        Ok(rows.iter().map(video_from_row).collect())
    }

    async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.read_pool)
            .await?;
        Ok(count)
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(id)
            .execute(&self.write_pool)
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
        // Cleanup deletes what it reads, so it reads from the primary.
        let rows = sqlx::query(
            r#"
            SELECT id, patient_id, clinic_id, title, file_url, created_at
            FROM videos
            WHERE created_at < $1
              AND ($2::timestamptz IS NULL OR ROW(created_at, id) > ROW($2, $3))
            ORDER BY created_at ASC, id ASC
            LIMIT $4
            "#,
        )
        .bind(cutoff)
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.write_pool)
        .await?;

        Ok(rows.iter().map(video_from_row).collect())
    }
}
