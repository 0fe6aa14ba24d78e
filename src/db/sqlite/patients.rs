use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use super::{common::parse_uuid, videos::SqliteVideoRepo};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::PatientRepo,
    },
    models::{CreatePatient, Patient, UpdatePatient, Video},
};

pub struct SqlitePatientRepo {
    pool: SqlitePool,
}

impl SqlitePatientRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn patient_from_row(row: &SqliteRow) -> DbResult<Patient> {
        Ok(Patient {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            clinic_id: parse_uuid(&row.get::<String, _>("clinic_id"))?,
            name: row.get("name"),
            phone: row.get("phone"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl PatientRepo for SqlitePatientRepo {
    async fn create(&self, clinic_id: Uuid, input: CreatePatient) -> DbResult<Patient> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO patients (id, clinic_id, name, phone, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(clinic_id.to_string())
        .bind(&input.name)
        .bind(&input.phone)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::Validation(format!("Clinic {clinic_id} does not exist"))
            }
            _ => DbError::from(e),
        })?;

        Ok(Patient {
            id,
            clinic_id,
            name: input.name,
            phone: input.phone,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Patient>> {
        let row = sqlx::query(
            r#"
            SELECT id, clinic_id, name, phone, created_at, updated_at
            FROM patients
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::patient_from_row).transpose()
    }

    async fn list_by_clinic(&self, clinic_id: Uuid) -> DbResult<Vec<Patient>> {
        let rows = sqlx::query(
            r#"
            SELECT id, clinic_id, name, phone, created_at, updated_at
            FROM patients
            WHERE clinic_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(clinic_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::patient_from_row).collect()
    }

    async fn count_by_clinic(
        &self,
        clinic_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<i64> {
        let count: i64 = match since {
            Some(since) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM patients WHERE clinic_id = ? AND created_at >= ?",
                )
                .bind(clinic_id.to_string())
                .bind(since)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM patients WHERE clinic_id = ?")
                    .bind(clinic_id.to_string())
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update(&self, id: Uuid, input: UpdatePatient) -> DbResult<Patient> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE patients SET
                name = COALESCE(?, name),
                phone = COALESCE(?, phone),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.name)
        .bind(&input.phone)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    async fn delete_with_videos(&self, id: Uuid) -> DbResult<Vec<Video>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, patient_id, clinic_id, title, file_url, created_at
            FROM videos
            WHERE patient_id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&mut *tx)
        .await?;
        let videos = rows
            .iter()
            .map(SqliteVideoRepo::video_from_row)
            .collect::<DbResult<Vec<_>>>()?;

        sqlx::query("DELETE FROM videos WHERE patient_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the video delete.
            return Err(DbError::NotFound);
        }

        tx.commit().await?;
        Ok(videos)
    }
}
