use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::videos::video_from_row;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::PatientRepo,
    },
    models::{CreatePatient, Patient, UpdatePatient, Video},
};

pub struct PostgresPatientRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresPatientRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }
}

fn patient_from_row(row: &PgRow) -> Patient {
    Patient {
        id: row.get("id"),
        clinic_id: row.get("clinic_id"),
        name: row.get("name"),
        phone: row.get("phone"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl PatientRepo for PostgresPatientRepo {
    async fn create(&self, clinic_id: Uuid, input: CreatePatient) -> DbResult<Patient> {
        let row = sqlx::query(
            r#"
            INSERT INTO patients (id, clinic_id, name, phone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING id, clinic_id, name, phone, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(&input.name)
        .bind(&input.phone)
        .fetch_one(&self.write_pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::Validation(format!("Clinic {clinic_id} does not exist"))
            }
            _ => DbError::from(e),
        })?;

        Ok(patient_from_row(&row))
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Patient>> {
        let row = sqlx::query(
            r#"
            SELECT id, clinic_id, name, phone, created_at, updated_at
            FROM patients
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.read_pool)
        .await?;

        Ok(row.as_ref().map(patient_from_row))
    }

    async fn list_by_clinic(&self, clinic_id: Uuid) -> DbResult<Vec<Patient>> {
        let rows = sqlx::query(
            r#"
            SELECT id, clinic_id, name, phone, created_at, updated_at
            FROM patients
            WHERE clinic_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(clinic_id)
        .fetch_all(&self.read_pool)
        .await?;

        Ok(rows.iter().map(patient_from_row).collect())
    }

    async fn count_by_clinic(
        &self,
        clinic_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM patients
            WHERE clinic_id = $1 AND ($2::timestamptz IS NULL OR created_at >= $2)
            "#,
        )
        .bind(clinic_id)
        .bind(since)
        .fetch_one(&self.read_pool)
        .await?;
        Ok(count)
    }

    async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients")
            .fetch_one(&self.read_pool)
            .await?;
        Ok(count)
    }

    async fn update(&self, id: Uuid, input: UpdatePatient) -> DbResult<Patient> {
        let row = sqlx::query(
            r#"
            UPDATE patients SET
                name = COALESCE($1, name),
                phone = COALESCE($2, phone),
                updated_at = NOW()
            WHERE id = $3
            RETURNING id, clinic_id, name, phone, created_at, updated_at
            "#,
        )
        .bind(&input.name)
        .bind(&input.phone)
        .bind(id)
        .fetch_optional(&self.write_pool)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(patient_from_row(&row))
    }

    async fn delete_with_videos(&self, id: Uuid) -> DbResult<Vec<Video>> {
        let mut tx = self.write_pool.begin().await?;

        let rows = sqlx::query(
            r#"
            DELETE FROM videos
            WHERE patient_id = $1
            RETURNING id, patient_id, clinic_id, title, file_url, created_at
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        let videos: Vec<Video> = rows.iter().map(video_from_row).collect();

        let result = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::NotFound);
        }

        tx.commit().await?;
        Ok(videos)
    }
}
