use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::ClinicRepo,
    },
    models::{Clinic, ClinicChanges, ClinicCredentials, NewClinic},
};

pub struct SqliteClinicRepo {
    pool: SqlitePool,
}

impl SqliteClinicRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn clinic_from_row(row: &SqliteRow) -> DbResult<Clinic> {
        Ok(Clinic {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            name: row.get("name"),
            city: row.get("city"),
            address: row.get("address"),
            phone: row.get("phone"),
            email: row.get("email"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

fn map_email_conflict(e: sqlx::Error, email: &str) -> DbError {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::Conflict(format!("Clinic with email '{email}' already exists"))
        }
        _ => DbError::from(e),
    }
}

#[async_trait]
impl ClinicRepo for SqliteClinicRepo {
    async fn create(&self, input: NewClinic) -> DbResult<Clinic> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query(
            r#"
            INSERT INTO clinics (id, name, city, address, phone, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&input.name)
        .bind(&input.city)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_email_conflict(e, &input.email))?;

        Ok(Clinic {
            id,
            name: input.name,
            city: input.city,
            address: input.address,
            phone: input.phone,
            email: input.email,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Clinic>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, city, address, phone, email, created_at, updated_at
            FROM clinics
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::clinic_from_row).transpose()
    }

    async fn get_credentials_by_email(&self, email: &str) -> DbResult<Option<ClinicCredentials>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, city, address, phone, email, password_hash, created_at, updated_at
            FROM clinics
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ClinicCredentials {
                clinic: Self::clinic_from_row(&row)?,
                password_hash: row.get("password_hash"),
            })),
            None => Ok(None),
        }
    }

    async fn list(&self) -> DbResult<Vec<Clinic>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, city, address, phone, email, created_at, updated_at
            FROM clinics
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::clinic_from_row).collect()
    }

    async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clinics")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update(&self, id: Uuid, changes: ClinicChanges) -> DbResult<Clinic> {
        let now = chrono::Utc::now();
        let email_for_error = changes.email.clone().unwrap_or_default();

        let result = sqlx::query(
            r#"
            UPDATE clinics SET
                name = COALESCE(?, name),
                city = COALESCE(?, city),
                address = COALESCE(?, address),
                phone = COALESCE(?, phone),
                email = COALESCE(?, email),
                password_hash = COALESCE(?, password_hash),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.name)
        .bind(&changes.city)
        .bind(&changes.address)
        .bind(&changes.phone)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_email_conflict(e, &email_for_error))?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}
