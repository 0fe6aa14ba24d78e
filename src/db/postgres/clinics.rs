use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::ClinicRepo,
    },
    models::{Clinic, ClinicChanges, ClinicCredentials, NewClinic},
};

pub struct PostgresClinicRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresClinicRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }
}

fn clinic_from_row(row: &PgRow) -> Clinic {
    Clinic {
        id: row.get("id"),
        name: row.get("name"),
        city: row.get("city"),
        address: row.get("address"),
        phone: row.get("phone"),
        email: row.get("email"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
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
impl ClinicRepo for PostgresClinicRepo {
    async fn create(&self, input: NewClinic) -> DbResult<Clinic> {
        let row = sqlx::query(
            r#"
            INSERT INTO clinics (id, name, city, address, phone, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            RETURNING id, name, city, address, phone, email, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.city)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .bind(&input.password_hash)
        .fetch_one(&self.write_pool)
        .await
        .map_err(|e| map_email_conflict(e, &input.email))?;

        Ok(clinic_from_row(&row))
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Clinic>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, city, address, phone, email, created_at, updated_at
            FROM clinics
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.read_pool)
        .await?;

        Ok(row.as_ref().map(clinic_from_row))
    }

    async fn get_credentials_by_email(&self, email: &str) -> DbResult<Option<ClinicCredentials>> {
        // Login right after creation must not miss a lagging replica.
        let row = sqlx::query(
            r#"
            SELECT id, name, city, address, phone, email, password_hash, created_at, updated_at
            FROM clinics
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.write_pool)
        .await?;

        Ok(row.map(|row| ClinicCredentials {
            clinic: clinic_from_row(&row),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn list(&self) -> DbResult<Vec<Clinic>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, city, address, phone, email, created_at, updated_at
            FROM clinics
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.read_pool)
        .await?;

        Ok(rows.iter().map(clinic_from_row).collect())
    }

    async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clinics")
            .fetch_one(&self.read_pool)
            .await?;
        Ok(count)
    }

    async fn update(&self, id: Uuid, changes: ClinicChanges) -> DbResult<Clinic> {
        let email_for_error = changes.email.clone().unwrap_or_default();

        let row = sqlx::query(
            r#"
            UPDATE clinics SET
                name = COALESCE($1, name),
                city = COALESCE($2, city),
                address = COALESCE($3, address),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                password_hash = COALESCE($6, password_hash),
                updated_at = NOW()
            WHERE id = $7
            RETURNING id, name, city, address, phone, email, created_at, updated_at
            "#,
        )
        .bind(&changes.name)
        .bind(&changes.city)
        .bind(&changes.address)
        .bind(&changes.phone)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .bind(id)
        .fetch_optional(&self.write_pool)
        .await
        .map_err(|e| map_email_conflict(e, &email_for_error))?
        .ok_or(DbError::NotFound)?;

        Ok(clinic_from_row(&row))
    }
}
