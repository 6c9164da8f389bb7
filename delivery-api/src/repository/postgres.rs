//! Postgres repositories built on runtime `sqlx` queries. Schema lives in
//! `migrations/`; enums are stored as their snake_case text form.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::{
    duplicate_tracking_number, duplicate_username, parcel_not_found, proof_not_found, user_not_found,
    DeliveryProofRepository, ParcelRepository, UserRepository,
};
use crate::{
    errors::AppError,
    models::{DeliveryProof, Parcel, ParcelStatus, User, UserRole},
};

fn unique_or_repo(e: sqlx::Error, on_unique: fn() -> AppError) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => on_unique(),
        _ => AppError::Repo(e.to_string()),
    }
}

fn user_from_row(row: &PgRow) -> Result<User, AppError> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone: row.try_get("phone")?,
        role: UserRole::parse(&role).ok_or_else(|| AppError::Repo(format!("unknown user role {role:?}")))?,
        is_active: row.try_get("is_active")?,
        date_joined: row.try_get("date_joined")?,
    })
}

fn parcel_from_row(row: &PgRow) -> Result<Parcel, AppError> {
    let status: String = row.try_get("status")?;
    Ok(Parcel {
        id: row.try_get("id")?,
        tracking_number: row.try_get("tracking_number")?,
        sender_id: row.try_get("sender_id")?,
        courier_id: row.try_get("courier_id")?,
        recipient_name: row.try_get("recipient_name")?,
        delivery_address: row.try_get("delivery_address")?,
        weight_kg: row.try_get("weight_kg")?,
        status: ParcelStatus::parse(&status).ok_or_else(|| AppError::Repo(format!("unknown parcel status {status:?}")))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn proof_from_row(row: &PgRow) -> Result<DeliveryProof, AppError> {
    Ok(DeliveryProof {
        id: row.try_get("id")?,
        parcel_id: row.try_get("parcel_id")?,
        courier_id: row.try_get("courier_id")?,
        received_by: row.try_get("received_by")?,
        signature: row.try_get("signature")?,
        photo_url: row.try_get("photo_url")?,
        notes: row.try_get("notes")?,
        delivered_at: row.try_get("delivered_at")?,
    })
}

#[derive(Clone)]
pub struct PostgresUserRepository {
    pub pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> Result<User, AppError> {
        let row = sqlx::query(
            r#"INSERT INTO users (id, username, email, first_name, last_name, phone, role, is_active, date_joined)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, username, email, first_name, last_name, phone, role, is_active, date_joined"#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.date_joined)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_or_repo(e, duplicate_username))?;
        user_from_row(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, AppError> {
        let row = sqlx::query(
            r#"SELECT id, username, email, first_name, last_name, phone, role, is_active, date_joined
               FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(user_from_row).unwrap_or_else(|| Err(user_not_found(id)))
    }

    async fn exists(&self, id: Uuid) -> Result<bool, AppError> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, username, email, first_name, last_name, phone, role, is_active, date_joined
               FROM users ORDER BY date_joined ASC, id ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update(&self, user: User) -> Result<User, AppError> {
        let row = sqlx::query(
            r#"UPDATE users SET username=$2, email=$3, first_name=$4, last_name=$5, phone=$6, role=$7, is_active=$8
               WHERE id=$1
               RETURNING id, username, email, first_name, last_name, phone, role, is_active, date_joined"#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_or_repo(e, duplicate_username))?;
        row.as_ref().map(user_from_row).unwrap_or_else(|| Err(user_not_found(user.id)))
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let rows = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        if rows.rows_affected() == 0 { return Err(user_not_found(id)); }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresParcelRepository {
    pub pool: PgPool,
}

impl PostgresParcelRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl ParcelRepository for PostgresParcelRepository {
    async fn create(&self, parcel: Parcel) -> Result<Parcel, AppError> {
        let row = sqlx::query(
            r#"INSERT INTO parcels (id, tracking_number, sender_id, courier_id, recipient_name, delivery_address,
                                    weight_kg, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id, tracking_number, sender_id, courier_id, recipient_name, delivery_address,
                         weight_kg, status, created_at, updated_at"#,
        )
        .bind(parcel.id)
        .bind(&parcel.tracking_number)
        .bind(parcel.sender_id)
        .bind(parcel.courier_id)
        .bind(&parcel.recipient_name)
        .bind(&parcel.delivery_address)
        .bind(parcel.weight_kg)
        .bind(parcel.status.as_str())
        .bind(parcel.created_at)
        .bind(parcel.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_or_repo(e, duplicate_tracking_number))?;
        parcel_from_row(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Parcel, AppError> {
        let row = sqlx::query(
            r#"SELECT id, tracking_number, sender_id, courier_id, recipient_name, delivery_address,
                      weight_kg, status, created_at, updated_at
               FROM parcels WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(parcel_from_row).unwrap_or_else(|| Err(parcel_not_found(id)))
    }

    async fn exists(&self, id: Uuid) -> Result<bool, AppError> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM parcels WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn list(&self) -> Result<Vec<Parcel>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, tracking_number, sender_id, courier_id, recipient_name, delivery_address,
                      weight_kg, status, created_at, updated_at
               FROM parcels ORDER BY created_at ASC, id ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(parcel_from_row).collect()
    }

    async fn update(&self, parcel: Parcel) -> Result<Parcel, AppError> {
        let row = sqlx::query(
            r#"UPDATE parcels SET tracking_number=$2, sender_id=$3, courier_id=$4, recipient_name=$5,
                                  delivery_address=$6, weight_kg=$7, status=$8, updated_at=$9
               WHERE id=$1
               RETURNING id, tracking_number, sender_id, courier_id, recipient_name, delivery_address,
                         weight_kg, status, created_at, updated_at"#,
        )
        .bind(parcel.id)
        .bind(&parcel.tracking_number)
        .bind(parcel.sender_id)
        .bind(parcel.courier_id)
        .bind(&parcel.recipient_name)
        .bind(&parcel.delivery_address)
        .bind(parcel.weight_kg)
        .bind(parcel.status.as_str())
        .bind(parcel.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_or_repo(e, duplicate_tracking_number))?;
        row.as_ref().map(parcel_from_row).unwrap_or_else(|| Err(parcel_not_found(parcel.id)))
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let rows = sqlx::query("DELETE FROM parcels WHERE id = $1").bind(id).execute(&self.pool).await?;
        if rows.rows_affected() == 0 { return Err(parcel_not_found(id)); }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresDeliveryProofRepository {
    pub pool: PgPool,
}

impl PostgresDeliveryProofRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl DeliveryProofRepository for PostgresDeliveryProofRepository {
    async fn create(&self, proof: DeliveryProof) -> Result<DeliveryProof, AppError> {
        let row = sqlx::query(
            r#"INSERT INTO delivery_proofs (id, parcel_id, courier_id, received_by, signature, photo_url, notes, delivered_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id, parcel_id, courier_id, received_by, signature, photo_url, notes, delivered_at"#,
        )
        .bind(proof.id)
        .bind(proof.parcel_id)
        .bind(proof.courier_id)
        .bind(&proof.received_by)
        .bind(&proof.signature)
        .bind(&proof.photo_url)
        .bind(&proof.notes)
        .bind(proof.delivered_at)
        .fetch_one(&self.pool)
        .await?;
        proof_from_row(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<DeliveryProof, AppError> {
        let row = sqlx::query(
            r#"SELECT id, parcel_id, courier_id, received_by, signature, photo_url, notes, delivered_at
               FROM delivery_proofs WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(proof_from_row).unwrap_or_else(|| Err(proof_not_found(id)))
    }

    async fn list(&self) -> Result<Vec<DeliveryProof>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, parcel_id, courier_id, received_by, signature, photo_url, notes, delivered_at
               FROM delivery_proofs ORDER BY delivered_at ASC, id ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(proof_from_row).collect()
    }

    async fn update(&self, proof: DeliveryProof) -> Result<DeliveryProof, AppError> {
        let row = sqlx::query(
            r#"UPDATE delivery_proofs SET parcel_id=$2, courier_id=$3, received_by=$4, signature=$5,
                                          photo_url=$6, notes=$7, delivered_at=$8
               WHERE id=$1
               RETURNING id, parcel_id, courier_id, received_by, signature, photo_url, notes, delivered_at"#,
        )
        .bind(proof.id)
        .bind(proof.parcel_id)
        .bind(proof.courier_id)
        .bind(&proof.received_by)
        .bind(&proof.signature)
        .bind(&proof.photo_url)
        .bind(&proof.notes)
        .bind(proof.delivered_at)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(proof_from_row).unwrap_or_else(|| Err(proof_not_found(proof.id)))
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let rows = sqlx::query("DELETE FROM delivery_proofs WHERE id = $1").bind(id).execute(&self.pool).await?;
        if rows.rows_affected() == 0 { return Err(proof_not_found(id)); }
        Ok(())
    }
}
