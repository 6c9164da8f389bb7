//! Repository layer: one async trait per resource, with an in-memory and a
//! Postgres implementation behind each.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    errors::{AppError, FieldErrors},
    models::{DeliveryProof, Parcel, User},
};

mod memory;
mod postgres;

pub use memory::{InMemoryDeliveryProofRepository, InMemoryParcelRepository, InMemoryUserRepository};
pub use postgres::{PostgresDeliveryProofRepository, PostgresParcelRepository, PostgresUserRepository};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> Result<User, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<User, AppError>;
    async fn exists(&self, id: Uuid) -> Result<bool, AppError>;
    /// All users, oldest `date_joined` first.
    async fn list(&self) -> Result<Vec<User>, AppError>;
    async fn update(&self, user: User) -> Result<User, AppError>;
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait ParcelRepository: Send + Sync {
    async fn create(&self, parcel: Parcel) -> Result<Parcel, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Parcel, AppError>;
    async fn exists(&self, id: Uuid) -> Result<bool, AppError>;
    /// All parcels, oldest `created_at` first.
    async fn list(&self) -> Result<Vec<Parcel>, AppError>;
    async fn update(&self, parcel: Parcel) -> Result<Parcel, AppError>;
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait DeliveryProofRepository: Send + Sync {
    async fn create(&self, proof: DeliveryProof) -> Result<DeliveryProof, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<DeliveryProof, AppError>;
    /// All proofs, earliest `delivered_at` first.
    async fn list(&self) -> Result<Vec<DeliveryProof>, AppError>;
    async fn update(&self, proof: DeliveryProof) -> Result<DeliveryProof, AppError>;
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}

/// The three repositories a running service needs, sharing one backend.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub parcels: Arc<dyn ParcelRepository>,
    pub proofs: Arc<dyn DeliveryProofRepository>,
}

#[derive(Debug, Clone)]
pub struct RepositoryFactory;

impl RepositoryFactory {
    pub fn postgres(pool: PgPool) -> Repositories {
        Repositories {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            parcels: Arc::new(PostgresParcelRepository::new(pool.clone())),
            proofs: Arc::new(PostgresDeliveryProofRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Repositories {
        Repositories {
            users: Arc::new(InMemoryUserRepository::new()),
            parcels: Arc::new(InMemoryParcelRepository::new()),
            proofs: Arc::new(InMemoryDeliveryProofRepository::new()),
        }
    }
}

pub(crate) fn user_not_found(id: Uuid) -> AppError { AppError::NotFound(format!("user {id}")) }
pub(crate) fn parcel_not_found(id: Uuid) -> AppError { AppError::NotFound(format!("parcel {id}")) }
pub(crate) fn proof_not_found(id: Uuid) -> AppError { AppError::NotFound(format!("delivery proof {id}")) }

pub(crate) fn duplicate_username() -> AppError {
    AppError::InvalidFields(FieldErrors::single("username", "A user with that username already exists."))
}

pub(crate) fn duplicate_tracking_number() -> AppError {
    AppError::InvalidFields(FieldErrors::single("tracking_number", "parcel with this tracking number already exists."))
}
