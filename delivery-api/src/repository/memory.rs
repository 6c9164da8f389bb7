//! In-memory repositories for development, tests and the no-database fallback.
//! Each table is an `Arc<RwLock<HashMap<..>>>`, so writers are serialised.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    duplicate_tracking_number, duplicate_username, parcel_not_found, proof_not_found, user_not_found,
    DeliveryProofRepository, ParcelRepository, UserRepository,
};
use crate::{
    errors::AppError,
    models::{DeliveryProof, Parcel, User},
};

#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    inner: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, AppError> {
        let mut map = self.inner.write().await;
        if map.values().any(|u| u.username == user.username) {
            return Err(duplicate_username());
        }
        map.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, AppError> {
        let map = self.inner.read().await;
        map.get(&id).cloned().ok_or_else(|| user_not_found(id))
    }

    async fn exists(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.inner.read().await.contains_key(&id))
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        let map = self.inner.read().await;
        let mut users: Vec<User> = map.values().cloned().collect();
        users.sort_by_key(|u| (u.date_joined, u.id));
        Ok(users)
    }

    async fn update(&self, user: User) -> Result<User, AppError> {
        let mut map = self.inner.write().await;
        if !map.contains_key(&user.id) {
            return Err(user_not_found(user.id));
        }
        if map.values().any(|u| u.id != user.id && u.username == user.username) {
            return Err(duplicate_username());
        }
        map.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut map = self.inner.write().await;
        map.remove(&id).ok_or_else(|| user_not_found(id))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryParcelRepository {
    inner: Arc<RwLock<HashMap<Uuid, Parcel>>>,
}

impl InMemoryParcelRepository {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl ParcelRepository for InMemoryParcelRepository {
    async fn create(&self, parcel: Parcel) -> Result<Parcel, AppError> {
        let mut map = self.inner.write().await;
        if map.values().any(|p| p.tracking_number == parcel.tracking_number) {
            return Err(duplicate_tracking_number());
        }
        map.insert(parcel.id, parcel.clone());
        Ok(parcel)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Parcel, AppError> {
        let map = self.inner.read().await;
        map.get(&id).cloned().ok_or_else(|| parcel_not_found(id))
    }

    async fn exists(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.inner.read().await.contains_key(&id))
    }

    async fn list(&self) -> Result<Vec<Parcel>, AppError> {
        let map = self.inner.read().await;
        let mut parcels: Vec<Parcel> = map.values().cloned().collect();
        parcels.sort_by_key(|p| (p.created_at, p.id));
        Ok(parcels)
    }

    async fn update(&self, parcel: Parcel) -> Result<Parcel, AppError> {
        let mut map = self.inner.write().await;
        if !map.contains_key(&parcel.id) {
            return Err(parcel_not_found(parcel.id));
        }
        if map.values().any(|p| p.id != parcel.id && p.tracking_number == parcel.tracking_number) {
            return Err(duplicate_tracking_number());
        }
        map.insert(parcel.id, parcel.clone());
        Ok(parcel)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut map = self.inner.write().await;
        map.remove(&id).ok_or_else(|| parcel_not_found(id))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDeliveryProofRepository {
    inner: Arc<RwLock<HashMap<Uuid, DeliveryProof>>>,
}

impl InMemoryDeliveryProofRepository {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl DeliveryProofRepository for InMemoryDeliveryProofRepository {
    async fn create(&self, proof: DeliveryProof) -> Result<DeliveryProof, AppError> {
        self.inner.write().await.insert(proof.id, proof.clone());
        Ok(proof)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<DeliveryProof, AppError> {
        let map = self.inner.read().await;
        map.get(&id).cloned().ok_or_else(|| proof_not_found(id))
    }

    async fn list(&self) -> Result<Vec<DeliveryProof>, AppError> {
        let map = self.inner.read().await;
        let mut proofs: Vec<DeliveryProof> = map.values().cloned().collect();
        proofs.sort_by_key(|p| (p.delivered_at, p.id));
        Ok(proofs)
    }

    async fn update(&self, proof: DeliveryProof) -> Result<DeliveryProof, AppError> {
        let mut map = self.inner.write().await;
        match map.get_mut(&proof.id) {
            Some(slot) => {
                *slot = proof.clone();
                Ok(proof)
            }
            None => Err(proof_not_found(proof.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut map = self.inner.write().await;
        map.remove(&id).ok_or_else(|| proof_not_found(id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryProofPayload, ParcelPayload, ParcelStatus, UserPayload};

    fn user(username: &str) -> User {
        UserPayload {
            username: Some(Some(username.into())),
            email: Some(Some(format!("{username}@example.com"))),
            ..Default::default()
        }
        .into_new()
    }

    fn parcel(tracking: &str, sender: Uuid) -> Parcel {
        ParcelPayload {
            tracking_number: Some(Some(tracking.into())),
            sender_id: Some(Some(sender)),
            recipient_name: Some(Some("Ann".into())),
            delivery_address: Some(Some("1 Main St".into())),
            ..Default::default()
        }
        .into_new()
    }

    #[tokio::test]
    async fn in_memory_user_crud() {
        let repo = InMemoryUserRepository::new();
        let alice = repo.create(user("alice")).await.unwrap();
        repo.create(user("bob")).await.unwrap();
        assert!(repo.exists(alice.id).await.unwrap());
        assert_eq!(repo.list().await.unwrap().len(), 2);

        let mut renamed = alice.clone();
        renamed.first_name = "Alice".into();
        repo.update(renamed).await.unwrap();
        assert_eq!(repo.find_by_id(alice.id).await.unwrap().first_name, "Alice");

        repo.delete(alice.id).await.unwrap();
        assert!(matches!(repo.find_by_id(alice.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(repo.delete(alice.id).await, Err(AppError::NotFound(_))));
        assert!(!repo.exists(alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let repo = InMemoryUserRepository::new();
        repo.create(user("alice")).await.unwrap();
        let bob = repo.create(user("bob")).await.unwrap();
        assert!(matches!(repo.create(user("alice")).await, Err(AppError::InvalidFields(_))));

        let mut clash = bob.clone();
        clash.username = "alice".into();
        assert!(matches!(repo.update(clash).await, Err(AppError::InvalidFields(_))));
        // Saving a user under its own username is not a clash.
        assert!(repo.update(bob).await.is_ok());
    }

    #[tokio::test]
    async fn parcel_update_and_tracking_uniqueness() {
        let repo = InMemoryParcelRepository::new();
        let sender = Uuid::new_v4();
        let first = repo.create(parcel("TRK-1", sender)).await.unwrap();
        assert!(matches!(repo.create(parcel("TRK-1", sender)).await, Err(AppError::InvalidFields(_))));

        let mut moved = first.clone();
        moved.status = ParcelStatus::Delivered;
        repo.update(moved).await.unwrap();
        assert_eq!(repo.find_by_id(first.id).await.unwrap().status, ParcelStatus::Delivered);

        let missing = parcel("TRK-2", sender);
        assert!(matches!(repo.update(missing).await, Err(AppError::NotFound(_))));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn proofs_list_in_delivery_order() {
        let repo = InMemoryDeliveryProofRepository::new();
        let parcel_id = Uuid::new_v4();
        let late = DeliveryProofPayload {
            parcel_id: Some(Some(parcel_id)),
            received_by: Some(Some("Late".into())),
            delivered_at: Some(Some("2024-05-02T10:00:00Z".parse().unwrap())),
            ..Default::default()
        }
        .into_new();
        let early = DeliveryProofPayload {
            parcel_id: Some(Some(parcel_id)),
            received_by: Some(Some("Early".into())),
            delivered_at: Some(Some("2024-05-01T10:00:00Z".parse().unwrap())),
            ..Default::default()
        }
        .into_new();
        repo.create(late).await.unwrap();
        repo.create(early).await.unwrap();
        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|p| p.received_by).collect();
        assert_eq!(names, vec!["Early", "Late"]);
    }
}
