use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    SqlErr,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{BaseRepository, Repository, UserRepository};
use crate::entities::user;
use crate::errors::ServiceError;
use crate::models::{normalize_email, User};

/// Process-local account store used with the fixtures backend.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: DashMap<Uuid, User>,
    /// normalised email -> id
    emails: DashMap<String, Uuid>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ServiceError> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let id = match self.emails.get(&normalize_email(email)) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        self.find_by_id(id).await
    }

    async fn insert(&self, user: User) -> Result<User, ServiceError> {
        // the email entry is the uniqueness guard
        match self.emails.entry(normalize_email(&user.email)) {
            Entry::Occupied(_) => Err(ServiceError::DuplicateEmail),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
                self.users.insert(user.id, user.clone());
                Ok(user)
            }
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        match self.users.remove(&id) {
            Some((_, user)) => {
                self.emails.remove(&normalize_email(&user.email));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Account store backed by the `users` table.
#[derive(Debug, Clone)]
pub struct SeaOrmUserRepository {
    base: BaseRepository,
}

impl SeaOrmUserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ServiceError> {
        user::Entity::find_by_id(id)
            .one(self.base.get_db())
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(self.base.get_db())
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn insert(&self, user: User) -> Result<User, ServiceError> {
        if self.find_by_email(&user.email).await?.is_some() {
            return Err(ServiceError::DuplicateEmail);
        }

        let model = user::ActiveModel::from(&user)
            .insert(self.base.get_db())
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::DuplicateEmail,
                _ => ServiceError::DatabaseError(e),
            })?;
        User::try_from(model)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        let db = self.base.get_db();
        match user::Entity::find_by_id(id).one(db).await? {
            Some(model) => {
                model.delete(db).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn user(email: &str) -> User {
        User::new("Ana".into(), email.into(), "hash".into(), Role::User)
    }

    #[tokio::test]
    async fn in_memory_lookup_by_id_and_normalised_email() {
        let repo = InMemoryUserRepository::new();
        let stored = repo.insert(user("ana@example.com")).await.unwrap();

        assert_eq!(repo.find_by_id(stored.id).await.unwrap(), Some(stored.clone()));
        assert_eq!(
            repo.find_by_email(" ANA@example.com").await.unwrap(),
            Some(stored)
        );
        assert!(repo.find_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_rejects_duplicate_email() {
        let repo = InMemoryUserRepository::new();
        repo.insert(user("ana@example.com")).await.unwrap();
        let err = repo.insert(user("Ana@Example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateEmail));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn in_memory_delete_frees_the_email() {
        let repo = InMemoryUserRepository::new();
        let stored = repo.insert(user("ana@example.com")).await.unwrap();
        assert!(repo.delete(stored.id).await.unwrap());
        assert!(!repo.delete(stored.id).await.unwrap());
        assert!(repo.insert(user("ana@example.com")).await.is_ok());
    }
}
