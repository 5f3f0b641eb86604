//! User storage with CRUD operations

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::types::{
    CreateUserRequest, StoreError, StoreResult, UpdateUserRequest, User,
};

/// Storage backend for user records.
///
/// Every mutating call validates its input first and leaves the store untouched on
/// failure.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// List all users ordered by id
    async fn list(&self) -> Vec<User>;

    /// Get a user by id
    async fn get(&self, id: i64) -> StoreResult<User>;

    /// Validate and insert a new user
    async fn create(&self, request: CreateUserRequest) -> StoreResult<User>;

    /// Validate and apply a partial update
    async fn update(&self, id: i64, request: UpdateUserRequest) -> StoreResult<User>;

    /// Delete a user, returning the removed record
    async fn delete(&self, id: i64) -> StoreResult<User>;

    /// Number of stored users
    async fn count(&self) -> usize;

    /// Backend name for logging and health output
    fn backend_name(&self) -> &'static str;
}

/// In-memory user storage
pub struct MemoryUserStore {
    users: DashMap<i64, User>,
    next_id: AtomicI64,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        users.sort_by_key(|u| u.id);
        users
    }

    async fn get(&self, id: i64) -> StoreResult<User> {
        self.users
            .get(&id)
            .map(|u| u.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, request: CreateUserRequest) -> StoreResult<User> {
        let new_user = request.validate()?;
        let now = Utc::now();
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            created_at: now,
            updated_at: now,
        };

        self.users.insert(user.id, user.clone());
        tracing::debug!(user_id = user.id, "User created");

        Ok(user)
    }

    async fn update(&self, id: i64, request: UpdateUserRequest) -> StoreResult<User> {
        let mut entry = self.users.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let changes = request.validate()?;

        let user = entry.value_mut();
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        user.updated_at = Utc::now();

        tracing::debug!(user_id = id, "User updated");
        Ok(user.clone())
    }

    async fn delete(&self, id: i64) -> StoreResult<User> {
        let (_, user) = self.users.remove(&id).ok_or(StoreError::NotFound(id))?;
        tracing::debug!(user_id = id, "User deleted");
        Ok(user)
    }

    async fn count(&self) -> usize {
        self.users.len()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Create an Arc-wrapped in-memory store
pub fn create_user_store() -> Arc<dyn UserStore> {
    Arc::new(MemoryUserStore::new())
}
