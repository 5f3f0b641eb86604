//! User records: types, validation and storage backends

mod store;
mod types;

pub use store::{create_user_store, MemoryUserStore, UserStore};
pub use types::{
    CreateUserRequest, NewUser, StoreError, StoreResult, UpdateUserRequest, User, UserChanges,
    ValidationErrors, MAX_NAME_LENGTH,
};

/// Users created by [`seed_sample_users`]
pub const SAMPLE_USERS: &[(&str, &str)] = &[
    ("John", "Doe"),
    ("Jane", "Smith"),
    ("Alice", "Johnson"),
    ("Bob", "Williams"),
];

/// Insert the sample users into `store`, returning how many were created
pub async fn seed_sample_users(store: &dyn UserStore) -> StoreResult<usize> {
    for (first_name, last_name) in SAMPLE_USERS {
        let user = store
            .create(CreateUserRequest {
                first_name: Some(first_name.to_string()),
                last_name: Some(last_name.to_string()),
            })
            .await?;
        tracing::info!(user_id = user.id, first_name = %user.first_name, last_name = %user.last_name, "Seeded sample user");
    }
    Ok(SAMPLE_USERS.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_sample_users() {
        let store = MemoryUserStore::new();
        let created = seed_sample_users(&store).await.unwrap();

        assert_eq!(created, 4);
        let users = store.list().await;
        assert_eq!(users[0].first_name, "John");
        assert_eq!(users[3].last_name, "Williams");
    }
}
