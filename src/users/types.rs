//! User record types, request payloads and validation

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a name field, in characters
pub const MAX_NAME_LENGTH: usize = 100;

/// A stored user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /api/users/`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Body of `PATCH /api/users/{id}/`; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Field name -> list of messages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_result(self) -> Result<(), StoreError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{}: {}", field, messages.join(" "))?;
        }
        Ok(())
    }
}

/// Record store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("User not found: {0}")]
    NotFound(i64),

    #[error("Invalid user: {0}")]
    Validation(ValidationErrors),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trim and check a name field. Returns the cleaned value when valid.
fn clean_name(
    field: &str,
    value: Option<&str>,
    required: bool,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let Some(raw) = value else {
        if required {
            errors.add(field, "This field is required.");
        }
        return None;
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        errors.add(field, "This field may not be blank.");
        return None;
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", MAX_NAME_LENGTH),
        );
        return None;
    }

    Some(trimmed.to_string())
}

/// Validated fields of a new user
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
}

/// Validated fields of a partial update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> StoreResult<NewUser> {
        let mut errors = ValidationErrors::new();
        let first_name = clean_name("first_name", self.first_name.as_deref(), true, &mut errors);
        let last_name = clean_name("last_name", self.last_name.as_deref(), true, &mut errors);

        match (first_name, last_name) {
            (Some(first_name), Some(last_name)) if errors.is_empty() => Ok(NewUser {
                first_name,
                last_name,
            }),
            _ => Err(StoreError::Validation(errors)),
        }
    }
}

impl UpdateUserRequest {
    pub fn validate(&self) -> StoreResult<UserChanges> {
        let mut errors = ValidationErrors::new();
        let changes = UserChanges {
            first_name: clean_name("first_name", self.first_name.as_deref(), false, &mut errors),
            last_name: clean_name("last_name", self.last_name.as_deref(), false, &mut errors),
        };
        errors.into_result()?;
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requires_both_names() {
        let err = CreateUserRequest::default().validate().unwrap_err();
        let StoreError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("first_name").unwrap(), ["This field is required."]);
        assert_eq!(errors.get("last_name").unwrap(), ["This field is required."]);
    }

    #[test]
    fn test_create_trims_whitespace() {
        let request = CreateUserRequest {
            first_name: Some("  John ".to_string()),
            last_name: Some("Doe".to_string()),
        };
        let new_user = request.validate().unwrap();
        assert_eq!(new_user.first_name, "John");
        assert_eq!(new_user.last_name, "Doe");
    }

    #[test]
    fn test_blank_and_too_long() {
        let request = CreateUserRequest {
            first_name: Some("   ".to_string()),
            last_name: Some("x".repeat(MAX_NAME_LENGTH + 1)),
        };
        let StoreError::Validation(errors) = request.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("first_name").unwrap(), ["This field may not be blank."]);
        assert!(errors.get("last_name").unwrap()[0].contains("100 characters"));
    }

    #[test]
    fn test_update_allows_partial() {
        let request = UpdateUserRequest {
            first_name: None,
            last_name: Some("Smith".to_string()),
        };
        let changes = request.validate().unwrap();
        assert_eq!(changes.first_name, None);
        assert_eq!(changes.last_name.as_deref(), Some("Smith"));
    }

    #[test]
    fn test_validation_errors_serialize_as_map() {
        let mut errors = ValidationErrors::new();
        errors.add("first_name", "This field is required.");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"first_name": ["This field is required."]}));
        assert_eq!(errors.to_string(), "first_name: This field is required.");
    }
}
