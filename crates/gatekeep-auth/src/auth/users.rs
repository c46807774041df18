//! User records and storage.

use std::path::Path;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use gatekeep_core::ValidationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AuthError;

/// User directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// A record for this identity already exists.
    #[error("User already exists: {0}")]
    Exists(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular account, assigned at signup.
    User,
    /// Administrative account.
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Locally stored user record.
///
/// Holds gateway object ids, never the gateway secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User identity (email).
    pub identity: String,
    /// User role.
    pub role: UserRole,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Consumer id from the last successful login.
    #[serde(default)]
    pub gateway_consumer_id: Option<String>,
    /// JWT credential id from the last successful login.
    #[serde(default)]
    pub gateway_credential_id: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Create an unprovisioned record, hashing the password.
    ///
    /// # Errors
    ///
    /// Returns error if password hashing fails.
    pub fn new(
        identity: impl Into<String>,
        password: &str,
        role: UserRole,
    ) -> Result<Self, AuthError> {
        let now = Utc::now();
        Ok(Self {
            identity: identity.into(),
            role,
            password_hash: hash_password(password)?,
            gateway_consumer_id: None,
            gateway_credential_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Verify a password against this record's hash.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` if the password doesn't match.
    pub fn verify_password(&self, password: &str) -> Result<(), AuthError> {
        verify_password(password, &self.password_hash)
    }

    /// Whether the record points at live gateway objects.
    #[must_use]
    pub const fn is_provisioned(&self) -> bool {
        self.gateway_credential_id.is_some()
    }
}

/// Identity-keyed user storage.
pub trait UserDirectory: Send + Sync {
    /// Look up a record.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn get(&self, identity: &str) -> Result<Option<UserRecord>, DirectoryError>;

    /// Insert a record only if the identity is absent.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::Exists` if the identity is taken.
    fn create(&self, record: &UserRecord) -> Result<(), DirectoryError>;

    /// Insert or replace a record, stamping `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    fn upsert(&self, record: UserRecord) -> Result<UserRecord, DirectoryError>;
}

/// User directory backed by sled.
pub struct UserStore {
    tree: sled::Tree,
}

impl UserStore {
    /// Open or create a user store under the given directory.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, DirectoryError> {
        let db = sled::open(path.join("directory"))
            .map_err(|e| DirectoryError::Storage(format!("Failed to open user database: {e}")))?;

        let tree = db
            .open_tree("users")
            .map_err(|e| DirectoryError::Storage(format!("Failed to open users tree: {e}")))?;

        Ok(Self { tree })
    }

    /// Count stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Check if any users exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn flush(&self) -> Result<(), DirectoryError> {
        self.tree
            .flush()
            .map_err(|e| DirectoryError::Storage(format!("Flush error: {e}")))?;
        Ok(())
    }
}

impl UserDirectory for UserStore {
    fn get(&self, identity: &str) -> Result<Option<UserRecord>, DirectoryError> {
        match self.tree.get(identity.as_bytes()) {
            Ok(Some(value)) => {
                let record: UserRecord = serde_json::from_slice(&value).map_err(|e| {
                    DirectoryError::Storage(format!("Deserialization error: {e}"))
                })?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DirectoryError::Storage(format!("Get error: {e}"))),
        }
    }

    fn create(&self, record: &UserRecord) -> Result<(), DirectoryError> {
        let value = serde_json::to_vec(record)
            .map_err(|e| DirectoryError::Storage(format!("Serialization error: {e}")))?;

        self.tree
            .compare_and_swap(record.identity.as_bytes(), None::<&[u8]>, Some(value))
            .map_err(|e| DirectoryError::Storage(format!("Insert error: {e}")))?
            .map_err(|_| DirectoryError::Exists(record.identity.clone()))?;

        self.flush()
    }

    fn upsert(&self, mut record: UserRecord) -> Result<UserRecord, DirectoryError> {
        record.updated_at = Utc::now();
        let value = serde_json::to_vec(&record)
            .map_err(|e| DirectoryError::Storage(format!("Serialization error: {e}")))?;

        self.tree
            .insert(record.identity.as_bytes(), value)
            .map_err(|e| DirectoryError::Storage(format!("Update error: {e}")))?;

        self.flush()?;
        Ok(record)
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hashing(format!("Password hashing failed: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AuthError::Hashing(format!("Invalid hash: {e}")))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::Validation(ValidationError::InvalidCredentials))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_record_creation() {
        let record = UserRecord::new("a@x.com", "Passw0rd!", UserRole::User).unwrap();
        assert_eq!(record.identity, "a@x.com");
        assert_eq!(record.role, UserRole::User);
        assert!(record.password_hash.starts_with("$argon2id$"));
        assert!(!record.is_provisioned());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_password_verification() {
        let record = UserRecord::new("a@x.com", "Passw0rd!", UserRole::User).unwrap();
        assert!(record.verify_password("Passw0rd!").is_ok());
        assert!(matches!(
            record.verify_password("Wr0ngpass!"),
            Err(AuthError::Validation(ValidationError::InvalidCredentials))
        ));
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&UserRole::User).unwrap(), r#""user""#);
        assert_eq!(UserRole::Admin.to_string(), "admin");
    }

    #[test]
    fn test_user_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = UserStore::open(temp_dir.path()).unwrap();

        assert!(store.is_empty());

        let record = UserRecord::new("a@x.com", "Passw0rd!", UserRole::User).unwrap();
        store.create(&record).unwrap();

        assert_eq!(store.len(), 1);
        let loaded = store.get("a@x.com").unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.get("b@x.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_create() {
        let temp_dir = TempDir::new().unwrap();
        let store = UserStore::open(temp_dir.path()).unwrap();

        let first = UserRecord::new("a@x.com", "Passw0rd!", UserRole::User).unwrap();
        store.create(&first).unwrap();

        let second = UserRecord::new("a@x.com", "0therPass!", UserRole::Admin).unwrap();
        let result = store.create(&second);
        assert!(matches!(result, Err(DirectoryError::Exists(_))));

        // first write wins
        let loaded = store.get("a@x.com").unwrap().unwrap();
        assert_eq!(loaded.role, UserRole::User);
    }

    #[test]
    fn test_upsert() {
        let temp_dir = TempDir::new().unwrap();
        let store = UserStore::open(temp_dir.path()).unwrap();

        let mut record = UserRecord::new("a@x.com", "Passw0rd!", UserRole::User).unwrap();
        store.create(&record).unwrap();

        record.gateway_consumer_id = Some("cons-1".to_string());
        record.gateway_credential_id = Some("cred-1".to_string());
        let saved = store.upsert(record).unwrap();
        assert!(saved.updated_at >= saved.created_at);

        let loaded = store.get("a@x.com").unwrap().unwrap();
        assert_eq!(loaded.gateway_credential_id.as_deref(), Some("cred-1"));
        assert!(loaded.is_provisioned());
    }

    #[test]
    fn test_reopen_persists() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = UserStore::open(temp_dir.path()).unwrap();
            let record = UserRecord::new("a@x.com", "Passw0rd!", UserRole::User).unwrap();
            store.create(&record).unwrap();
        }

        let store = UserStore::open(temp_dir.path()).unwrap();
        assert!(store.get("a@x.com").unwrap().is_some());
    }
}
