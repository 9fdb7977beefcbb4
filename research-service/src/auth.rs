//! Local credential store: a flat JSON file mapping email addresses to
//! salted password hashes. Passwords are never stored in clear text.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("An account already exists for {0}")]
    DuplicateEmail(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential store is corrupt: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialRecord {
    salt: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn signup(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(AuthError::InvalidInput(
                "Password must not be empty".to_string(),
            ));
        }

        let mut records = self.load()?;
        if records.contains_key(&email) {
            return Err(AuthError::DuplicateEmail(email));
        }

        let salt: [u8; 16] = rand::rng().random();
        records.insert(
            email,
            CredentialRecord {
                salt: hex_encode(&salt),
                password_hash: hash_password(&salt, password),
                created_at: Utc::now(),
            },
        );

        self.persist(&records)
    }

    pub fn verify(&self, email: &str, password: &str) -> Result<bool, AuthError> {
        let email = normalize_email(email)?;
        let records = self.load()?;

        let Some(record) = records.get(&email) else {
            return Ok(false);
        };
        let salt = hex_decode(&record.salt)
            .ok_or_else(|| AuthError::Corrupt(format!("Bad salt for {}", email)))?;

        Ok(hash_password(&salt, password) == record.password_hash)
    }

    fn load(&self) -> Result<HashMap<String, CredentialRecord>, AuthError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| AuthError::Corrupt(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, records: &HashMap<String, CredentialRecord>) -> Result<(), AuthError> {
        let contents = serde_json::to_string_pretty(records)
            .map_err(|e| AuthError::Corrupt(e.to_string()))?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AuthError::InvalidInput(
            "A valid email address is required".to_string(),
        ));
    }
    Ok(email)
}

fn hash_password(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TempStore {
        store: CredentialStore,
        path: PathBuf,
    }

    impl TempStore {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!(
                "credential-store-test-{}.json",
                uuid::Uuid::new_v4()
            ));
            Self {
                store: CredentialStore::new(&path),
                path,
            }
        }
    }

    impl Drop for TempStore {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    #[test]
    fn signup_then_verify_roundtrip() {
        let temp = TempStore::new();
        temp.store.signup("User@Example.com", "hunter22").unwrap();

        assert!(temp.store.verify("user@example.com", "hunter22").unwrap());
        assert!(!temp.store.verify("user@example.com", "wrong").unwrap());
        assert!(!temp.store.verify("other@example.com", "hunter22").unwrap());
    }

    #[test]
    fn duplicate_signup_is_rejected() {
        let temp = TempStore::new();
        temp.store.signup("user@example.com", "hunter22").unwrap();

        let result = temp.store.signup("user@example.com", "other");
        assert!(matches!(result, Err(AuthError::DuplicateEmail(_))));
    }

    #[test]
    fn stored_file_contains_no_plaintext_password() {
        let temp = TempStore::new();
        temp.store.signup("user@example.com", "hunter22").unwrap();

        let contents = std::fs::read_to_string(&temp.path).unwrap();
        assert!(!contents.contains("hunter22"));
    }

    #[test]
    fn invalid_email_is_rejected() {
        let temp = TempStore::new();
        assert!(matches!(
            temp.store.signup("not-an-email", "hunter22"),
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[test]
    fn hex_roundtrip() {
        let bytes = [0u8, 1, 0xab, 0xff];
        assert_eq!(hex_decode(&hex_encode(&bytes)).unwrap(), bytes);
        assert!(hex_decode("abc").is_none());
        assert!(hex_decode("zz").is_none());
    }
}
