/// Credentials and credential stores
use crate::core::error::lock_error;
use crate::core::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use subtle::ConstantTimeEq;

/// A stored username/password pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: &str, password: &str) -> Self {
        Credential {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

/// What a client presented during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialQuery {
    pub username: String,
    pub password: Option<String>,
}

impl CredentialQuery {
    pub fn new(username: &str) -> Self {
        CredentialQuery {
            username: username.to_string(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }
}

/// Looks up stored credentials by the username in a query.
pub trait CredentialStore: Send + Sync {
    fn lookup_credential(&self, query: &CredentialQuery) -> Result<Option<Credential>>;
}

/// In-memory credential store keyed by username.
#[derive(Debug, Default)]
pub struct PlainCredentialStore {
    credentials: RwLock<HashMap<String, Credential>>,
}

impl PlainCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds credentials, replacing any with the same username.
    pub fn set_credentials<I>(&self, creds: I) -> Result<()>
    where
        I: IntoIterator<Item = Credential>,
    {
        let mut map = self
            .credentials
            .write()
            .map_err(|_| lock_error("credential store"))?;
        for cred in creds {
            map.insert(cred.username.clone(), cred);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.credentials.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for PlainCredentialStore {
    fn lookup_credential(&self, query: &CredentialQuery) -> Result<Option<Credential>> {
        let map = self
            .credentials
            .read()
            .map_err(|_| lock_error("credential store"))?;
        Ok(map.get(&query.username).cloned())
    }
}

/// Compares two secrets in time independent of where they differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
