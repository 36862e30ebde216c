use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

#[cfg(test)]
use std::sync::Mutex;

use keyring::{Entry, Error as KeyringError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigProvider;

/// Storage key the login flow writes the credential under.
pub const TOKEN_KEY: &str = "token";

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token store backend: {0}")]
    Backend(String),
}

/// The slot holding the session token. Written by the login flow, read on
/// every outgoing request, and cleared when the server reports the token
/// expired. `remove` of an absent token is not an error.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Result<Option<String>, TokenStoreError>;
    fn set(&self, token: &str) -> Result<(), TokenStoreError>;
    fn remove(&self) -> Result<(), TokenStoreError>;
}

/// Production token store backed by the operating system keyring.
#[derive(Clone)]
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    const DEFAULT_SERVICE: &'static str = "app.authgate";

    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry, TokenStoreError> {
        Entry::new(&self.service, TOKEN_KEY).map_err(|err| {
            TokenStoreError::Backend(format!(
                "keyring entry for service `{}` and user `{TOKEN_KEY}`: {err}",
                self.service
            ))
        })
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SERVICE)
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Result<Option<String>, TokenStoreError> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(TokenStoreError::Backend(err.to_string())),
        }
    }

    fn set(&self, token: &str) -> Result<(), TokenStoreError> {
        let entry = self.entry()?;
        entry
            .set_password(token)
            .map_err(|err| TokenStoreError::Backend(err.to_string()))
    }

    fn remove(&self) -> Result<(), TokenStoreError> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
            Err(err) => Err(TokenStoreError::Backend(err.to_string())),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct TokenFile(HashMap<String, String>);

/// Token store persisted as a small JSON file under the app config dir, for
/// platforms where a keyring is unavailable or unwanted.
pub struct FileTokenStore<C> {
    provider: C,
}

impl<C: ConfigProvider> FileTokenStore<C> {
    pub fn new(provider: C) -> Self {
        Self { provider }
    }

    fn path(&self) -> PathBuf {
        self.provider.base_dir().join("token.json")
    }

    // A missing or unreadable file reads as an empty map; corrupt state is
    // indistinguishable from "not logged in" and resolves through the login
    // flow rather than an error the caller can't act on.
    fn load(&self) -> TokenFile {
        let path = self.path();
        if !path.exists() {
            return TokenFile::default();
        }
        fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    fn save(&self, map: &TokenFile) -> Result<(), TokenStoreError> {
        let path = self.path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|err| TokenStoreError::Backend(format!("create config dir: {err}")))?;
        }
        let content = serde_json::to_vec_pretty(map)
            .map_err(|err| TokenStoreError::Backend(format!("to json: {err}")))?;
        fs::write(&path, content)
            .map_err(|err| TokenStoreError::Backend(format!("write token file: {err}")))
    }
}

impl<C: ConfigProvider> TokenStore for FileTokenStore<C> {
    fn get(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self.load().0.get(TOKEN_KEY).cloned())
    }

    fn set(&self, token: &str) -> Result<(), TokenStoreError> {
        let mut map = self.load();
        map.0.insert(TOKEN_KEY.to_string(), token.to_string());
        self.save(&map)
    }

    fn remove(&self) -> Result<(), TokenStoreError> {
        let mut map = self.load();
        if map.0.remove(TOKEN_KEY).is_none() {
            return Ok(());
        }
        self.save(&map)
    }
}

/// Simple in-memory store for tests so we do not touch the real OS keychain.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

#[cfg(test)]
impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self.token.lock().unwrap().clone())
    }

    fn set(&self, token: &str) -> Result<(), TokenStoreError> {
        *self.token.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), TokenStoreError> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}
