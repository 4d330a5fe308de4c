mod token;

pub use token::Token;

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage;

const CREDENTIALS_FILE: &str = "credentials.json";

/// Username and token pair used to authenticate against GitLab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub token: Token,
}

/// Persists a single [`Credentials`] record.
///
/// The record is loaded once when the store is opened and kept in memory;
/// `save` and `clear` write through to disk.
pub struct CredentialStore {
    path: PathBuf,
    current: Option<Credentials>,
}

impl CredentialStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CREDENTIALS_FILE);
        let current = storage::read_json(&path)?;

        Ok(Self { path, current })
    }

    pub fn current(&self) -> Option<&Credentials> {
        self.current.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.current.is_some()
    }

    pub fn save(&mut self, credentials: Credentials) -> Result<()> {
        storage::write_json(&self.path, &credentials)?;
        info!("Saved credentials for {}", credentials.username);
        self.current = Some(credentials);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        storage::remove(&self.path)?;
        self.current = None;
        Ok(())
    }
}
