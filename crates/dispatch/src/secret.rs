//! Credential provider seam.
//!
//! Reporters that authenticate to their backend receive a provider rather
//! than raw bytes, so tokens can be rotated without restarting dispatchers.
//! Refresh lifecycle is caller-owned; there is no process-wide mutable
//! secret registry.

use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::SetupError;

/// Supplies the current secret bytes on demand.
pub trait SecretProvider: Send + Sync {
    fn current(&self) -> Vec<u8>;
}

impl<F> SecretProvider for F
where
    F: Fn() -> Vec<u8> + Send + Sync,
{
    fn current(&self) -> Vec<u8> {
        self()
    }
}

/// Fixed secret, mainly for tests and dev wiring.
#[derive(Debug, Clone)]
pub struct StaticSecret(Vec<u8>);

impl StaticSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }
}

impl SecretProvider for StaticSecret {
    fn current(&self) -> Vec<u8> {
        self.0.clone()
    }
}

/// Token file provider.
///
/// `load` validates the file at startup (unreadable token files are a
/// setup error); `refresh` re-reads it on the caller's schedule. Trailing
/// whitespace is stripped, as token files routinely end with a newline.
#[derive(Debug)]
pub struct FileSecret {
    path: PathBuf,
    bytes: RwLock<Vec<u8>>,
}

impl FileSecret {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SetupError> {
        let path = path.into();
        let bytes = Self::read(&path)?;
        Ok(Self {
            path,
            bytes: RwLock::new(bytes),
        })
    }

    /// Re-read the token file, keeping the previous value on failure.
    pub fn refresh(&self) -> Result<(), SetupError> {
        let bytes = Self::read(&self.path)?;
        *self.bytes.write().unwrap() = bytes;
        Ok(())
    }

    fn read(path: &PathBuf) -> Result<Vec<u8>, SetupError> {
        let raw = fs::read(path)
            .map_err(|e| SetupError::credential(format!("{}: {e}", path.display())))?;
        let trimmed = raw
            .strip_suffix(b"\n")
            .map(|b| b.strip_suffix(b"\r").unwrap_or(b))
            .unwrap_or(&raw);
        Ok(trimmed.to_vec())
    }
}

impl SecretProvider for FileSecret {
    fn current(&self) -> Vec<u8> {
        self.bytes.read().unwrap().clone()
    }
}
