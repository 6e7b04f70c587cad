//! Whitelist storage trait and errors.

use thiserror::Error;

use super::types::Whitelist;

/// Errors from whitelist and history persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Trait for whitelist storage backends.
pub trait WhitelistStore: Send + Sync {
    /// Load the persisted whitelist.
    ///
    /// A missing backing store yields an empty whitelist, not an error.
    fn load(&self) -> Result<Whitelist, StoreError>;

    /// Persist the whitelist, replacing the previous contents.
    fn save(&self, whitelist: &Whitelist) -> Result<(), StoreError>;
}
