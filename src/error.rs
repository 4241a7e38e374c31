//! Error types for the data layer
//!
//! Each component owns its own error enum. None of them blocks the others:
//! a storage failure in the collection store does not stop the search
//! pipeline from running over the index.

use thiserror::Error;

/// Failure acquiring the species index
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The API answered with a non-success status
    #[error("failed to fetch pokemon list: HTTP {status}")]
    Status { status: u16 },

    /// Transport failure (DNS, connection reset, timeout)
    #[error("failed to fetch pokemon list: {0}")]
    Network(String),

    /// The body did not match the expected shape
    #[error("failed to decode pokemon list: {0}")]
    Decode(String),

    /// A newer load attempt started before this one finished
    #[error("load attempt superseded by a newer one")]
    Superseded,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Raw failure from the persistence port
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The write would exceed the storage quota
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// Any other backend failure
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded
    #[error("storage serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, _)
                if code.code == rusqlite::ErrorCode::DiskFull =>
            {
                Self::QuotaExceeded
            }
            other => Self::Backend(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Failure reported by the collection store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// The persisted collection could not be read; the store started empty
    #[error("failed to load collection: {0}")]
    LoadFailed(String),

    /// The write exceeded the storage quota; the change was rolled back
    #[error("storage full")]
    StorageFull,

    /// Any other write failure; the change was rolled back
    #[error("failed to save collection: {0}")]
    SaveFailed(String),
}

impl CollectionError {
    /// Classify a failed write
    pub fn from_write(err: StorageError) -> Self {
        match err {
            StorageError::QuotaExceeded => Self::StorageFull,
            other => Self::SaveFailed(other.to_string()),
        }
    }

    /// Text suitable for a toast
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::LoadFailed(_) => "Failed to load collection",
            Self::StorageFull => "Storage full. Cannot save changes.",
            Self::SaveFailed(_) => "Failed to save changes",
        }
    }

    /// Whether freeing up space would let the write succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StorageFull)
    }
}

/// Failure from the semantic filter boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    /// No credential, or the credential has expired
    #[error("not signed in")]
    NotAuthenticated,

    /// The provider call itself failed
    #[error("semantic filter provider error: {0}")]
    Provider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_classification() {
        assert_eq!(
            CollectionError::from_write(StorageError::QuotaExceeded),
            CollectionError::StorageFull
        );
        assert!(matches!(
            CollectionError::from_write(StorageError::Backend("disk I/O".into())),
            CollectionError::SaveFailed(_)
        ));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            CollectionError::StorageFull.user_message(),
            "Storage full. Cannot save changes."
        );
        assert_eq!(
            CollectionError::SaveFailed("x".into()).user_message(),
            "Failed to save changes"
        );
        assert!(CollectionError::StorageFull.is_recoverable());
        assert!(!CollectionError::SaveFailed("x".into()).is_recoverable());
    }

    #[test]
    fn test_sqlite_full_maps_to_quota() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
            None,
        );
        assert_eq!(StorageError::from(err), StorageError::QuotaExceeded);
    }
}
