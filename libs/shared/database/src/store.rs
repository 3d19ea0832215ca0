use thiserror::Error;

use crate::supabase::SupabaseError;

/// Failure modes shared by every store backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Duplicate row: {0}")]
    Duplicate(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<SupabaseError>() {
            Some(SupabaseError::Duplicate(body)) => StoreError::Duplicate(body.clone()),
            Some(SupabaseError::NotFound(body)) => StoreError::NotFound(body.clone()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("Failed to parse row: {}", err))
    }
}
