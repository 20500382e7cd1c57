//! Error taxonomy shared by every store.
//!
//! Malformed data on disk is deliberately absent here: a corrupt JSON-Lines
//! record or a broken whole-JSON document is recovered inside
//! [`flatfile`](crate::flatfile) and never reaches a caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Missing required field or wrong input shape. Raised before any I/O.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Marker, image or preset absent. A soft negative result.
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
