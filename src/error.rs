//! Error types for client secret generation and inspection.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SecretError>;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("could not read key file {}: {source}", .path.display())]
    KeyLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{origin} is not a valid private key: {reason}")]
    KeyFormat { origin: String, reason: String },

    #[error("ES256 signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("{0} must not be empty")]
    MissingField(&'static str),

    #[error("lifetime of {0}s is outside 1..={max}s", max = crate::secret::MAX_LIFETIME_SECS)]
    InvalidLifetime(u64),

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("signature verification failed: {0}")]
    Verify(jsonwebtoken::errors::Error),
}

impl SecretError {
    /// The key is missing, unreadable, or not a well-formed private key.
    pub fn is_key_load(&self) -> bool {
        matches!(self, Self::KeyLoad { .. } | Self::KeyFormat { .. })
    }

    /// The key was loaded but is not usable for ES256.
    pub fn is_signing(&self) -> bool {
        matches!(self, Self::Signing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_load_names_the_path() {
        let err = SecretError::KeyLoad {
            path: PathBuf::from("AuthKey_ABC123.p8"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("AuthKey_ABC123.p8"));
        assert!(err.is_key_load());
        assert!(!err.is_signing());
    }

    #[test]
    fn lifetime_message_includes_cap() {
        let err = SecretError::InvalidLifetime(0);
        assert_eq!(err.to_string(), "lifetime of 0s is outside 1..=15777000s");
    }
}
