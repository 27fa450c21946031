//! Error types for leaderlock
//!
//! `LeaderLockError` covers every failure the lock and the store contract
//! can report. `KeyNotFound` and `BucketNotFound` are ordinary control flow
//! for the lock protocol; callers match on them instead of treating them as
//! failures.

/// Application-specific error types
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaderLockError {
    #[error("invalid parameter: {0}")]
    BadParameter(String),

    #[error("key not found")]
    KeyNotFound,

    #[error("bucket '{0}' not found")]
    BucketNotFound(String),

    #[error("bucket '{0}' already exists")]
    BucketExists(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LeaderLockError {
    /// Whether this error signals an absent or expired key
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, LeaderLockError::KeyNotFound)
    }

    /// Whether this error signals a missing bucket
    pub fn is_bucket_not_found(&self) -> bool {
        matches!(self, LeaderLockError::BucketNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, LeaderLockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            LeaderLockError::BucketNotFound("locks".to_string()).to_string(),
            "bucket 'locks' not found"
        );
        assert_eq!(LeaderLockError::KeyNotFound.to_string(), "key not found");
        assert_eq!(
            LeaderLockError::BadParameter("ttl must be non-zero".to_string()).to_string(),
            "invalid parameter: ttl must be non-zero"
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(LeaderLockError::KeyNotFound.is_key_not_found());
        assert!(!LeaderLockError::KeyNotFound.is_bucket_not_found());
        assert!(LeaderLockError::BucketNotFound("b".to_string()).is_bucket_not_found());
        assert!(!LeaderLockError::Backend("io".to_string()).is_key_not_found());
    }
}
