use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example, due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Closed error taxonomy. Every error carries exactly one kind, and callers
/// branch on the kind rather than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A precondition on the inputs failed: empty password, mismatched
    /// confirmation, source that is not a regular file, or an output name
    /// that cannot be derived.
    InputValidation,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
    /// The filesystem ran out of space while writing output.
    InsufficientSpace,
    /// The input is not a recognized or decodable locked container
    /// (bad magic, truncated, or trailing data).
    MalformedContainer,
    /// The input claims to be a locked container but uses a future or
    /// unknown format version or key derivation algorithm.
    UnsupportedFormat,
    /// Authentication failed: wrong password, or tampered/corrupted
    /// ciphertext. The two causes are deliberately indistinguishable.
    Authentication,
    /// The destination path already exists; overwriting is never a default.
    DestinationExists,
    /// Key derivation parameters are malformed (e.g. a cost factor of zero).
    KeyDerivation,
    /// A password could not be obtained from the configured reader.
    PasswordUnavailable,
    /// The operation was cancelled between chunk boundaries.
    Cancelled,
    /// Unexpected state reached within filelocker logic.
    Internal,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct LockerError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Specific condition tag for consumers that need to branch their
    /// behavior.
    pub kind: ErrorKind,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl LockerError {
    /// Creates a new error with a category, kind, and display message.
    pub fn new(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The user-facing message carried by the error. Never contains password
    /// or key material.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving
    /// the kind and the original error as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LockerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_context_preserves_kind_and_source() {
        let inner = LockerError::new(
            ErrorCategory::User,
            ErrorKind::Authentication,
            "authentication failed",
        );
        let wrapped = inner.with_context("failed to decrypt embedded file name");

        assert_eq!(wrapped.kind, ErrorKind::Authentication);
        assert_eq!(wrapped.category, ErrorCategory::User);
        assert_eq!(wrapped.message(), "failed to decrypt embedded file name");
        assert!(wrapped.source_error().is_some());
    }

    #[test]
    fn test_with_source_retains_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = LockerError::with_source(
            ErrorCategory::User,
            ErrorKind::Io,
            "failed to read from /tmp/x",
            io,
        );
        assert_eq!(err.kind, ErrorKind::Io);
        assert!(err.source_error().unwrap().to_string().contains("gone"));
    }
}
