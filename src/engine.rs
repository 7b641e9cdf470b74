//! Operation facade: the single entry point for callers.
//!
//! Re-validates preconditions a UI layer is expected to have already checked
//! (non-empty password; for locking, confirmation equality), since the
//! engine may be called from contexts other than an interactive UI. All
//! failures are reported through the closed taxonomy in [`crate::error`];
//! no password or derived key material ever appears in an error.

use std::path::{Path, PathBuf};

use crate::error::{ErrorCategory, ErrorKind, LockerError, Result};
use crate::transaction::{self, LockOptions, UnlockOptions};

/// Encrypt `source` with `password`, returning the path of the new
/// `.locked` container.
///
/// When `confirm` is supplied it must equal `password`; callers that have
/// already confirmed the password elsewhere may pass `None`.
pub fn lock_file(
    source: &Path,
    password: &[u8],
    confirm: Option<&[u8]>,
    options: &LockOptions,
) -> Result<PathBuf> {
    validate_password(password)?;
    if let Some(confirm) = confirm {
        if confirm != password {
            return Err(LockerError::new(
                ErrorCategory::User,
                ErrorKind::InputValidation,
                "password confirmation does not match",
            ));
        }
    }
    transaction::lock(source, password, options)
}

/// Decrypt the container at `source` with `password`, returning the path of
/// the restored plaintext file.
pub fn unlock_file(source: &Path, password: &[u8], options: &UnlockOptions) -> Result<PathBuf> {
    validate_password(password)?;
    transaction::unlock(source, password, options)
}

fn validate_password(password: &[u8]) -> Result<()> {
    if password.is_empty() {
        return Err(LockerError::new(
            ErrorCategory::User,
            ErrorKind::InputValidation,
            "password must not be empty",
        ));
    }
    Ok(())
}
