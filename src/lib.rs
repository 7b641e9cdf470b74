//! filelocker - Password-based file encryption with an authenticated,
//! atomically-committed container format.
//!
//! Locking turns a file into a `.locked` container: scrypt derives a key
//! from the password and a random salt, and the contents are encrypted in
//! chunks with XChaCha20-Poly1305, with the container header authenticated
//! as associated data. Unlocking verifies every chunk before the output is
//! committed; both directions stage output in a temporary file and rename
//! it into place atomically, so a failed or cancelled operation never leaves
//! a partial file at the destination.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod container;
pub mod engine;
pub mod error;
pub mod kdf;
pub mod password;
pub mod transaction;

pub use engine::{lock_file, unlock_file};
pub use error::{ErrorCategory, ErrorKind, LockerError, Result};
pub use transaction::{CancelFlag, LOCKED_SUFFIX, LockOptions, UnlockOptions};
