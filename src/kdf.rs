//! Key derivation from passwords using scrypt.
//!
//! The cost factor is stored in the container header so it can be raised in
//! future format versions without breaking existing containers.

use scrypt::{Params, scrypt};
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, LockerError, Result};

/// Length of the derived symmetric key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the random salt in bytes.
pub const SALT_LEN: usize = 16;

/// Identifier byte stored in the container header for scrypt.
pub const KDF_SCRYPT: u8 = 1;

/// Default scrypt cost exponent (N = 2^15 = 32768).
pub const DEFAULT_LOG_N: u8 = 15;

/// scrypt block size parameter, fixed for container format version 1.
const SCRYPT_R: u32 = 8;

/// scrypt parallelization parameter, fixed for container format version 1.
const SCRYPT_P: u32 = 1;

/// Largest cost exponent we are willing to honor when decoding a container.
/// N = 2^24 with r = 8 already means 16 GiB of scrypt memory.
const MAX_LOG_N: u8 = 24;

/// Key derivation parameters carried in the container header.
///
/// Only the cost factor varies; `r` and `p` are fixed by the container
/// format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// scrypt cost exponent; key derivation uses N = 2^log_n.
    pub log_n: u8,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: DEFAULT_LOG_N,
        }
    }
}

impl KdfParams {
    /// Builds params from the cost field of a container header.
    pub fn from_cost(cost: u32) -> Result<Self> {
        if cost == 0 || cost > MAX_LOG_N as u32 {
            return Err(LockerError::new(
                ErrorCategory::User,
                ErrorKind::KeyDerivation,
                format!("scrypt cost exponent {cost} is out of range (1..={MAX_LOG_N})"),
            ));
        }
        Ok(Self { log_n: cost as u8 })
    }

    /// The value to store in the cost field of a container header.
    pub fn cost(&self) -> u32 {
        self.log_n as u32
    }
}

/// Derive a 32-byte key from a password and salt.
///
/// Deterministic: the same password, salt, and params always yield the same
/// key. Fails only on malformed parameters, never on password content. The
/// returned key is wiped from memory when dropped.
pub fn derive(password: &[u8], salt: &[u8], params: &KdfParams) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let scrypt_params = Params::new(params.log_n, SCRYPT_R, SCRYPT_P, KEY_LEN).map_err(|e| {
        LockerError::with_source(
            ErrorCategory::User,
            ErrorKind::KeyDerivation,
            format!("invalid scrypt parameters (log_n = {})", params.log_n),
            e,
        )
    })?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt(password, salt, &scrypt_params, &mut key[..]).map_err(|e| {
        LockerError::with_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "scrypt key derivation failed",
            e,
        )
    })?;

    Ok(key)
}
