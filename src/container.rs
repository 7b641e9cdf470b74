//! On-disk container format for locked files.
//!
//! Container layout, format version 1 (all multi-byte integers big-endian):
//!
//! ```text
//! offset size field
//! 0      4    magic "FLCK"
//! 4      1    format version (1)
//! 5      1    kdf id (1 = scrypt, r=8 p=1)
//! 6      4    kdf cost (scrypt log2 N)
//! 10     16   salt
//! 26     24   base nonce
//! 50     8    plaintext length
//! 58     2    encrypted file-name block length (0 = absent)
//! 60     ..   file-name block, then payload chunks, each with a 16-byte tag
//! ```
//!
//! Fields are fixed-width so decoding never scans for delimiters. The full
//! 60-byte header is the associated data for every chunk seal, which is how
//! header tampering is detected.

use std::io::{self, Read};

use crate::cipher::{NONCE_LEN, TAG_LEN};
use crate::error::{ErrorCategory, ErrorKind, LockerError, Result};
use crate::kdf::{KDF_SCRYPT, KdfParams, SALT_LEN};

/// Fixed identifier at the start of every locked container.
pub const MAGIC: [u8; 4] = *b"FLCK";

/// Current container format version.
pub const FORMAT_VERSION: u8 = 1;

/// Encoded length of the fixed header in bytes.
pub const HEADER_LEN: usize = 60;

/// Upper bound on the encrypted file-name block. Anything larger is rejected
/// as malformed before key derivation.
pub const MAX_NAME_BLOCK: usize = 1024;

/// Decoded fixed header of a locked container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kdf: KdfParams,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    /// Length of the original plaintext; determines chunk boundaries on
    /// decrypt, including where the final chunk ends.
    pub plaintext_len: u64,
    /// Length of the encrypted file-name block that follows the header,
    /// or zero when no name is embedded.
    pub name_block_len: u16,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&MAGIC);
        out[4] = FORMAT_VERSION;
        out[5] = KDF_SCRYPT;
        out[6..10].copy_from_slice(&self.kdf.cost().to_be_bytes());
        out[10..26].copy_from_slice(&self.salt);
        out[26..50].copy_from_slice(&self.nonce);
        out[50..58].copy_from_slice(&self.plaintext_len.to_be_bytes());
        out[58..60].copy_from_slice(&self.name_block_len.to_be_bytes());
        out
    }

    /// Decodes and validates a fixed header.
    ///
    /// Magic and version are checked before anything else so that "not a
    /// locked file" and "locked file from the future" are reported without
    /// touching key material.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        if bytes[0..4] != MAGIC {
            return Err(LockerError::new(
                ErrorCategory::User,
                ErrorKind::MalformedContainer,
                "input is not a locked container",
            ));
        }
        if bytes[4] != FORMAT_VERSION {
            return Err(LockerError::new(
                ErrorCategory::User,
                ErrorKind::UnsupportedFormat,
                format!(
                    "container format version {} is not supported (this build reads version {})",
                    bytes[4], FORMAT_VERSION
                ),
            ));
        }
        if bytes[5] != KDF_SCRYPT {
            return Err(LockerError::new(
                ErrorCategory::User,
                ErrorKind::UnsupportedFormat,
                format!("unknown key derivation algorithm id {}", bytes[5]),
            ));
        }

        let mut cost = [0u8; 4];
        cost.copy_from_slice(&bytes[6..10]);
        let kdf = KdfParams::from_cost(u32::from_be_bytes(cost))?;

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[10..26]);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[26..50]);

        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[50..58]);
        let plaintext_len = u64::from_be_bytes(len);

        let mut name_len = [0u8; 2];
        name_len.copy_from_slice(&bytes[58..60]);
        let name_block_len = u16::from_be_bytes(name_len);

        // A present name block must at least hold a tag, and stays small.
        let nbl = name_block_len as usize;
        if nbl != 0 && (nbl < TAG_LEN || nbl > MAX_NAME_BLOCK) {
            return Err(LockerError::new(
                ErrorCategory::User,
                ErrorKind::MalformedContainer,
                format!("invalid file-name block length {nbl}"),
            ));
        }

        Ok(Self {
            kdf,
            salt,
            nonce,
            plaintext_len,
            name_block_len,
        })
    }
}

/// Reads and decodes the fixed header, returning both the decoded form and
/// the raw bytes (used as associated data for chunk authentication).
pub fn read_header(reader: &mut impl Read) -> Result<(Header, [u8; HEADER_LEN])> {
    let mut raw = [0u8; HEADER_LEN];
    reader.read_exact(&mut raw).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            LockerError::new(
                ErrorCategory::User,
                ErrorKind::MalformedContainer,
                "input is too short to be a locked container",
            )
        } else {
            LockerError::with_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to read container header",
                e,
            )
        }
    })?;
    let header = Header::decode(&raw)?;
    Ok((header, raw))
}

/// Fast check whether a byte prefix carries the container magic.
pub fn is_container_magic(prefix: &[u8]) -> bool {
    prefix.len() >= MAGIC.len() && prefix[..MAGIC.len()] == MAGIC
}
