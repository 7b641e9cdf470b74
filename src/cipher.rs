//! Authenticated chunk encryption using XChaCha20-Poly1305.
//!
//! Files are processed in fixed-size chunks so arbitrarily large inputs need
//! only bounded memory. Each chunk is sealed independently with a 16-byte
//! Poly1305 tag, and every seal binds the encoded container header as
//! associated data so header tampering breaks authentication.
//!
//! Per-chunk nonce construction: the first 16 bytes of the random base nonce
//! are kept fixed and the trailing 8 bytes carry the chunk index, big-endian.
//! The base nonce is unique per container and the index is monotonic, so no
//! (key, nonce) pair is ever reused within or across containers.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, LockerError, Result};
use crate::kdf::KEY_LEN;

/// Length of the XChaCha20-Poly1305 base nonce in bytes.
pub const NONCE_LEN: usize = 24;

/// Length of the Poly1305 authentication tag appended to each chunk.
pub const TAG_LEN: usize = 16;

/// Plaintext bytes carried by each chunk; the final chunk may be shorter.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Reserved chunk index used to seal the embedded file-name block. Payload
/// chunk indices count up from zero and can never collide with it.
pub const NAME_CHUNK_INDEX: u64 = u64::MAX;

/// Seals and opens individual chunks of a container under one derived key.
pub struct ChunkCipher {
    cipher: XChaCha20Poly1305,
    base_nonce: [u8; NONCE_LEN],
}

impl ChunkCipher {
    pub fn new(key: &[u8; KEY_LEN], base_nonce: [u8; NONCE_LEN]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(key)),
            base_nonce,
        }
    }

    fn nonce_for(&self, index: u64) -> XNonce {
        let mut nonce = self.base_nonce;
        nonce[16..24].copy_from_slice(&index.to_be_bytes());
        XNonce::from(nonce)
    }

    /// Encrypts one chunk, binding the encoded header as associated data.
    pub fn seal(&self, index: u64, header: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.cipher
            .encrypt(
                &self.nonce_for(index),
                Payload {
                    msg: plaintext,
                    aad: header,
                },
            )
            .map_err(|_| {
                LockerError::new(
                    ErrorCategory::Internal,
                    ErrorKind::Internal,
                    "chunk encryption failed",
                )
            })
    }

    /// Decrypts and authenticates one chunk.
    ///
    /// A failure means the password is wrong or the container was tampered
    /// with or corrupted; the engine cannot and must not tell those apart.
    /// The returned plaintext is wiped from memory when dropped.
    pub fn open(&self, index: u64, header: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let plaintext = self
            .cipher
            .decrypt(
                &self.nonce_for(index),
                Payload {
                    msg: ciphertext,
                    aad: header,
                },
            )
            .map_err(|_| {
                LockerError::new(
                    ErrorCategory::User,
                    ErrorKind::Authentication,
                    "authentication failed: wrong password, or corrupted or tampered-with data",
                )
            })?;
        Ok(Zeroizing::new(plaintext))
    }
}

/// Number of payload chunks for a plaintext of `len` bytes.
///
/// An empty file still carries exactly one (empty) chunk so that at least
/// one tag always covers the header.
pub fn chunk_count(len: u64) -> u64 {
    if len == 0 {
        1
    } else {
        len.div_ceil(CHUNK_SIZE as u64)
    }
}

/// Plaintext length of chunk `index` within a plaintext of `len` bytes.
pub fn chunk_len(len: u64, index: u64) -> usize {
    let start = index.saturating_mul(CHUNK_SIZE as u64);
    len.saturating_sub(start).min(CHUNK_SIZE as u64) as usize
}
