//! Lock/unlock file transactions.
//!
//! Orchestrates reading the source, driving the chunk cipher, and committing
//! the output atomically. Output is always staged in a temporary file in the
//! destination directory (same filesystem, so the final rename cannot fail
//! across devices) and renamed into place only after a successful fsync. On
//! any failure or cancellation the temporary file is deleted and the
//! destination path is never created or modified; the source file is left
//! untouched in all cases.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::RngCore;
use rand::rngs::OsRng;
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use crate::cipher::{ChunkCipher, NAME_CHUNK_INDEX, NONCE_LEN, TAG_LEN, chunk_count, chunk_len};
use crate::container::{self, Header, MAX_NAME_BLOCK};
use crate::error::{ErrorCategory, ErrorKind, LockerError, Result};
use crate::kdf::{self, KdfParams, SALT_LEN};

/// Suffix appended to a file name when locking, stripped when unlocking.
pub const LOCKED_SUFFIX: &str = ".locked";

/// Cooperative cancellation flag, checked between chunk boundaries.
///
/// Cancelling never leaves a partial destination: the rename either has not
/// happened (temp file deleted) or is fully committed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for [`lock`].
#[derive(Debug, Clone)]
pub struct LockOptions {
    /// Embed the source file name (encrypted) in the container so unlocking
    /// can restore it regardless of the container's on-disk name.
    pub store_name: bool,
    pub cancel: Option<CancelFlag>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            store_name: true,
            cancel: None,
        }
    }
}

/// Options for [`unlock`].
#[derive(Debug, Clone, Default)]
pub struct UnlockOptions {
    /// Name the output after the file name embedded in the container instead
    /// of stripping the locked suffix from the container's name.
    pub use_embedded_name: bool,
    pub cancel: Option<CancelFlag>,
}

/// Destination path for locking: the source path with the locked suffix
/// appended to its name.
pub fn locked_destination(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(LOCKED_SUFFIX);
    PathBuf::from(name)
}

/// Destination path for unlocking: the source path with the locked suffix
/// stripped from its name.
pub fn unlocked_destination(source: &Path) -> Result<PathBuf> {
    let name = source.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        LockerError::new(
            ErrorCategory::User,
            ErrorKind::InputValidation,
            format!("{} has no usable file name", source.display()),
        )
    })?;
    let stem = name
        .strip_suffix(LOCKED_SUFFIX)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            LockerError::new(
                ErrorCategory::User,
                ErrorKind::InputValidation,
                format!(
                    "cannot derive an output name: {} does not end with {LOCKED_SUFFIX}",
                    source.display()
                ),
            )
        })?;
    Ok(source.with_file_name(stem))
}

/// Encrypt `source` into a new `<source>.locked` container.
///
/// Implements the transaction described in the module docs; returns the
/// destination path on success.
pub fn lock(source: &Path, password: &[u8], options: &LockOptions) -> Result<PathBuf> {
    let (mut input, plaintext_len) = open_source(source)?;

    // Refuse to lock a file that is already a recognized container; double
    // encryption is almost certainly a mistake and the caller can rename
    // the file if it truly wants nested containers.
    if plaintext_len >= container::MAGIC.len() as u64 {
        let mut probe = [0u8; 4];
        input
            .read_exact(&mut probe)
            .map_err(|e| read_error(source, e))?;
        if container::is_container_magic(&probe) {
            return Err(LockerError::new(
                ErrorCategory::User,
                ErrorKind::InputValidation,
                format!("{} is already a locked container", source.display()),
            ));
        }
        input
            .seek(SeekFrom::Start(0))
            .map_err(|e| read_error(source, e))?;
    }

    let destination = locked_destination(source);
    if destination.exists() {
        return Err(destination_exists(&destination));
    }

    let kdf_params = KdfParams::default();
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let key = kdf::derive(password, &salt, &kdf_params)?;

    let name_bytes: Option<Vec<u8>> = if options.store_name {
        source
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.as_bytes().to_vec())
    } else {
        None
    };
    let name_block_len = name_bytes.as_ref().map_or(0, |n| n.len() + TAG_LEN);
    if name_block_len > MAX_NAME_BLOCK {
        return Err(LockerError::new(
            ErrorCategory::User,
            ErrorKind::InputValidation,
            format!("file name of {} is too long to embed", source.display()),
        ));
    }

    let header = Header {
        kdf: kdf_params,
        salt,
        nonce,
        plaintext_len,
        name_block_len: name_block_len as u16,
    };
    let header_bytes = header.encode();
    let chunk_cipher = ChunkCipher::new(&key, nonce);

    let mut tmp = temp_in_destination_dir(&destination)?;
    tmp.write_all(&header_bytes)
        .map_err(|e| write_error(&destination, e))?;
    if let Some(name) = &name_bytes {
        let block = chunk_cipher.seal(NAME_CHUNK_INDEX, &header_bytes, name)?;
        tmp.write_all(&block)
            .map_err(|e| write_error(&destination, e))?;
    }

    let mut buf = Zeroizing::new(vec![0u8; chunk_len(plaintext_len, 0)]);
    for index in 0..chunk_count(plaintext_len) {
        check_cancel(&options.cancel)?;
        let len = chunk_len(plaintext_len, index);
        input
            .read_exact(&mut buf[..len])
            .map_err(|e| read_error(source, e))?;
        let sealed = chunk_cipher.seal(index, &header_bytes, &buf[..len])?;
        tmp.write_all(&sealed)
            .map_err(|e| write_error(&destination, e))?;
    }

    // The header promised plaintext_len bytes; a source that grew while we
    // were reading would be silently truncated, so report it instead.
    let mut probe = [0u8; 1];
    if input.read(&mut probe).map_err(|e| read_error(source, e))? != 0 {
        return Err(LockerError::new(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("{} changed size while being locked", source.display()),
        ));
    }

    commit(tmp, &destination)?;
    Ok(destination)
}

/// Decrypt the container at `source` into a new plaintext file.
///
/// The embedded file-name block (when present) is decrypted first, so a
/// wrong password is normally rejected before any bulk work. Plaintext only
/// ever reaches the temporary file, which is deleted on any failure.
pub fn unlock(source: &Path, password: &[u8], options: &UnlockOptions) -> Result<PathBuf> {
    let (mut input, _) = open_source(source)?;
    let (header, header_bytes) = container::read_header(&mut input)?;

    // When the output name comes from the container's on-disk name we can
    // refuse an existing destination before paying for key derivation.
    let derived = if options.use_embedded_name {
        None
    } else {
        let dest = unlocked_destination(source)?;
        if dest.exists() {
            return Err(destination_exists(&dest));
        }
        Some(dest)
    };

    let key = kdf::derive(password, &header.salt, &header.kdf)?;
    let chunk_cipher = ChunkCipher::new(&key, header.nonce);

    let embedded_name = if header.name_block_len > 0 {
        let mut block = vec![0u8; header.name_block_len as usize];
        read_container_bytes(&mut input, &mut block)?;
        let name = chunk_cipher
            .open(NAME_CHUNK_INDEX, &header_bytes, &block)
            .map_err(|e| e.with_context("failed to decrypt embedded file name"))?;
        let name = String::from_utf8(name.to_vec()).map_err(|_| {
            LockerError::new(
                ErrorCategory::User,
                ErrorKind::MalformedContainer,
                "embedded file name is not valid UTF-8",
            )
        })?;
        validate_embedded_name(&name)?;
        Some(name)
    } else {
        None
    };

    let destination = match derived {
        Some(dest) => dest,
        None => {
            let name = embedded_name.as_deref().ok_or_else(|| {
                LockerError::new(
                    ErrorCategory::User,
                    ErrorKind::InputValidation,
                    format!("{} carries no embedded file name", source.display()),
                )
            })?;
            source.with_file_name(name)
        }
    };
    if destination.exists() {
        return Err(destination_exists(&destination));
    }

    let mut tmp = temp_in_destination_dir(&destination)?;
    let mut buf = vec![0u8; chunk_len(header.plaintext_len, 0) + TAG_LEN];
    for index in 0..chunk_count(header.plaintext_len) {
        check_cancel(&options.cancel)?;
        let sealed_len = chunk_len(header.plaintext_len, index) + TAG_LEN;
        read_container_bytes(&mut input, &mut buf[..sealed_len])?;
        let plaintext = chunk_cipher.open(index, &header_bytes, &buf[..sealed_len])?;
        tmp.write_all(&plaintext)
            .map_err(|e| write_error(&destination, e))?;
    }

    let mut probe = [0u8; 1];
    if input.read(&mut probe).map_err(|e| read_error(source, e))? != 0 {
        return Err(LockerError::new(
            ErrorCategory::User,
            ErrorKind::MalformedContainer,
            "unexpected data after the final chunk",
        ));
    }

    commit(tmp, &destination)?;
    Ok(destination)
}

/// Opens the source for reading after validating it is a regular file.
fn open_source(path: &Path) -> Result<(File, u64)> {
    let meta = fs::metadata(path).map_err(|e| read_error(path, e))?;
    if !meta.is_file() {
        return Err(LockerError::new(
            ErrorCategory::User,
            ErrorKind::InputValidation,
            format!("{} is not a regular file", path.display()),
        ));
    }
    let file = File::open(path).map_err(|e| read_error(path, e))?;
    Ok((file, meta.len()))
}

/// Creates the staging temp file next to the destination. Same directory
/// means same filesystem, keeping the final rename atomic.
fn temp_in_destination_dir(destination: &Path) -> Result<NamedTempFile> {
    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    NamedTempFile::new_in(dir).map_err(|e| {
        LockerError::with_source(
            ErrorCategory::Internal,
            io_kind(&e),
            "failed to create temporary file",
            e,
        )
    })
}

/// Flushes, fsyncs, fixes permissions, and atomically renames the staged
/// output into place. Refuses to clobber an existing destination.
fn commit(mut tmp: NamedTempFile, destination: &Path) -> Result<()> {
    tmp.flush()
        .map_err(|e| write_error(destination, e))?;
    // fsync before rename so the rename, if it succeeds, always points at a
    // fully written file.
    tmp.as_file()
        .sync_all()
        .map_err(|e| write_error(destination, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                LockerError::with_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set output permissions",
                    e,
                )
            })?;
    }

    match tmp.persist_noclobber(destination) {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            Err(destination_exists(destination))
        }
        Err(e) => Err(LockerError::with_source(
            ErrorCategory::Internal,
            io_kind(&e.error),
            format!("failed to rename into {}", destination.display()),
            e.error,
        )),
    }
}

/// Reads container payload bytes, reporting truncation as a malformed
/// container rather than a plain I/O failure.
fn read_container_bytes(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            LockerError::new(
                ErrorCategory::User,
                ErrorKind::MalformedContainer,
                "container is truncated",
            )
        } else {
            LockerError::with_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to read container payload",
                e,
            )
        }
    })
}

/// Rejects embedded names that could escape the destination directory.
fn validate_embedded_name(name: &str) -> Result<()> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if unsafe_name {
        return Err(LockerError::new(
            ErrorCategory::User,
            ErrorKind::MalformedContainer,
            "embedded file name is not a plain file name",
        ));
    }
    Ok(())
}

fn check_cancel(cancel: &Option<CancelFlag>) -> Result<()> {
    if cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
        return Err(LockerError::new(
            ErrorCategory::User,
            ErrorKind::Cancelled,
            "operation cancelled",
        ));
    }
    Ok(())
}

fn destination_exists(path: &Path) -> LockerError {
    LockerError::new(
        ErrorCategory::User,
        ErrorKind::DestinationExists,
        format!("{} already exists; refusing to overwrite", path.display()),
    )
}

fn io_kind(err: &io::Error) -> ErrorKind {
    if err.kind() == io::ErrorKind::StorageFull {
        ErrorKind::InsufficientSpace
    } else {
        ErrorKind::Io
    }
}

fn read_error(path: &Path, err: io::Error) -> LockerError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    LockerError::with_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}

fn write_error(destination: &Path, err: io::Error) -> LockerError {
    let kind = io_kind(&err);
    LockerError::with_source(
        ErrorCategory::Internal,
        kind,
        format!("failed to write output for {}", destination.display()),
        err,
    )
}
