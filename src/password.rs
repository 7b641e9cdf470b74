//! Password reading functionality

use crate::error::{ErrorCategory, ErrorKind, LockerError, Result};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Trait for reading passwords from various sources
pub trait PasswordReader {
    /// Read a password as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the password wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed password (for testing)
pub struct ConstantPasswordReader {
    password: Zeroizing<Vec<u8>>,
}

impl ConstantPasswordReader {
    pub fn new(password: Vec<u8>) -> Self {
        Self {
            password: Zeroizing::new(password),
        }
    }
}

impl PasswordReader for ConstantPasswordReader {
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.password).clone()))
    }
}

/// Reads a password from any io::Read source
pub struct ReaderPasswordReader {
    reader: Box<dyn Read>,
}

impl ReaderPasswordReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PasswordReader for ReaderPasswordReader {
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            LockerError::with_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading password: {}", e),
                e,
            )
        })?;
        // A trailing newline is an artifact of piping, not part of the
        // password.
        if data.last() == Some(&b'\n') {
            data.pop();
            if data.last() == Some(&b'\r') {
                data.pop();
            }
        }
        Ok(data)
    }
}

/// Reads a password from the terminal with no echo
pub struct TerminalPasswordReader {
    prompt: &'static str,
}

impl TerminalPasswordReader {
    pub fn new() -> Self {
        Self::with_prompt("Password: ")
    }

    pub fn with_prompt(prompt: &'static str) -> Self {
        Self { prompt }
    }
}

impl Default for TerminalPasswordReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordReader for TerminalPasswordReader {
    /// Read a password from the terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library
    /// constraints. For non-UTF-8 passwords, use --password-stdin instead.
    fn read_password(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(LockerError::new(
                ErrorCategory::User,
                ErrorKind::PasswordUnavailable,
                "cannot read password from terminal - stdin is not a terminal",
            ));
        }

        io::stderr().write_all(self.prompt.as_bytes()).map_err(|e| {
            LockerError::with_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write prompt: {}", e),
                e,
            )
        })?;
        io::stderr().flush().map_err(|e| {
            LockerError::with_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to flush prompt: {}", e),
                e,
            )
        })?;

        // Read password *without echo*
        // Note: rpassword returns String (UTF-8 only), not zeroized
        let password = rpassword::read_password().map_err(|e| {
            LockerError::with_source(
                ErrorCategory::Internal,
                ErrorKind::PasswordUnavailable,
                format!("failure reading password: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(password.into_bytes()))
    }
}
