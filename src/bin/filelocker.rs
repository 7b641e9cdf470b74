//! filelocker CLI - Password-based file locking
//!
//! Command-line interface for locking files into authenticated containers
//! (XChaCha20-Poly1305 with scrypt key derivation) and unlocking them.

use clap::{Parser, Subcommand};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;

use filelocker::password::{
    PasswordReader, ReaderPasswordReader, TerminalPasswordReader,
};
use filelocker::{LockOptions, UnlockOptions, engine};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "filelocker")]
#[command(version)]
#[command(about = "Password-based file locking.", long_about = None)]
struct Cli {
    /// Read the password from stdin instead of from the terminal
    #[arg(long, global = true)]
    password_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file into a .locked container
    #[command(alias = "l")]
    Lock {
        /// Path of the file to lock
        file: PathBuf,

        /// Do not embed the original file name in the container
        #[arg(long)]
        no_store_name: bool,
    },

    /// Decrypt a .locked container
    #[command(alias = "u")]
    Unlock {
        /// Path of the locked container
        file: PathBuf,

        /// Name the output after the file name embedded in the container
        /// instead of stripping the .locked suffix
        #[arg(long)]
        use_embedded_name: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Lock {
            file,
            no_store_name,
        } => lock(file, *no_store_name, cli.password_stdin),
        Commands::Unlock {
            file,
            use_embedded_name,
        } => unlock(file, *use_embedded_name, cli.password_stdin),
    };

    match result {
        Ok(destination) => println!("{}", destination.display()),
        Err(err) => {
            eprintln!("filelocker: {}", err);
            process::exit(1);
        }
    }
}

fn lock(file: &PathBuf, no_store_name: bool, password_stdin: bool) -> filelocker::Result<PathBuf> {
    let password = read_password(password_stdin, "Password: ")?;

    // When the password is typed interactively, ask for it twice; a typo in
    // an unconfirmed password locks the file away for good.
    let confirm = if password_stdin || !io::stdin().is_terminal() {
        None
    } else {
        Some(read_password(false, "Confirm password: ")?)
    };

    let options = LockOptions {
        store_name: !no_store_name,
        cancel: None,
    };
    engine::lock_file(
        file,
        &password,
        confirm.as_ref().map(|c| c.as_slice()),
        &options,
    )
}

fn unlock(
    file: &PathBuf,
    use_embedded_name: bool,
    password_stdin: bool,
) -> filelocker::Result<PathBuf> {
    let password = read_password(password_stdin, "Password: ")?;
    let options = UnlockOptions {
        use_embedded_name,
        cancel: None,
    };
    engine::unlock_file(file, &password, &options)
}

fn read_password(from_stdin: bool, prompt: &'static str) -> filelocker::Result<Zeroizing<Vec<u8>>> {
    let mut reader: Box<dyn PasswordReader> = if from_stdin {
        Box::new(ReaderPasswordReader::new(Box::new(io::stdin())))
    } else {
        Box::new(TerminalPasswordReader::with_prompt(prompt))
    };
    reader.read_password()
}
