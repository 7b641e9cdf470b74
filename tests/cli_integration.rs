//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Get path to the filelocker binary
fn filelocker_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove deps/
    path.push("filelocker");
    path
}

/// Run filelocker with the password piped over stdin
fn run_filelocker_with_password(
    args: &[&str],
    password: &str,
) -> Result<std::process::Output, std::io::Error> {
    let mut child = Command::new(filelocker_bin())
        .arg("--password-stdin")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error (e.g., file not found)
        let _ = stdin.write_all(password.as_bytes());
    }

    child.wait_with_output()
}

#[test]
fn test_lock_unlock_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("hello.txt");
    let locked = temp_dir.path().join("hello.txt.locked");

    fs::write(&plaintext, "Hello, World!\n").unwrap();

    let result =
        run_filelocker_with_password(&["lock", plaintext.to_str().unwrap()], "test").unwrap();
    assert!(
        result.status.success(),
        "lock failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );

    // The destination path is reported on stdout.
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert_eq!(stdout.trim(), locked.to_str().unwrap());
    assert!(locked.exists());

    fs::remove_file(&plaintext).unwrap();

    let result =
        run_filelocker_with_password(&["unlock", locked.to_str().unwrap()], "test").unwrap();
    assert!(
        result.status.success(),
        "unlock failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert_eq!(stdout.trim(), plaintext.to_str().unwrap());
    assert_eq!(fs::read_to_string(&plaintext).unwrap(), "Hello, World!\n");
}

#[test]
fn test_unlock_with_wrong_password_fails() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("secret.txt");
    let locked = temp_dir.path().join("secret.txt.locked");

    fs::write(&plaintext, "Secret contents").unwrap();

    let result = run_filelocker_with_password(
        &["lock", plaintext.to_str().unwrap()],
        "correct_password",
    )
    .unwrap();
    assert!(result.status.success());

    fs::remove_file(&plaintext).unwrap();

    let result = run_filelocker_with_password(
        &["unlock", locked.to_str().unwrap()],
        "wrong_password",
    )
    .unwrap();

    assert!(!result.status.success());
    assert!(!plaintext.exists());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("decrypt") || stderr.contains("password"),
        "Expected error message about decryption/password, got: {}",
        stderr
    );
}

#[test]
fn test_lock_nonexistent_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let nonexistent = temp_dir.path().join("nonexistent.txt");

    let result =
        run_filelocker_with_password(&["lock", nonexistent.to_str().unwrap()], "test").unwrap();

    assert!(!result.status.success());
    assert!(!temp_dir.path().join("nonexistent.txt.locked").exists());
}

#[test]
fn test_lock_refuses_to_overwrite_existing_container() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("notes.txt");
    let locked = temp_dir.path().join("notes.txt.locked");

    fs::write(&plaintext, "contents").unwrap();

    let result =
        run_filelocker_with_password(&["lock", plaintext.to_str().unwrap()], "test").unwrap();
    assert!(result.status.success());
    let first = fs::read(&locked).unwrap();

    let result =
        run_filelocker_with_password(&["lock", plaintext.to_str().unwrap()], "test").unwrap();
    assert!(!result.status.success());
    assert_eq!(fs::read(&locked).unwrap(), first);
}

#[test]
fn test_unlock_with_embedded_name() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("report.pdf");
    let locked = temp_dir.path().join("report.pdf.locked");
    let renamed = temp_dir.path().join("anonymous.bin");

    fs::write(&plaintext, "pdf bytes").unwrap();

    let result =
        run_filelocker_with_password(&["lock", plaintext.to_str().unwrap()], "test").unwrap();
    assert!(result.status.success());

    fs::remove_file(&plaintext).unwrap();
    fs::rename(&locked, &renamed).unwrap();

    let result = run_filelocker_with_password(
        &["unlock", "--use-embedded-name", renamed.to_str().unwrap()],
        "test",
    )
    .unwrap();
    assert!(
        result.status.success(),
        "unlock failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert_eq!(fs::read_to_string(&plaintext).unwrap(), "pdf bytes");
}

#[test]
fn test_empty_password_fails() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("notes.txt");
    fs::write(&plaintext, "contents").unwrap();

    let result = run_filelocker_with_password(&["lock", plaintext.to_str().unwrap()], "").unwrap();

    assert!(!result.status.success());
    assert!(!temp_dir.path().join("notes.txt.locked").exists());
}

#[test]
fn test_subcommand_aliases() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("hello.txt");
    let locked = temp_dir.path().join("hello.txt.locked");

    fs::write(&plaintext, "aliased").unwrap();

    let result = run_filelocker_with_password(&["l", plaintext.to_str().unwrap()], "test").unwrap();
    assert!(result.status.success());

    fs::remove_file(&plaintext).unwrap();

    let result = run_filelocker_with_password(&["u", locked.to_str().unwrap()], "test").unwrap();
    assert!(result.status.success());
    assert_eq!(fs::read_to_string(&plaintext).unwrap(), "aliased");
}
