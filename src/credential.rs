//! Scopus API key storage.
//!
//! The key is read from `SCOPUS_API_KEY`, then from the key file, and only
//! then asked for on the terminal. A prompted key is written back with
//! owner-only permissions.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const API_KEY_ENV: &str = "SCOPUS_API_KEY";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Key from the environment or the key file, if either has one
    pub fn load(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Some(key);
            }
        }

        if !self.path.exists() {
            return None;
        }
        match fs::read_to_string(&self.path) {
            Ok(content) => Some(content.trim().to_string()).filter(|k| !k.is_empty()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read API key file");
                None
            }
        }
    }

    /// Write the key with owner-only permissions from the moment the file exists
    pub fn save(&self, key: &str) -> Result<(), CredentialError> {
        let mut file = owner_only_options().open(&self.path)?;
        // `mode` only applies on creation; an older file keeps its bits otherwise
        restrict_permissions(&self.path)?;
        file.write_all(key.as_bytes())?;
        Ok(())
    }

    /// Delete the key file. Returns false when there was nothing to delete.
    pub fn reset(&self) -> Result<bool, CredentialError> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }

    /// Stored key, or one typed on the terminal without echo
    pub fn load_or_prompt_terminal(&self) -> Result<Option<String>, CredentialError> {
        if let Some(key) = self.load() {
            return Ok(Some(key));
        }
        let mut stdout = io::stdout();
        write_prompt_banner(&mut stdout)?;
        let answer = rpassword::prompt_password("Enter your Scopus API key (will be saved): ")?;
        Ok(self.accept(&answer))
    }

    /// Stored key, or one read from `input` after printing a prompt to `output`.
    ///
    /// A key obtained from the prompt is saved; failing to save it only logs.
    pub fn load_or_prompt(
        &self,
        input: &mut impl BufRead,
        output: &mut impl Write,
    ) -> Result<Option<String>, CredentialError> {
        if let Some(key) = self.load() {
            return Ok(Some(key));
        }

        write_prompt_banner(output)?;
        write!(output, "Enter your Scopus API key (will be saved): ")?;
        output.flush()?;

        let answer = rpassword::read_password_from_bufread(input)?;
        Ok(self.accept(&answer))
    }

    fn accept(&self, answer: &str) -> Option<String> {
        let key = answer.trim().to_string();
        if key.is_empty() {
            return None;
        }
        if let Err(e) = self.save(&key) {
            warn!(path = %self.path.display(), error = %e, "Could not save API key");
        }
        Some(key)
    }
}

fn write_prompt_banner(output: &mut impl Write) -> io::Result<()> {
    writeln!(output, "Scopus API key setup")?;
    writeln!(output, "Free API key available at: https://dev.elsevier.com")?;
    output.flush()
}

#[cfg(unix)]
fn owner_only_options() -> fs::OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true).mode(0o600);
    options
}

#[cfg(not(unix))]
fn owner_only_options() -> fs::OpenOptions {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    options
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Append `entries` to the `.gitignore` in `dir` unless already listed.
///
/// Returns the entries that were added.
pub fn ensure_gitignored(dir: &Path, entries: &[&str]) -> Result<Vec<String>, CredentialError> {
    let path = dir.join(".gitignore");
    let existing = if path.exists() {
        fs::read_to_string(&path)?
    } else {
        String::new()
    };

    let missing: Vec<String> = entries
        .iter()
        .filter(|entry| !existing.lines().any(|line| line.trim() == **entry))
        .map(|entry| entry.to_string())
        .collect();

    if missing.is_empty() {
        return Ok(missing);
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for entry in &missing {
        content.push_str(entry);
        content.push('\n');
    }
    fs::write(&path, content)?;
    Ok(missing)
}
