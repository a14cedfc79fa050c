//! Persisted settings: the device host and the pairing marker, kept in a
//! `KEY=value` env file next to the identity files.

use crate::endpoint::Endpoint;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;
use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ENV_FILE_NAME: &str = ".env";
pub const HOST_KEY: &str = "SHIELD_HOST";
pub const CERT_KEY: &str = "SHIELD_CERT";

const MARKER_PREFIX: &str = "paired_";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Cannot access config file: {0}")]
    Io(#[from] io::Error),
    #[error("Cannot parse config file: {0}")]
    Parse(#[from] dotenvy::Error),
}

/// String key-value storage that survives between runs.
pub trait CredentialStore {
    fn get(&self, key: &str) -> Option<String>;
    /// Writes are all-or-nothing from the caller's point of view.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Human readable location, used in messages.
    fn location(&self) -> String;
}

/// A dotenv-style file. Read once on open, rewritten atomically on every set.
pub struct EnvFile {
    path: PathBuf,
    values: Vec<(String, String)>,
}

impl EnvFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = if path.exists() {
            dotenvy::from_path_iter(&path)?.collect::<Result<Vec<_>, _>>()?
        } else {
            vec![]
        };
        debug!("Loaded {} entries from {:?}", values.len(), path);
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rewrite(&self, key: &str, value: &str) -> io::Result<()> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        let entry = format!("{key}={value}");
        // The last assignment wins on read, so that is the one replaced.
        // Earlier duplicates are dropped.
        let last = existing
            .lines()
            .enumerate()
            .filter(|(_, line)| line_key(line) == Some(key))
            .map(|(i, _)| i)
            .last();
        let mut lines: Vec<String> = existing
            .lines()
            .enumerate()
            .filter_map(|(i, line)| match last {
                Some(last) if i == last => Some(entry.clone()),
                Some(_) if line_key(line) == Some(key) => None,
                _ => Some(line.to_string()),
            })
            .collect();
        if last.is_none() {
            lines.push(entry);
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        for line in &lines {
            writeln!(tmp, "{line}")?;
        }
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn line_key(line: &str) -> Option<&str> {
    let line = line.trim_start();
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, _) = line.split_once('=')?;
    Some(key.trim())
}

impl CredentialStore for EnvFile {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.rewrite(key, value)?;
        self.values.retain(|(k, _)| k != key);
        self.values.push((key.to_string(), value.to_string()));
        debug!("Saved {} to {:?}", key, self.path);
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Opaque proof that pairing succeeded for one host. The key material itself
/// lives in the identity files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialMarker(String);

impl CredentialMarker {
    pub fn for_endpoint(endpoint: &Endpoint) -> Self {
        Self(STANDARD.encode(format!("{MARKER_PREFIX}{endpoint}")))
    }

    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this marker was issued for `endpoint`.
    pub fn is_for(&self, endpoint: &Endpoint) -> bool {
        let Ok(decoded) = STANDARD.decode(&self.0) else {
            return false;
        };
        let Some(host) = std::str::from_utf8(&decoded)
            .ok()
            .and_then(|s| s.strip_prefix(MARKER_PREFIX))
        else {
            return false;
        };
        host.parse::<Endpoint>().map_or(false, |h| h == *endpoint)
    }
}

/// Snapshot of the stored settings, read once at startup.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    pub host: Option<String>,
    pub marker: Option<CredentialMarker>,
}

impl Config {
    pub fn load(store: &dyn CredentialStore) -> Self {
        let non_empty = |key: &str| store.get(key).filter(|v| !v.trim().is_empty());
        Self {
            host: non_empty(HOST_KEY),
            marker: non_empty(CERT_KEY).map(CredentialMarker::from_stored),
        }
    }
}
