//! Settings persistence backends.
//!
//! A backend stores untyped scalar values per key plus the first-boot
//! sentinel. Commits are atomic per key: `FileBackend` writes the whole
//! document to a uniquely named temporary file in the same directory, syncs
//! it and renames it over the previous one, so a failed write leaves the last
//! committed state intact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::SettingsError;
use super::table::SettingKey;

/// Scalar as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
}

/// Persistence layer behind the Settings Store.
pub trait SettingsBackend: Send + Sync {
    /// Read a value; `Ok(None)` if the key was never written.
    fn load(&self, key: SettingKey) -> Result<Option<StoredValue>, SettingsError>;

    /// Commit one key.
    fn store(&mut self, key: SettingKey, value: StoredValue) -> Result<(), SettingsError>;

    /// Whether the complete default table has been written.
    fn is_seeded(&self) -> bool;

    /// Record that seeding completed.
    fn mark_seeded(&mut self) -> Result<(), SettingsError>;
}

// ─── File backend ───────────────────────────────────────────────────

/// On-disk document layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsDocument {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    seeded: bool,
    #[serde(default)]
    settings: BTreeMap<String, StoredValue>,
}

impl SettingsDocument {
    const CURRENT_VERSION: u32 = 1;

    fn fresh() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            seeded: false,
            settings: BTreeMap::new(),
        }
    }
}

/// TOML file backend.
///
/// ```toml
/// version = 1
/// seeded = true
///
/// [settings]
/// "$100" = 250.0
/// "$20" = false
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    document: SettingsDocument,
}

impl FileBackend {
    /// Open (or prepare to create) the settings file at `path`.
    ///
    /// A missing file or a file written by a different format version is
    /// treated as unseeded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening settings file {:?}", path);

        if !path.exists() {
            info!("Settings file {:?} does not exist, starting unseeded", path);
            return Ok(Self {
                path,
                document: SettingsDocument::fresh(),
            });
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            SettingsError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let document: SettingsDocument = toml::from_str(&content).map_err(|e| {
            SettingsError::Storage(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        if document.version != SettingsDocument::CURRENT_VERSION {
            warn!(
                "Settings file version {} differs from current {}, reseeding",
                document.version,
                SettingsDocument::CURRENT_VERSION
            );
            return Ok(Self {
                path,
                document: SettingsDocument::fresh(),
            });
        }

        info!(
            "Loaded {} settings from {:?} (seeded={})",
            document.settings.len(),
            path,
            document.seeded
        );
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&self, document: &SettingsDocument) -> Result<(), SettingsError> {
        let write_err = |what: &str, e: &dyn std::fmt::Display| {
            SettingsError::ConfigWriteError(format!("{what} {}: {e}", self.path.display()))
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| write_err("Failed to create directory for", &e))?;

        let content =
            toml::to_string_pretty(document).map_err(|e| write_err("Failed to serialize", &e))?;

        // Uniquely named sibling, flushed to disk before it replaces the file.
        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| write_err("Failed to create temporary for", &e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| write_err("Failed to write temporary for", &e))?;
        tmp.persist(&self.path)
            .map_err(|e| write_err("Failed to commit", &e.error))?;
        Ok(())
    }
}

impl SettingsBackend for FileBackend {
    fn load(&self, key: SettingKey) -> Result<Option<StoredValue>, SettingsError> {
        Ok(self.document.settings.get(&key.to_string()).copied())
    }

    fn store(&mut self, key: SettingKey, value: StoredValue) -> Result<(), SettingsError> {
        let mut next = self.document.clone();
        next.settings.insert(key.to_string(), value);
        self.commit(&next)?;
        self.document = next;
        Ok(())
    }

    fn is_seeded(&self) -> bool {
        self.document.seeded
    }

    fn mark_seeded(&mut self) -> Result<(), SettingsError> {
        let mut next = self.document.clone();
        next.seeded = true;
        self.commit(&next)?;
        self.document = next;
        Ok(())
    }
}

// ─── Memory backend ─────────────────────────────────────────────────

/// In-memory backend with optional write-fault injection.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    values: BTreeMap<SettingKey, StoredValue>,
    seeded: bool,
    /// Remaining successful writes before every write fails.
    writes_before_failure: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose first `n` writes succeed and every later write fails.
    pub fn failing_after(n: usize) -> Self {
        Self {
            writes_before_failure: Some(n),
            ..Self::default()
        }
    }

    /// Already-seeded backend holding exactly `values`.
    pub fn seeded_with(values: impl IntoIterator<Item = (SettingKey, StoredValue)>) -> Self {
        Self {
            values: values.into_iter().collect(),
            seeded: true,
            writes_before_failure: None,
        }
    }

    fn consume_write(&mut self) -> Result<(), SettingsError> {
        match self.writes_before_failure.as_mut() {
            Some(0) => Err(SettingsError::ConfigWriteError(
                "injected write failure".to_string(),
            )),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl SettingsBackend for MemoryBackend {
    fn load(&self, key: SettingKey) -> Result<Option<StoredValue>, SettingsError> {
        Ok(self.values.get(&key).copied())
    }

    fn store(&mut self, key: SettingKey, value: StoredValue) -> Result<(), SettingsError> {
        self.consume_write()?;
        self.values.insert(key, value);
        Ok(())
    }

    fn is_seeded(&self) -> bool {
        self.seeded
    }

    fn mark_seeded(&mut self) -> Result<(), SettingsError> {
        self.consume_write()?;
        self.seeded = true;
        Ok(())
    }
}
