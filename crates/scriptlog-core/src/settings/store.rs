//! JSON-backed store of caller settings
//!
//! The whole file is rewritten on each mutation: serialize the new snapshot,
//! write it to a sibling temp file, fsync, then rename over the old file.
//! The in-memory copy only changes once that rename succeeded, so an
//! acknowledged toggle is always on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::Mutex;

use super::{CallerSettings, Toggle};
use crate::errors::SettingsError;

pub struct SettingsStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, CallerSettings>>,
}

impl SettingsStore {
    /// Opens the store at `path`. A missing file starts an empty store; an
    /// unreadable one is logged and also starts empty.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(content) => parse_records(&content).unwrap_or_else(|e| {
                log::error!(
                    "Settings file {} could not be parsed, starting empty: {}",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(SettingsError::IoError(e)),
        };

        log::info!(
            "Loaded settings for {} caller(s) from {}",
            records.len(),
            path.display()
        );

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the caller's settings, seeding and persisting defaults on first
    /// access. Never fails: a failed seed write is logged and the defaults are
    /// still returned.
    pub async fn get(&self, caller_id: &str) -> CallerSettings {
        let mut records = self.records.lock().await;
        if let Some(existing) = records.get(caller_id) {
            return existing.clone();
        }

        let defaults = CallerSettings::default();
        let mut snapshot = records.clone();
        snapshot.insert(caller_id.to_string(), defaults.clone());
        match persist(&self.path, &snapshot).await {
            Ok(()) => {
                *records = snapshot;
                log::debug!("Seeded default settings for caller {}", caller_id);
            }
            Err(e) => log::error!("Failed to seed settings for caller {}: {}", caller_id, e),
        }
        defaults
    }

    /// Sets one toggle by name. Names outside the recognized set are rejected
    /// with [`SettingsError::UnknownSetting`].
    pub async fn set(
        &self,
        caller_id: &str,
        name: &str,
        value: bool,
    ) -> Result<CallerSettings, SettingsError> {
        let toggle: Toggle = name.parse()?;
        self.update(caller_id, |settings| settings.set(toggle, value))
            .await
    }

    /// Flips one toggle and returns the updated record.
    pub async fn toggle(
        &self,
        caller_id: &str,
        toggle: Toggle,
    ) -> Result<CallerSettings, SettingsError> {
        self.update(caller_id, |settings| {
            let current = settings.get(toggle);
            settings.set(toggle, !current);
        })
        .await
    }

    async fn update<F>(&self, caller_id: &str, mutate: F) -> Result<CallerSettings, SettingsError>
    where
        F: FnOnce(&mut CallerSettings),
    {
        let mut records = self.records.lock().await;
        let mut updated = records.get(caller_id).cloned().unwrap_or_default();
        mutate(&mut updated);

        let mut snapshot = records.clone();
        snapshot.insert(caller_id.to_string(), updated.clone());
        persist(&self.path, &snapshot).await?;
        *records = snapshot;

        Ok(updated)
    }
}

fn parse_records(content: &str) -> Result<BTreeMap<String, CallerSettings>, SettingsError> {
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let raw: BTreeMap<String, Value> = serde_json::from_str(content)?;
    let mut records = BTreeMap::new();
    for (caller_id, value) in raw {
        match value.as_object() {
            Some(map) => {
                records.insert(caller_id, CallerSettings::from_raw(map));
            }
            None => log::warn!("Dropping malformed settings record for caller {}", caller_id),
        }
    }
    Ok(records)
}

async fn persist(
    path: &Path,
    records: &BTreeMap<String, CallerSettings>,
) -> Result<(), SettingsError> {
    let body = serde_json::to_vec_pretty(records)?;
    let target = path.to_path_buf();

    tokio::task::spawn_blocking(move || write_atomically(&target, &body))
        .await
        .map_err(|e| SettingsError::Persist {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
}

fn write_atomically(path: &Path, body: &[u8]) -> Result<(), SettingsError> {
    use std::io::Write;

    let persist_err = |message: String| SettingsError::Persist {
        path: path.display().to_string(),
        message,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| persist_err(e.to_string()))?;

    let mut staged = tempfile::NamedTempFile::new_in(&dir).map_err(|e| persist_err(e.to_string()))?;
    staged
        .write_all(body)
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|e| persist_err(e.to_string()))?;
    staged
        .persist(path)
        .map_err(|e| persist_err(e.error.to_string()))?;
    Ok(())
}
