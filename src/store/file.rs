// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON file backed state store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::StateStore;
use crate::error::StoreError;
use crate::state::DeviceState;

/// [`StateStore`] that keeps every device in a single JSON document.
///
/// The file is read once on [`open`](Self::open). Each [`set`](StateStore::set)
/// writes the whole document to a sibling temporary file and renames it over
/// the original, so readers never observe a half written file. The temporary
/// file and the directory are synced before and after the rename, so the
/// document also survives a power loss. The in-memory copy only changes once
/// the rename succeeded.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, DeviceState>>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No state file found, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), devices = entries.len(), "Opened state file");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_document(
        &self,
        entries: &BTreeMap<String, DeviceState>,
    ) -> Result<(), StoreError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty());
        if let Some(parent) = parent {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_vec_pretty(entries)?;
        let temp = self.temp_path();

        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(&contents).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp, &self.path).await?;

        // The rename itself is only durable once the directory entry is.
        sync_dir(parent.unwrap_or_else(|| Path::new("."))).await?;

        Ok(())
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

impl StateStore for JsonFileStore {
    async fn get(&self, device_id: &str) -> Result<Option<DeviceState>, StoreError> {
        Ok(self.entries.lock().await.get(device_id).cloned())
    }

    async fn set(&self, device_id: &str, state: &DeviceState) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;

        let mut updated = entries.clone();
        updated.insert(device_id.to_string(), state.clone());
        self.write_document(&updated).await?;

        *entries = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("state.json"))
            .await
            .unwrap();
        assert!(store.get("ab123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        let state = DeviceState::new("ab123", "Home", "armed").with_online(true);
        store.set("ab123", &state).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("ab123").await.unwrap(), Some(state));
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn file_holds_every_device_after_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::open(&path).await.unwrap();

        let home = DeviceState::new("ab123", "Home", "armed");
        let garage = DeviceState::new("cd456", "Garage", "disarmed").with_online(true);
        store.set("ab123", &home).await.unwrap();
        store.set("cd456", &garage).await.unwrap();

        let on_disk: BTreeMap<String, DeviceState> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert_eq!(on_disk["ab123"], home);
        assert_eq!(on_disk["cd456"], garage);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = JsonFileStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::open(&path).await.unwrap();

        let first = DeviceState::new("ab123", "Home", "armed");
        store.set("ab123", &first).await.unwrap();

        // A directory where the temp file should go makes the write fail.
        std::fs::create_dir(dir.path().join("state.json.tmp")).unwrap();
        let second = first.clone().with_mode("disarmed");
        assert!(store.set("ab123", &second).await.is_err());

        assert_eq!(store.get("ab123").await.unwrap(), Some(first));
    }
}
