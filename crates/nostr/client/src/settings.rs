//! Persistence of the relay list and the profile cache.

use crate::error::{ClientError, Result};
use crate::profiles::ProfileCacheEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

const SETTINGS_SCHEMA_VERSION: u32 = 1;
const RELAYS_FILE_NAME: &str = "relays.json";
const PROFILES_FILE_NAME: &str = "profiles.json";

/// Storage for settings that outlive the process.
pub trait SettingsStore: Send + Sync {
    /// Saved relay list; `None` if none was ever saved.
    fn load_relays(&self) -> Result<Option<Vec<String>>>;

    fn save_relays(&self, relays: &[String]) -> Result<()>;

    fn load_profiles(&self) -> Result<Vec<ProfileCacheEntry>>;

    /// Insert or replace one profile.
    fn save_profile(&self, profile: &ProfileCacheEntry) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct RelaysDocument {
    version: u32,
    relays: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfilesDocument {
    version: u32,
    profiles: BTreeMap<String, ProfileCacheEntry>,
}

/// JSON files under one directory.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    dir: PathBuf,
    profiles_lock: Arc<Mutex<()>>,
}

impl FileSettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            profiles_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Store under the platform data directory.
    pub fn open_default() -> Self {
        Self::new(default_data_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_document<T: DeserializeOwned>(&self, file_name: &str) -> Result<Option<T>> {
        let path = self.dir.join(file_name);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).map_err(|error| {
            ClientError::Settings(format!("failed to read {}: {}", path.display(), error))
        })?;
        serde_json::from_str(&raw).map(Some).map_err(|error| {
            ClientError::Settings(format!("failed to parse {}: {}", path.display(), error))
        })
    }

    fn write_document<T: Serialize>(&self, file_name: &str, document: &T) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|error| {
            ClientError::Settings(format!(
                "failed to create settings directory {}: {}",
                self.dir.display(),
                error
            ))
        })?;
        let path = self.dir.join(file_name);
        let json = serde_json::to_string_pretty(document)?;

        let tmp_path = temporary_path(&path);
        fs::write(&tmp_path, json).map_err(|error| {
            ClientError::Settings(format!(
                "failed to write temporary file {}: {}",
                tmp_path.display(),
                error
            ))
        })?;
        fs::rename(&tmp_path, &path).map_err(|error| {
            ClientError::Settings(format!("failed to commit {}: {}", path.display(), error))
        })
    }
}

impl SettingsStore for FileSettingsStore {
    fn load_relays(&self) -> Result<Option<Vec<String>>> {
        Ok(self
            .read_document::<RelaysDocument>(RELAYS_FILE_NAME)?
            .map(|document| document.relays))
    }

    fn save_relays(&self, relays: &[String]) -> Result<()> {
        self.write_document(
            RELAYS_FILE_NAME,
            &RelaysDocument {
                version: SETTINGS_SCHEMA_VERSION,
                relays: relays.to_vec(),
            },
        )
    }

    fn load_profiles(&self) -> Result<Vec<ProfileCacheEntry>> {
        Ok(self
            .read_document::<ProfilesDocument>(PROFILES_FILE_NAME)?
            .map(|document| document.profiles.into_values().collect())
            .unwrap_or_default())
    }

    fn save_profile(&self, profile: &ProfileCacheEntry) -> Result<()> {
        let _guard = self
            .profiles_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut document = self
            .read_document::<ProfilesDocument>(PROFILES_FILE_NAME)?
            .unwrap_or_default();
        document.version = SETTINGS_SCHEMA_VERSION;
        document
            .profiles
            .insert(profile.pubkey.clone(), profile.clone());
        self.write_document(PROFILES_FILE_NAME, &document)
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let extension = path
        .extension()
        .map(|ext| format!("{}.tmp", ext.to_string_lossy()))
        .unwrap_or_else(|| "tmp".to_string());
    tmp.set_extension(extension);
    tmp
}

/// Platform data directory for this client.
pub fn default_data_dir() -> PathBuf {
    if let Some(mut data_dir) = dirs::data_dir() {
        data_dir.push("nostr-relay-pool");
        return data_dir;
    }

    if let Some(mut home_dir) = dirs::home_dir() {
        home_dir.push(".nostr-relay-pool");
        return home_dir;
    }

    PathBuf::from(".nostr-relay-pool")
}

/// Volatile store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    relays: Mutex<Option<Vec<String>>>,
    profiles: Mutex<BTreeMap<String, ProfileCacheEntry>>,
    fail_writes: Mutex<bool>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relays(relays: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let store = Self::default();
        *store.relays.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(relays.into_iter().map(Into::into).collect());
        store
    }

    /// Make every subsequent save fail.
    pub fn set_fail_writes(&self, fail: bool) {
        *self
            .fail_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = fail;
    }

    fn check_writable(&self) -> Result<()> {
        if *self
            .fail_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
        {
            return Err(ClientError::Settings("store is read-only".to_string()));
        }
        Ok(())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load_relays(&self) -> Result<Option<Vec<String>>> {
        Ok(self
            .relays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_relays(&self, relays: &[String]) -> Result<()> {
        self.check_writable()?;
        *self.relays.lock().unwrap_or_else(PoisonError::into_inner) = Some(relays.to_vec());
        Ok(())
    }

    fn load_profiles(&self) -> Result<Vec<ProfileCacheEntry>> {
        Ok(self
            .profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    fn save_profile(&self, profile: &ProfileCacheEntry) -> Result<()> {
        self.check_writable()?;
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.pubkey.clone(), profile.clone());
        Ok(())
    }
}
