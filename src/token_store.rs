//! Durable storage for the session credential.
//!
//! The credential lives under a single fixed key, [`STORAGE_KEY`], and is
//! serialized as JSON. Reading never fails: anything that cannot be read or
//! parsed is treated as "no credential stored", which sends the user through
//! login again.
//!
//! Two stores are provided:
//! * [`FileStore`] keeps `tokens.json` in a directory and survives restarts
//! * [`MemoryStore`] keeps the credential in process only

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{credential::Credential, error::Result};

/// Fixed key under which the credential is stored.
pub const STORAGE_KEY: &str = "tokens";

/// Upper bound on the size of a stored credential file.
///
/// Anything larger did not come from us and is not worth reading into memory.
const MAX_FILE_SIZE: u64 = 16 * 1024;

/// Durable slot holding at most one credential.
pub trait TokenStore: Send + Sync {
    /// Returns the stored credential, or `None` when absent or unreadable.
    fn load(&self) -> Option<Credential>;

    /// Replaces the stored credential.
    fn save(&self, credential: &Credential) -> Result<()>;

    /// Removes the stored credential. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

/// Stores the credential as `tokens.json` in a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a store keeping its file in `dir`.
    ///
    /// The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    /// Path of the credential file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> io::Result<Credential> {
        // Prevent out-of-memory condition: the file should be small.
        let file_size = fs::metadata(&self.path)?.len();
        if file_size > MAX_FILE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is too large", self.path.display()),
            ));
        }

        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(io::Error::from)
    }
}

impl TokenStore for FileStore {
    fn load(&self) -> Option<Credential> {
        match self.read() {
            Ok(credential) => Some(credential),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("ignoring stored credential: {e}");
                None
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        // Write then rename, so that a reader sees either the old or the new
        // credential and never a partial one.
        let tmp = self
            .path
            .with_extension(format!("json.{:016x}.tmp", fastrand::u64(..)));
        let written = write_private(&tmp, &serde_json::to_vec(credential)?)
            .and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!("stored {credential}");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("cleared stored credential");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Writes `contents` to a new file only the current user can read.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Keeps the credential in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `credential`.
    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

impl TokenStore for MemoryStore {
    fn load(&self) -> Option<Credential> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        *self.slot.lock()? = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.slot.lock()?.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn credential() -> Credential {
        Credential {
            id_token: "id".to_owned(),
            refresh_token: "refresh".to_owned(),
            expires_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cssorbot-{name}-{}-{}",
            std::process::id(),
            fastrand::u64(..)
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn file_store_round_trips_under_fixed_key() {
        let dir = scratch_dir("roundtrip");
        let store = FileStore::new(&dir);
        assert_eq!(store.path(), dir.join("tokens.json"));
        assert!(store.load().is_none());

        store.save(&credential()).unwrap();
        assert_eq!(store.load(), Some(credential()));

        store.clear().unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn malformed_file_reads_as_absent() {
        let dir = scratch_dir("malformed");
        fs::create_dir_all(&dir).unwrap();
        let store = FileStore::new(&dir);

        fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_none());

        fs::write(store.path(), r#"{"idToken":"id"}"#).unwrap();
        assert!(store.load().is_none());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn stored_file_uses_wire_names() {
        let dir = scratch_dir("wire");
        let store = FileStore::new(&dir);
        store.save(&credential()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["idToken"], "id");
        assert_eq!(raw["refreshToken"], "refresh");
        assert_eq!(raw["expiresAt"], 1_700_000_000);

        let _ = fs::remove_dir_all(dir);
    }

    #[cfg(unix)]
    #[test]
    fn stored_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = scratch_dir("private");
        let store = FileStore::new(&dir);
        store.save(&credential()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn concurrent_saves_leave_one_complete_file() {
        let dir = scratch_dir("concurrent");
        let store = FileStore::new(&dir);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    let mut credential = credential();
                    credential.id_token = format!("id-{i}");
                    store.save(&credential).unwrap();
                });
            }
        });

        let stored = store.load().unwrap();
        assert!(stored.id_token.starts_with("id-"));
        let entries: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("tokens.json")]);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn memory_store_replaces_and_clears() {
        let store = MemoryStore::new();
        assert!(store.load().is_none());

        store.save(&credential()).unwrap();
        let mut newer = credential();
        newer.id_token = "newer".to_owned();
        store.save(&newer).unwrap();
        assert_eq!(store.load().map(|c| c.id_token), Some("newer".to_owned()));

        store.clear().unwrap();
        assert!(store.load().is_none());
    }
}
