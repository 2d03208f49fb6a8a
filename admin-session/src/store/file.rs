use crate::store::{KeyValueSlot, StorageError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// File-backed slot
//--------------------------------------------------------------------------------------------------

/// A JSON object in a single file.
///
/// The file is re-read on every access so separate processes sharing it see each other's writes;
/// concurrent writers are last-write-wins. Writes go to a sibling temp file that is renamed into
/// place, so readers never see a half-written file.
#[derive(Debug)]
pub struct FileSlot {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock();
        let mut values = self.read_all()?;
        f(&mut values);
        self.write_all(&values)
    }
}

impl KeyValueSlot for FileSlot {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("admin-session-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let slot = FileSlot::new(temp_path("session.json"));
        assert!(slot.get("authToken").unwrap().is_none());
    }

    #[test]
    fn values_survive_a_new_handle() {
        let path = temp_path("session.json");
        FileSlot::new(&path).set("authToken", "a.b.c").unwrap();

        let reopened = FileSlot::new(&path);
        assert_eq!(reopened.get("authToken").unwrap().as_deref(), Some("a.b.c"));

        reopened.remove("authToken").unwrap();
        assert!(FileSlot::new(&path).get("authToken").unwrap().is_none());
    }

    #[test]
    fn writes_from_another_handle_are_visible() {
        let path = temp_path("session.json");
        let first = FileSlot::new(&path);
        let second = FileSlot::new(&path);

        first.set("authToken", "one").unwrap();
        second.set("authToken", "two").unwrap();
        assert_eq!(first.get("authToken").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let path = temp_path("session.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            FileSlot::new(&path).get("authToken"),
            Err(StorageError::Serialization(_))
        ));
    }
}
