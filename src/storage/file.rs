//! File-based token storage.

use crate::error::Result;
use crate::storage::traits::TokenStore;
use std::fs;
use std::path::PathBuf;

/// Name of the token file inside the ragchat home directory.
const TOKEN_FILE: &str = "token";

/// Token store backed by a single file, written atomically.
#[derive(Debug)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    /// Create a new file token store.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Path of the token file.
    #[must_use]
    pub fn token_path(&self) -> PathBuf {
        self.base_dir.join(TOKEN_FILE)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let token = contents.trim();
        if token.is_empty() {
            return Ok(None);
        }
        Ok(Some(token.to_string()))
    }

    fn save(&self, token: &str) -> Result<()> {
        let path = self.token_path();
        let temp = path.with_extension("tmp");

        fs::write(&temp, token)?;
        restrict_permissions(&temp)?;

        // Rename is atomic, a reader never sees a half-written token
        fs::rename(&temp, &path)?;

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FileTokenStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(temp_dir.path().to_path_buf()).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn creates_base_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("home");
        let _store = FileTokenStore::new(nested.clone()).unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn load_missing_token() {
        let (store, _temp) = create_test_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_and_load_token() {
        let (store, _temp) = create_test_store();
        store.save("T").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("T"));
    }

    #[test]
    fn save_replaces_previous_token() {
        let (store, _temp) = create_test_store();
        store.save("first").unwrap();
        store.save("second").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let (store, temp_dir) = create_test_store();
        store.save("T").unwrap();

        assert!(!temp_dir.path().join("token.tmp").exists());
        assert!(temp_dir.path().join("token").exists());
    }

    #[test]
    fn token_survives_new_store_instance() {
        let (store, temp_dir) = create_test_store();
        store.save("persisted").unwrap();
        drop(store);

        let reopened = FileTokenStore::new(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.load().unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn clear_removes_file() {
        let (store, temp_dir) = create_test_store();
        store.save("T").unwrap();

        store.clear().unwrap();
        assert!(!temp_dir.path().join("token").exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn clear_without_token_succeeds() {
        let (store, _temp) = create_test_store();
        store.clear().unwrap();
    }

    #[test]
    fn blank_file_reads_as_no_token() {
        let (store, temp_dir) = create_test_store();
        fs::write(temp_dir.path().join("token"), "  \n").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (store, _temp) = create_test_store();
        store.save("T").unwrap();

        let mode = fs::metadata(store.token_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
