//! Shared fixtures for database and environment dependent tests.

use std::{
    io,
    path::Path,
    sync::{Mutex, MutexGuard, OnceLock},
};

use tempfile::TempDir;

pub fn test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// A SQLite database file in a private temp directory, removed on drop.
pub struct TempDatabase {
    dir: TempDir,
    url: String,
}

impl TempDatabase {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("checklists-test-").tempdir()?;
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("db.sqlite").display());
        Ok(Self { dir, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Holds the global test lock while overriding environment variables, restoring the
/// previous values on drop.
pub struct TestEnvGuard {
    _lock: MutexGuard<'static, ()>,
    previous: Vec<(String, Option<String>)>,
}

impl TestEnvGuard {
    pub fn new() -> Self {
        let lock = test_lock().lock().unwrap_or_else(|err| err.into_inner());
        Self {
            _lock: lock,
            previous: Vec::new(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl AsRef<str>) -> &mut Self {
        self.remember(key);
        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe { std::env::set_var(key, value.as_ref()) };
        self
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.remember(key);
        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe { std::env::remove_var(key) };
        self
    }

    fn remember(&mut self, key: &str) {
        if self.previous.iter().all(|(known, _)| known != key) {
            self.previous.push((key.to_string(), std::env::var(key).ok()));
        }
    }
}

impl Default for TestEnvGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestEnvGuard {
    fn drop(&mut self) {
        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            for (key, value) in self.previous.drain(..).rev() {
                match value {
                    Some(value) => std::env::set_var(&key, value),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_database_url_points_into_temp_dir() {
        let db = TempDatabase::new().unwrap();
        assert!(db.url().starts_with("sqlite://"));
        assert!(db.url().ends_with("?mode=rwc"));
        assert!(db.url().contains(&*db.path().to_string_lossy()));
    }

    #[test]
    fn env_guard_restores_previous_values() {
        let key = "TEST_SUPPORT_GUARD_PROBE";
        {
            let mut guard = TestEnvGuard::new();
            guard.set(key, "one").set(key, "two");
            assert_eq!(std::env::var(key).as_deref(), Ok("two"));
        }
        assert!(std::env::var(key).is_err());
    }
}
