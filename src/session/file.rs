use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{SessionCookie, SessionError, SessionStore};

/// Directory holding the CLI's persisted state.
pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("CMP_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("cmp").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Session persisted as `session.json`, the CLI's stand-in for browser cookies.
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileSession {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn open_default() -> anyhow::Result<Self> {
        let path = get_config_dir()?.join("session.json");
        Ok(Self::open(path)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<(), SessionError> {
        let content = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SessionStore for FileSession {
    fn get(&self, cookie: SessionCookie) -> Option<String> {
        self.lock().get(cookie.name()).cloned()
    }

    fn set(&self, cookie: SessionCookie, value: &str) -> Result<(), SessionError> {
        let mut values = self.lock();
        values.insert(cookie.name().to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, cookie: SessionCookie) -> Result<(), SessionError> {
        let mut values = self.lock();
        if values.remove(cookie.name()).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}
