//! Key/value persistence for session snapshots.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::StoreError;

pub trait SessionStore {
    fn get_object(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set_object(&mut self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// A JSON object on disk, one entry per key. Every write rewrites the whole
/// file through a temporary sibling so readers never see a partial file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    objects: Map<String, Value>,
}

impl JsonFileStore {
    /// Open the store, starting empty if the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(store) => store,
            Err(e) => {
                warn!("session store {} unusable, starting empty: {e}", path.display());
                Self {
                    path,
                    objects: Map::new(),
                }
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let objects = match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => match serde_json::from_str(&text)? {
                Value::Object(map) => map,
                other => {
                    warn!(
                        "session store {} holds {} instead of an object; ignoring it",
                        path.display(),
                        kind(&other)
                    );
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no session store at {}", path.display());
                Map::new()
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            objects,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, objects: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(io_err)?;
            }
        }

        let body = serde_json::to_vec_pretty(objects)?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&body).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!("session store written to {}", self.path.display());
        Ok(())
    }
}

impl SessionStore for JsonFileStore {
    fn get_object(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.objects.get(key).cloned())
    }

    /// Memory only changes once the file has been written.
    fn set_object(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut objects = self.objects.clone();
        objects.insert(key.to_string(), value);
        self.save(&objects)?;
        self.objects = objects;
        Ok(())
    }
}

/// Volatile store, for tests and for running without a state file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Map<String, Value>,
}

impl SessionStore for MemoryStore {
    fn get_object(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.objects.get(key).cloned())
    }

    fn set_object(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
        self.objects.insert(key.to_string(), value);
        Ok(())
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
