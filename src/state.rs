//! Key/value record persisted between runs.
//!
//! The orchestrator itself keeps nothing between invocations, so values that
//! the next run must know (the last applied WPS password) live in a small JSON
//! object next to the service data.
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    data: BTreeMap<String, String>,
    dirty: bool,
}

impl StateStore {
    /// Load the record, starting empty when the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        let data = if path.exists() {
            let bytes = fs::read(path).with_context(|| format!("read state {}", path.display()))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("parse state JSON {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            data,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn put(&mut self, key: &str, value: &str) {
        if self.get(key) == Some(value) {
            return;
        }
        self.data.insert(key.to_string(), value.to_string());
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Overwrite the file with the current record.
    pub fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let text = serde_json::to_string_pretty(&self.data).context("serialize state")?;
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("state path {} has no file name", self.path.display()))?;
        let tmp_path = self.path.with_file_name(format!(".{file_name}.tmp"));
        fs::write(&tmp_path, text.as_bytes())
            .with_context(|| format!("write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("publish {}", self.path.display()))?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), keys = self.data.len(), "state saved");
        Ok(())
    }

    pub fn save_if_dirty(&mut self) -> Result<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }
}
