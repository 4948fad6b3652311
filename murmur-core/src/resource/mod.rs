//! Resource loading.
//!
//! The decoder never touches the filesystem or network directly. Every
//! model file, dictionary and grammar is fetched through an injected
//! [`ResourceLoader`], so the same pipeline runs against local files
//! ([`FsLoader`]), in-memory bundles ([`MemoryLoader`]) or, with the `http`
//! feature, a remote model server (`HttpLoader`).

pub mod fs;

#[cfg(feature = "http")]
pub mod http;

pub use fs::FsLoader;

#[cfg(feature = "http")]
pub use http::HttpLoader;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{MurmurError, Result};

/// Async byte-fetch contract.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    /// Fetch the full contents of `path`.
    ///
    /// # Errors
    /// `MurmurError::Resource` if the resource does not exist or cannot be
    /// read.
    async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>>;

    /// Fetch a key/value parameter file, in file order.
    ///
    /// Accepts a JSON object or the whitespace-separated text form
    /// (`-lowerf 130` per line, `#` comments).
    async fn fetch_params(&self, path: &str) -> Result<Vec<(String, Value)>> {
        let bytes = self.fetch_bytes(path).await?;
        parse_params(path, &bytes)
    }
}

/// Parse a parameter file in either supported form.
pub fn parse_params(path: &str, bytes: &[u8]) -> Result<Vec<(String, Value)>> {
    let text = std::str::from_utf8(bytes).map_err(|e| MurmurError::Resource {
        path: path.to_string(),
        reason: format!("not UTF-8: {e}"),
    })?;

    if text.trim_start().starts_with('{') {
        let object: serde_json::Map<String, Value> = serde_json::from_str(text)?;
        return Ok(object.into_iter().collect());
    }

    let mut entries = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut words = line.split_whitespace();
        let key = words.next().unwrap_or_default();
        let value = words.collect::<Vec<_>>().join(" ");
        if value.is_empty() {
            return Err(MurmurError::Resource {
                path: path.to_string(),
                reason: format!("line {}: {key} has no value", lineno + 1),
            });
        }
        entries.push((key.to_string(), Value::String(value)));
    }
    Ok(entries)
}

/// In-memory resource map keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }
}

#[async_trait]
impl ResourceLoader for MemoryLoader {
    async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| MurmurError::Resource {
                path: path.to_string(),
                reason: "not found".into(),
            })
    }
}
