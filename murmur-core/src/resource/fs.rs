//! Local filesystem loader.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::ResourceLoader;
use crate::error::{MurmurError, Result};

/// Reads resources with `tokio::fs`. Relative paths resolve against `root`
/// when one is given.
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    root: Option<PathBuf>,
}

impl FsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        match &self.root {
            Some(root) if p.is_relative() => root.join(p),
            _ => p.to_path_buf(),
        }
    }
}

#[async_trait]
impl ResourceLoader for FsLoader {
    async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        debug!(path = %full.display(), "reading resource");
        tokio::fs::read(&full).await.map_err(|e| MurmurError::Resource {
            path: full.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_relative_to_root() {
        let dir = std::env::temp_dir().join(format!("murmur-fs-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("dict.txt"), b"go G OW\n").await.unwrap();

        let loader = FsLoader::with_root(&dir);
        assert_eq!(loader.fetch_bytes("dict.txt").await.unwrap(), b"go G OW\n");
        assert!(matches!(
            loader.fetch_bytes("missing.txt").await,
            Err(MurmurError::Resource { .. })
        ));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
