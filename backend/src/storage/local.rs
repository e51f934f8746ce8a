use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use super::{BlobStore, StoredBlob};

/// Stockage sur disque, pour le développement sans identifiants cloud.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)
            .with_context(|| format!("création du répertoire {}", root.display()))?;
        let root = root
            .canonicalize()
            .with_context(|| format!("chemin invalide: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> anyhow::Result<StoredBlob> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("écriture de {}", path.display()))?;

        Ok(StoredBlob {
            key: key.to_string(),
            public_url: format!("file://{}", path.display()),
        })
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
