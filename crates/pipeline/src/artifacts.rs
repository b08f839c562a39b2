//! Storage for generated source artifacts.
//!
//! The project row only keeps the location string returned by
//! [`ArtifactStore::put`].

use std::path::{Component, Path, PathBuf};

use applaude_core::types::ProjectId;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `contents` under `key`, replacing any previous value. Returns
    /// the location to persist.
    async fn put(&self, key: &str, contents: &str) -> Result<String, ArtifactError>;

    async fn get(&self, location: &str) -> Result<String, ArtifactError>;
}

/// Key for a project's generated source.
pub fn source_key(project_id: ProjectId) -> String {
    format!("projects/{project_id}/source.md")
}

/// Relative keys only, without `..` or root components.
fn checked_key(key: &str) -> Result<&Path, ArtifactError> {
    let path = Path::new(key);
    let valid = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(path)
    } else {
        Err(ArtifactError::InvalidKey(key.to_string()))
    }
}

/// Files under a root directory.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, key: &str, contents: &str) -> Result<String, ArtifactError> {
        let path = self.root.join(checked_key(key)?);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write then rename so readers never see a partial file. Each write
        // gets its own temp file so concurrent puts of one key cannot collide.
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let tmp = path.with_file_name(tmp_name);

        let written = match tokio::fs::write(&tmp, contents).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(key.to_string())
    }

    async fn get(&self, location: &str) -> Result<String, ArtifactError> {
        let path = self.root.join(checked_key(location)?);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let id = uuid::Uuid::now_v7();

        let location = store.put(&source_key(id), "fn main() {}").await.unwrap();
        assert_eq!(location, format!("projects/{id}/source.md"));
        assert_eq!(store.get(&location).await.unwrap(), "fn main() {}");
    }

    #[tokio::test]
    async fn put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        store.put("a/b.md", "one").await.unwrap();
        store.put("a/b.md", "two").await.unwrap();
        assert_eq!(store.get("a/b.md").await.unwrap(), "two");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_of_one_key_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(LocalArtifactStore::new(dir.path()));
        let key = source_key(uuid::Uuid::now_v7());

        for round in 0..50 {
            let writers: Vec<_> = (0..4)
                .map(|n| {
                    let store = store.clone();
                    let key = key.clone();
                    tokio::spawn(async move { store.put(&key, &format!("{round}-{n}")).await })
                })
                .collect();
            for writer in writers {
                writer.await.unwrap().unwrap();
            }
        }

        let last = store.get(&key).await.unwrap();
        assert!(last.starts_with("49-"), "{last}");
        let parent = dir.path().join(&key);
        let leftovers = std::fs::read_dir(parent.parent().unwrap())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        assert!(matches!(
            store.get("nope.md").await,
            Err(ArtifactError::NotFound(_))
        ));
    }

    #[test]
    fn escaping_keys_are_rejected() {
        assert!(checked_key("../etc/passwd").is_err());
        assert!(checked_key("/abs/path").is_err());
        assert!(checked_key("").is_err());
        assert!(checked_key("projects/x/source.md").is_ok());
    }
}
