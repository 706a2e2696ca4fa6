//! Filesystem document store: each bucket is a directory under a root.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use sismica_core::{Document, DocumentStore, Error, Result};

use super::detect_content_type;

pub struct FilesystemDocumentStore {
    root: PathBuf,
}

impl FilesystemDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `bucket/path` under the root, rejecting anything that could
    /// escape it.
    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let mut full = self.root.join(safe_relative(bucket)?);
        if !path.is_empty() {
            full.push(safe_relative(path)?);
        }
        Ok(full)
    }
}

fn safe_relative(part: &str) -> Result<&Path> {
    let p = Path::new(part);
    if part.is_empty() || !p.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(Error::InvalidInput(format!("Invalid storage path: {}", part)));
    }
    Ok(p)
}

/// Walk `base` recursively, pushing `/`-joined names relative to it.
async fn walk(base: &Path, out: &mut Vec<String>) -> Result<()> {
    let mut pending = vec![base.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else if let Ok(rel) = path.strip_prefix(base) {
                let name = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(name);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for FilesystemDocumentStore {
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Document> {
        let full = self.resolve(bucket, path)?;
        let data = match fs::read(&full).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("gs://{}/{}", bucket, path)));
            }
            Err(e) => return Err(Error::Storage(format!("{}: {}", full.display(), e))),
        };
        let content_type = detect_content_type(path, &data);
        debug!(
            subsystem = "store",
            component = "filesystem",
            op = "fetch",
            bucket,
            archivo = path,
            document_bytes = data.len(),
            "Read document"
        );
        Ok(Document::new(data, content_type))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let base = self.resolve(bucket, "")?;
        if !fs::try_exists(&base).await? {
            return Err(Error::NotFound(format!("gs://{}", bucket)));
        }
        let mut names = Vec::new();
        walk(&base, &mut names).await?;
        names.retain(|n| n.starts_with(prefix));
        names.sort();
        Ok(names)
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}
