//! In-memory document store for tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use sismica_core::{Document, DocumentStore, Error, Result};

use super::detect_content_type;

/// Objects keyed by `(bucket, path)`. Listing order is lexicographic, like GCS.
#[derive(Default)]
pub struct MemoryDocumentStore {
    objects: RwLock<BTreeMap<(String, String), Document>>,
    fail_with: RwLock<Option<String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, inferring its content type from the name and bytes.
    pub fn insert(&self, bucket: &str, path: &str, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let content_type = detect_content_type(path, &data);
        self.insert_document(bucket, path, Document::new(data, content_type));
    }

    pub fn insert_document(&self, bucket: &str, path: &str, document: Document) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert((bucket.to_string(), path.to_string()), document);
        }
    }

    /// Make every subsequent call fail with a storage error.
    pub fn fail_with(&self, message: &str) {
        if let Ok(mut fail) = self.fail_with.write() {
            *fail = Some(message.to_string());
        }
    }

    fn check_failure(&self) -> Result<()> {
        match self.fail_with.read().ok().and_then(|f| f.clone()) {
            Some(msg) => Err(Error::Storage(msg)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Document> {
        self.check_failure()?;
        let objects = self
            .objects
            .read()
            .map_err(|_| Error::Internal("document store lock poisoned".into()))?;
        objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("gs://{}/{}", bucket, path)))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        self.check_failure()?;
        let objects = self
            .objects
            .read()
            .map_err(|_| Error::Internal("document store lock poisoned".into()))?;
        Ok(objects
            .keys()
            .filter(|(b, p)| b == bucket && p.starts_with(prefix))
            .map(|(_, p)| p.clone())
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_lists_by_bucket_and_prefix() {
        let store = MemoryDocumentStore::new();
        store.insert("b", "dir/z.pdf", b"1".to_vec());
        store.insert("b", "dir/a.png", b"2".to_vec());
        store.insert("b", "other/c.pdf", b"3".to_vec());
        store.insert("c", "dir/d.pdf", b"4".to_vec());

        assert_eq!(store.list("b", "dir/").await.unwrap(), vec!["dir/a.png", "dir/z.pdf"]);
        let doc = store.fetch("b", "dir/a.png").await.unwrap();
        assert_eq!(doc.content_type, "image/png");
        assert!(store.fetch("b", "nope").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = MemoryDocumentStore::new();
        store.insert("b", "a.pdf", b"1".to_vec());
        store.fail_with("bucket unreachable");
        let err = store.fetch("b", "a.pdf").await.unwrap_err();
        assert_eq!(err.to_string(), "Storage error: bucket unreachable");
    }
}
