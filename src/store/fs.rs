//! Filesystem storage backend.
//!
//! [`FsBackend`] keeps one JSON envelope per document at
//! `{root}/{collection}/{encoded_doc_id}.json`:
//!
//! ```json
//! { "version": 3, "data": "{\"userId\":\"u1\", ...}" }
//! ```
//!
//! Document ids are percent-encoded so arbitrary ids cannot escape the
//! collection directory. A file that cannot be read or parsed is listed
//! with empty data so the document layer quarantines it. Writes go to a temporary file and are renamed into
//! place. A process-wide write lock serializes mutations so
//! `put_if_version` is a real compare-and-swap for a single process.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::store::backend::{parse_key, StorageBackend, StorageError, VersionedRecord};

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u64,
    data: String,
}

/// Directory-backed [`StorageBackend`].
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsBackend {
    /// Creates a backend rooted at `root`. The directory is created on first
    /// write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let (collection, doc_id) = parse_key(key).ok_or_else(|| StorageError::Backend {
            message: format!("key without collection: {key}"),
            source: None,
        })?;
        if collection.is_empty() || doc_id.is_empty() {
            return Err(StorageError::Backend {
                message: format!("incomplete key: {key}"),
                source: None,
            });
        }
        Ok(self
            .root
            .join(encode_component(collection))
            .join(format!("{}.json", encode_component(doc_id))))
    }

    async fn read_envelope(&self, key: &str) -> Result<Option<Envelope>, StorageError> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::backend(format!("read {}", path.display()), e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::backend(format!("corrupt envelope {}", path.display()), e))
    }

    async fn write_envelope(&self, key: &str, data: &[u8], version: u64) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let data = String::from_utf8(data.to_vec())
            .map_err(|e| StorageError::backend(format!("non-UTF-8 document for {key}"), e))?;
        let bytes = serde_json::to_vec(&Envelope { version, data })
            .map_err(|e| StorageError::backend("encode envelope", e))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::backend(format!("create {}", parent.display()), e))?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StorageError::backend(format!("write {}", tmp.display()), e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::backend(format!("rename into {}", path.display()), e))
    }
}

#[async_trait]
impl StorageBackend for FsBackend {
    async fn get(&self, key: &str) -> Result<VersionedRecord, StorageError> {
        let envelope = self
            .read_envelope(key)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })?;
        Ok(VersionedRecord {
            data: envelope.data.into_bytes(),
            version: envelope.version,
        })
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<u64, StorageError> {
        let _guard = self.write_lock.lock().await;
        let version = self
            .read_envelope(key)
            .await?
            .map_or(1, |envelope| envelope.version + 1);
        self.write_envelope(key, data, version).await?;
        Ok(version)
    }

    async fn put_if_version(
        &self,
        key: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StorageError> {
        let _guard = self.write_lock.lock().await;
        let current = self
            .read_envelope(key)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })?;
        if current.version != expected_version {
            return Err(StorageError::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                actual: current.version,
            });
        }
        let version = current.version + 1;
        self.write_envelope(key, data, version).await?;
        Ok(version)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::backend(format!("remove {}", path.display()), e)),
        }
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, VersionedRecord)>, StorageError> {
        let mut results = Vec::new();
        let mut collections = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(results),
            Err(e) => {
                return Err(StorageError::backend(
                    format!("list {}", self.root.display()),
                    e,
                ))
            },
        };

        while let Some(collection_dir) = collections
            .next_entry()
            .await
            .map_err(|e| StorageError::backend("list collections", e))?
        {
            let Some(collection) = decode_component(&collection_dir.file_name().to_string_lossy())
            else {
                continue;
            };
            if !collection_dir.path().is_dir() {
                continue;
            }
            let mut docs = tokio::fs::read_dir(collection_dir.path())
                .await
                .map_err(|e| StorageError::backend(format!("list {collection}"), e))?;
            while let Some(doc) = docs
                .next_entry()
                .await
                .map_err(|e| StorageError::backend(format!("list {collection}"), e))?
            {
                let file_name = doc.file_name().to_string_lossy().into_owned();
                let Some(encoded_id) = file_name.strip_suffix(".json") else {
                    continue;
                };
                let Some(doc_id) = decode_component(encoded_id) else {
                    continue;
                };
                let key = format!("{collection}/{doc_id}");
                if !key.starts_with(prefix) {
                    continue;
                }
                match self.read_envelope(&key).await {
                    Ok(Some(envelope)) => results.push((
                        key,
                        VersionedRecord {
                            data: envelope.data.into_bytes(),
                            version: envelope.version,
                        },
                    )),
                    Ok(None) => {},
                    // An empty record fails decoding upstream and is quarantined
                    // there, so one bad file cannot block the whole listing.
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "unreadable document file");
                        results.push((
                            key,
                            VersionedRecord {
                                data: Vec::new(),
                                version: 0,
                            },
                        ));
                    },
                }
            }
        }

        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }
}

/// Percent-encodes a path component. `urlencoding` leaves `.` and `~`
/// alone; both are escaped here so `.` and `..` never name a directory.
fn encode_component(raw: &str) -> String {
    urlencoding::encode(raw)
        .replace('.', "%2E")
        .replace('~', "%7E")
}

fn decode_component(encoded: &str) -> Option<String> {
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_encoding_escapes_path_characters() {
        assert_eq!(encode_component("../etc"), "%2E%2E%2Fetc");
        assert_eq!(decode_component("%2E%2E%2Fetc").as_deref(), Some("../etc"));
        assert_eq!(decode_component("plain-id_1").as_deref(), Some("plain-id_1"));
        assert_eq!(encode_component("a.b~c d"), "a%2Eb%7Ec%20d");
        assert_eq!(decode_component("a%2Eb%7Ec%20d").as_deref(), Some("a.b~c d"));
        assert_eq!(encode_component(".."), "%2E%2E");
        // Escapes that decode to invalid UTF-8 are not ids we wrote.
        assert_eq!(decode_component("%FF"), None);
    }

    #[tokio::test]
    async fn put_get_and_versioning() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        assert_eq!(backend.put("tasks/a", b"{\"x\":1}").await.unwrap(), 1);
        assert_eq!(backend.put("tasks/a", b"{\"x\":2}").await.unwrap(), 2);
        let record = backend.get("tasks/a").await.unwrap();
        assert_eq!(record.data, b"{\"x\":2}");
        assert_eq!(record.version, 2);
    }

    #[tokio::test]
    async fn put_if_version_detects_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        backend.put("tasks/a", b"1").await.unwrap();
        assert_eq!(backend.put_if_version("tasks/a", b"2", 1).await.unwrap(), 2);
        let err = backend.put_if_version("tasks/a", b"3", 1).await.unwrap_err();
        assert!(matches!(err, StorageError::VersionConflict { actual: 2, .. }));
    }

    #[tokio::test]
    async fn missing_root_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path().join("absent"));
        assert!(backend.list_by_prefix("tasks/").await.unwrap().is_empty());
        assert!(matches!(
            backend.get("tasks/a").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_by_prefix_round_trips_odd_ids() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        backend.put("tasks/with space", b"1").await.unwrap();
        backend.put("tasks/plain", b"2").await.unwrap();
        backend.put("fcmTokens/u1", b"3").await.unwrap();

        let keys: Vec<String> = backend
            .list_by_prefix("tasks/")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["tasks/plain".to_string(), "tasks/with space".to_string()]);
    }

    #[tokio::test]
    async fn corrupt_file_is_listed_with_empty_data() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        backend.put("tasks/good", b"{}").await.unwrap();
        std::fs::write(dir.path().join("tasks").join("bad.json"), "garbage").unwrap();

        let listed = backend.list_by_prefix("tasks/").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0, "tasks/bad");
        assert!(listed[0].1.data.is_empty());
        assert_eq!(listed[1].1.data, b"{}");
        assert!(backend.get("tasks/bad").await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        backend.put("tasks/a", b"1").await.unwrap();
        assert!(backend.delete("tasks/a").await.unwrap());
        assert!(!backend.delete("tasks/a").await.unwrap());
    }

    #[tokio::test]
    async fn rejects_keys_without_collection() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FsBackend::new(dir.path());
        assert!(backend.put("nocollection", b"1").await.is_err());
    }
}
