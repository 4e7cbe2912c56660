//! Blob store kept entirely in process memory.
//!
//! Useful for dry runs and tests. Individual operations can be made to fail
//! for keys containing a given fragment.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage::BlobStore;

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlobOp {
    Get,
    Put,
    Delete,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug)]
pub struct MemoryBlobStore {
    bucket: String,
    bucket_exists: bool,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    faults: Mutex<BTreeSet<(BlobOp, String)>>,
}

impl MemoryBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            bucket_exists: true,
            objects: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(BTreeSet::new()),
        }
    }

    /// A store whose bucket does not exist.
    pub fn without_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket_exists: false,
            ..Self::new(bucket)
        }
    }

    /// Make `op` fail for every key containing `fragment`.
    pub fn fail_on(&self, op: BlobOp, fragment: impl Into<String>) {
        lock(&self.faults).insert((op, fragment.into()));
    }

    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        lock(&self.objects).get(key).cloned()
    }

    fn check(&self, op: BlobOp, key: &str) -> Result<(), StorageError> {
        let failing = lock(&self.faults)
            .iter()
            .any(|(fault_op, fragment)| *fault_op == op && key.contains(fragment.as_str()));
        if failing {
            return Err(StorageError::Service {
                operation: op.name(),
                bucket: self.bucket.clone(),
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl BlobOp {
    fn name(self) -> &'static str {
        match self {
            BlobOp::Get => "GetObject",
            BlobOp::Put => "PutObject",
            BlobOp::Delete => "DeleteObject",
            BlobOp::List => "ListObjectsV2",
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> Result<bool, StorageError> {
        Ok(self.bucket_exists)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.check(BlobOp::Get, key)?;
        lock(&self.objects)
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.check(BlobOp::Put, key)?;
        lock(&self.objects).insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check(BlobOp::Delete, key)?;
        lock(&self.objects).remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.check(BlobOp::List, prefix)?;
        Ok(lock(&self.objects)
            .range(prefix.to_string()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.check(BlobOp::Get, key)?;
        Ok(lock(&self.objects).contains_key(key))
    }
}
