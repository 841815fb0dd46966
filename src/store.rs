//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Yun.
//! The Yun project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Blob Store Module
//!
//! This module defines the narrow interface the export pipeline consumes
//! from a blob store, plus two bundled implementations: an in-memory store
//! for tests and a directory-backed store for local runs.
//!
//! The real cloud SDK (authentication, low-level PUT/LIST, region lookup)
//! lives behind this trait and is intentionally out of scope. Puts are
//! assumed atomic: either the full object lands or none of it does.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::errors::{Result, YunError};

/// Descriptor for one stored object, as returned by a prefix listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YunObjectInfo {
    pub key: String,
    pub size: u64,
}

/// Narrow blob-store contract consumed by readers, writers, and bypass
/// strategies. Implementations must be safe to share across threads; the
/// pipeline itself drives them from a single logical pass.
pub trait YunBlobStore: Send + Sync {
    /// Stores an object, replacing any previous content at the key.
    fn put_object(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()>;

    /// Fetches the full content of an object.
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Returns the region the bucket actually lives in.
    fn get_bucket_location(&self, bucket: &str) -> Result<String>;

    /// Lists objects under a key prefix, in lexicographic key order.
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<YunObjectInfo>>;
}

/// In-memory blob store used by the test suite and small dry runs.
///
/// Buckets must be created explicitly; operations against an unknown bucket
/// fail the same way a missing cloud bucket would.
#[derive(Debug, Default)]
pub struct YunMemoryStore {
    buckets: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    regions: Mutex<HashMap<String, String>>,
}

impl YunMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bucket in the given region.
    pub fn create_bucket(&self, name: &str, region: &str) {
        self.buckets
            .lock()
            .expect("bucket map poisoned")
            .insert(name.to_string(), BTreeMap::new());
        self.regions
            .lock()
            .expect("region map poisoned")
            .insert(name.to_string(), region.to_string());
    }

    fn with_bucket<T>(
        &self,
        bucket: &str,
        f: impl FnOnce(&mut BTreeMap<String, Vec<u8>>) -> Result<T>,
    ) -> Result<T> {
        let mut buckets = self.buckets.lock().expect("bucket map poisoned");
        match buckets.get_mut(bucket) {
            Some(objects) => f(objects),
            None => Err(YunError::store(format!("no such bucket '{bucket}'"))),
        }
    }
}

impl YunBlobStore for YunMemoryStore {
    fn put_object(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()> {
        self.with_bucket(bucket, |objects| {
            objects.insert(key.to_string(), bytes.to_vec());
            Ok(())
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.with_bucket(bucket, |objects| {
            objects
                .get(key)
                .cloned()
                .ok_or_else(|| YunError::store(format!("no such key '{key}' in '{bucket}'")))
        })
    }

    fn get_bucket_location(&self, bucket: &str) -> Result<String> {
        self.regions
            .lock()
            .expect("region map poisoned")
            .get(bucket)
            .cloned()
            .ok_or_else(|| YunError::store(format!("no such bucket '{bucket}'")))
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<YunObjectInfo>> {
        self.with_bucket(bucket, |objects| {
            Ok(objects
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, bytes)| YunObjectInfo {
                    key: key.clone(),
                    size: bytes.len() as u64,
                })
                .collect())
        })
    }
}

/// Directory-backed blob store: each bucket is a subdirectory of the root,
/// each key a relative file path. Puts write to a temp file then rename, so
/// readers never observe a partial object.
#[derive(Debug)]
pub struct YunFsStore {
    root: PathBuf,
}

impl YunFsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the bucket directory if it does not exist yet.
    pub fn create_bucket(&self, name: &str) -> Result<()> {
        fs::create_dir_all(self.root.join(name))?;
        Ok(())
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        let dir = self.root.join(bucket);
        if !dir.is_dir() {
            return Err(YunError::store(format!("no such bucket '{bucket}'")));
        }
        Ok(dir)
    }

    fn collect_keys(dir: &Path, base: &Path, out: &mut Vec<YunObjectInfo>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect_keys(&path, base, out)?;
            } else {
                let key = path
                    .strip_prefix(base)
                    .map_err(|e| YunError::internal(e.to_string()))?
                    .to_string_lossy()
                    .replace(std::path::MAIN_SEPARATOR, "/");
                let size = entry.metadata()?.len();
                out.push(YunObjectInfo { key, size });
            }
        }
        Ok(())
    }
}

impl YunBlobStore for YunFsStore {
    fn put_object(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.bucket_dir(bucket)?;
        let path = dir.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("object");
        let temp = path.with_file_name(format!(".{file_name}.tmp"));
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(bytes)?;
            file.flush()?;
        }
        fs::rename(&temp, &path)?;
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let dir = self.bucket_dir(bucket)?;
        fs::read(dir.join(key))
            .map_err(|e| YunError::store(format!("no such key '{key}' in '{bucket}': {e}")))
    }

    fn get_bucket_location(&self, bucket: &str) -> Result<String> {
        self.bucket_dir(bucket)?;
        Ok("local".to_string())
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<YunObjectInfo>> {
        let dir = self.bucket_dir(bucket)?;
        let mut all = Vec::new();
        Self::collect_keys(&dir, &dir, &mut all)?;
        all.retain(|info| info.key.starts_with(prefix));
        all.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(all)
    }
}
