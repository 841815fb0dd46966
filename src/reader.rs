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

//! # Yun Reader Module
//!
//! Batch readers produce the record stream the exporter consumes. The
//! contract distinguishes clean exhaustion (`Ok(None)`) from a mid-stream
//! failure (`Err`); the manager pulls batches until one or the other.

use std::collections::VecDeque;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::{Result, YunError};
use crate::record::{YunRecord, YunRecordBatch};
use crate::store::YunBlobStore;

/// Contract for record sources feeding the export pipeline.
pub trait YunBatchReader: Send + fmt::Debug {
    /// Returns the next batch, or `Ok(None)` once the source is exhausted.
    fn next_batch(&mut self) -> Result<Option<YunRecordBatch>>;
}

/// In-memory reader over pre-built batches. Used by tests and embedders
/// that already hold their records.
#[derive(Debug, Default)]
pub struct YunVecReader {
    batches: VecDeque<YunRecordBatch>,
}

impl YunVecReader {
    pub fn new(batches: Vec<YunRecordBatch>) -> Self {
        Self {
            batches: batches.into(),
        }
    }
}

impl YunBatchReader for YunVecReader {
    fn next_batch(&mut self) -> Result<Option<YunRecordBatch>> {
        Ok(self.batches.pop_front())
    }
}

/// Reads JSONL objects (optionally gzip- or zstd-compressed, by extension)
/// under a blob-store prefix. Each stored object becomes one batch, in
/// listing order.
pub struct YunStoreReader {
    store: Arc<dyn YunBlobStore>,
    bucket: String,
    prefix: String,
    keys: Option<VecDeque<String>>,
}

impl YunStoreReader {
    pub fn new(store: Arc<dyn YunBlobStore>, bucket: String, prefix: String) -> Self {
        Self {
            store,
            bucket,
            prefix,
            keys: None,
        }
    }

    fn decode(key: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
        if key.ends_with(".gz") {
            let mut raw = Vec::new();
            flate2::read::GzDecoder::new(&bytes[..])
                .read_to_end(&mut raw)
                .map_err(|e| {
                    YunError::pipeline("reader.store", format!("gunzip '{key}': {e}"))
                })?;
            Ok(raw)
        } else if key.ends_with(".zst") {
            zstd::decode_all(&bytes[..]).map_err(|e| {
                YunError::pipeline("reader.store", format!("unzstd '{key}': {e}"))
            })
        } else {
            Ok(bytes)
        }
    }

    fn parse_batch(key: &str, raw: &[u8]) -> Result<YunRecordBatch> {
        let text = std::str::from_utf8(raw).map_err(|e| {
            YunError::pipeline("reader.store", format!("'{key}' is not UTF-8: {e}"))
        })?;

        let mut batch = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line).map_err(|e| {
                YunError::pipeline(
                    "reader.store",
                    format!("invalid JSON at '{key}' line {idx}: {e}"),
                )
            })?;
            let record = YunRecord::from_value(value).ok_or_else(|| {
                YunError::pipeline(
                    "reader.store",
                    format!("record at '{key}' line {idx} is not an object"),
                )
            })?;
            batch.push(record);
        }
        Ok(batch)
    }
}

// The store handle is a trait object, so Debug is written out by hand.
impl fmt::Debug for YunStoreReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YunStoreReader")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("listed", &self.keys.is_some())
            .finish()
    }
}

impl YunBatchReader for YunStoreReader {
    fn next_batch(&mut self) -> Result<Option<YunRecordBatch>> {
        if self.keys.is_none() {
            let listed = self.store.list(&self.bucket, &self.prefix)?;
            log::debug!(
                "reader.store found {} objects under '{}/{}'",
                listed.len(),
                self.bucket,
                self.prefix
            );
            self.keys = Some(listed.into_iter().map(|info| info.key).collect());
        }

        let key = match self.keys.as_mut().and_then(VecDeque::pop_front) {
            Some(key) => key,
            None => return Ok(None),
        };

        let bytes = self.store.get_object(&self.bucket, &key)?;
        let raw = Self::decode(&key, bytes)?;
        Ok(Some(Self::parse_batch(&key, &raw)?))
    }
}
