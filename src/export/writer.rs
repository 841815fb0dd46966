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

//! # Batch Writer Module
//!
//! This module provides the destination side of the export pipeline:
//! buffering records per group, compressing each flushed batch as a single
//! stream, uploading it under a run-scoped collision-free name, and
//! maintaining the optional pointer manifest.
//!
//! ## Semantics
//!
//! - One uploaded object per flushed group buffer; a batch is never split
//!   across objects.
//! - Object keys are `{filebase}{group path}{name}-{run id}-{seq}.jsonl`
//!   plus the compression extension; `seq` increments per uploaded object
//!   and the run id is unique per writer, so two flushes within one run
//!   never overwrite each other.
//! - A failed upload surfaces as a `Write` error carrying the destination
//!   key and leaves the buffered records in place for caller retry; a
//!   batch is never silently dropped.
//! - Pointer-manifest writes overwrite the pointer object with the current
//!   path prefix after every flush that uploaded at least one object; a
//!   flush with nothing to upload leaves the pointer untouched. They are
//!   best-effort: a pointer failure is logged and counted, never raised.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, YunError};
use crate::record::{YunRecord, YunRecordBatch};
use crate::store::YunBlobStore;

/// Compression applied to each flushed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YunCompression {
    None,
    Gzip,
    Zstd,
}

impl YunCompression {
    /// File extension appended to object names.
    pub fn extension(self) -> &'static str {
        match self {
            YunCompression::None => "",
            YunCompression::Gzip => ".gz",
            YunCompression::Zstd => ".zst",
        }
    }
}

impl Default for YunCompression {
    fn default() -> Self {
        YunCompression::Gzip
    }
}

/// Destination addressing and behavior options for the batch writer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct YunWriterOptions {
    /// Exporter identity embedded in object names.
    pub name: String,
    /// Destination bucket/container.
    pub bucket: String,
    /// Key prefix every uploaded object lands under.
    pub filebase: String,
    /// Explicit region override; always wins over the store lookup.
    pub aws_region: Option<String>,
    /// Optional pointer-manifest path.
    pub save_pointer: Option<String>,
    /// Object compression, gzip by default.
    pub compression: YunCompression,
}

impl YunWriterOptions {
    /// Parses writer options from a stage options mapping, validating the
    /// required fields.
    pub fn from_spec(exporter_name: &str, options: &Value) -> Result<Self> {
        let obj = options.as_object().ok_or_else(|| {
            YunError::config_parse("writer.store options must be an object")
        })?;

        let bucket = obj
            .get("bucket")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                YunError::config_parse("writer.store requires string 'bucket'")
            })?
            .to_string();

        let filebase = obj
            .get("filebase")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                YunError::config_parse("writer.store requires string 'filebase'")
            })?
            .to_string();

        let aws_region = obj
            .get("aws_region")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        let save_pointer = obj
            .get("save_pointer")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        let compression = match obj.get("compression") {
            Some(value) => serde_json::from_value(value.clone()).map_err(|_| {
                YunError::config_parse(
                    "writer.store 'compression' must be one of none, gzip, zstd",
                )
            })?,
            None => YunCompression::default(),
        };

        Ok(Self {
            name: exporter_name.to_string(),
            bucket,
            filebase,
            aws_region,
            save_pointer,
            compression,
        })
    }
}

/// Statistics about write operations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct YunWriteStats {
    /// Total number of records uploaded.
    pub records_written: usize,
    /// Number of objects uploaded.
    pub objects_written: usize,
    /// Total compressed bytes uploaded.
    pub bytes_written: usize,
    /// Pointer-manifest writes that failed and were downgraded to warnings.
    pub pointer_errors: usize,
}

/// Buffers record batches per group, compresses each flushed buffer as a
/// single stream, and uploads it to the configured destination address.
///
/// Owned exclusively by one exporter run: the internal buffer, the sequence
/// counter, and the region cache are all writer-instance-scoped.
pub struct YunBatchWriter {
    options: YunWriterOptions,
    store: Arc<dyn YunBlobStore>,
    /// Resolved at construction, cached for the run.
    region: String,
    run_id: String,
    seq: usize,
    buffers: BTreeMap<String, YunRecordBatch>,
    stats: YunWriteStats,
    closed: bool,
}

impl YunBatchWriter {
    /// Creates a writer, resolving the destination region. An explicit
    /// `aws_region` option always takes precedence; otherwise the bucket's
    /// actual location is queried once through the store and cached.
    pub fn new(options: YunWriterOptions, store: Arc<dyn YunBlobStore>) -> Result<Self> {
        let region = match &options.aws_region {
            Some(region) => region.clone(),
            None => store.get_bucket_location(&options.bucket).map_err(|e| {
                YunError::write(
                    &options.bucket,
                    format!("region lookup failed: {e}"),
                )
            })?,
        };
        log::info!(
            "writer.store targeting bucket '{}' in region '{}'",
            options.bucket,
            region
        );

        let now = Utc::now();
        let tag = blake3::hash(
            format!("{}-{}", options.name, now.timestamp_nanos_opt().unwrap_or(0))
                .as_bytes(),
        );
        let hex = tag.to_hex();
        let run_id = format!("{}-{}", now.format("%Y%m%d%H%M%S"), &hex.as_str()[..8]);

        Ok(Self {
            options,
            store,
            region,
            run_id,
            seq: 0,
            buffers: BTreeMap::new(),
            stats: YunWriteStats::default(),
            closed: false,
        })
    }

    /// The region this writer resolved for its destination bucket.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Cumulative statistics for this writer instance.
    pub fn stats(&self) -> &YunWriteStats {
        &self.stats
    }

    /// Buffers a batch, keyed by group membership. Input order is preserved
    /// within each group.
    pub fn write_batch(&mut self, batch: YunRecordBatch) -> Result<()> {
        if self.closed {
            return Err(YunError::internal("write_batch called on closed writer"));
        }
        for record in batch {
            let group = Self::group_path(&record.group_membership);
            self.buffers.entry(group).or_default().push(record);
        }
        Ok(())
    }

    /// Finalizes every non-empty buffer into one compressed object each and
    /// uploads them, returning only after all uploads are acknowledged.
    /// On upload failure the affected buffer is retained so the caller can
    /// retry the flush or fail the run.
    pub fn flush(&mut self) -> Result<()> {
        let groups: Vec<String> = self.buffers.keys().cloned().collect();
        let mut uploaded = 0;
        for group in groups {
            let records = match self.buffers.get(&group) {
                Some(records) if !records.is_empty() => records,
                _ => continue,
            };
            let bytes = Self::encode(self.options.compression, records)?;
            let key = self.next_object_key(&group);
            let record_count = records.len();

            self.store
                .put_object(&self.options.bucket, &key, &bytes)
                .map_err(|e| YunError::write(&key, e.to_string()))?;
            log::info!(
                "uploaded {} records ({} bytes) to '{}'",
                record_count,
                bytes.len(),
                key
            );

            self.buffers.remove(&group);
            self.seq += 1;
            uploaded += 1;
            self.stats.records_written += record_count;
            self.stats.objects_written += 1;
            self.stats.bytes_written += bytes.len();
        }

        // The pointer only moves once an upload has actually succeeded; a
        // flush with nothing buffered must not touch it.
        if uploaded > 0 {
            self.write_pointer();
        }
        Ok(())
    }

    /// Final flush plus resource release. Idempotent; the manager invokes
    /// this on every exit path, including cancellation and errors.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.flush();
        self.closed = true;
        result
    }

    /// Maps a membership tuple onto a key sub-path, one segment per value.
    fn group_path(membership: &[Value]) -> String {
        let mut path = String::new();
        for value in membership {
            let segment = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            path.push_str(&segment);
            path.push('/');
        }
        path
    }

    /// Deterministic, collision-avoiding object key within the run.
    fn next_object_key(&self, group: &str) -> String {
        format!(
            "{}{}{}-{}-{:04}.jsonl{}",
            self.options.filebase,
            group,
            self.options.name,
            self.run_id,
            self.seq,
            self.options.compression.extension()
        )
    }

    /// Serializes record payloads as JSONL and compresses the whole stream
    /// as one object, allowing a one-shot upload of the final bytes.
    fn encode(compression: YunCompression, records: &[YunRecord]) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        for record in records {
            serde_json::to_writer(&mut raw, &record.payload)?;
            raw.push(b'\n');
        }

        match compression {
            YunCompression::None => Ok(raw),
            YunCompression::Gzip => {
                let mut encoder = flate2::write::GzEncoder::new(
                    Vec::new(),
                    flate2::Compression::default(),
                );
                encoder.write_all(&raw)?;
                Ok(encoder.finish()?)
            }
            YunCompression::Zstd => zstd::encode_all(&raw[..], 0)
                .map_err(|e| YunError::internal(format!("zstd encoder error: {e}"))),
        }
    }

    /// Overwrites the pointer object with the current path prefix. Pointer
    /// writes happen only after a flush whose uploads succeeded, in flush
    /// order, and never fail the batch: failures are logged and counted.
    fn write_pointer(&mut self) {
        let pointer = match &self.options.save_pointer {
            Some(pointer) => pointer.clone(),
            None => return,
        };
        if let Err(err) = self.store.put_object(
            &self.options.bucket,
            &pointer,
            self.options.filebase.as_bytes(),
        ) {
            let downgraded = YunError::pointer_write(&pointer, err.to_string());
            log::warn!("{downgraded}");
            self.stats.pointer_errors += 1;
        }
    }
}

// The store handle is a trait object, so Debug is written out by hand.
impl fmt::Debug for YunBatchWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YunBatchWriter")
            .field("options", &self.options)
            .field("region", &self.region)
            .field("run_id", &self.run_id)
            .field("seq", &self.seq)
            .field("buffered_groups", &self.buffers.len())
            .field("closed", &self.closed)
            .finish()
    }
}
