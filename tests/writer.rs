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

//! # Yun Writer Tests
//!
//! This module contains tests for the batch writer: buffering, compression,
//! object naming, region resolution, and the pointer manifest.
//!
//! ## Test Categories
//!
//! - **Upload Tests**: Verify the one-batch-one-object mapping and content
//! - **Pointer Tests**: Verify manifest overwrite and the failure downgrade
//! - **Region Tests**: Verify lookup-once semantics and the explicit override
//! - **Failure Tests**: Verify that a failed upload retains the batch
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test writer
//! ```

use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use yunx::{
    Result, YunBatchWriter, YunBlobStore, YunCompression, YunError, YunMemoryStore,
    YunObjectInfo, YunRecord, YunWriterOptions,
};

fn record(value: Value) -> YunRecord {
    YunRecord::from_value(value).expect("test payload must be an object")
}

fn options(bucket: &str, filebase: &str) -> YunWriterOptions {
    YunWriterOptions {
        name: "tests-writer".to_string(),
        bucket: bucket.to_string(),
        filebase: filebase.to_string(),
        aws_region: None,
        save_pointer: None,
        compression: YunCompression::Gzip,
    }
}

fn gunzip(bytes: &[u8]) -> String {
    let mut raw = String::new();
    flate2::read::GzDecoder::new(bytes)
        .read_to_string(&mut raw)
        .expect("object must be valid gzip");
    raw
}

/// Tests that one flushed batch becomes exactly one compressed object.
///
/// Two ungrouped records share the single default group, so a flush uploads
/// a single gzip object under the filebase whose lines round-trip back to
/// the original payloads.
#[test]
fn one_batch_becomes_one_gzip_object() {
    let store = Arc::new(YunMemoryStore::new());
    store.create_bucket("datasets", "us-east-1");

    let mut writer =
        YunBatchWriter::new(options("datasets", "tests/"), Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    writer
        .write_batch(vec![
            record(json!({"name": "Roberto", "birthday": "12/05/1987"})),
            record(json!({"name": "Claudia", "birthday": "21/12/1985"})),
        ])
        .unwrap();
    writer.close().unwrap();

    let listed = store.list("datasets", "tests/").unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].key.ends_with(".jsonl.gz"));

    let content = gunzip(&store.get_object("datasets", &listed[0].key).unwrap());
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        serde_json::from_str::<Value>(lines[0]).unwrap(),
        json!({"name": "Roberto", "birthday": "12/05/1987"})
    );
    assert_eq!(
        serde_json::from_str::<Value>(lines[1]).unwrap(),
        json!({"name": "Claudia", "birthday": "21/12/1985"})
    );

    let stats = writer.stats();
    assert_eq!(stats.records_written, 2);
    assert_eq!(stats.objects_written, 1);
    assert_eq!(stats.pointer_errors, 0);
}

/// Tests that the pointer manifest holds exactly the current filebase.
#[test]
fn pointer_manifest_contains_filebase() {
    let store = Arc::new(YunMemoryStore::new());
    store.create_bucket("datasets", "us-east-1");

    let mut opts = options("datasets", "tests/");
    opts.save_pointer = Some("pointer/LAST".to_string());
    let mut writer = YunBatchWriter::new(opts, Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    writer
        .write_batch(vec![record(json!({"name": "Roberto"}))])
        .unwrap();
    writer.close().unwrap();

    let pointer = store.get_object("datasets", "pointer/LAST").unwrap();
    assert_eq!(pointer, b"tests/");
}

/// Tests that a writer that never uploads anything leaves the pointer
/// manifest untouched: closing after zero batches must not move it.
#[test]
fn close_without_uploads_leaves_pointer_untouched() {
    let store = Arc::new(YunMemoryStore::new());
    store.create_bucket("datasets", "us-east-1");

    let mut opts = options("datasets", "tests/");
    opts.save_pointer = Some("pointer/LAST".to_string());
    let mut writer = YunBatchWriter::new(opts, Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    writer.flush().unwrap();
    writer.close().unwrap();

    assert!(store.get_object("datasets", "pointer/LAST").is_err());
    assert_eq!(writer.stats().objects_written, 0);
}

/// Tests that the pointer is not rewritten by the empty final flush that
/// `close` performs after a successful run.
#[test]
fn pointer_reflects_last_successful_flush_only() {
    let store = Arc::new(YunMemoryStore::new());
    store.create_bucket("datasets", "us-east-1");

    let mut opts = options("datasets", "tests/");
    opts.save_pointer = Some("pointer/LAST".to_string());
    let mut writer = YunBatchWriter::new(opts, Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    writer
        .write_batch(vec![record(json!({"name": "Roberto"}))])
        .unwrap();
    writer.flush().unwrap();

    store
        .put_object("datasets", "pointer/LAST", b"elsewhere/")
        .unwrap();
    writer.close().unwrap();

    // The empty close-time flush uploaded nothing, so the pointer keeps
    // whatever was written after the last real flush.
    assert_eq!(
        store.get_object("datasets", "pointer/LAST").unwrap(),
        b"elsewhere/"
    );
}

/// Tests that the destination region comes from the bucket location when no
/// explicit region is configured, and from the configuration when one is.
#[test]
fn region_resolution_prefers_explicit_override() {
    let store = Arc::new(YunMemoryStore::new());
    store.create_bucket("datasets", "eu-west-1");

    let writer =
        YunBatchWriter::new(options("datasets", "tests/"), Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    assert_eq!(writer.region(), "eu-west-1");

    let mut opts = options("datasets", "tests/");
    opts.aws_region = Some("ap-south-1".to_string());
    let writer = YunBatchWriter::new(opts, Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    assert_eq!(writer.region(), "ap-south-1");
}

/// Tests that a failed region lookup fails writer construction.
#[test]
fn region_lookup_failure_fails_construction() {
    let store = Arc::new(YunMemoryStore::new());
    let err = YunBatchWriter::new(options("missing", "tests/"), store).unwrap_err();
    assert!(matches!(err, YunError::Write { .. }));
}

/// Tests that repeated flushes within a run never overwrite each other.
#[test]
fn repeated_flushes_produce_distinct_objects() {
    let store = Arc::new(YunMemoryStore::new());
    store.create_bucket("datasets", "us-east-1");

    let mut writer =
        YunBatchWriter::new(options("datasets", "tests/"), Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    for n in 0..5 {
        writer.write_batch(vec![record(json!({"n": n}))]).unwrap();
        writer.flush().unwrap();
    }
    writer.close().unwrap();

    let listed = store.list("datasets", "tests/").unwrap();
    assert_eq!(listed.len(), 5);
    assert_eq!(writer.stats().objects_written, 5);
}

/// Tests that grouped batches are partitioned into one object per group,
/// each under its membership sub-path.
#[test]
fn groups_flush_to_separate_objects() {
    let store = Arc::new(YunMemoryStore::new());
    store.create_bucket("datasets", "us-east-1");

    let mut es = record(json!({"name": "Roberto", "country": "es"}));
    es.group_membership = vec![json!("es")];
    let mut us = record(json!({"name": "Claudia", "country": "us"}));
    us.group_membership = vec![json!("us")];

    let mut writer =
        YunBatchWriter::new(options("datasets", "tests/"), Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    writer.write_batch(vec![es, us]).unwrap();
    writer.close().unwrap();

    assert_eq!(store.list("datasets", "tests/es/").unwrap().len(), 1);
    assert_eq!(store.list("datasets", "tests/us/").unwrap().len(), 1);
    assert_eq!(writer.stats().objects_written, 2);
}

/// Tests that a failed upload surfaces the attempted destination key and
/// retains the batch, so a later flush can complete it.
#[test]
fn failed_upload_retains_batch_for_retry() {
    let store = Arc::new(YunMemoryStore::new());

    // Explicit region skips the location lookup, so construction succeeds
    // against a bucket that does not exist yet.
    let mut opts = options("late", "tests/");
    opts.aws_region = Some("us-east-1".to_string());
    let mut writer = YunBatchWriter::new(opts, Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    writer
        .write_batch(vec![record(json!({"name": "Roberto"}))])
        .unwrap();

    let err = writer.flush().unwrap_err();
    match &err {
        YunError::Write { key, .. } => assert!(key.starts_with("tests/")),
        other => panic!("expected Write error, got {other}"),
    }
    assert_eq!(writer.stats().objects_written, 0);

    store.create_bucket("late", "us-east-1");
    writer.close().unwrap();
    assert_eq!(store.list("late", "tests/").unwrap().len(), 1);
    assert_eq!(writer.stats().records_written, 1);
}

/// Store wrapper that rejects pointer writes while letting data uploads
/// through, to observe the documented pointer downgrade.
struct PointerHostileStore {
    inner: YunMemoryStore,
    rejected: AtomicUsize,
}

impl YunBlobStore for PointerHostileStore {
    fn put_object(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()> {
        if key.starts_with("pointer/") {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(YunError::store("pointer writes disabled"));
        }
        self.inner.put_object(bucket, key, bytes)
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.inner.get_object(bucket, key)
    }

    fn get_bucket_location(&self, bucket: &str) -> Result<String> {
        self.inner.get_bucket_location(bucket)
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<YunObjectInfo>> {
        self.inner.list(bucket, prefix)
    }
}

/// Tests that a pointer-manifest failure never fails the flush: the data
/// object lands, the failure is only counted in the stats.
#[test]
fn pointer_failure_is_downgraded_to_stats() {
    let store = Arc::new(PointerHostileStore {
        inner: YunMemoryStore::new(),
        rejected: AtomicUsize::new(0),
    });
    store.inner.create_bucket("datasets", "us-east-1");

    let mut opts = options("datasets", "tests/");
    opts.save_pointer = Some("pointer/LAST".to_string());
    let mut writer = YunBatchWriter::new(opts, Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    writer
        .write_batch(vec![record(json!({"name": "Roberto"}))])
        .unwrap();
    writer.close().unwrap();

    assert_eq!(store.inner.list("datasets", "tests/").unwrap().len(), 1);
    assert!(writer.stats().pointer_errors >= 1);
    assert!(store.rejected.load(Ordering::SeqCst) >= 1);
}

/// Tests the uncompressed and zstd encodings end to end through the store.
#[test]
fn alternate_compressions_round_trip() {
    let store = Arc::new(YunMemoryStore::new());
    store.create_bucket("datasets", "us-east-1");

    let mut opts = options("datasets", "plain/");
    opts.compression = YunCompression::None;
    let mut writer = YunBatchWriter::new(opts, Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    writer.write_batch(vec![record(json!({"a": 1}))]).unwrap();
    writer.close().unwrap();

    let listed = store.list("datasets", "plain/").unwrap();
    assert!(listed[0].key.ends_with(".jsonl"));
    let bytes = store.get_object("datasets", &listed[0].key).unwrap();
    assert_eq!(bytes, b"{\"a\":1}\n");

    let mut opts = options("datasets", "zst/");
    opts.compression = YunCompression::Zstd;
    let mut writer = YunBatchWriter::new(opts, Arc::clone(&store) as Arc<dyn YunBlobStore>).unwrap();
    writer.write_batch(vec![record(json!({"a": 1}))]).unwrap();
    writer.close().unwrap();

    let listed = store.list("datasets", "zst/").unwrap();
    assert!(listed[0].key.ends_with(".jsonl.zst"));
    let bytes = store.get_object("datasets", &listed[0].key).unwrap();
    assert_eq!(zstd::decode_all(&bytes[..]).unwrap(), b"{\"a\":1}\n");
}
