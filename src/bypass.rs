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

//! # Yun Bypass Module
//!
//! Bypass strategies replace the transform pipeline with a direct
//! source-to-destination transfer when the two are provably compatible,
//! skipping the decode/re-encode work entirely. A strategy that claims
//! applicability must produce output equivalent to running the full
//! pipeline — same records, same destination semantics — which is the
//! correctness contract that justifies the shortcut.
//!
//! Candidates are evaluated in declared order; the first whose predicate
//! returns `true` wins. A predicate that itself fails to evaluate raises a
//! `BypassEvaluation` error, which is distinct from "not applicable".

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::YunConfig;
use crate::errors::{Result, YunError};
use crate::store::YunBlobStore;

/// Statistics reported by a completed bypass transfer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct YunBypassStats {
    pub objects_copied: usize,
    pub bytes_copied: u64,
}

/// Contract for interchangeable direct-transfer strategies.
pub trait YunBypassStrategy {
    /// Unique, human-readable name for the strategy.
    fn name(&self) -> &'static str;

    /// Whether this strategy applies to the concrete reader/writer pair.
    /// `Ok(false)` means "not applicable"; `Err` means the predicate itself
    /// could not be evaluated.
    fn can_bypass(&self) -> Result<bool>;

    /// Performs the direct transfer.
    fn transfer(&self) -> Result<YunBypassStats>;
}

/// Direct copy between two prefixes of the same blob store. Applicable when
/// both endpoints are store stages, no grouper is configured, and both
/// buckets resolve to the same region; objects are then copied
/// byte-for-byte without decoding.
pub struct YunSameStoreBypass {
    config: YunConfig,
    store: Arc<dyn YunBlobStore>,
}

struct SameStoreEndpoints {
    source_bucket: String,
    source_prefix: String,
    dest_bucket: String,
    filebase: String,
    save_pointer: Option<String>,
}

impl YunSameStoreBypass {
    pub fn new(config: YunConfig, store: Arc<dyn YunBlobStore>) -> Self {
        Self { config, store }
    }

    fn option_str(options: &Value, field: &str) -> Result<String> {
        options
            .get(field)
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or_else(|| {
                YunError::bypass(
                    "bypass.same_store",
                    format!("missing string option '{field}'"),
                )
            })
    }

    fn endpoints(&self) -> Result<SameStoreEndpoints> {
        let reader = &self.config.reader.options;
        let writer = &self.config.writer.options;
        Ok(SameStoreEndpoints {
            source_bucket: Self::option_str(reader, "bucket")?,
            source_prefix: Self::option_str(reader, "prefix")?,
            dest_bucket: Self::option_str(writer, "bucket")?,
            filebase: Self::option_str(writer, "filebase")?,
            save_pointer: writer
                .get("save_pointer")
                .and_then(Value::as_str)
                .map(|s| s.to_string()),
        })
    }

    fn dest_region(&self, endpoints: &SameStoreEndpoints) -> Result<String> {
        if let Some(region) = self
            .config
            .writer
            .options
            .get("aws_region")
            .and_then(Value::as_str)
        {
            return Ok(region.to_string());
        }
        self.store
            .get_bucket_location(&endpoints.dest_bucket)
            .map_err(|e| YunError::bypass(self.name(), e.to_string()))
    }
}

impl YunBypassStrategy for YunSameStoreBypass {
    fn name(&self) -> &'static str {
        "bypass.same_store"
    }

    fn can_bypass(&self) -> Result<bool> {
        if self.config.reader.name != "reader.store"
            || self.config.writer.name != "writer.store"
            || self.config.grouper.is_some()
        {
            return Ok(false);
        }

        // Both endpoints are store stages from here on; malformed options
        // are an evaluation failure, not "not applicable".
        let endpoints = self.endpoints()?;
        let source_region = self
            .store
            .get_bucket_location(&endpoints.source_bucket)
            .map_err(|e| YunError::bypass(self.name(), e.to_string()))?;
        let dest_region = self.dest_region(&endpoints)?;

        Ok(source_region == dest_region)
    }

    fn transfer(&self) -> Result<YunBypassStats> {
        let endpoints = self.endpoints()?;
        let listed = self
            .store
            .list(&endpoints.source_bucket, &endpoints.source_prefix)?;
        log::info!(
            "bypassing pipeline: copying {} objects from '{}/{}' to '{}/{}'",
            listed.len(),
            endpoints.source_bucket,
            endpoints.source_prefix,
            endpoints.dest_bucket,
            endpoints.filebase
        );

        let mut stats = YunBypassStats::default();
        for info in listed {
            let suffix = info
                .key
                .strip_prefix(&endpoints.source_prefix)
                .unwrap_or(&info.key);
            let dest_key = format!("{}{}", endpoints.filebase, suffix);
            let bytes = self
                .store
                .get_object(&endpoints.source_bucket, &info.key)?;
            self.store
                .put_object(&endpoints.dest_bucket, &dest_key, &bytes)
                .map_err(|e| YunError::write(&dest_key, e.to_string()))?;
            stats.objects_copied += 1;
            stats.bytes_copied += bytes.len() as u64;
        }

        // Pointer semantics match the writer's: it only moves after at
        // least one object actually landed, and the copied objects stand
        // even when the pointer cannot be updated.
        if stats.objects_copied == 0 {
            return Ok(stats);
        }
        if let Some(pointer) = &endpoints.save_pointer {
            if let Err(err) = self.store.put_object(
                &endpoints.dest_bucket,
                pointer,
                endpoints.filebase.as_bytes(),
            ) {
                let downgraded = YunError::pointer_write(pointer, err.to_string());
                log::warn!("{downgraded}");
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YunConfig;
    use crate::store::YunMemoryStore;

    fn config(doc: &str) -> YunConfig {
        YunConfig::from_document(doc.as_bytes()).unwrap()
    }

    #[test]
    fn not_applicable_when_grouper_configured() {
        let store = Arc::new(YunMemoryStore::new());
        store.create_bucket("a", "us-east-1");
        store.create_bucket("b", "us-east-1");
        let config = config(
            r#"
name: x
reader: {name: reader.store, options: {bucket: a, prefix: "in/"}}
grouper: {name: grouper.file_key, options: {keys: [k]}}
writer: {name: writer.store, options: {bucket: b, filebase: "out/"}}
"#,
        );
        let bypass = YunSameStoreBypass::new(config, store);
        assert!(!bypass.can_bypass().unwrap());
    }

    #[test]
    fn not_applicable_across_regions() {
        let store = Arc::new(YunMemoryStore::new());
        store.create_bucket("a", "us-east-1");
        store.create_bucket("b", "eu-west-1");
        let config = config(
            r#"
name: x
reader: {name: reader.store, options: {bucket: a, prefix: "in/"}}
writer: {name: writer.store, options: {bucket: b, filebase: "out/"}}
"#,
        );
        let bypass = YunSameStoreBypass::new(config, store);
        assert!(!bypass.can_bypass().unwrap());
    }

    #[test]
    fn malformed_options_fail_evaluation() {
        let store = Arc::new(YunMemoryStore::new());
        let config = config(
            r#"
name: x
reader: {name: reader.store, options: {prefix: "in/"}}
writer: {name: writer.store, options: {bucket: b, filebase: "out/"}}
"#,
        );
        let bypass = YunSameStoreBypass::new(config, store);
        let err = bypass.can_bypass().unwrap_err();
        assert!(matches!(err, YunError::BypassEvaluation { .. }));
    }

    #[test]
    fn transfer_copies_objects_and_pointer() {
        let store = Arc::new(YunMemoryStore::new());
        store.create_bucket("data", "us-east-1");
        store.put_object("data", "in/part-0.gz", b"zero").unwrap();
        store.put_object("data", "in/part-1.gz", b"one").unwrap();

        let config = config(
            r#"
name: x
reader: {name: reader.store, options: {bucket: data, prefix: "in/"}}
writer:
  name: writer.store
  options: {bucket: data, filebase: "out/", save_pointer: "pointer/LAST"}
"#,
        );
        let bypass = YunSameStoreBypass::new(config, Arc::clone(&store) as Arc<dyn YunBlobStore>);
        assert!(bypass.can_bypass().unwrap());

        let stats = bypass.transfer().unwrap();
        assert_eq!(stats.objects_copied, 2);
        assert_eq!(store.get_object("data", "out/part-0.gz").unwrap(), b"zero");
        assert_eq!(
            store.get_object("data", "pointer/LAST").unwrap(),
            b"out/"
        );
    }

    #[test]
    fn empty_source_transfer_leaves_pointer_untouched() {
        let store = Arc::new(YunMemoryStore::new());
        store.create_bucket("data", "us-east-1");

        let config = config(
            r#"
name: x
reader: {name: reader.store, options: {bucket: data, prefix: "in/"}}
writer:
  name: writer.store
  options: {bucket: data, filebase: "out/", save_pointer: "pointer/LAST"}
"#,
        );
        let bypass = YunSameStoreBypass::new(config, Arc::clone(&store) as Arc<dyn YunBlobStore>);

        let stats = bypass.transfer().unwrap();
        assert_eq!(stats.objects_copied, 0);
        assert!(store.get_object("data", "pointer/LAST").is_err());
    }
}
