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

//! # Yun Record Module
//!
//! This module provides the core data structures for representing individual
//! data records in the Yun framework. YunRecord is the fundamental unit of
//! data that flows through Yun export pipelines.
//!
//! ## Design Principles
//!
//! - **Flexibility**: Payloads are ordered JSON mappings
//!   (serde_json::Map with insertion order preserved), enabling
//!   semi-structured data without a fixed schema
//! - **First-class grouping annotations**: The group key sequence and the
//!   resolved membership tuple are explicit fields, not ad hoc attributes
//! - **Positional identity**: Records carry no global identifier; identity
//!   is their position within a batch
//!
//! ## Lifecycle
//!
//! A record is created by a reader, optionally annotated by the grouper,
//! serialized by the writer, then discarded. Only the payload reaches the
//! destination store; the grouping annotations are pipeline-internal.

use std::sync::Arc;

use serde_json::{Map, Value};

/// Ordered mapping from field name to value carried by a record.
pub type YunPayload = Map<String, Value>;

/// Fundamental data unit processed by the Yun export pipeline.
///
/// The payload is the user content; `group_key` and `group_membership` are
/// mutable annotations written by the grouper stage. The key sequence is
/// shared between all records of a run (`Arc`) and must not be mutated
/// per-record once assigned.
#[derive(Clone, Debug)]
pub struct YunRecord {
    /// Primary payload carrying user content, in field order.
    pub payload: YunPayload,

    /// Ordered sequence of dotted key-paths used to compute grouping.
    /// Empty until the grouper runs; shared across records.
    pub group_key: Arc<[String]>,

    /// Tuple of resolved values, one per key-path, in key-path order.
    /// Unresolvable paths hold the `"unknown"` sentinel.
    pub group_membership: Vec<Value>,
}

impl YunRecord {
    /// Constructs an unannotated record from a payload mapping.
    pub fn new(payload: YunPayload) -> Self {
        YunRecord {
            payload,
            group_key: Arc::from(Vec::new()),
            group_membership: Vec::new(),
        }
    }

    /// Constructs a record from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(YunRecord::new(map)),
            _ => None,
        }
    }

    /// Returns the payload as a JSON value, cloning the mapping.
    pub fn to_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }
}

/// Convenience alias for working on batches of records.
///
/// A batch is the unit of compression and upload: a batch is never split
/// across two uploaded objects.
pub type YunRecordBatch = Vec<YunRecord>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_record_has_empty_annotations() {
        let mut payload = YunPayload::new();
        payload.insert("name".into(), json!("Roberto"));
        let record = YunRecord::new(payload);

        assert!(record.group_key.is_empty());
        assert!(record.group_membership.is_empty());
        assert_eq!(record.payload["name"], json!("Roberto"));
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(YunRecord::from_value(json!({"a": 1})).is_some());
        assert!(YunRecord::from_value(json!([1, 2])).is_none());
        assert!(YunRecord::from_value(json!("scalar")).is_none());
    }

    #[test]
    fn payload_preserves_field_order() {
        let record =
            YunRecord::from_value(json!({"z": 1, "a": 2, "m": 3})).unwrap();
        let keys: Vec<&String> = record.payload.keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }
}
