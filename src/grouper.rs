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

//! # Yun Grouper Module
//!
//! This module tags each record of a batch with group-membership
//! information derived from configured key-paths. The grouper is a pure
//! transform: it never reorders, drops, or duplicates records, and it never
//! fails a run — a key that cannot be resolved degrades to the `"unknown"`
//! sentinel. Actual partitioning into separate output objects is the
//! writer's concern.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::Result;
use crate::record::{YunRecord, YunRecordBatch};

/// Sentinel value assigned when a key-path cannot be resolved.
pub const YUN_UNKNOWN_GROUP: &str = "unknown";

/// Contract for grouping stages. Mirrors the batch-in, batch-out shape of
/// the other pipeline stages; grouping itself is infallible, the `Result`
/// keeps the seam uniform for custom implementations.
pub trait YunGrouper: Send + Sync + std::fmt::Debug {
    /// Unique, human-readable name for the grouper.
    fn name(&self) -> &'static str;

    /// Annotates every record of the batch with its group membership.
    fn group_batch(&self, batch: YunRecordBatch) -> Result<YunRecordBatch>;
}

/// Groups records by the values found at an ordered sequence of dotted
/// key-paths (`"a.b.c"` descends `a`, then `b`, then `c`). Order matters:
/// it defines tuple position, not a set.
#[derive(Clone, Debug)]
pub struct YunFileKeyGrouper {
    keys: Arc<[String]>,
}

impl YunFileKeyGrouper {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys: Arc::from(keys),
        }
    }

    /// The configured key-path sequence.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Lazily annotates a batch, preserving input order and length. The
    /// returned sequence is single-pass; each call starts a fresh pass over
    /// its own batch.
    pub fn annotate(
        &self,
        batch: YunRecordBatch,
    ) -> impl Iterator<Item = YunRecord> + '_ {
        batch.into_iter().map(move |mut record| {
            record.group_membership = self
                .keys
                .iter()
                .map(|key| Self::nested_value(&record.payload, key))
                .collect();
            record.group_key = Arc::clone(&self.keys);
            record
        })
    }

    /// Resolves one dotted key-path against a payload mapping. A missing
    /// key, a non-object intermediate, or an explicit null anywhere along
    /// the path resolves to the sentinel.
    fn nested_value(map: &Map<String, Value>, key: &str) -> Value {
        match key.split_once('.') {
            Some((first, rest)) => match map.get(first) {
                Some(Value::Object(inner)) => Self::nested_value(inner, rest),
                _ => Value::String(YUN_UNKNOWN_GROUP.to_string()),
            },
            None => match map.get(key) {
                Some(Value::Null) | None => {
                    Value::String(YUN_UNKNOWN_GROUP.to_string())
                }
                Some(value) => value.clone(),
            },
        }
    }
}

impl YunGrouper for YunFileKeyGrouper {
    fn name(&self) -> &'static str {
        "grouper.file_key"
    }

    fn group_batch(&self, batch: YunRecordBatch) -> Result<YunRecordBatch> {
        log::debug!("grouping batch by keys {:?}", self.keys);
        Ok(self.annotate(batch).collect())
    }
}
