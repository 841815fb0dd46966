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

//! # Yun Configuration Module
//!
//! This module resolves pipeline configuration from either a static document
//! on disk or a previously persisted configuration blob, producing one
//! immutable [`YunConfig`] per run.
//!
//! Configuration documents are YAML (JSON documents also load, YAML being a
//! superset). A document names the exporter and describes each stage as a
//! name plus an options mapping:
//!
//! ```yaml
//! name: daily-export
//! reader:
//!   name: reader.store
//!   options: {bucket: source, prefix: "in/"}
//! grouper:
//!   name: grouper.file_key
//!   options: {keys: [country, state.code]}
//! writer:
//!   name: writer.store
//!   options: {bucket: dest, filebase: "out/", save_pointer: "pointer/LAST"}
//! ```
//!
//! Persistence-based loading dereferences an opaque locator through a
//! [`YunPersistenceResolver`] and resolves the returned document bytes
//! identically, which makes re-invoking a run against the same locator
//! reproduce comparable configuration.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, YunError};
use crate::store::YunBlobStore;

/// One pipeline stage: a registry identifier plus an options mapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct YunStageSpec {
    /// Registry identifier, e.g. `writer.store`.
    pub name: String,
    /// Free-form options validated by the stage factory.
    #[serde(default)]
    pub options: Value,
}

/// Resolved pipeline configuration. Immutable for the lifetime of a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct YunConfig {
    /// Exporter identity, used in logs and object names.
    pub name: String,
    /// Record source stage.
    pub reader: YunStageSpec,
    /// Destination stage.
    pub writer: YunStageSpec,
    /// Optional grouping stage.
    #[serde(default)]
    pub grouper: Option<YunStageSpec>,
}

impl YunConfig {
    /// Loads configuration from a static document on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            YunError::config_load(format!("{}: {e}", path.display()))
        })?;
        Self::from_document(&bytes)
    }

    /// Loads configuration by dereferencing a persistence locator.
    pub fn from_persistence(
        locator: &str,
        resolver: &dyn YunPersistenceResolver,
    ) -> Result<Self> {
        let bytes = resolver
            .resolve(locator)
            .map_err(|e| YunError::config_locator(format!("{locator}: {e}")))?;
        Self::from_document(&bytes)
    }

    /// Parses a raw configuration document into the expected shape.
    pub fn from_document(bytes: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(bytes)
            .map_err(|e| YunError::config_parse(e.to_string()))
    }
}

/// Contract for dereferencing an opaque persistence locator into
/// configuration document bytes. No particular storage backend is assumed.
pub trait YunPersistenceResolver {
    fn resolve(&self, locator: &str) -> Result<Vec<u8>>;
}

/// Resolver treating the locator as a filesystem path.
#[derive(Debug, Default)]
pub struct YunFilePersistenceResolver;

impl YunPersistenceResolver for YunFilePersistenceResolver {
    fn resolve(&self, locator: &str) -> Result<Vec<u8>> {
        std::fs::read(locator).map_err(|e| YunError::Io(e.to_string()))
    }
}

/// Resolver treating the locator as `bucket/key` within a blob store.
pub struct YunStorePersistenceResolver {
    store: Arc<dyn YunBlobStore>,
}

impl YunStorePersistenceResolver {
    pub fn new(store: Arc<dyn YunBlobStore>) -> Self {
        Self { store }
    }
}

impl YunPersistenceResolver for YunStorePersistenceResolver {
    fn resolve(&self, locator: &str) -> Result<Vec<u8>> {
        let (bucket, key) = locator.split_once('/').ok_or_else(|| {
            YunError::config_locator(format!(
                "locator '{locator}' must be '<bucket>/<key>'"
            ))
        })?;
        self.store.get_object(bucket, key)
    }
}
