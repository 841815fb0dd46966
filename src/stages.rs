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

//! # Yun Stage Registry Module
//!
//! Pipeline stages are chosen by string identifier plus an options mapping.
//! The registry maps each identifier to a factory; stage names are checked
//! against it when configuration is resolved, and each factory validates
//! its own option shape when the stage is built.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::YunConfig;
use crate::errors::{Result, YunError};
use crate::export::{YunBatchWriter, YunWriterOptions};
use crate::grouper::{YunFileKeyGrouper, YunGrouper};
use crate::reader::{YunBatchReader, YunStoreReader};
use crate::store::YunBlobStore;

type ReaderFactory =
    fn(&YunConfig, &Value, Arc<dyn YunBlobStore>) -> Result<Box<dyn YunBatchReader>>;
type GrouperFactory = fn(&YunConfig, &Value) -> Result<Box<dyn YunGrouper>>;
type WriterFactory = fn(&YunConfig, &Value, Arc<dyn YunBlobStore>) -> Result<YunBatchWriter>;

/// Registry that knows how to instantiate pipeline stages from
/// configuration.
pub struct YunStageRegistry {
    readers: HashMap<String, ReaderFactory>,
    groupers: HashMap<String, GrouperFactory>,
    writers: HashMap<String, WriterFactory>,
}

impl YunStageRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            readers: HashMap::new(),
            groupers: HashMap::new(),
            writers: HashMap::new(),
        }
    }

    /// Creates a registry pre-loaded with the bundled Yun stages.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_reader("reader.store", store_reader_factory);
        registry.register_grouper("grouper.file_key", file_key_grouper_factory);
        registry.register_writer("writer.store", store_writer_factory);
        registry
    }

    pub fn register_reader(&mut self, name: impl Into<String>, factory: ReaderFactory) {
        self.readers.insert(name.into(), factory);
    }

    pub fn register_grouper(&mut self, name: impl Into<String>, factory: GrouperFactory) {
        self.groupers.insert(name.into(), factory);
    }

    pub fn register_writer(&mut self, name: impl Into<String>, factory: WriterFactory) {
        self.writers.insert(name.into(), factory);
    }

    /// Rejects configurations naming stages this registry does not know.
    /// Called at config-resolution time, before any stage is built.
    pub fn validate(&self, config: &YunConfig) -> Result<()> {
        if !self.readers.contains_key(&config.reader.name) {
            return Err(YunError::config_parse(format!(
                "unknown reader stage '{}'",
                config.reader.name
            )));
        }
        if !self.writers.contains_key(&config.writer.name) {
            return Err(YunError::config_parse(format!(
                "unknown writer stage '{}'",
                config.writer.name
            )));
        }
        if let Some(grouper) = &config.grouper {
            if !self.groupers.contains_key(&grouper.name) {
                return Err(YunError::config_parse(format!(
                    "unknown grouper stage '{}'",
                    grouper.name
                )));
            }
        }
        Ok(())
    }

    pub fn build_reader(
        &self,
        config: &YunConfig,
        store: Arc<dyn YunBlobStore>,
    ) -> Result<Box<dyn YunBatchReader>> {
        let factory = self.readers.get(&config.reader.name).ok_or_else(|| {
            YunError::config_parse(format!(
                "unknown reader stage '{}'",
                config.reader.name
            ))
        })?;
        factory(config, &config.reader.options, store)
    }

    pub fn build_grouper(&self, config: &YunConfig) -> Result<Option<Box<dyn YunGrouper>>> {
        let spec = match &config.grouper {
            Some(spec) => spec,
            None => return Ok(None),
        };
        let factory = self.groupers.get(&spec.name).ok_or_else(|| {
            YunError::config_parse(format!("unknown grouper stage '{}'", spec.name))
        })?;
        factory(config, &spec.options).map(Some)
    }

    pub fn build_writer(
        &self,
        config: &YunConfig,
        store: Arc<dyn YunBlobStore>,
    ) -> Result<YunBatchWriter> {
        let factory = self.writers.get(&config.writer.name).ok_or_else(|| {
            YunError::config_parse(format!(
                "unknown writer stage '{}'",
                config.writer.name
            ))
        })?;
        factory(config, &config.writer.options, store)
    }
}

impl Default for YunStageRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn store_reader_factory(
    _config: &YunConfig,
    options: &Value,
    store: Arc<dyn YunBlobStore>,
) -> Result<Box<dyn YunBatchReader>> {
    let obj = options
        .as_object()
        .ok_or_else(|| YunError::config_parse("reader.store options must be an object"))?;

    let bucket = obj
        .get("bucket")
        .and_then(Value::as_str)
        .ok_or_else(|| YunError::config_parse("reader.store requires string 'bucket'"))?
        .to_string();

    let prefix = obj
        .get("prefix")
        .and_then(Value::as_str)
        .ok_or_else(|| YunError::config_parse("reader.store requires string 'prefix'"))?
        .to_string();

    Ok(Box::new(YunStoreReader::new(store, bucket, prefix)))
}

fn file_key_grouper_factory(
    _config: &YunConfig,
    options: &Value,
) -> Result<Box<dyn YunGrouper>> {
    let obj = options.as_object().ok_or_else(|| {
        YunError::config_parse("grouper.file_key options must be an object")
    })?;

    let keys = obj
        .get("keys")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            YunError::config_parse("grouper.file_key requires array 'keys'")
        })?
        .iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| YunError::config_parse("group keys must be strings"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Box::new(YunFileKeyGrouper::new(keys)))
}

fn store_writer_factory(
    config: &YunConfig,
    options: &Value,
    store: Arc<dyn YunBlobStore>,
) -> Result<YunBatchWriter> {
    let writer_options = YunWriterOptions::from_spec(&config.name, options)?;
    YunBatchWriter::new(writer_options, store)
}
