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

//! # Yun Exporter Manager Module
//!
//! The top-level orchestrator of an export run. It resolves configuration
//! once, asks the bypass candidates whether the pipeline can be replaced by
//! a direct transfer, and otherwise drives record batches from the reader
//! through the optional grouper into the writer, one batch at a time.
//!
//! ## State machine
//!
//! ```text
//! Init -> ConfigResolved -> BypassEvaluated -> {Bypassing | Running}
//!      -> Done | Failed
//! ```
//!
//! Any unhandled error from any stage moves the run to `Failed` and
//! propagates to the caller; the manager performs no automatic retry.
//! Retry policy is external: the caller re-invokes the manager, optionally
//! against the same persistence locator so the run resumes from comparable
//! configuration.
//!
//! ## Concurrency
//!
//! A run is a single logical pass: one batch is grouped and written to
//! completion before the next is pulled, so no two `write_batch` calls on
//! the same writer overlap. The writer instance, its buffer, and its region
//! cache are owned exclusively by this run. Cancellation is cooperative and
//! takes effect between batches, never mid-upload; the writer is still
//! closed on the way out.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bypass::{YunBypassStats, YunBypassStrategy, YunSameStoreBypass};
use crate::config::{YunConfig, YunPersistenceResolver};
use crate::errors::Result;
use crate::export::YunWriteStats;
use crate::stages::YunStageRegistry;
use crate::store::YunBlobStore;

/// Lifecycle states of an export run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum YunExportState {
    Init,
    ConfigResolved,
    BypassEvaluated,
    Bypassing,
    Running,
    Done,
    Failed,
}

/// Outcome of a completed run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct YunExportStats {
    /// Batches pulled from the reader (zero when bypassed).
    pub batches: usize,
    /// Records pulled from the reader (zero when bypassed).
    pub records: usize,
    /// Whether a bypass strategy replaced the pipeline.
    pub bypassed: bool,
    /// Writer statistics for a normal run.
    pub write: Option<YunWriteStats>,
    /// Transfer statistics for a bypassed run.
    pub bypass: Option<YunBypassStats>,
}

/// Top-level export orchestrator.
pub struct YunExporter {
    config: YunConfig,
    store: Arc<dyn YunBlobStore>,
    registry: YunStageRegistry,
    state: YunExportState,
    cancel: Arc<AtomicBool>,
}

impl YunExporter {
    /// Creates an exporter from an already resolved configuration. Stage
    /// names are validated against the default registry immediately.
    pub fn new(config: YunConfig, store: Arc<dyn YunBlobStore>) -> Result<Self> {
        let mut exporter = Self {
            config,
            store,
            registry: YunStageRegistry::with_defaults(),
            state: YunExportState::Init,
            cancel: Arc::new(AtomicBool::new(false)),
        };
        exporter.registry.validate(&exporter.config)?;
        log::info!(
            "resolved configuration for exporter '{}'",
            exporter.config.name
        );
        exporter.state = YunExportState::ConfigResolved;
        Ok(exporter)
    }

    /// Creates an exporter reading configuration from a static file.
    pub fn from_file_configuration(
        path: impl AsRef<Path>,
        store: Arc<dyn YunBlobStore>,
    ) -> Result<Self> {
        let config = YunConfig::from_file(path)?;
        Self::new(config, store)
    }

    /// Creates an exporter reading configuration through a persistence
    /// locator, enabling resumable/repeatable jobs.
    pub fn from_persistence_configuration(
        locator: &str,
        resolver: &dyn YunPersistenceResolver,
        store: Arc<dyn YunBlobStore>,
    ) -> Result<Self> {
        let config = YunConfig::from_persistence(locator, resolver)?;
        Self::new(config, store)
    }

    /// The resolved configuration driving this run.
    pub fn config(&self) -> &YunConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> YunExportState {
        self.state
    }

    /// Handle for requesting cooperative cancellation. Checked between
    /// batches; the writer is still closed before `run` returns.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Ordered bypass candidates applicable to this configuration's
    /// reader/writer pair. First match wins.
    pub fn bypass_cases(&self) -> Vec<Box<dyn YunBypassStrategy>> {
        vec![Box::new(YunSameStoreBypass::new(
            self.config.clone(),
            Arc::clone(&self.store),
        ))]
    }

    /// Executes the run to completion, a bypass transfer, cancellation, or
    /// the first fatal error.
    pub fn run(&mut self) -> Result<YunExportStats> {
        match self.try_run() {
            Ok(stats) => {
                self.state = YunExportState::Done;
                log::info!(
                    "exporter '{}' finished: {} batches, {} records{}",
                    self.config.name,
                    stats.batches,
                    stats.records,
                    if stats.bypassed { " (bypassed)" } else { "" }
                );
                Ok(stats)
            }
            Err(err) => {
                self.state = YunExportState::Failed;
                log::error!("exporter '{}' failed: {err}", self.config.name);
                Err(err)
            }
        }
    }

    fn try_run(&mut self) -> Result<YunExportStats> {
        let mut matched = None;
        for case in self.bypass_cases() {
            if case.can_bypass()? {
                matched = Some(case);
                break;
            }
        }
        self.state = YunExportState::BypassEvaluated;

        if let Some(case) = matched {
            self.state = YunExportState::Bypassing;
            log::info!("bypass strategy '{}' applies", case.name());
            let bypass = case.transfer()?;
            return Ok(YunExportStats {
                bypassed: true,
                bypass: Some(bypass),
                ..YunExportStats::default()
            });
        }

        let mut reader = self
            .registry
            .build_reader(&self.config, Arc::clone(&self.store))?;
        let grouper = self.registry.build_grouper(&self.config)?;
        let mut writer = self
            .registry
            .build_writer(&self.config, Arc::clone(&self.store))?;

        self.state = YunExportState::Running;
        let mut stats = YunExportStats::default();

        // One batch at a time: grouped, written, flushed before the next
        // pull, which keeps the batch-to-object mapping 1:1 and pointer
        // updates in flush order.
        let cancel = &self.cancel;
        let result = (|| -> Result<()> {
            loop {
                if cancel.load(Ordering::SeqCst) {
                    log::info!("cancellation requested, stopping between batches");
                    return Ok(());
                }
                let batch = match reader.next_batch()? {
                    Some(batch) => batch,
                    None => return Ok(()),
                };
                stats.batches += 1;
                stats.records += batch.len();

                let batch = match &grouper {
                    Some(grouper) => grouper.group_batch(batch)?,
                    None => batch,
                };
                writer.write_batch(batch)?;
                writer.flush()?;
            }
        })();

        // Close on every exit path; a close failure on an otherwise clean
        // run is still a run failure.
        let close_result = writer.close();
        result?;
        close_result?;

        stats.write = Some(writer.stats().clone());
        Ok(stats)
    }
}

// The store handle is a trait object, so Debug is written out by hand.
impl fmt::Debug for YunExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YunExporter")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .finish()
    }
}
