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

//! # Yun Core Library
//!
//! Yun is a configurable batch-export pipeline: it reads a stream of
//! structured records, optionally partitions them into named groups by
//! key-path, and writes them as compressed batches to a blob store,
//! optionally recording a pointer manifest locating the most recent output.
//!
//! ## Module Overview
//!
//! - **record**: YunRecord, the semi-structured unit of data flowing
//!   through the pipeline
//! - **config**: configuration resolution from static documents or
//!   persistence locators
//! - **store**: the narrow blob-store contract plus bundled in-memory and
//!   filesystem implementations
//! - **reader**: batch readers producing the input stream
//! - **grouper**: nested key-path extraction and group-membership tagging
//! - **export**: batch buffering, compression, upload, and the pointer
//!   manifest
//! - **bypass**: direct source-to-destination transfer strategies that can
//!   replace the pipeline when provably equivalent
//! - **stages**: registry mapping stage identifiers to constructors
//! - **manager**: the exporter state machine orchestrating a run
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use yunx::{YunExporter, YunMemoryStore};
//!
//! let store = Arc::new(YunMemoryStore::new());
//! store.create_bucket("data", "eu-west-1");
//!
//! let mut exporter =
//!     YunExporter::from_file_configuration("export.yaml", store)?;
//! let stats = exporter.run()?;
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, YunError>`. Configuration and
//! bypass-evaluation errors are fatal and propagate immediately; write
//! errors fail the run but leave previously uploaded objects intact;
//! pointer-manifest failures are downgraded to warnings by design.

pub mod bypass;
pub mod config;
pub mod errors;
pub mod export;
pub mod grouper;
pub mod manager;
pub mod reader;
pub mod record;
pub mod stages;
pub mod store;

pub use errors::{Result, YunError};
pub use record::{YunPayload, YunRecord, YunRecordBatch};

pub use bypass::{YunBypassStats, YunBypassStrategy, YunSameStoreBypass};
pub use config::{
    YunConfig, YunFilePersistenceResolver, YunPersistenceResolver, YunStageSpec,
    YunStorePersistenceResolver,
};
pub use export::{YunBatchWriter, YunCompression, YunWriteStats, YunWriterOptions};
pub use grouper::{YunFileKeyGrouper, YunGrouper, YUN_UNKNOWN_GROUP};
pub use manager::{YunExporter, YunExportState, YunExportStats};
pub use reader::{YunBatchReader, YunStoreReader, YunVecReader};
pub use stages::YunStageRegistry;
pub use store::{YunBlobStore, YunFsStore, YunMemoryStore, YunObjectInfo};
