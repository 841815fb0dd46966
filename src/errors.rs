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

//! # Yun Error Module
//!
//! This module defines the error types and utilities used throughout the Yun
//! framework for consistent error handling and reporting.
//!
//! ## Error Handling Philosophy
//!
//! Yun uses a structured error approach with the following principles:
//!
//! - **Explicit Error Types**: Each error variant represents a specific phase
//!   of an export run (configuration, bypass evaluation, writing), making it
//!   easy for callers to decide whether a retry is worthwhile
//! - **Context-Rich**: Errors include relevant context (stage names,
//!   destination keys, underlying causes) to support caller-driven retry
//! - **No Silent Failures**: The only documented downgrade is the
//!   pointer-manifest write, which is logged and counted but never fails a
//!   run; every other failure propagates
//!
//! ## Error Categories
//!
//! - **ConfigLoad / ConfigParse / ConfigLocator**: Configuration phase
//! - **BypassEvaluation**: A bypass candidate's predicate itself failed
//!   (distinct from "not applicable")
//! - **Write**: Upload or region-resolution failure, carrying the
//!   destination key attempted
//! - **PointerWrite**: Pointer-manifest failure; constructed for logging
//!   and stats but never fails a batch
//! - **Store / Io / Serde**: Underlying blob-store, filesystem, and
//!   serialization failures
//! - **Pipeline**: Failures raised while a stage processes records
//! - **Internal**: Unexpected internal failures
//!
//! There is deliberately no variant for unresolved group keys: key-path
//! resolution degrades to the `"unknown"` sentinel instead of failing.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience result type used throughout Yun.
pub type Result<T> = std::result::Result<T, YunError>;

/// Canonical error enumeration for Yun.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum YunError {
    /// The configuration document could not be read.
    #[error("config load error: {0}")]
    ConfigLoad(String),

    /// The configuration document could not be parsed into the expected shape.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// A persistence locator could not be dereferenced.
    #[error("config locator error: {0}")]
    ConfigLocator(String),

    /// A bypass strategy's applicability predicate failed to evaluate.
    #[error("bypass '{strategy}' evaluation failed: {message}")]
    BypassEvaluation { strategy: String, message: String },

    /// An upload or region-resolution failure, carrying the destination key.
    #[error("write to '{key}' failed: {message}")]
    Write { key: String, message: String },

    /// A pointer-manifest write failure. Non-fatal: reported, never raised
    /// past the writer.
    #[error("pointer write to '{key}' failed: {message}")]
    PointerWrite { key: String, message: String },

    /// Failures surfaced by the underlying blob store.
    #[error("store error: {0}")]
    Store(String),

    /// Errors originating from filesystem IO.
    #[error("io error: {0}")]
    Io(String),

    /// Wrapper for serde-style serialization issues.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Failures raised while a pipeline stage processes records.
    #[error("pipeline error at stage '{stage}': {message}")]
    Pipeline { stage: String, message: String },

    /// Catch-all variant for unexpected situations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for YunError {
    fn from(err: io::Error) -> Self {
        YunError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for YunError {
    fn from(err: serde_json::Error) -> Self {
        YunError::Serde(err.to_string())
    }
}

impl YunError {
    /// Helper to construct config-load errors.
    pub fn config_load<T: Into<String>>(message: T) -> Self {
        YunError::ConfigLoad(message.into())
    }

    /// Helper to construct config-parse errors.
    pub fn config_parse<T: Into<String>>(message: T) -> Self {
        YunError::ConfigParse(message.into())
    }

    /// Helper to construct config-locator errors.
    pub fn config_locator<T: Into<String>>(message: T) -> Self {
        YunError::ConfigLocator(message.into())
    }

    /// Helper to construct bypass-evaluation errors.
    pub fn bypass(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        YunError::BypassEvaluation {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    /// Helper to construct write errors carrying the destination key.
    pub fn write(key: impl Into<String>, message: impl Into<String>) -> Self {
        YunError::Write {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Helper to construct pointer-write errors.
    pub fn pointer_write(key: impl Into<String>, message: impl Into<String>) -> Self {
        YunError::PointerWrite {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Helper to construct store errors.
    pub fn store<T: Into<String>>(message: T) -> Self {
        YunError::Store(message.into())
    }

    /// Helper to construct pipeline errors.
    pub fn pipeline(stage: impl Into<String>, message: impl Into<String>) -> Self {
        YunError::Pipeline {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Helper to construct internal errors.
    pub fn internal<T: Into<String>>(message: T) -> Self {
        YunError::Internal(message.into())
    }
}
