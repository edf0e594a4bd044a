//! Error types shared across the crate.
//!
//! The taxonomy deliberately separates three situations that a lookup can end
//! in: confirmed absence (`Ok(None)` at the call sites), transient
//! unavailability (`IndexNotReady`, `StaleNode`), and real failures. Callers
//! fold the transient variants into "no result" instead of surfacing them.
//! `Cancelled` is special: it must re-propagate through every layer and is
//! never absorbed by the per-item recovery paths.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{FileId, NodeRef};

/// Errors from indexing, cache, and inference operations.
#[derive(Error, Debug)]
pub enum IntelError {
    /// The stub index has not finished its initial population. Treated by
    /// readers as "nothing found", not as a failure.
    #[error("Index is not ready (initial indexing still in progress)")]
    IndexNotReady,

    /// The request was cancelled by the host. Always re-propagated.
    #[error("Operation cancelled")]
    Cancelled,

    /// A node reference outlived the parse that produced it.
    #[error("Stale node reference {node:?} (file was re-indexed)")]
    StaleNode { node: NodeRef },

    #[error("Unknown file {file:?}")]
    UnknownFile { file: FileId },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Failed to initialize Lua grammar: {reason}")]
    Grammar { reason: String },

    #[error("Debugger bridge error: {reason}")]
    Bridge { reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntelError {
    /// True for errors that mean "try again later / pretend nothing was
    /// found", as opposed to real failures.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IntelError::IndexNotReady | IntelError::StaleNode { .. }
        )
    }
}

pub type IntelResult<T> = Result<T, IntelError>;
