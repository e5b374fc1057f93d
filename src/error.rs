//! Error handling for the capture request resolver
//!
//! This module defines the crate error type and a Result alias used by
//! resolution, request bookkeeping and configuration loading.

use crate::pipeline::id::{BufferId, MetadataId, NodeId};
use thiserror::Error;

/// Main error type for resolver operations
#[derive(Error, Debug)]
pub enum ResolverError {
    /// The data item arena ran out of slots; the pipeline was sized too small
    #[error("Data item arena full (capacity {capacity})")]
    ArenaFull { capacity: usize },

    /// A node evaluator rejected the current inference state
    #[error("Node {node} evaluation failed: {message}")]
    Evaluator { node: NodeId, message: String },

    /// Buffer id not registered on the request
    #[error("Unknown buffer {0:?}")]
    UnknownBuffer(BufferId),

    /// Metadata id not registered on the request
    #[error("Unknown metadata {0}")]
    UnknownMetadata(MetadataId),

    /// A node touched a buffer it was never bound to
    #[error("Node {node} is not bound to {what}")]
    NotBound { node: NodeId, what: String },

    /// Release by a node that holds no reference (double release)
    #[error("Node {node} released {what} without holding a reference")]
    ReleaseWithoutReference { node: NodeId, what: String },

    /// An id past the 64-entry id space of its kind
    #[error("{kind} id {id} out of range (ids stop at 63)")]
    IdOutOfRange { kind: &'static str, id: u8 },

    /// A name in a config file did not map to a known id
    #[error("Unknown {kind} name '{name}'")]
    UnknownName { kind: &'static str, name: String },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ResolverError>,
    },
}

impl ResolverError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ResolverError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for an evaluator failure
    pub fn evaluator(node: NodeId, message: impl Into<String>) -> Self {
        ResolverError::Evaluator {
            node,
            message: message.into(),
        }
    }
}

/// Result type alias for resolver operations
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
