//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`ArborError`] covers two kinds of failure:
//! - Precondition violations (invalid handles, out-of-range indices, name
//!   collisions, wrong types). These are programmer errors; the engine context
//!   reports them on its diagnostic message queue as well as returning them.
//! - Operational failures (missing data, lookups that found nothing, loading a
//!   resource twice). These are ordinary outcomes and are only returned.
//!
//! Nothing in the engine is fatal: every error leaves the engine in a
//! consistent state and can be handled by the caller.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, ArborError>`.

use thiserror::Error;

use crate::handle::{NodeHandle, ResHandle};

/// The main error type for the Arbor engine.
#[derive(Error, Debug)]
pub enum ArborError {
    // ========================================================================
    // Handle Errors
    // ========================================================================
    /// The resource handle does not refer to a live resource.
    #[error("Invalid resource handle {0}")]
    InvalidResource(ResHandle),

    /// The node handle does not refer to a live node.
    #[error("Invalid node handle {0}")]
    InvalidNode(NodeHandle),

    /// A resource of a different type was expected.
    #[error("Resource {handle} has type {found}, expected {expected}")]
    ResourceTypeMismatch {
        handle: ResHandle,
        expected: &'static str,
        found: &'static str,
    },

    /// A node of a different type was expected.
    #[error("Node {handle} has type {found}, expected {expected}")]
    NodeTypeMismatch {
        handle: NodeHandle,
        expected: &'static str,
        found: &'static str,
    },

    /// The raw resource type value is not a known type.
    #[error("Unknown resource type {0}")]
    UnknownResourceType(i32),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A resource with this type and name already exists.
    #[error("Resource name '{0}' is already in use")]
    NameInUse(String),

    /// Persistent resources need a non-empty name.
    #[error("Resource name must not be empty")]
    EmptyName,

    /// The application holds no references to the resource.
    #[error("Resource {0} has no user references left")]
    NoUserReferences(ResHandle),

    /// Data was supplied for a resource that is already loaded.
    #[error("Resource {0} is already loaded")]
    AlreadyLoaded(ResHandle),

    /// The resource has no data to work with.
    #[error("Resource {0} has no data available")]
    DataUnavailable(ResHandle),

    /// The supplied resource data could not be parsed.
    #[error("Malformed data for resource '{name}': {source}")]
    MalformedData {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The supplied resource data parsed but describes an inconsistent object.
    #[error("Invalid data for resource '{name}': {reason}")]
    InvalidData { name: String, reason: String },

    /// The element or parameter does not belong to the resource type.
    #[error("Parameter {param} does not apply to element {elem}")]
    ParamMismatch { elem: String, param: String },

    /// The parameter cannot be written.
    #[error("Parameter {0} is read-only")]
    ReadOnlyParam(String),

    /// The stream cannot be mapped with the requested access.
    #[error("Stream {0} cannot be mapped")]
    StreamNotMappable(String),

    // ========================================================================
    // Index & Value Errors
    // ========================================================================
    /// An index was outside the valid range.
    #[error("Index out of range: {context} (index: {index})")]
    IndexOutOfRange {
        /// Description of what was being accessed
        context: &'static str,
        /// The invalid index
        index: usize,
    },

    /// A value was rejected by a parameter or option.
    #[error("Invalid value for {context}: {value}")]
    InvalidValue { context: &'static str, value: String },

    // ========================================================================
    // Scene Graph Errors
    // ========================================================================
    /// The root node cannot be removed or relocated.
    #[error("The root node cannot be modified this way")]
    RootImmutable,

    /// The relocation would create a cycle.
    #[error("Node {node} cannot be attached below its descendant {parent}")]
    CycleDetected { node: NodeHandle, parent: NodeHandle },

    /// The node type cannot be attached below the given parent.
    #[error("A {child} node cannot be attached below node {parent}: {reason}")]
    AttachmentRejected {
        child: &'static str,
        parent: NodeHandle,
        reason: &'static str,
    },

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// A named item was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A configuration document could not be parsed.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ArborError {
    /// Returns `true` for errors caused by invalid arguments.
    ///
    /// Operational failures (`AlreadyLoaded`, `DataUnavailable`, `NotFound`,
    /// malformed data, configuration parsing) return `false`.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        !matches!(
            self,
            Self::AlreadyLoaded(_)
                | Self::DataUnavailable(_)
                | Self::NotFound(_)
                | Self::MalformedData { .. }
                | Self::InvalidData { .. }
                | Self::JsonError(_)
        )
    }
}

/// Alias for `Result<T, ArborError>`.
pub type Result<T> = std::result::Result<T, ArborError>;
