//! Error Types
//!
//! Errors are split by how they surface:
//!
//! - [`NetworkError`]: structural mutations rejected synchronously. The
//!   network is left unchanged when one of these is returned.
//! - [`ProcessError`] and [`TaskError`]: computation failures. These never
//!   cross the evaluation-thread boundary as errors; they end up as a
//!   processor's `Error` status.
//! - [`SerializationError`]: fatal persistence failures that abort a load.
//! - [`ElementError`]: recoverable per-element load failures, routed to the
//!   caller-supplied handler.

use thiserror::Error;

/// Result alias for structural network operations.
pub type Result<T, E = NetworkError> = std::result::Result<T, E>;

/// Structural errors returned by the network mutation API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("a processor with identifier '{0}' already exists")]
    DuplicateIdentifier(String),

    #[error("'{0}' is not a valid identifier (must be non-empty and contain no '.')")]
    InvalidIdentifier(String),

    #[error("'{0}' is not in the network")]
    NotInNetwork(String),

    #[error("processor '{processor}' has no port '{port}'")]
    UnknownPort { processor: String, port: String },

    #[error("processor '{processor}' has no property '{property}'")]
    UnknownProperty { processor: String, property: String },

    #[error("'{0}' is a composite property and holds no value")]
    NotAValueProperty(String),

    #[error("cannot connect '{outport}' ({outport_type}) to '{inport}' ({inport_type})")]
    IncompatibleTypes {
        outport: String,
        outport_type: String,
        inport: String,
        inport_type: String,
    },

    #[error("inport '{0}' is already connected")]
    AlreadyConnected(String),

    #[error("'{outport}' is already connected to '{inport}'")]
    DuplicateConnection { outport: String, inport: String },

    #[error("connecting '{outport}' to '{inport}' would create a cycle")]
    WouldCreateCycle { outport: String, inport: String },

    #[error("'{source_path}' is already linked to '{destination}'")]
    DuplicateLink {
        source_path: String,
        destination: String,
    },

    #[error("a property cannot be linked to itself: '{0}'")]
    SelfLink(String),

    #[error("cannot assign a {found} value to '{property}' of type {expected}")]
    TypeMismatch {
        property: String,
        expected: String,
        found: String,
    },

    #[error("'{0}' is not a valid path")]
    InvalidPath(String),
}

/// Failure of a processor's computation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("{0}")]
    Failed(String),

    #[error("missing input on inport '{0}'")]
    MissingInput(String),

    #[error("processor panicked: {0}")]
    Panicked(String),
}

impl ProcessError {
    /// Create a failure with the given message.
    pub fn failed(message: impl Into<String>) -> Self {
        ProcessError::Failed(message.into())
    }
}

/// Failure of a single background task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("{0}")]
    Failed(String),

    #[error("task was cancelled")]
    Cancelled,

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Create a failure with the given message.
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed(message.into())
    }
}

/// Failure to submit a background job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("processor is not attached to a network; background jobs are unavailable")]
    Detached,
}

/// Fatal persistence errors. Any of these aborts the load.
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("missing version attribute on the root element")]
    MissingVersion,

    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("document version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("no converter registered to upgrade documents from version {0}")]
    MissingConverter(u32),

    #[error("conversion from version {version} failed: {message}")]
    Conversion { version: u32, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recoverable failure while loading one element of a document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ElementError {
    #[error("no processor type '{class}' is registered (processor '{identifier}')")]
    UnknownProcessorType { identifier: String, class: String },

    #[error("element '{element}' is missing field '{field}'")]
    MissingField { element: String, field: String },

    #[error("'{path}' does not exist")]
    UnknownProperty { path: String },

    #[error("'{path}' expects a {expected} value, document has {found}")]
    PropertyTypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("cannot parse '{content}' as {kind} for '{path}'")]
    InvalidValue {
        path: String,
        kind: String,
        content: String,
    },

    #[error("{0}")]
    Network(#[from] NetworkError),
}

/// Turn a caught panic payload into a message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
