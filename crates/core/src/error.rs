//! Error types for store, codec and dependency-tree operations

use std::path::PathBuf;

/// Result type used throughout acb-core
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the store, the archive codec and the tree engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Store Errors
    // =========================================================================
    /// A name (and labels) or image ID could not be mapped to a stored archive.
    #[error("cannot resolve image '{name}': {reason}")]
    Resolution { name: String, reason: String },

    /// No archive is stored under the given key.
    #[error("no image stored under key {0}")]
    NotFound(String),

    /// Output path exists and overwriting was not requested.
    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    /// Store configuration could not be loaded.
    #[error("invalid store configuration: {0}")]
    Config(String),

    // =========================================================================
    // Codec Errors
    // =========================================================================
    /// Stored bytes are not a valid manifest or archive.
    #[error("cannot decode {what}: {reason}")]
    Decode { what: String, reason: String },

    /// Image directory does not follow the manifest + rootfs layout.
    #[error("invalid image layout: {0}")]
    InvalidLayout(String),

    /// Image name contains characters outside the allowed set.
    #[error("invalid image name '{0}'")]
    InvalidName(String),

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Read, write or seek failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Tree Errors
    // =========================================================================
    /// A failure inside the dependency tree, tagged with the node it hit.
    #[error("{operation} failed at image '{node}': {source}")]
    Tree {
        node: String,
        operation: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an I/O error with a description of what was being done.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn decode(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub fn resolution(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Attach the tree node and operation at which this error surfaced.
    pub fn at_node(self, node: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Tree {
            node: node.into(),
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping any tree context wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Tree { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Extension for attaching context to `std::io::Result`.
pub(crate) trait IoContext<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::io(f(), e))
    }
}
