//! Error types for QueryLens.
//!
//! All fallible operations return [`QueryLensError`]. Every variant is fatal to
//! the session that produced it: the orchestrator logs the error and closes
//! the connection, so the variants mostly exist to make logs precise.
//!
//! # Examples
//!
//! ```
//! use querylens::error::{QueryLensError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(QueryLensError::compile("unbalanced parenthesis"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for QueryLens operations.
#[derive(Error, Debug)]
pub enum QueryLensError {
    /// I/O errors (file operations, sockets, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed inbound message or failed transport write
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Query text does not parse in the requested dialect
    #[error("Compile error: {0}")]
    Compile(String),

    /// Query tree cannot be expressed in the requested dialect
    #[error("Render error: {0}")]
    Render(String),

    /// Variation generation failed
    #[error("Transformation error: {0}")]
    Transform(String),

    /// Retrieval backend failure
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Candidate selection failed
    #[error("Selection error: {0}")]
    Selection(String),

    /// Ranking model could not be loaded or evaluated
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A heavyweight resource (ontology, embeddings, collection) failed to load
    #[error("Resource error: {0}")]
    Resource(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with QueryLensError.
pub type Result<T> = std::result::Result<T, QueryLensError>;

impl QueryLensError {
    /// Create a new protocol error.
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        QueryLensError::Protocol(msg.into())
    }

    /// Create a new compile error.
    pub fn compile<S: Into<String>>(msg: S) -> Self {
        QueryLensError::Compile(msg.into())
    }

    /// Create a new render error.
    pub fn render<S: Into<String>>(msg: S) -> Self {
        QueryLensError::Render(msg.into())
    }

    /// Create a new transformation error.
    pub fn transform<S: Into<String>>(msg: S) -> Self {
        QueryLensError::Transform(msg.into())
    }

    /// Create a new retrieval error.
    pub fn retrieval<S: Into<String>>(msg: S) -> Self {
        QueryLensError::Retrieval(msg.into())
    }

    /// Create a new selection error.
    pub fn selection<S: Into<String>>(msg: S) -> Self {
        QueryLensError::Selection(msg.into())
    }

    /// Create a new model error.
    pub fn model<S: Into<String>>(msg: S) -> Self {
        QueryLensError::Model(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        QueryLensError::Config(msg.into())
    }

    /// Create a new resource error.
    pub fn resource<S: Into<String>>(msg: S) -> Self {
        QueryLensError::Resource(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        QueryLensError::Other(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        QueryLensError::Other(format!("Invalid argument: {}", msg.into()))
    }

    /// True when the error came from the transport rather than the pipeline.
    pub fn is_protocol(&self) -> bool {
        matches!(self, QueryLensError::Protocol(_) | QueryLensError::Json(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = QueryLensError::compile("unexpected ')'");
        assert_eq!(error.to_string(), "Compile error: unexpected ')'");

        let error = QueryLensError::retrieval("backend offline");
        assert_eq!(error.to_string(), "Retrieval error: backend offline");

        let error = QueryLensError::selection("model not loaded");
        assert_eq!(error.to_string(), "Selection error: model not loaded");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = QueryLensError::from(io_error);

        match error {
            QueryLensError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_protocol_classification() {
        assert!(QueryLensError::protocol("bad frame").is_protocol());
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(QueryLensError::from(json_error).is_protocol());
        assert!(!QueryLensError::compile("x").is_protocol());
    }
}
