//! JSON messages exchanged with a client.

use serde::{Deserialize, Serialize};

use crate::error::{QueryLensError, Result};

/// One refinement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LensRequest {
    pub query: String,
    /// Dialect tag; absent or unknown tags use the default dialect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl LensRequest {
    pub fn new<S: Into<String>>(query: S, language: Option<&str>) -> Self {
        LensRequest {
            query: query.into(),
            language: language.map(str::to_string),
        }
    }

    /// Decode a request. Malformed input is a protocol error.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| QueryLensError::protocol(format!("malformed request: {e}")))
    }
}

/// Visual family of a reported query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// A generated variation.
    Circle,
    /// The variation picked by the ranking model.
    Triangle,
    /// The user's original query.
    Cross,
}

/// An evaluated query as reported to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryVariation {
    pub query: String,
    pub shape: Shape,
    pub transformation: String,
    pub num_transformations: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub num_ret: usize,
}

/// Server to client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LensResponse {
    /// A stage is starting.
    Message { message: String },
    /// Per-item progress within a stage, 0 to 100.
    Executing {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        progress: f64,
    },
    /// Final report, sorted by ascending F1.
    Queries { queries: Vec<QueryVariation> },
}

impl LensResponse {
    pub fn message<S: Into<String>>(message: S) -> Self {
        LensResponse::Message {
            message: message.into(),
        }
    }

    pub fn executing(progress: f64) -> Self {
        LensResponse::Executing {
            message: None,
            progress,
        }
    }

    pub fn executing_with<S: Into<String>>(message: S, progress: f64) -> Self {
        LensResponse::Executing {
            message: Some(message.into()),
            progress,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
