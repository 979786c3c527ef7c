//! # QueryLens
//!
//! Semi-automatic refinement of Boolean search queries for systematic review
//! literature search.
//!
//! A client sends a query over a streaming channel. QueryLens compiles it
//! with a search dialect, generates one-step variations with a fixed set of
//! transformation operators, predicts the most promising variation with a
//! learned ranking model, evaluates every query against the client's relevant
//! documents and streams the results back sorted by F1.
//!
//! ## Layout
//!
//! - [`dialect`]: query languages (MEDLINE/Ovid, PubMed) to and from [`query::Query`]
//! - [`transform`]: transformation operators and the variation generator
//! - [`select`]: feature extraction and the tree ensemble selector
//! - [`retrieval`]: backends and result caches
//! - [`eval`]: judgments and precision/recall/F1
//! - [`session`]: the per-connection pipeline and its wire protocol
//! - [`plugin`] and [`server`]: the HTTP/WebSocket host

pub mod cli;
pub mod config;
pub mod dialect;
pub mod error;
pub mod eval;
pub mod plugin;
pub mod query;
pub mod resources;
pub mod retrieval;
pub mod select;
pub mod server;
pub mod session;
pub mod transform;

pub mod prelude {
    pub use crate::config::LensConfig;
    pub use crate::error::{QueryLensError, Result};
    pub use crate::query::{Field, Keyword, Query};
    pub use crate::session::{LensEngine, LensRequest, LensResponse, Session};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
