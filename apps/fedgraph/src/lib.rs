//! # fedgraph
//!
//! The application layer over `fedgraph-core`: a clap CLI and an axum HTTP
//! API serving one federated store. Exposed as a library so the integration
//! tests can build the router directly.

pub mod api;
pub mod cli;
