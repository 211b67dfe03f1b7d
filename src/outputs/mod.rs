//! Durable outputs for pipeline runs.
//!
//! The JSON batch files written here are the contract between the
//! pipeline and any downstream ingester; see [`json::ResultSink`].

pub mod json;

pub use json::ResultSink;
