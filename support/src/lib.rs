//! Shared primitives for the chi toolchain: node identifiers and the
//! accumulating [`Report`] diagnostic type that every fallible graph
//! operation returns.

pub mod id;
pub mod report;

pub use id::{IdSource, NodeId, parse_node_id};
pub use report::{Report, ReportEntry};
