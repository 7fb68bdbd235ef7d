//! The `.chimod` JSON format: total round-trip of a graph module.
//!
//! Loading and re-saving a module produces semantically equal JSON: the
//! `nodes` map is unordered, `connections` is a set, positions compare
//! within 1e-5, and everything else is byte-stable.

pub mod deserialize;
pub mod serialize;

pub use deserialize::load_graph_module;
pub use serialize::{graph_function_to_json, graph_module_to_json};
