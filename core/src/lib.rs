//! The chi graph model and compiler.
//!
//! Programs are directed graphs of typed nodes. *Execution* edges order side
//! effects; *data* edges carry typed values. A [`Context`] owns the loaded
//! modules: the builtin `lang` and `c` modules plus any number of
//! [`GraphModule`]s loaded from `.chimod` JSON files. Each graph module holds
//! [`GraphFunction`]s — the unit of compilation — which lower one-for-one
//! into functions of a [`chi_ir::Module`].
//!
//! The crate is organised the way data flows: the type system
//! ([`data_type`], [`node_type`]) feeds the module registry ([`module`],
//! [`lang`], [`clib`], [`context`]), user graphs live in [`graph_module`] /
//! [`graph_function`] / [`node_instance`] with the connection engine in
//! [`connection`], and [`validator`] gates [`codegen`]. [`json`] round-trips
//! all of it.

pub mod clib;
pub mod codegen;
pub mod connection;
pub mod context;
pub mod data_type;
pub mod debug;
pub mod graph_function;
pub mod graph_module;
pub mod graph_struct;
pub mod json;
pub mod lang;
pub mod module;
pub mod node_instance;
pub mod node_type;
pub mod validator;

pub use chi_support::{IdSource, NodeId, Report};
pub use context::Context;
pub use data_type::{DataType, NamedDataType, split_qualified};
pub use graph_function::GraphFunction;
pub use graph_module::GraphModule;
pub use graph_struct::GraphStruct;
pub use module::ChiModule;
pub use node_instance::NodeInstance;
pub use node_type::{NodeKind, NodeType};
