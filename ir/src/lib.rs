//! The SSA intermediate representation the chi compiler lowers graph
//! functions into.
//!
//! The IR is deliberately small: typed values, basic blocks with a single
//! terminator, allocas, loads/stores, calls, aggregate insert/extract, and
//! the three branch forms. It exists in three interchangeable shapes:
//!
//! - an in-memory [`Module`] built through the builder methods on
//!   [`Function`],
//! - an LLVM-flavoured textual form ([`fmt::Display`] on [`Module`], read
//!   back by [`parse::parse_module`]),
//! - a compact binary form ([`binary::encode`] / [`binary::decode`]).
//!
//! [`interp::run_main`] executes a module directly, which is what
//! `chi interpret` and `chi run` are built on.
//!
//! [`fmt::Display`]: std::fmt::Display

pub mod binary;
pub mod instruction;
pub mod interp;
pub mod module;
pub mod parse;
pub mod text;
pub mod types;
pub mod value;
pub mod verify;

pub use instruction::{Inst, Op};
pub use module::{Block, Function, Global, Module};
pub use types::Type;
pub use value::{BlockId, GlobalId, Operand, ValueId};
