//! The builtin `c` module: node types that call into the C library.
//!
//! Only a curated set of symbols is exposed. Lowering declares the symbol in
//! the IR module and calls it; the interpreter implements the same set
//! natively, so `chi run` works without linking anything.

use std::collections::BTreeSet;

use serde_json::{Value, json};

use chi_support::Report;

use crate::context::Context;
use crate::data_type::NamedDataType;
use crate::module::ChiModule;
use crate::node_type::{NodeKind, NodeType};

#[derive(Debug, Default)]
pub struct CModule {
	dependencies: BTreeSet<String>,
}

impl CModule {
	pub fn new() -> Self {
		Self::default()
	}
}

impl ChiModule for CModule {
	fn full_name(&self) -> &str {
		"c"
	}

	fn dependencies(&self) -> &BTreeSet<String> {
		&self.dependencies
	}

	fn type_names(&self) -> Vec<String> {
		Vec::new()
	}

	fn node_type_names(&self) -> Vec<String> {
		vec!["putchar".into(), "puts".into()]
	}

	fn type_from_name(&self, _name: &str) -> Option<crate::data_type::DataType> {
		None
	}

	fn node_type_from_name(&self, ctx: &Context, name: &str, _config: &Value, report: &mut Report) -> Option<NodeType> {
		let mut lang = |type_name: &str| ctx.type_from_module("lang", type_name, report);
		match name {
			"puts" => {
				let string = lang("i8*")?;
				let int = lang("i32")?;
				Some(NodeType::new(
					"c",
					"puts",
					"Write a string and a newline to stdout",
					NodeKind::CCall { symbol: "puts".into() },
					vec![NamedDataType::new("string", string)],
					vec![NamedDataType::new("result", int)],
					vec![String::new()],
					vec![String::new()],
				))
			}
			"putchar" => {
				let int = lang("i32")?;
				Some(NodeType::new(
					"c",
					"putchar",
					"Write one character to stdout",
					NodeKind::CCall { symbol: "putchar".into() },
					vec![NamedDataType::new("character", int.clone())],
					vec![NamedDataType::new("result", int)],
					vec![String::new()],
					vec![String::new()],
				))
			}
			_ => {
				report.add_entry(
					"E37",
					"Failed to find node in module",
					json!({ "Module": "c", "Requested Node Type": name }),
				);
				None
			}
		}
	}
}
