//! Debugger glue: the mapping between graph nodes and IR locations.
//!
//! Lowering stamps every emitted instruction with a source line taken from
//! the module-wide node/line association (`codegen::line_number_assoc`). A
//! debugger front-end works in nodes, the backend works in lines; this
//! module translates both ways and keeps a breakpoint set expressed in
//! either vocabulary.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use chi_ir as ir;
use chi_support::NodeId;

use crate::codegen::line_number_assoc;
use crate::graph_module::GraphModule;

/// Bidirectional node ↔ line association for one graph module.
#[derive(Debug)]
pub struct DebugAssoc {
	lines: FxHashMap<(String, NodeId), u32>,
	nodes: BTreeMap<u32, (String, NodeId)>,
}

impl DebugAssoc {
	pub fn build(module: &GraphModule) -> Self {
		let lines = line_number_assoc(module);
		let nodes = lines
			.iter()
			.map(|((function, id), line)| (*line, (function.clone(), *id)))
			.collect();
		Self { lines, nodes }
	}

	/// The debug line every IR instruction emitted for this node carries.
	pub fn line_for_node(&self, function: &str, id: NodeId) -> Option<u32> {
		self.lines.get(&(function.to_string(), id)).copied()
	}

	/// The node a debug line belongs to.
	pub fn node_for_line(&self, line: u32) -> Option<(&str, NodeId)> {
		self.nodes.get(&line).map(|(function, id)| (function.as_str(), *id))
	}
}

/// One concrete place in an IR module: function, block, instruction index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrLocation {
	pub function: String,
	pub block: String,
	pub instruction: usize,
}

/// Every instruction of `module` stamped with `line`, in emission order. A
/// node usually maps to several instructions (loads, the node's own code,
/// its terminator), so a node breakpoint covers all of them.
pub fn ir_locations(module: &ir::Module, line: u32) -> Vec<IrLocation> {
	let mut locations = Vec::new();
	for func in &module.functions {
		for block in &func.blocks {
			for (index, inst) in block.insts.iter().enumerate() {
				if inst.line == Some(line) {
					locations.push(IrLocation {
						function: func.name.clone(),
						block: block.label.clone(),
						instruction: index,
					});
				}
			}
		}
	}
	locations
}

/// A set of breakpoints, stored as debug lines.
#[derive(Debug, Default)]
pub struct BreakpointSet {
	lines: BTreeSet<u32>,
}

impl BreakpointSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Set a breakpoint on a node. Returns false when the node is unknown to
	/// the association (e.g. it was removed after the assoc was built).
	pub fn add_node(&mut self, assoc: &DebugAssoc, function: &str, id: NodeId) -> bool {
		match assoc.line_for_node(function, id) {
			Some(line) => self.lines.insert(line),
			None => false,
		}
	}

	pub fn remove_node(&mut self, assoc: &DebugAssoc, function: &str, id: NodeId) -> bool {
		match assoc.line_for_node(function, id) {
			Some(line) => self.lines.remove(&line),
			None => false,
		}
	}

	pub fn contains_line(&self, line: u32) -> bool {
		self.lines.contains(&line)
	}

	/// The breakpointed lines, ascending.
	pub fn lines(&self) -> impl Iterator<Item = u32> + '_ {
		self.lines.iter().copied()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::Value;

	use super::*;
	use crate::context::Context;
	use chi_support::Report;

	fn id(n: u128) -> NodeId {
		uuid::Uuid::from_u128(n)
	}

	/// entry -> strliteral -> puts -> exit, the usual smallest program.
	fn loaded_context() -> Context {
		let mut ctx = Context::new(".");
		{
			let module = ctx.new_graph_module("test/main");
			module.get_or_create_function("main", vec![], vec![], vec![String::new()], vec![String::new()]);
		}
		let mut report = Report::new();
		let hello = ctx
			.node_type_from_module("lang", "strliteral", &serde_json::json!("hi"), &mut report)
			.unwrap();
		let puts = ctx.node_type_from_module("c", "puts", &Value::Null, &mut report).unwrap();
		assert!(report.success(), "{report}");

		let func = ctx.graph_module_mut("test/main").unwrap().function_mut("main").unwrap();
		func.get_or_insert_entry_node(0.0, 0.0, Some(id(1)));
		func.insert_node(hello, 1.0, 0.0, Some(id(2)));
		func.insert_node(puts, 2.0, 0.0, Some(id(3)));
		let exit = func.create_exit_node_type();
		func.insert_node(exit, 3.0, 0.0, Some(id(4)));
		func.connect_exec(id(1), 0, id(2), 0);
		func.connect_exec(id(2), 0, id(3), 0);
		func.connect_exec(id(3), 0, id(4), 0);
		func.connect_data(id(2), 0, id(3), 0);
		ctx
	}

	#[test]
	fn assoc_is_bijective_over_the_module() {
		let ctx = loaded_context();
		let assoc = DebugAssoc::build(ctx.graph_module("test/main").unwrap());
		for node in [id(1), id(2), id(3), id(4)] {
			let line = assoc.line_for_node("main", node).unwrap();
			assert_eq!(assoc.node_for_line(line), Some(("main", node)));
		}
		assert_eq!(assoc.node_for_line(99), None);
	}

	#[test]
	fn node_breakpoints_resolve_to_ir_locations() {
		let ctx = loaded_context();
		let module = ctx.graph_module("test/main").unwrap();
		let assoc = DebugAssoc::build(module);

		let mut report = Report::new();
		let ir_module = ctx.compile_module("test/main", &mut report).expect("compiles");
		assert!(report.success(), "{report}");

		let mut breakpoints = BreakpointSet::new();
		assert!(breakpoints.add_node(&assoc, "main", id(3)));
		assert!(!breakpoints.add_node(&assoc, "main", id(77)));

		let line = assoc.line_for_node("main", id(3)).unwrap();
		assert!(breakpoints.contains_line(line));

		// The puts node emitted at least its load, call, result store and
		// branch, all inside the lowered main function.
		let locations = ir_locations(&ir_module, line);
		assert!(locations.len() >= 3, "{locations:?}");
		assert!(locations.iter().all(|location| location.function == "test/main.main"));

		assert!(breakpoints.remove_node(&assoc, "main", id(3)));
		assert!(!breakpoints.contains_line(line));
	}
}
