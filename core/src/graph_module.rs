//! User-defined modules of graph functions and struct declarations.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use chi_support::Report;

use crate::context::Context;
use crate::data_type::{DataType, NamedDataType};
use crate::graph_function::GraphFunction;
use crate::graph_struct::GraphStruct;
use crate::module::ChiModule;
use crate::node_type::{NodeKind, NodeType};

/// A module authored as graphs: functions, struct declarations, and the
/// synthesized node types both give rise to (one call node type per
/// function, `_make_`/`_break_` per struct, `_get_`/`_set_` per local).
///
/// Synthesis is by name at resolution time, so editing a declaration never
/// leaves a stale registration behind: the next resolution sees the current
/// signature.
#[derive(Debug)]
pub struct GraphModule {
	full_name: String,
	dependencies: BTreeSet<String>,
	functions: Vec<GraphFunction>,
	structs: Vec<GraphStruct>,
	source_path: PathBuf,
}

impl GraphModule {
	pub(crate) fn new(full_name: impl Into<String>, source_path: PathBuf) -> Self {
		Self {
			full_name: full_name.into(),
			dependencies: BTreeSet::new(),
			functions: Vec::new(),
			structs: Vec::new(),
			source_path,
		}
	}

	/// Where this module was loaded from (or will be saved to).
	pub fn source_path(&self) -> &Path {
		&self.source_path
	}

	pub(crate) fn set_source_path(&mut self, path: PathBuf) {
		self.source_path = path;
	}

	pub fn add_dependency(&mut self, full_name: impl Into<String>) {
		self.dependencies.insert(full_name.into());
	}

	// Functions
	////////////

	pub fn functions(&self) -> &[GraphFunction] {
		&self.functions
	}

	pub fn function_from_name(&self, name: &str) -> Option<&GraphFunction> {
		self.functions.iter().find(|func| func.name() == name)
	}

	pub fn function_mut(&mut self, name: &str) -> Option<&mut GraphFunction> {
		self.functions.iter_mut().find(|func| func.name() == name)
	}

	/// Return the function by this name, or create it with the given
	/// signature. The flag is true when a new function was created.
	pub fn get_or_create_function(
		&mut self,
		name: &str,
		data_inputs: Vec<NamedDataType>,
		data_outputs: Vec<NamedDataType>,
		exec_inputs: Vec<String>,
		exec_outputs: Vec<String>,
	) -> (&mut GraphFunction, bool) {
		if let Some(position) = self.functions.iter().position(|func| func.name() == name) {
			return (&mut self.functions[position], false);
		}
		self.functions.push(GraphFunction::new(
			self.full_name.clone(),
			name,
			data_inputs,
			data_outputs,
			exec_inputs,
			exec_outputs,
		));
		(self.functions.last_mut().expect("just pushed"), true)
	}

	pub fn remove_function(&mut self, name: &str) -> bool {
		let before = self.functions.len();
		self.functions.retain(|func| func.name() != name);
		before != self.functions.len()
	}

	// Structs
	//////////

	pub fn structs(&self) -> &[GraphStruct] {
		&self.structs
	}

	pub fn struct_from_name(&self, name: &str) -> Option<&GraphStruct> {
		self.structs.iter().find(|decl| decl.name() == name)
	}

	pub fn struct_mut(&mut self, name: &str) -> Option<&mut GraphStruct> {
		self.structs.iter_mut().find(|decl| decl.name() == name)
	}

	pub fn get_or_create_struct(&mut self, name: &str) -> &mut GraphStruct {
		if let Some(position) = self.structs.iter().position(|decl| decl.name() == name) {
			return &mut self.structs[position];
		}
		self.structs.push(GraphStruct::new(name));
		self.structs.last_mut().expect("just pushed")
	}

	pub fn remove_struct(&mut self, name: &str) -> bool {
		let before = self.structs.len();
		self.structs.retain(|decl| decl.name() != name);
		before != self.structs.len()
	}

	// Local variables
	//
	// Declarations live on the function; the module owns these operations
	// because the synthesized `_get_`/`_set_` node types are module-level,
	// so instances in *any* function of the module must be swept.
	//////////////////////////////////////////////////////////////////////

	/// Remove a local declared in `function` and every `_get_`/`_set_` node
	/// instance that referenced it anywhere in the module. Disconnect
	/// problems from the removals are collected, not fatal.
	pub fn remove_local(&mut self, function: &str, name: &str) -> (bool, Report) {
		let mut report = Report::new();
		if self.function_from_name(function).is_none() {
			report.add_entry(
				"EUKN",
				"Could not find function in module",
				json!({ "Module": self.full_name, "Requested Function": function }),
			);
			return (false, report);
		}
		let func = self.function_mut(function).expect("checked above");
		if !func.remove_local_declaration(name) {
			return (false, report);
		}

		let module_name = self.full_name.clone();
		let getter = format!("_get_{name}");
		let setter = format!("_set_{name}");
		for func in &mut self.functions {
			for id in func.nodes_with_type(&module_name, &getter) {
				report += func.remove_node(id);
			}
			for id in func.nodes_with_type(&module_name, &setter) {
				report += func.remove_node(id);
			}
		}
		(true, report)
	}

	/// Rename a local. No-op (returns false) when `old` does not exist or
	/// `new` already does. Existing getter/setter instances are retyped to
	/// the new name; their connections survive because the value types are
	/// unchanged.
	pub fn rename_local(&mut self, function: &str, old: &str, new: &str) -> bool {
		let Some(func) = self.function_mut(function) else {
			return false;
		};
		if !func.rename_local_declaration(old, new) {
			return false;
		}
		let local = func.local_variable(new).expect("just renamed").clone();

		let module_name = self.full_name.clone();
		let getter = format!("_get_{old}");
		let setter = format!("_set_{old}");
		for func in &mut self.functions {
			for id in func.nodes_with_type(&module_name, &getter) {
				func.set_node_type(id, local_get_node_type(&module_name, &local));
			}
			for id in func.nodes_with_type(&module_name, &setter) {
				func.set_node_type(id, local_set_node_type(&module_name, &local));
			}
		}
		true
	}

	/// Change a local's type. Getter/setter instances get fresh node types
	/// with the new signature; data edges that no longer type-check are
	/// disconnected in the process.
	pub fn retype_local(&mut self, function: &str, name: &str, new_type: DataType) -> (bool, Report) {
		let mut report = Report::new();
		let Some(func) = self.function_mut(function) else {
			return (false, report);
		};
		if !func.retype_local_declaration(name, new_type) {
			return (false, report);
		}
		let local = func.local_variable(name).expect("just retyped").clone();

		let module_name = self.full_name.clone();
		let getter = format!("_get_{name}");
		let setter = format!("_set_{name}");
		for func in &mut self.functions {
			for id in func.nodes_with_type(&module_name, &getter) {
				report += func.set_node_type(id, local_get_node_type(&module_name, &local));
			}
			for id in func.nodes_with_type(&module_name, &setter) {
				report += func.set_node_type(id, local_set_node_type(&module_name, &local));
			}
		}
		(true, report)
	}

	/// Serialize back to the module's source path.
	pub fn save_to_disk(&self) -> Report {
		let mut report = Report::new();
		if let Some(parent) = self.source_path.parent()
			&& let Err(error) = std::fs::create_dir_all(parent)
		{
			report.add_entry(
				"EUKN",
				"Failed to create directories in workspace",
				json!({ "Module File": self.source_path.display().to_string(), "Error": error.to_string() }),
			);
			return report;
		}
		let value = crate::json::serialize::graph_module_to_json(self);
		let text = serde_json::to_string_pretty(&value).expect("serializable value");
		if let Err(error) = std::fs::write(&self.source_path, text) {
			report.add_entry(
				"EUKN",
				"Failed to write module file",
				json!({ "Module File": self.source_path.display().to_string(), "Error": error.to_string() }),
			);
		}
		report
	}

	// Node type synthesis
	//////////////////////

	fn func_call_node_type(&self, func: &GraphFunction) -> NodeType {
		NodeType::new(
			&self.full_name,
			func.name(),
			func.description(),
			NodeKind::FuncCall {
				module: self.full_name.clone(),
				function: func.name().to_string(),
			},
			func.data_inputs().to_vec(),
			func.data_outputs().to_vec(),
			func.exec_inputs().to_vec(),
			func.exec_outputs().to_vec(),
		)
	}

	fn make_node_type(&self, decl: &GraphStruct) -> Option<NodeType> {
		let ty = decl.data_type(&self.full_name)?;
		Some(NodeType::new(
			&self.full_name,
			format!("_make_{}", decl.name()),
			format!("Make a {}", decl.name()),
			NodeKind::StructMake { name: decl.name().to_string() },
			decl.fields().to_vec(),
			vec![NamedDataType::new(decl.name(), ty)],
			Vec::new(),
			Vec::new(),
		))
	}

	fn break_node_type(&self, decl: &GraphStruct) -> Option<NodeType> {
		let ty = decl.data_type(&self.full_name)?;
		Some(NodeType::new(
			&self.full_name,
			format!("_break_{}", decl.name()),
			format!("Break a {}", decl.name()),
			NodeKind::StructBreak { name: decl.name().to_string() },
			vec![NamedDataType::new(decl.name(), ty)],
			decl.fields().to_vec(),
			Vec::new(),
			Vec::new(),
		))
	}

	/// Find a local declaration by name anywhere in the module (function
	/// declaration order decides ties).
	fn local_from_name(&self, name: &str) -> Option<&NamedDataType> {
		self.functions.iter().find_map(|func| func.local_variable(name))
	}
}

/// The pure getter node type for a local.
pub(crate) fn local_get_node_type(module: &str, local: &NamedDataType) -> NodeType {
	NodeType::new(
		module,
		format!("_get_{}", local.name),
		format!("Get the local variable {}", local.name),
		NodeKind::LocalGet { local: local.name.clone() },
		Vec::new(),
		vec![local.clone()],
		Vec::new(),
		Vec::new(),
	)
}

/// The setter node type for a local: one exec in/out, one data input.
pub(crate) fn local_set_node_type(module: &str, local: &NamedDataType) -> NodeType {
	NodeType::new(
		module,
		format!("_set_{}", local.name),
		format!("Set the local variable {}", local.name),
		NodeKind::LocalSet { local: local.name.clone() },
		vec![local.clone()],
		Vec::new(),
		vec![String::new()],
		vec![String::new()],
	)
}

impl ChiModule for GraphModule {
	fn full_name(&self) -> &str {
		&self.full_name
	}

	fn dependencies(&self) -> &BTreeSet<String> {
		&self.dependencies
	}

	fn type_names(&self) -> Vec<String> {
		self.structs.iter().map(|decl| decl.name().to_string()).collect()
	}

	fn node_type_names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.functions.iter().map(|func| func.name().to_string()).collect();
		for decl in &self.structs {
			names.push(format!("_make_{}", decl.name()));
			names.push(format!("_break_{}", decl.name()));
		}
		for func in &self.functions {
			for local in func.local_variables() {
				names.push(format!("_get_{}", local.name));
				names.push(format!("_set_{}", local.name));
			}
		}
		names.sort();
		names
	}

	fn type_from_name(&self, name: &str) -> Option<DataType> {
		self.struct_from_name(name)?.data_type(&self.full_name)
	}

	fn node_type_from_name(&self, _ctx: &Context, name: &str, _config: &Value, report: &mut Report) -> Option<NodeType> {
		if let Some(local) = name.strip_prefix("_get_")
			&& let Some(local) = self.local_from_name(local)
		{
			return Some(local_get_node_type(&self.full_name, local));
		}
		if let Some(local) = name.strip_prefix("_set_")
			&& let Some(local) = self.local_from_name(local)
		{
			return Some(local_set_node_type(&self.full_name, local));
		}
		if let Some(decl) = name.strip_prefix("_make_")
			&& let Some(decl) = self.struct_from_name(decl)
		{
			return self.make_node_type(decl);
		}
		if let Some(decl) = name.strip_prefix("_break_")
			&& let Some(decl) = self.struct_from_name(decl)
		{
			return self.break_node_type(decl);
		}
		if let Some(func) = self.function_from_name(name) {
			return Some(self.func_call_node_type(func));
		}
		report.add_entry(
			"EUKN",
			"Graph not found in module",
			json!({ "Module Name": self.full_name, "Requested Node Type": name }),
		);
		None
	}

	fn as_graph(&self) -> Option<&GraphModule> {
		Some(self)
	}

	fn as_graph_mut(&mut self) -> Option<&mut GraphModule> {
		Some(self)
	}
}
