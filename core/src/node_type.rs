//! Node types: the per-class description every node instance carries.
//!
//! A node type is a value: its signature (data and exec ports) is derived
//! once, at construction, from its [`NodeKind`] and whatever declaration the
//! kind references. Mutating a placed node means replacing its node type
//! through [`crate::GraphFunction::set_node_type`], never editing one in
//! place.

use serde_json::{Value, json};

use crate::data_type::NamedDataType;

/// What a node type *is*, with its per-instance configuration.
///
/// Signature derivation is a pure function of this tag plus the referenced
/// declaration, which keeps cloning trivial.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
	/// `lang:entry` — mirrors the containing function's inputs.
	Entry,
	/// `lang:exit` — mirrors the containing function's outputs.
	Exit,
	/// `lang:if` — one bool in, `True`/`False` exec outs.
	If,
	ConstInt(i32),
	ConstBool(bool),
	ConstFloat(f64),
	StrLiteral(String),
	/// A call to a C library symbol provided by the `c` module.
	CCall { symbol: String },
	/// A call to a graph function, possibly in another module.
	FuncCall { module: String, function: String },
	/// Build a struct value from its fields (pure).
	StructMake { name: String },
	/// Split a struct value into its fields (pure).
	StructBreak { name: String },
	/// Read a function-local variable (pure).
	LocalGet { local: String },
	/// Write a function-local variable.
	LocalSet { local: String },
}

/// One node class: identity, signature, and configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeType {
	module: String,
	name: String,
	description: String,
	data_inputs: Vec<NamedDataType>,
	data_outputs: Vec<NamedDataType>,
	exec_inputs: Vec<String>,
	exec_outputs: Vec<String>,
	kind: NodeKind,
}

impl NodeType {
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn new(
		module: impl Into<String>,
		name: impl Into<String>,
		description: impl Into<String>,
		kind: NodeKind,
		data_inputs: Vec<NamedDataType>,
		data_outputs: Vec<NamedDataType>,
		exec_inputs: Vec<String>,
		exec_outputs: Vec<String>,
	) -> Self {
		Self {
			module: module.into(),
			name: name.into(),
			description: description.into(),
			data_inputs,
			data_outputs,
			exec_inputs,
			exec_outputs,
			kind,
		}
	}

	/// A fresh `lang:entry` whose data outputs mirror `data` (the function's
	/// data inputs) and exec outputs mirror `exec` (the exec inputs).
	pub(crate) fn entry(data: Vec<NamedDataType>, exec: Vec<String>) -> Self {
		Self::new("lang", "entry", "The entry into a function", NodeKind::Entry, Vec::new(), data, Vec::new(), exec)
	}

	/// A fresh `lang:exit`; inputs mirror the function's outputs.
	pub(crate) fn exit(data: Vec<NamedDataType>, exec: Vec<String>) -> Self {
		Self::new("lang", "exit", "Return from a function", NodeKind::Exit, data, Vec::new(), exec, Vec::new())
	}

	pub fn module(&self) -> &str {
		&self.module
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	/// `"<module>:<name>"`.
	pub fn qualified_name(&self) -> String {
		format!("{}:{}", self.module, self.name)
	}

	pub fn data_inputs(&self) -> &[NamedDataType] {
		&self.data_inputs
	}

	pub fn data_outputs(&self) -> &[NamedDataType] {
		&self.data_outputs
	}

	pub fn exec_inputs(&self) -> &[String] {
		&self.exec_inputs
	}

	pub fn exec_outputs(&self) -> &[String] {
		&self.exec_outputs
	}

	pub fn kind(&self) -> &NodeKind {
		&self.kind
	}

	/// Pure nodes have no execution ports at all; they are lowered on demand
	/// when a consumer needs their output.
	pub fn pure(&self) -> bool {
		self.exec_inputs.is_empty() && self.exec_outputs.is_empty()
	}

	/// The configuration JSON this type round-trips through. Literal kinds
	/// emit their literal; entry/exit emit their port lists; everything
	/// synthesized recovers its identity from its qualified name and emits
	/// `{}`.
	pub fn to_json(&self) -> Value {
		match &self.kind {
			NodeKind::ConstInt(value) => json!(value),
			NodeKind::ConstBool(value) => json!(value),
			NodeKind::ConstFloat(value) => json!(value),
			NodeKind::StrLiteral(text) => json!(text),
			NodeKind::Entry => io_config(&self.data_outputs, &self.exec_outputs),
			NodeKind::Exit => io_config(&self.data_inputs, &self.exec_inputs),
			_ => json!({}),
		}
	}
}

/// The `{data, exec}` object entry/exit nodes are configured by: an ordered
/// list of single-entry `{docstring: "mod:type"}` objects plus exec names.
fn io_config(data: &[NamedDataType], exec: &[String]) -> Value {
	let data: Vec<Value> = data
		.iter()
		.map(|port| json!({ port.name.as_str(): port.ty.qualified_name() }))
		.collect();
	json!({ "data": data, "exec": exec })
}
