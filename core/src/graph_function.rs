//! The graph function: the unit of compilation.
//!
//! A function owns its node table and its signature (data/exec inputs and
//! outputs) plus local variable declarations. Every edit operation leaves the
//! function satisfying the structural invariants: slot vectors sized to each
//! node's type, connections symmetric, and any `lang:entry`/`lang:exit`
//! nodes mirroring the function's current signature.

use rustc_hash::FxHashMap;
use serde_json::json;
use uuid::Uuid;

use chi_ir as ir;
use chi_support::{NodeId, Report};

use crate::data_type::{DataType, NamedDataType};
use crate::node_instance::NodeInstance;
use crate::node_type::NodeType;

/// A directed graph of typed nodes plus the signature it compiles to.
#[derive(Clone, Debug)]
pub struct GraphFunction {
	module: String,
	name: String,
	description: String,
	data_inputs: Vec<NamedDataType>,
	data_outputs: Vec<NamedDataType>,
	exec_inputs: Vec<String>,
	exec_outputs: Vec<String>,
	local_variables: Vec<NamedDataType>,
	nodes: FxHashMap<NodeId, NodeInstance>,
}

impl GraphFunction {
	pub(crate) fn new(
		module: impl Into<String>,
		name: impl Into<String>,
		data_inputs: Vec<NamedDataType>,
		data_outputs: Vec<NamedDataType>,
		exec_inputs: Vec<String>,
		exec_outputs: Vec<String>,
	) -> Self {
		Self {
			module: module.into(),
			name: name.into(),
			description: String::new(),
			data_inputs,
			data_outputs,
			exec_inputs,
			exec_outputs,
			local_variables: Vec::new(),
			nodes: FxHashMap::default(),
		}
	}

	/// Full name of the containing module.
	pub fn module(&self) -> &str {
		&self.module
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	pub fn set_description(&mut self, description: impl Into<String>) {
		self.description = description.into();
	}

	// Node access
	//////////////

	pub fn node(&self, id: NodeId) -> Option<&NodeInstance> {
		self.nodes.get(&id)
	}

	/// Mutable node access; position is the only thing callers can move this
	/// way — structural edits go through the function so invariants hold.
	pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeInstance> {
		self.nodes.get_mut(&id)
	}

	pub fn nodes(&self) -> impl Iterator<Item = &NodeInstance> {
		self.nodes.values()
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Node ids in a stable (sorted) order. Iteration order of the table
	/// itself is unspecified; everything that must be deterministic goes
	/// through this.
	pub fn node_ids(&self) -> Vec<NodeId> {
		let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
		ids.sort();
		ids
	}

	/// All nodes of the qualified type `module:name`, sorted by id.
	pub fn nodes_with_type(&self, module: &str, name: &str) -> Vec<NodeId> {
		let mut ids: Vec<NodeId> = self
			.nodes
			.values()
			.filter(|node| node.node_type().module() == module && node.node_type().name() == name)
			.map(NodeInstance::id)
			.collect();
		ids.sort();
		ids
	}

	/// The unique `lang:entry` node whose signature matches the function, or
	/// `None` — also `None` when the entry is duplicated, which is illegal.
	pub fn entry_node(&self) -> Option<NodeId> {
		let matching = self.nodes_with_type("lang", "entry");
		let [single] = matching.as_slice() else {
			return None;
		};
		let ty = self.nodes[single].node_type();
		if ty.data_outputs() == self.data_inputs.as_slice() && ty.exec_outputs() == self.exec_inputs.as_slice() {
			Some(*single)
		} else {
			None
		}
	}

	// Node manipulation
	////////////////////

	/// Add a node with the given owned type. A fresh id is generated when
	/// `id` is `None`; a colliding id fails with `EUKN` and inserts nothing.
	pub fn insert_node(&mut self, ty: NodeType, x: f32, y: f32, id: Option<NodeId>) -> (Option<NodeId>, Report) {
		let mut report = Report::new();
		let id = id.unwrap_or_else(Uuid::new_v4);
		if self.nodes.contains_key(&id) {
			report.add_entry(
				"EUKN",
				"Cannot insert node: id already exists in function",
				json!({ "Function": self.name, "Node ID": id.to_string() }),
			);
			return (None, report);
		}
		self.nodes.insert(id, NodeInstance::new(id, ty, x, y));
		(Some(id), report)
	}

	/// Remove a node, severing every incident connection first. Severing
	/// problems are collected but do not stop the removal.
	pub fn remove_node(&mut self, id: NodeId) -> Report {
		let mut report = Report::new();
		let Some(node) = self.nodes.get(&id) else {
			report.add_entry(
				"EUKN",
				"Cannot remove node that is not in the function",
				json!({ "Function": self.name, "Node ID": id.to_string() }),
			);
			return report;
		};

		// Incoming exec: disconnect from each predecessor's output slot.
		let incoming_exec: Vec<(NodeId, usize)> = node.input_exec.iter().flatten().copied().collect();
		for (source, source_slot) in incoming_exec {
			report += self.disconnect_exec(source, source_slot);
		}
		// Outgoing exec.
		let out_exec_len = self.nodes[&id].output_exec.len();
		for slot in 0..out_exec_len {
			if self.nodes[&id].output_exec[slot].is_some() {
				report += self.disconnect_exec(id, slot);
			}
		}
		// Incoming data: disconnect from each producer.
		let incoming_data: Vec<(NodeId, usize)> = self.nodes[&id].input_data.iter().flatten().copied().collect();
		for (producer, producer_slot) in incoming_data {
			report += self.disconnect_data(producer, producer_slot, id);
		}
		// Outgoing data.
		for slot in 0..self.nodes[&id].output_data.len() {
			let consumers: Vec<NodeId> = self.nodes[&id].output_data[slot].iter().map(|(node, _)| *node).collect();
			for consumer in consumers {
				report += self.disconnect_data(id, slot, consumer);
			}
		}

		self.nodes.remove(&id);
		report
	}

	/// Replace a node's type, disconnecting exactly the incident edges the
	/// new signature cannot keep: slots beyond the new count, and data slots
	/// whose declared type changed.
	pub fn set_node_type(&mut self, id: NodeId, new_type: NodeType) -> Report {
		let mut report = Report::new();
		let Some(node) = self.nodes.get(&id) else {
			report.add_entry(
				"EUKN",
				"Cannot set type of node that is not in the function",
				json!({ "Function": self.name, "Node ID": id.to_string() }),
			);
			return report;
		};
		let old_type = node.node_type().clone();

		for slot in new_type.exec_inputs().len()..old_type.exec_inputs().len() {
			let incoming = self.nodes[&id].input_exec[slot].clone();
			for (source, source_slot) in incoming {
				report += self.disconnect_exec(source, source_slot);
			}
		}
		for slot in new_type.exec_outputs().len()..old_type.exec_outputs().len() {
			if self.nodes[&id].output_exec[slot].is_some() {
				report += self.disconnect_exec(id, slot);
			}
		}
		for slot in 0..old_type.data_inputs().len() {
			let Some((producer, producer_slot)) = self.nodes[&id].input_data[slot] else {
				continue;
			};
			let keeps = new_type
				.data_inputs()
				.get(slot)
				.is_some_and(|port| port.ty == old_type.data_inputs()[slot].ty);
			if !keeps {
				report += self.disconnect_data(producer, producer_slot, id);
			}
		}
		for slot in 0..old_type.data_outputs().len() {
			let keeps = new_type
				.data_outputs()
				.get(slot)
				.is_some_and(|port| port.ty == old_type.data_outputs()[slot].ty);
			if keeps {
				continue;
			}
			let consumers: Vec<NodeId> = self.nodes[&id].output_data[slot].iter().map(|(node, _)| *node).collect();
			for consumer in consumers {
				report += self.disconnect_data(id, slot, consumer);
			}
		}

		self.nodes.get_mut(&id).expect("checked above").install_type(new_type);
		report
	}

	// Entry and exit node types
	////////////////////////////

	/// A fresh `lang:entry` type mirroring the current signature.
	pub fn create_entry_node_type(&self) -> NodeType {
		NodeType::entry(self.data_inputs.clone(), self.exec_inputs.clone())
	}

	/// A fresh `lang:exit` type mirroring the current signature.
	pub fn create_exit_node_type(&self) -> NodeType {
		NodeType::exit(self.data_outputs.clone(), self.exec_outputs.clone())
	}

	/// Return the existing entry node or insert one at the given position.
	pub fn get_or_insert_entry_node(&mut self, x: f32, y: f32, id: Option<NodeId>) -> (Option<NodeId>, Report) {
		if let Some(entry) = self.entry_node() {
			return (Some(entry), Report::new());
		}
		let ty = self.create_entry_node_type();
		self.insert_node(ty, x, y, id)
	}

	/// The IR signature this function lowers to:
	/// `(i32 exec_input, data_ins..., *data_outs...) -> i32`. `None` when a
	/// port's backend type is missing (invalid data type).
	pub fn function_type(&self) -> Option<(Vec<ir::Type>, ir::Type)> {
		let mut params = Vec::with_capacity(1 + self.data_inputs.len() + self.data_outputs.len());
		params.push(ir::Type::I32);
		for port in &self.data_inputs {
			params.push(port.ty.backend()?.clone());
		}
		for port in &self.data_outputs {
			params.push(port.ty.backend()?.clone().pointer_to());
		}
		Some((params, ir::Type::I32))
	}

	// Data input modifiers
	///////////////////////

	pub fn data_inputs(&self) -> &[NamedDataType] {
		&self.data_inputs
	}

	/// Insert before `before`, clipped to the end of the list.
	pub fn add_data_input(&mut self, ty: DataType, name: &str, before: usize) {
		let index = before.min(self.data_inputs.len());
		self.data_inputs.insert(index, NamedDataType::new(name, ty));
		self.update_entries();
	}

	/// Out-of-range indices are a no-op.
	pub fn remove_data_input(&mut self, index: usize) {
		if index < self.data_inputs.len() {
			self.data_inputs.remove(index);
		}
		self.update_entries();
	}

	pub fn rename_data_input(&mut self, index: usize, new_name: &str) {
		if let Some(port) = self.data_inputs.get_mut(index) {
			port.name = new_name.to_string();
		}
		self.update_entries();
	}

	pub fn retype_data_input(&mut self, index: usize, new_type: DataType) {
		if let Some(port) = self.data_inputs.get_mut(index) {
			port.ty = new_type;
		}
		self.update_entries();
	}

	// Data output modifiers
	////////////////////////

	pub fn data_outputs(&self) -> &[NamedDataType] {
		&self.data_outputs
	}

	pub fn add_data_output(&mut self, ty: DataType, name: &str, before: usize) {
		let index = before.min(self.data_outputs.len());
		self.data_outputs.insert(index, NamedDataType::new(name, ty));
		self.update_exits();
	}

	pub fn remove_data_output(&mut self, index: usize) {
		if index < self.data_outputs.len() {
			self.data_outputs.remove(index);
		}
		self.update_exits();
	}

	pub fn rename_data_output(&mut self, index: usize, new_name: &str) {
		if let Some(port) = self.data_outputs.get_mut(index) {
			port.name = new_name.to_string();
		}
		self.update_exits();
	}

	pub fn retype_data_output(&mut self, index: usize, new_type: DataType) {
		if let Some(port) = self.data_outputs.get_mut(index) {
			port.ty = new_type;
		}
		self.update_exits();
	}

	// Exec input modifiers
	///////////////////////

	pub fn exec_inputs(&self) -> &[String] {
		&self.exec_inputs
	}

	pub fn add_exec_input(&mut self, name: &str, before: usize) {
		let index = before.min(self.exec_inputs.len());
		self.exec_inputs.insert(index, name.to_string());
		self.update_entries();
	}

	pub fn remove_exec_input(&mut self, index: usize) {
		if index < self.exec_inputs.len() {
			self.exec_inputs.remove(index);
		}
		self.update_entries();
	}

	pub fn rename_exec_input(&mut self, index: usize, new_name: &str) {
		if let Some(name) = self.exec_inputs.get_mut(index) {
			*name = new_name.to_string();
		}
		self.update_entries();
	}

	// Exec output modifiers
	////////////////////////

	pub fn exec_outputs(&self) -> &[String] {
		&self.exec_outputs
	}

	pub fn add_exec_output(&mut self, name: &str, before: usize) {
		let index = before.min(self.exec_outputs.len());
		self.exec_outputs.insert(index, name.to_string());
		self.update_exits();
	}

	pub fn remove_exec_output(&mut self, index: usize) {
		if index < self.exec_outputs.len() {
			self.exec_outputs.remove(index);
		}
		self.update_exits();
	}

	pub fn rename_exec_output(&mut self, index: usize, new_name: &str) {
		if let Some(name) = self.exec_outputs.get_mut(index) {
			*name = new_name.to_string();
		}
		self.update_exits();
	}

	// Local variables
	//////////////////

	pub fn local_variables(&self) -> &[NamedDataType] {
		&self.local_variables
	}

	pub fn local_variable(&self, name: &str) -> Option<&NamedDataType> {
		self.local_variables.iter().find(|local| local.name == name)
	}

	/// Return the existing local by this name (its type untouched), or
	/// append a new declaration. The `_get_<name>`/`_set_<name>` node types
	/// become resolvable in the containing module from this point on.
	pub fn get_or_create_local(&mut self, name: &str, ty: DataType) -> (NamedDataType, bool) {
		if let Some(existing) = self.local_variable(name) {
			return (existing.clone(), false);
		}
		let local = NamedDataType::new(name, ty);
		self.local_variables.push(local.clone());
		(local, true)
	}

	pub(crate) fn remove_local_declaration(&mut self, name: &str) -> bool {
		let before = self.local_variables.len();
		self.local_variables.retain(|local| local.name != name);
		before != self.local_variables.len()
	}

	pub(crate) fn rename_local_declaration(&mut self, old: &str, new: &str) -> bool {
		if self.local_variable(new).is_some() {
			return false;
		}
		match self.local_variables.iter_mut().find(|local| local.name == old) {
			Some(local) => {
				local.name = new.to_string();
				true
			}
			None => false,
		}
	}

	pub(crate) fn retype_local_declaration(&mut self, name: &str, new_type: DataType) -> bool {
		match self.local_variables.iter_mut().find(|local| local.name == name) {
			Some(local) => {
				local.ty = new_type;
				true
			}
			None => false,
		}
	}

	// Entry/exit propagation
	/////////////////////////

	/// Rebuild every `lang:entry` node's type from the function's current
	/// signature. Connections whose types survived are kept.
	pub(crate) fn update_entries(&mut self) {
		let fresh = self.create_entry_node_type();
		for id in self.nodes_with_type("lang", "entry") {
			self.set_node_type(id, fresh.clone());
		}
	}

	/// Rebuild every `lang:exit` node's type likewise.
	pub(crate) fn update_exits(&mut self) {
		let fresh = self.create_exit_node_type();
		for id in self.nodes_with_type("lang", "exit") {
			self.set_node_type(id, fresh.clone());
		}
	}
}
