//! The connection engine: the four primitives every edit ultimately goes
//! through. All of them keep the two endpoint records symmetric — for every
//! forward entry there is exactly one matching back-pointer.

use serde_json::{Value, json};

use chi_support::{NodeId, Report};

use crate::data_type::NamedDataType;
use crate::graph_function::GraphFunction;

/// Diagnostic payload: the data ports of a node as `[{name: "mod:type"}]`.
fn data_ports_json(ports: &[NamedDataType]) -> Value {
	Value::Array(
		ports
			.iter()
			.map(|port| json!({ port.name.as_str(): port.ty.qualified_name() }))
			.collect(),
	)
}

impl GraphFunction {
	/// Connect a data output of `lhs` to a data input of `rhs`.
	///
	/// A consumer slot holds one producer, so an existing connection on
	/// `rhs`'s slot is implicitly disconnected first.
	pub fn connect_data(&mut self, lhs: NodeId, lhs_slot: usize, rhs: NodeId, rhs_slot: usize) -> Report {
		let mut report = Report::new();
		if !self.nodes_in_function(&mut report, lhs, rhs, "connect") {
			return report;
		}

		let lhs_type = self.node(lhs).expect("checked").node_type();
		let rhs_type = self.node(rhs).expect("checked").node_type();
		if lhs_slot >= lhs_type.data_outputs().len() {
			report.add_entry(
				"E22",
				"Output data connection doesn't exist in node",
				json!({
					"Requested ID": lhs_slot,
					"Node Type": lhs_type.qualified_name(),
					"Node JSON": lhs_type.to_json(),
					"Node Output Data Connections": data_ports_json(lhs_type.data_outputs()),
				}),
			);
		}
		if rhs_slot >= rhs_type.data_inputs().len() {
			report.add_entry(
				"E23",
				"Input data connection doesn't exist in node",
				json!({
					"Requested ID": rhs_slot,
					"Node Type": rhs_type.qualified_name(),
					"Node JSON": rhs_type.to_json(),
					"Node Input Data Connections": data_ports_json(rhs_type.data_inputs()),
				}),
			);
		}
		if !report.success() {
			return report;
		}

		let lhs_ty = &lhs_type.data_outputs()[lhs_slot].ty;
		let rhs_ty = &rhs_type.data_inputs()[rhs_slot].ty;
		if lhs_ty != rhs_ty {
			report.add_entry(
				"E24",
				"Connecting data nodes with different types is invalid",
				json!({
					"Left Hand Type": lhs_ty.qualified_name(),
					"Right Hand Type": rhs_ty.qualified_name(),
				}),
			);
			return report;
		}

		// Single fan-in: displace whatever was feeding this input.
		if let Some((producer, producer_slot)) = self.node(rhs).expect("checked").input_data[rhs_slot] {
			report += self.disconnect_data(producer, producer_slot, rhs);
			if !report.success() {
				return report;
			}
		}

		self.node_mut(lhs).expect("checked").output_data[lhs_slot].push((rhs, rhs_slot));
		self.node_mut(rhs).expect("checked").input_data[rhs_slot] = Some((lhs, lhs_slot));
		report
	}

	/// Connect an exec output of `lhs` to an exec input of `rhs`.
	///
	/// An exec output has one successor, so an existing edge out of `lhs`'s
	/// slot is implicitly disconnected first.
	pub fn connect_exec(&mut self, lhs: NodeId, lhs_slot: usize, rhs: NodeId, rhs_slot: usize) -> Report {
		let mut report = Report::new();
		if !self.nodes_in_function(&mut report, lhs, rhs, "connect") {
			return report;
		}

		let lhs_type = self.node(lhs).expect("checked").node_type();
		let rhs_type = self.node(rhs).expect("checked").node_type();
		if lhs_slot >= lhs_type.exec_outputs().len() {
			report.add_entry(
				"E22",
				"Output exec connection doesn't exist in node",
				json!({
					"Requested ID": lhs_slot,
					"Node Type": lhs_type.qualified_name(),
					"Node Output Exec Connections": lhs_type.exec_outputs(),
				}),
			);
		}
		if rhs_slot >= rhs_type.exec_inputs().len() {
			report.add_entry(
				"E23",
				"Input exec connection doesn't exist in node",
				json!({
					"Requested ID": rhs_slot,
					"Node Type": rhs_type.qualified_name(),
					"Node Input Exec Connections": rhs_type.exec_inputs(),
				}),
			);
		}
		if !report.success() {
			return report;
		}

		// Single fan-out: displace the existing successor.
		if self.node(lhs).expect("checked").output_exec[lhs_slot].is_some() {
			report += self.disconnect_exec(lhs, lhs_slot);
			if !report.success() {
				return report;
			}
		}

		self.node_mut(lhs).expect("checked").output_exec[lhs_slot] = Some((rhs, rhs_slot));
		self.node_mut(rhs).expect("checked").input_exec[rhs_slot].push((lhs, lhs_slot));
		report
	}

	/// Remove the data edge from `lhs`'s output slot to `rhs`.
	pub fn disconnect_data(&mut self, lhs: NodeId, lhs_slot: usize, rhs: NodeId) -> Report {
		let mut report = Report::new();
		if !self.nodes_in_function(&mut report, lhs, rhs, "disconnect") {
			return report;
		}

		let lhs_type = self.node(lhs).expect("checked").node_type();
		if lhs_slot >= lhs_type.data_outputs().len() {
			report.add_entry(
				"E22",
				"Output data connection doesn't exist in node",
				json!({
					"Requested ID": lhs_slot,
					"Node Type": lhs_type.qualified_name(),
					"Node Output Data Connections": data_ports_json(lhs_type.data_outputs()),
				}),
			);
			return report;
		}

		// There is at most one entry per consumer on a producer slot.
		let forward = self.node(lhs).expect("checked").output_data[lhs_slot]
			.iter()
			.position(|(consumer, _)| *consumer == rhs);
		let Some(position) = forward else {
			report.add_entry(
				"EUKN",
				"Cannot disconnect from connection that doesn't exist",
				json!({
					"Left node ID": lhs.to_string(),
					"Right node ID": rhs.to_string(),
					"Left dock ID": lhs_slot,
				}),
			);
			return report;
		};
		let (_, rhs_slot) = self.node(lhs).expect("checked").output_data[lhs_slot][position];

		let rhs_node = self.node(rhs).expect("checked");
		if rhs_slot >= rhs_node.input_data.len() {
			report.add_entry(
				"E23",
				"Input data connection doesn't exist in node",
				json!({
					"Requested ID": rhs_slot,
					"Node Type": rhs_node.node_type().qualified_name(),
					"Node Input Data Connections": data_ports_json(rhs_node.node_type().data_inputs()),
				}),
			);
			return report;
		}
		if rhs_node.input_data[rhs_slot] != Some((lhs, lhs_slot)) {
			report.add_entry(
				"EUKN",
				"Cannot disconnect from connection that doesn't exist",
				json!({
					"Left node ID": lhs.to_string(),
					"Right node ID": rhs.to_string(),
				}),
			);
			return report;
		}

		self.node_mut(rhs).expect("checked").input_data[rhs_slot] = None;
		self.node_mut(lhs).expect("checked").output_data[lhs_slot].remove(position);
		report
	}

	/// Remove the exec edge out of `lhs`'s output slot.
	pub fn disconnect_exec(&mut self, lhs: NodeId, lhs_slot: usize) -> Report {
		let mut report = Report::new();
		let Some(lhs_node) = self.node(lhs) else {
			report.add_entry(
				"EUKN",
				"Cannot disconnect a node that is not in the function",
				json!({ "Left node ID": lhs.to_string() }),
			);
			return report;
		};
		if lhs_slot >= lhs_node.node_type().exec_outputs().len() {
			report.add_entry(
				"E22",
				"Output exec connection doesn't exist in node",
				json!({
					"Requested ID": lhs_slot,
					"Node Type": lhs_node.node_type().qualified_name(),
					"Node Output Exec Connections": lhs_node.node_type().exec_outputs(),
				}),
			);
			return report;
		}
		let Some((rhs, rhs_slot)) = lhs_node.output_exec[lhs_slot] else {
			report.add_entry(
				"EUKN",
				"Cannot disconnect an exec output that is not connected",
				json!({ "Left node ID": lhs.to_string(), "Left node dock id": lhs_slot }),
			);
			return report;
		};

		let back = self
			.node(rhs)
			.and_then(|node| node.input_exec.get(rhs_slot))
			.and_then(|slot| slot.iter().position(|entry| *entry == (lhs, lhs_slot)));
		let Some(position) = back else {
			report.add_entry(
				"EUKN",
				"Cannot disconnect an exec connection that doesn't connect back",
				json!({ "Left node ID": lhs.to_string(), "Left node dock id": lhs_slot }),
			);
			return report;
		};

		self.node_mut(rhs).expect("checked").input_exec[rhs_slot].remove(position);
		self.node_mut(lhs).expect("checked").output_exec[lhs_slot] = None;
		report
	}

	/// Both endpoints must be nodes of this function; anything else is the
	/// "different graphs" error.
	fn nodes_in_function(&self, report: &mut Report, lhs: NodeId, rhs: NodeId, verb: &str) -> bool {
		if self.node(lhs).is_none() || self.node(rhs).is_none() {
			report.add_entry(
				"EUKN",
				format!("Cannot {verb} two nodes of different graphs"),
				json!({
					"Function": self.name(),
					"Left node ID": lhs.to_string(),
					"Right node ID": rhs.to_string(),
				}),
			);
			return false;
		}
		true
	}
}
