//! Static checks a function must pass before lowering.
//!
//! Everything accumulates into one report; nothing aborts early, so the user
//! sees every problem in one pass.

use std::collections::BTreeSet;

use serde_json::json;

use chi_support::{NodeId, Report};

use crate::graph_function::GraphFunction;
use crate::graph_module::GraphModule;

/// Validate one function: a single matching entry, a reachable exit, every
/// exec input of reached nodes satisfied, every data input of everything the
/// lowering will touch connected, and no cycles on the exec edges (nor among
/// pure data dependencies, which would never terminate materialization).
pub fn validate_function(func: &GraphFunction) -> Report {
	let mut report = Report::new();

	let Some(entry) = func.entry_node() else {
		report.add_entry(
			"EUKN",
			"Function has no entry node matching its signature",
			json!({ "Function": func.name() }),
		);
		return report;
	};

	// Reachability along exec edges.
	let mut reachable: BTreeSet<NodeId> = BTreeSet::new();
	let mut stack = vec![entry];
	while let Some(id) = stack.pop() {
		if !reachable.insert(id) {
			continue;
		}
		let node = func.node(id).expect("connections stay inside the function");
		for slot in node.output_exec() {
			if let Some((successor, _)) = slot {
				stack.push(*successor);
			}
		}
	}

	// At least one exit reachable from the entry.
	let has_exit = reachable.iter().any(|id| {
		let ty = func.node(*id).expect("reachable").node_type();
		ty.module() == "lang" && ty.name() == "exit"
	});
	if !has_exit {
		report.add_entry(
			"EUKN",
			"No exit node is reachable from the entry node",
			json!({ "Function": func.name() }),
		);
	}

	// Exec inputs of reached nodes must all be satisfied.
	for id in &reachable {
		let node = func.node(*id).expect("reachable");
		for (slot, incoming) in node.input_exec().iter().enumerate() {
			if incoming.is_empty() {
				report.add_entry(
					"EUKN",
					"Reached node has a disconnected exec input",
					json!({
						"Function": func.name(),
						"Node ID": id.to_string(),
						"Node Type": node.node_type().qualified_name(),
						"Exec Input": slot,
					}),
				);
			}
		}
	}

	// Data inputs of everything lowering will touch, walking through pure
	// producers. The in-progress set doubles as pure-cycle detection.
	let mut checked: BTreeSet<NodeId> = BTreeSet::new();
	for id in &reachable {
		let mut in_progress = BTreeSet::new();
		check_data_inputs(func, *id, &mut checked, &mut in_progress, &mut report);
	}

	// No exec cycles among non-pure nodes.
	check_exec_acyclic(func, entry, &mut report);

	report
}

fn check_data_inputs(
	func: &GraphFunction,
	id: NodeId,
	checked: &mut BTreeSet<NodeId>,
	in_progress: &mut BTreeSet<NodeId>,
	report: &mut Report,
) {
	if checked.contains(&id) {
		return;
	}
	if !in_progress.insert(id) {
		report.add_entry(
			"EUKN",
			"Pure nodes form a data dependency cycle",
			json!({ "Function": func.name(), "Node ID": id.to_string() }),
		);
		return;
	}

	let node = func.node(id).expect("caller verified");
	for (slot, connection) in node.input_data().iter().enumerate() {
		match connection {
			None => {
				report.add_entry(
					"EUKN",
					"Node has a disconnected data input and its type declares no default",
					json!({
						"Function": func.name(),
						"Node ID": id.to_string(),
						"Node Type": node.node_type().qualified_name(),
						"Data Input": slot,
					}),
				);
			}
			Some((producer, _)) => {
				let pure = func
					.node(*producer)
					.is_some_and(|producer| producer.node_type().pure());
				if pure {
					check_data_inputs(func, *producer, checked, in_progress, report);
				}
			}
		}
	}

	in_progress.remove(&id);
	checked.insert(id);
}

/// Depth-first search for a back edge along exec edges.
fn check_exec_acyclic(func: &GraphFunction, entry: NodeId, report: &mut Report) {
	let mut visiting: BTreeSet<NodeId> = BTreeSet::new();
	let mut done: BTreeSet<NodeId> = BTreeSet::new();
	let mut found_cycle = false;
	visit(func, entry, &mut visiting, &mut done, &mut found_cycle);
	if found_cycle {
		report.add_entry(
			"EUKN",
			"Execution edges form a cycle",
			json!({ "Function": func.name() }),
		);
	}

	fn visit(
		func: &GraphFunction,
		id: NodeId,
		visiting: &mut BTreeSet<NodeId>,
		done: &mut BTreeSet<NodeId>,
		found_cycle: &mut bool,
	) {
		if done.contains(&id) || *found_cycle {
			return;
		}
		if !visiting.insert(id) {
			*found_cycle = true;
			return;
		}
		if let Some(node) = func.node(id) {
			for slot in node.output_exec() {
				if let Some((successor, _)) = slot {
					visit(func, *successor, visiting, done, found_cycle);
				}
			}
		}
		visiting.remove(&id);
		done.insert(id);
	}
}

/// Validate every function of a module, merging the reports.
pub fn validate_module(module: &GraphModule) -> Report {
	let mut report = Report::new();
	for func in module.functions() {
		report += validate_function(func);
	}
	report
}
