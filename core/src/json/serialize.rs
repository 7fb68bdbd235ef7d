//! Graph module → JSON.

use serde_json::{Map, Value, json};

use crate::graph_function::GraphFunction;
use crate::graph_module::GraphModule;
use crate::module::ChiModule;

/// Serialize a whole module.
pub fn graph_module_to_json(module: &GraphModule) -> Value {
	let dependencies: Vec<Value> = module
		.dependencies()
		.iter()
		.map(|name| json!(name))
		.collect();

	let mut types = Map::new();
	for decl in module.structs() {
		let fields: Vec<Value> = decl
			.fields()
			.iter()
			.map(|field| json!({ field.name.as_str(): field.ty.qualified_name() }))
			.collect();
		types.insert(decl.name().to_string(), json!({ "type": "struct", "data": fields }));
	}

	let graphs: Vec<Value> = module.functions().iter().map(graph_function_to_json).collect();

	json!({
		"dependencies": dependencies,
		"types": types,
		"graphs": graphs,
	})
}

/// Serialize one function, nodes keyed by id (sorted for stable output) and
/// connections listed producer-first.
pub fn graph_function_to_json(func: &GraphFunction) -> Value {
	let data_inputs: Vec<Value> = func
		.data_inputs()
		.iter()
		.map(|port| json!({ port.name.as_str(): port.ty.qualified_name() }))
		.collect();
	let data_outputs: Vec<Value> = func
		.data_outputs()
		.iter()
		.map(|port| json!({ port.name.as_str(): port.ty.qualified_name() }))
		.collect();

	let mut locals = Map::new();
	for local in func.local_variables() {
		locals.insert(local.name.clone(), json!(local.ty.qualified_name()));
	}

	let mut nodes = Map::new();
	let mut connections = Vec::new();
	for id in func.node_ids() {
		let node = func.node(id).expect("listed");
		nodes.insert(
			id.to_string(),
			json!({
				"type": node.node_type().qualified_name(),
				"location": [node.x(), node.y()],
				"data": node.node_type().to_json(),
			}),
		);

		for (slot, connection) in node.output_exec().iter().enumerate() {
			if let Some((target, target_slot)) = connection {
				connections.push(json!({
					"type": "exec",
					"input": [id.to_string(), slot],
					"output": [target.to_string(), target_slot],
				}));
			}
		}
		for (slot, connection) in node.input_data().iter().enumerate() {
			if let Some((source, source_slot)) = connection {
				connections.push(json!({
					"type": "data",
					"input": [source.to_string(), source_slot],
					"output": [id.to_string(), slot],
				}));
			}
		}
	}

	json!({
		"type": "function",
		"name": func.name(),
		"description": func.description(),
		"data_inputs": data_inputs,
		"data_outputs": data_outputs,
		"exec_inputs": func.exec_inputs(),
		"exec_outputs": func.exec_outputs(),
		"local_variables": locals,
		"nodes": nodes,
		"connections": connections,
	})
}
