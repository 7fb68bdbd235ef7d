//! JSON → graph module, loaded into a [`Context`].
//!
//! Loading is phased so references resolve no matter the order they appear
//! in the file: dependencies first, then struct declarations, then every
//! function header (so call nodes can reference functions declared later),
//! then locals, then nodes and connections. Problems accumulate; a damaged
//! graph is skipped rather than aborting the whole module.

use std::path::PathBuf;

use serde_json::{Value, json};

use chi_support::{NodeId, Report, parse_node_id};

use crate::context::Context;
use crate::data_type::{DataType, NamedDataType, split_qualified};
use crate::node_type::NodeType;

/// Resolve a `"mod:name"` reference through the context.
fn resolve_type(ctx: &Context, reference: &str, report: &mut Report) -> Option<DataType> {
	let Some((module, name)) = split_qualified(reference) else {
		report.add_entry(
			"EUKN",
			"Type reference is not colon-qualified",
			json!({ "Given Type": reference }),
		);
		return None;
	};
	ctx.type_from_module(module, name, report)
}

/// Parse a `[{doc: "mod:type"}, ...]` port list.
fn parse_ports(ctx: &Context, ports: &[Value], report: &mut Report) -> Option<Vec<NamedDataType>> {
	let mut out = Vec::with_capacity(ports.len());
	for port in ports {
		let Some(object) = port.as_object() else {
			report.add_entry(
				"EUKN",
				"Port entries must be single-entry objects",
				json!({ "Given Port": port }),
			);
			return None;
		};
		for (doc_string, reference) in object {
			let Some(reference) = reference.as_str() else {
				report.add_entry(
					"EUKN",
					"Type reference must be a string",
					json!({ "Given Type": reference }),
				);
				return None;
			};
			let ty = resolve_type(ctx, reference, report)?;
			out.push(NamedDataType::new(doc_string.clone(), ty));
		}
	}
	Some(out)
}

fn parse_names(list: &[Value]) -> Vec<String> {
	list.iter()
		.map(|name| name.as_str().unwrap_or_default().to_string())
		.collect()
}

struct FunctionHeader {
	name: String,
	description: String,
	data_inputs: Vec<NamedDataType>,
	data_outputs: Vec<NamedDataType>,
	exec_inputs: Vec<String>,
	exec_outputs: Vec<String>,
}

/// Validate one graph object's header per the schema error codes.
fn parse_function_header(ctx: &Context, graph: &Value, report: &mut Report) -> Option<FunctionHeader> {
	if !graph.is_object() {
		report.add_entry("E1", "Graph json isn't a JSON object", Value::Null);
		return None;
	}
	let Some(kind) = graph.get("type") else {
		report.add_entry("E2", r#"JSON in graph doesn't have a "type" element"#, Value::Null);
		return None;
	};
	if kind != "function" {
		report.add_entry("E3", "JSON in graph doesn't have a function type", Value::Null);
		return None;
	}
	let Some(name) = graph.get("name").and_then(Value::as_str) else {
		report.add_entry("E4", "JSON in graph doesn't have a name parameter", Value::Null);
		return None;
	};

	let Some(data_inputs) = graph.get("data_inputs").and_then(Value::as_array) else {
		report.add_entry("E43", "JSON in graph doesn't have a data_inputs array", Value::Null);
		return None;
	};
	let data_inputs = parse_ports(ctx, data_inputs, report)?;

	let Some(data_outputs) = graph.get("data_outputs").and_then(Value::as_array) else {
		report.add_entry("E44", "JSON in graph doesn't have a data_outputs array", Value::Null);
		return None;
	};
	let data_outputs = parse_ports(ctx, data_outputs, report)?;

	let Some(exec_inputs) = graph.get("exec_inputs").and_then(Value::as_array) else {
		report.add_entry("EUKN", "JSON in graph doesn't have an exec_inputs array", Value::Null);
		return None;
	};
	let Some(exec_outputs) = graph.get("exec_outputs").and_then(Value::as_array) else {
		report.add_entry("EUKN", "JSON in graph doesn't have an exec_outputs array", Value::Null);
		return None;
	};

	Some(FunctionHeader {
		name: name.to_string(),
		description: graph
			.get("description")
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_string(),
		data_inputs,
		data_outputs,
		exec_inputs: parse_names(exec_inputs),
		exec_outputs: parse_names(exec_outputs),
	})
}

/// Load a graph module from parsed JSON, registering it (and its
/// dependencies) in the context. Returns whether the load was clean.
pub fn load_graph_module(
	ctx: &mut Context,
	full_name: &str,
	source_path: PathBuf,
	json: &Value,
	report: &mut Report,
) -> bool {
	let Some(root) = json.as_object() else {
		report.add_entry("EUKN", "Module json isn't a JSON object", Value::Null);
		return false;
	};

	// Dependencies first so every reference below can resolve.
	let mut dependencies = Vec::new();
	if let Some(list) = root.get("dependencies") {
		match list.as_array() {
			Some(list) => {
				for dependency in list {
					match dependency.as_str() {
						Some(name) => dependencies.push(name.to_string()),
						None => report.add_entry(
							"EUKN",
							"Dependency names must be strings",
							json!({ "Given Dependency": dependency }),
						),
					}
				}
			}
			None => report.add_entry(
				"EUKN",
				"Module dependencies must be an array",
				json!({ "Given Dependencies": list }),
			),
		}
	}
	for dependency in &dependencies {
		ctx.load_module(dependency, report);
	}

	{
		let module = ctx.new_graph_module(full_name);
		module.set_source_path(source_path);
		for dependency in &dependencies {
			module.add_dependency(dependency);
		}
	}

	// Struct declarations, in file order; later structs may use earlier
	// ones as field types.
	if let Some(types) = root.get("types").and_then(Value::as_object) {
		for (name, declaration) in types {
			if declaration.get("type").and_then(Value::as_str) != Some("struct") {
				report.add_entry(
					"EUKN",
					"Type declarations must have type struct",
					json!({ "Type Name": name, "Declaration": declaration }),
				);
				continue;
			}
			let Some(fields) = declaration.get("data").and_then(Value::as_array) else {
				report.add_entry(
					"EUKN",
					"Struct declaration doesn't have a data array",
					json!({ "Type Name": name }),
				);
				continue;
			};
			let Some(fields) = parse_ports(ctx, fields, report) else {
				continue;
			};
			let module = ctx.graph_module_mut(full_name).expect("registered above");
			let decl = module.get_or_create_struct(name);
			for field in fields {
				decl.add_field(field.ty, &field.name, usize::MAX);
			}
		}
	}

	let Some(graphs) = root.get("graphs").and_then(Value::as_array) else {
		report.add_entry("EUKN", "Module doesn't have a graphs array", Value::Null);
		return false;
	};

	// Function headers before any bodies: a call node may reference a
	// function that appears later in the file.
	let mut loaded: Vec<Option<String>> = Vec::with_capacity(graphs.len());
	for graph in graphs {
		match parse_function_header(ctx, graph, report) {
			Some(header) => {
				let module = ctx.graph_module_mut(full_name).expect("registered above");
				let (func, _) = module.get_or_create_function(
					&header.name,
					header.data_inputs,
					header.data_outputs,
					header.exec_inputs,
					header.exec_outputs,
				);
				func.set_description(header.description);
				loaded.push(Some(header.name));
			}
			None => loaded.push(None),
		}
	}

	// Locals for every function, before nodes anywhere: getter/setter node
	// types resolve against these declarations.
	for (graph, name) in graphs.iter().zip(&loaded) {
		let Some(name) = name else { continue };
		if let Some(locals) = graph.get("local_variables").and_then(Value::as_object) {
			for (local_name, reference) in locals {
				let Some(reference) = reference.as_str() else {
					report.add_entry(
						"EUKN",
						"Local variable types must be strings",
						json!({ "Local": local_name, "Given Type": reference }),
					);
					continue;
				};
				let Some(ty) = resolve_type(ctx, reference, report) else {
					continue;
				};
				let module = ctx.graph_module_mut(full_name).expect("registered above");
				let func = module.function_mut(name).expect("header loaded");
				func.get_or_create_local(local_name, ty);
			}
		}
	}

	// Node tables and connections.
	for (graph, name) in graphs.iter().zip(&loaded) {
		let Some(name) = name else { continue };
		load_graph_body(ctx, full_name, name, graph, report);
	}

	report.success()
}

fn load_graph_body(ctx: &mut Context, module_name: &str, func_name: &str, graph: &Value, report: &mut Report) {
	// Plan node types with the context borrowed shared, then apply.
	let mut planned: Vec<(NodeId, NodeType, f32, f32)> = Vec::new();
	if let Some(nodes) = graph.get("nodes").and_then(Value::as_object) {
		for (id_text, node) in nodes {
			let Some(id) = parse_node_id(id_text) else {
				report.add_entry(
					"EUKN",
					"Node id is not a valid uuid",
					json!({ "Node ID": id_text }),
				);
				continue;
			};
			let Some(reference) = node.get("type").and_then(Value::as_str) else {
				report.add_entry(
					"EUKN",
					"Node doesn't have a type string",
					json!({ "Node ID": id_text }),
				);
				continue;
			};
			let Some((type_module, type_name)) = split_qualified(reference) else {
				report.add_entry(
					"EUKN",
					"Node type is not colon-qualified",
					json!({ "Node ID": id_text, "Given Type": reference }),
				);
				continue;
			};
			let (x, y) = match node.get("location").and_then(Value::as_array) {
				Some(location) if location.len() == 2 => (
					location[0].as_f64().unwrap_or_default() as f32,
					location[1].as_f64().unwrap_or_default() as f32,
				),
				_ => {
					report.add_entry(
						"WUKN",
						"Node location must be a two-element array; using the origin",
						json!({ "Node ID": id_text }),
					);
					(0.0, 0.0)
				}
			};
			let config = node.get("data").unwrap_or(&Value::Null);
			let Some(ty) = ctx.node_type_from_module(type_module, type_name, config, report) else {
				continue;
			};
			planned.push((id, ty, x, y));
		}
	}

	{
		let module = ctx.graph_module_mut(module_name).expect("registered");
		let func = module.function_mut(func_name).expect("header loaded");
		for (id, ty, x, y) in planned {
			let (_, insert_report) = func.insert_node(ty, x, y, Some(id));
			*report += insert_report;
		}
	}

	let Some(connections) = graph.get("connections").and_then(Value::as_array) else {
		return;
	};
	let module = ctx.graph_module_mut(module_name).expect("registered");
	let func = module.function_mut(func_name).expect("header loaded");
	for connection in connections {
		let kind = connection.get("type").and_then(Value::as_str);
		let input = connection.get("input").and_then(Value::as_array);
		let output = connection.get("output").and_then(Value::as_array);
		let (Some(kind), Some(input), Some(output)) = (kind, input, output) else {
			report.add_entry(
				"EUKN",
				"Connection must have type, input and output elements",
				json!({ "Connection": connection }),
			);
			continue;
		};
		let parse_end = |end: &[Value]| -> Option<(NodeId, usize)> {
			let id = parse_node_id(end.first()?.as_str()?)?;
			let slot = end.get(1)?.as_u64()? as usize;
			Some((id, slot))
		};
		let (Some((source, source_slot)), Some((target, target_slot))) = (parse_end(input), parse_end(output)) else {
			report.add_entry(
				"EUKN",
				"Connection endpoints must be [uuid, slot] pairs",
				json!({ "Connection": connection }),
			);
			continue;
		};
		match kind {
			"exec" => *report += func.connect_exec(source, source_slot, target, target_slot),
			"data" => *report += func.connect_data(source, source_slot, target, target_slot),
			_ => report.add_entry(
				"EUKN",
				"Connection type must be exec or data",
				json!({ "Connection": connection }),
			),
		}
	}
}
