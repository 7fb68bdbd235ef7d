//! The function compiler: exec-order lowering of a validated graph function
//! into one IR function.

use std::collections::{BTreeSet, VecDeque};

use rustc_hash::FxHashMap;
use serde_json::json;

use chi_ir as ir;
use chi_support::{NodeId, Report};

use crate::module::ChiModule;

use crate::context::Context;
use crate::graph_function::GraphFunction;
use crate::graph_module::GraphModule;
use crate::validator;

/// The backend name of a graph function: `<module_full_name>.<name>`.
/// Symbols are quoted in the textual IR, so path separators are safe.
pub fn mangle_function_name(module: &str, function: &str) -> String {
	format!("{module}.{function}")
}

/// Map every node of the module to a source line for debug info: nodes
/// sorted by `<function>:<id>`, numbered from 1.
pub fn line_number_assoc(module: &GraphModule) -> FxHashMap<(String, NodeId), u32> {
	let mut keys: Vec<(String, String, NodeId)> = Vec::new();
	for func in module.functions() {
		for id in func.node_ids() {
			keys.push((func.name().to_string(), id.to_string(), id));
		}
	}
	keys.sort();

	let mut assoc = FxHashMap::default();
	for (line, (func_name, _, id)) in keys.into_iter().enumerate() {
		assoc.insert((func_name, id), line as u32 + 1);
	}
	assoc
}

/// Lower a whole module: declare every function first so call nodes can
/// forward-reference, then compile each body, then the `main` glue. Nothing
/// is returned unless every function validated and compiled.
pub fn generate_module(module: &GraphModule, ctx: &Context, report: &mut Report) -> Option<ir::Module> {
	log::info!("lowering module `{}`", module.full_name());
	let mut ir_mod = ir::Module::new(module.full_name(), module.source_path().display().to_string());
	let lines = line_number_assoc(module);

	for func in module.functions() {
		match func.function_type() {
			Some((params, ret)) => {
				ir_mod.declare_function(&mangle_function_name(module.full_name(), func.name()), params, Some(ret));
			}
			None => report.add_entry(
				"EUKN",
				"Function signature contains an invalid data type",
				json!({ "Module": module.full_name(), "Function": func.name() }),
			),
		}
	}

	for func in module.functions() {
		let validation = validator::validate_function(func);
		let valid = validation.success();
		*report += validation;
		if !valid {
			continue;
		}
		*report += compile_function(func, module, ctx, &mut ir_mod, &lines);
	}

	if let Some(main) = module.function_from_name("main") {
		emit_main_glue(&mut ir_mod, main, module.full_name());
	}

	// Structural self-check on everything generated above; a failure here is
	// a compiler defect, not a user error, but it must never leak broken IR.
	if report.success()
		&& let Err(error) = ir::verify::verify_module(&ir_mod)
	{
		report.add_entry(
			"EUKN",
			"Generated IR failed verification",
			json!({ "Module": module.full_name(), "Error": error.to_string() }),
		);
	}

	if report.success() { Some(ir_mod) } else { None }
}

/// Lower one validated function.
pub fn compile_function(
	func: &GraphFunction,
	module: &GraphModule,
	_ctx: &Context,
	ir_mod: &mut ir::Module,
	lines: &FxHashMap<(String, NodeId), u32>,
) -> Report {
	let mut report = Report::new();
	let Some((params, ret)) = func.function_type() else {
		report.add_entry(
			"EUKN",
			"Function signature contains an invalid data type",
			json!({ "Function": func.name() }),
		);
		return report;
	};
	let mangled = mangle_function_name(module.full_name(), func.name());
	log::debug!("compiling function `{mangled}`");
	let mut f = ir::Function::new(mangled, params, Some(ret));
	let entry_block = f.add_block("entry");

	let entry_node = func.entry_node().expect("function was validated");

	// Output cells: one stack slot per declared data output of every node,
	// allocated up front in the entry block. Data readers load from these.
	let mut cells: FxHashMap<(NodeId, usize), ir::ValueId> = FxHashMap::default();
	for id in func.node_ids() {
		let node = func.node(id).expect("listed");
		for (slot, port) in node.node_type().data_outputs().iter().enumerate() {
			let Some(backend) = port.ty.backend() else {
				report.add_entry(
					"EUKN",
					"Node output has an invalid data type",
					json!({ "Function": func.name(), "Node ID": id.to_string(), "Output": slot }),
				);
				return report;
			};
			let cell = f
				.emit(entry_block, ir::Op::Alloca { ty: backend.clone() }, None)
				.expect("alloca produces a value");
			cells.insert((id, slot), cell);
		}
	}

	// One stack slot per local variable.
	let mut locals: FxHashMap<String, ir::ValueId> = FxHashMap::default();
	for local in func.local_variables() {
		let Some(backend) = local.ty.backend() else {
			report.add_entry(
				"EUKN",
				"Local variable has an invalid data type",
				json!({ "Function": func.name(), "Local": local.name }),
			);
			return report;
		};
		let cell = f
			.emit(entry_block, ir::Op::Alloca { ty: backend.clone() }, None)
			.expect("alloca produces a value");
		locals.insert(local.name.clone(), cell);
	}

	// One block per (node, exec input) pair, created lazily; predecessors
	// reaching the same pair all branch into the same block.
	let mut blocks: FxHashMap<(NodeId, usize), ir::BlockId> = FxHashMap::default();
	blocks.insert((entry_node, 0), entry_block);
	let mut queue: VecDeque<(NodeId, usize)> = VecDeque::from([(entry_node, 0)]);
	let mut dangling: Option<ir::BlockId> = None;
	let mut pure_counter = 0_usize;

	while let Some((id, exec_input)) = queue.pop_front() {
		let block = blocks[&(id, exec_input)];
		let node = func.node(id).expect("walk stays inside the function");
		let line = lines.get(&(func.name().to_string(), id)).copied();

		// Materialize data inputs. Pure producers codegen on demand, cached
		// for the duration of this exec step only.
		let mut cache: BTreeSet<NodeId> = BTreeSet::new();
		let mut cur = block;
		let mut io: Vec<ir::Operand> = Vec::new();
		for slot in 0..node.node_type().data_inputs().len() {
			let (producer, producer_slot) = node.input_data()[slot].expect("function was validated");
			if func.node(producer).expect("in function").node_type().pure() {
				cur = materialize_pure(
					func,
					&mut f,
					ir_mod,
					producer,
					cur,
					&mut cache,
					&cells,
					&locals,
					lines,
					&mut pure_counter,
					&mut report,
				);
			}
			let ty = node.node_type().data_inputs()[slot]
				.ty
				.backend()
				.expect("validated signature")
				.clone();
			let loaded = f
				.emit(
					cur,
					ir::Op::Load {
						ty,
						ptr: ir::Operand::Value(cells[&(producer, producer_slot)]),
					},
					line,
				)
				.expect("load produces a value");
			io.push(ir::Operand::Value(loaded));
		}
		for slot in 0..node.node_type().data_outputs().len() {
			io.push(ir::Operand::Value(cells[&(id, slot)]));
		}

		// One pre-created block per declared exec output; unconnected
		// outputs share a stub that returns exec output 0.
		let mut outputs: Vec<ir::BlockId> = Vec::new();
		for successor in node.output_exec() {
			match successor {
				Some((successor_id, successor_slot)) => {
					let key = (*successor_id, *successor_slot);
					let target = match blocks.get(&key) {
						Some(existing) => *existing,
						None => {
							let label = format!("n{}_e{}", successor_id.simple(), successor_slot);
							let created = f.add_block(label);
							blocks.insert(key, created);
							queue.push_back(key);
							created
						}
					};
					outputs.push(target);
				}
				None => {
					let target = match dangling {
						Some(existing) => existing,
						None => {
							let created = f.add_block("unreached");
							f.emit(
								created,
								ir::Op::Ret {
									ty: Some(ir::Type::I32),
									value: Some(ir::Operand::const_i32(0)),
								},
								None,
							);
							dangling = Some(created);
							created
						}
					};
					outputs.push(target);
				}
			}
		}

		report += node
			.node_type()
			.codegen(exec_input, ir_mod, line, &mut f, &io, cur, &outputs, &locals);
	}

	ir_mod.define_function(f);
	report
}

/// Emit a pure node into a dedicated block reached by fall-through from
/// `cur`, returning the block lowering continues in. Recursively
/// materializes the pure node's own inputs first.
#[allow(clippy::too_many_arguments)]
fn materialize_pure(
	func: &GraphFunction,
	f: &mut ir::Function,
	ir_mod: &mut ir::Module,
	id: NodeId,
	mut cur: ir::BlockId,
	cache: &mut BTreeSet<NodeId>,
	cells: &FxHashMap<(NodeId, usize), ir::ValueId>,
	locals: &FxHashMap<String, ir::ValueId>,
	lines: &FxHashMap<(String, NodeId), u32>,
	pure_counter: &mut usize,
	report: &mut Report,
) -> ir::BlockId {
	if !cache.insert(id) {
		return cur;
	}
	let node = func.node(id).expect("walk stays inside the function");
	let line = lines.get(&(func.name().to_string(), id)).copied();

	let mut io: Vec<ir::Operand> = Vec::new();
	for slot in 0..node.node_type().data_inputs().len() {
		let (producer, producer_slot) = node.input_data()[slot].expect("function was validated");
		if func.node(producer).expect("in function").node_type().pure() {
			cur = materialize_pure(func, f, ir_mod, producer, cur, cache, cells, locals, lines, pure_counter, report);
		}
		let ty = node.node_type().data_inputs()[slot]
			.ty
			.backend()
			.expect("validated signature")
			.clone();
		let loaded = f
			.emit(
				cur,
				ir::Op::Load {
					ty,
					ptr: ir::Operand::Value(cells[&(producer, producer_slot)]),
				},
				line,
			)
			.expect("load produces a value");
		io.push(ir::Operand::Value(loaded));
	}
	for slot in 0..node.node_type().data_outputs().len() {
		io.push(ir::Operand::Value(cells[&(id, slot)]));
	}

	*pure_counter += 1;
	let pure_block = f.add_block(format!("p{}_{}", pure_counter, id.simple()));
	f.emit(cur, ir::Op::Br { dest: pure_block }, line);
	*report += node.node_type().codegen(0, ir_mod, line, f, &io, pure_block, &[], locals);
	pure_block
}

/// The trivially generated entry point: call the module's `main` graph
/// function with exec input 0 and return its first `i32` data output (or 0).
fn emit_main_glue(ir_mod: &mut ir::Module, func: &GraphFunction, module_name: &str) {
	let mut main = ir::Function::new("main", Vec::new(), Some(ir::Type::I32));
	let entry = main.add_block("entry");

	let mut args: Vec<(ir::Type, ir::Operand)> = vec![(ir::Type::I32, ir::Operand::const_i32(0))];
	for port in func.data_inputs() {
		let Some(backend) = port.ty.backend() else {
			return;
		};
		args.push((backend.clone(), ir::Operand::Undef(backend.clone())));
	}
	let mut out_cells: Vec<(ir::ValueId, ir::Type)> = Vec::new();
	for port in func.data_outputs() {
		let Some(backend) = port.ty.backend() else {
			return;
		};
		let cell = main
			.emit(entry, ir::Op::Alloca { ty: backend.clone() }, None)
			.expect("alloca produces a value");
		out_cells.push((cell, backend.clone()));
		args.push((backend.clone().pointer_to(), ir::Operand::Value(cell)));
	}

	main.emit(
		entry,
		ir::Op::Call {
			ret: Some(ir::Type::I32),
			callee: mangle_function_name(module_name, func.name()),
			args,
		},
		None,
	);

	match out_cells.first() {
		Some((cell, ty)) if *ty == ir::Type::I32 => {
			let loaded = main
				.emit(
					entry,
					ir::Op::Load {
						ty: ir::Type::I32,
						ptr: ir::Operand::Value(*cell),
					},
					None,
				)
				.expect("load produces a value");
			main.emit(
				entry,
				ir::Op::Ret {
					ty: Some(ir::Type::I32),
					value: Some(ir::Operand::Value(loaded)),
				},
				None,
			);
		}
		_ => {
			main.emit(
				entry,
				ir::Op::Ret {
					ty: Some(ir::Type::I32),
					value: Some(ir::Operand::const_i32(0)),
				},
				None,
			);
		}
	}
	ir_mod.define_function(main);
}
