//! Per-node-type IR fragments.
//!
//! `io` is laid out as `[data inputs as values..., pointers to output
//! cells...]`, matching the declared port order. Non-pure nodes must leave
//! `current` (or the last block they created) terminated with a branch into
//! one of `output_blocks`; pure nodes receive no output blocks and fall
//! through.

use rustc_hash::FxHashMap;
use serde_json::json;

use chi_ir as ir;
use chi_support::Report;

use crate::codegen::compiler::mangle_function_name;
use crate::data_type::NamedDataType;
use crate::node_type::{NodeKind, NodeType};

fn backend_of(port: &NamedDataType, report: &mut Report) -> Option<ir::Type> {
	let backend = port.ty.backend().cloned();
	if backend.is_none() {
		report.add_entry(
			"EUKN",
			"Port has an invalid data type",
			json!({ "Port": port.name, "Type": port.ty.qualified_name() }),
		);
	}
	backend
}

impl NodeType {
	/// Emit this node's IR into `current`, writing outputs through the
	/// pointers in `io` and ending control flow in one of `output_blocks`.
	/// Every emitted instruction carries `line` as its debug location.
	#[allow(clippy::too_many_arguments)]
	pub fn codegen(
		&self,
		exec_input_id: usize,
		module: &mut ir::Module,
		line: Option<u32>,
		func: &mut ir::Function,
		io: &[ir::Operand],
		current: ir::BlockId,
		output_blocks: &[ir::BlockId],
		locals: &FxHashMap<String, ir::ValueId>,
	) -> Report {
		let mut report = Report::new();

		// Branch to the single declared exec output.
		let fall_through = |func: &mut ir::Function, report: &mut Report| {
			match output_blocks.first() {
				Some(dest) => {
					func.emit(current, ir::Op::Br { dest: *dest }, line);
				}
				None => report.add_entry(
					"EUKN",
					"Node has no exec output to branch to",
					json!({ "Node Type": self.qualified_name() }),
				),
			}
		};

		match self.kind() {
			NodeKind::Entry => {
				// Spill the function arguments into the entry node's output
				// cells; argument 0 is the exec input selector.
				for (index, port) in self.data_outputs().iter().enumerate() {
					let Some(ty) = backend_of(port, &mut report) else {
						return report;
					};
					func.emit(
						current,
						ir::Op::Store {
							ty,
							value: ir::Operand::Arg(index as u32 + 1),
							ptr: io[index].clone(),
						},
						line,
					);
				}
				match output_blocks.len() {
					0 => {
						func.emit(
							current,
							ir::Op::Ret {
								ty: Some(ir::Type::I32),
								value: Some(ir::Operand::const_i32(0)),
							},
							line,
						);
					}
					1 => {
						func.emit(current, ir::Op::Br { dest: output_blocks[0] }, line);
					}
					_ => {
						let cases = output_blocks
							.iter()
							.enumerate()
							.map(|(index, dest)| (index as i64, *dest))
							.collect();
						func.emit(
							current,
							ir::Op::Switch {
								ty: ir::Type::I32,
								value: ir::Operand::Arg(0),
								default: output_blocks[0],
								cases,
							},
							line,
						);
					}
				}
			}

			NodeKind::Exit => {
				// Returns live after the arguments; write them through the
				// caller's pointers, then select this exec output.
				let ret_start = func.params.len() - io.len();
				for (index, port) in self.data_inputs().iter().enumerate() {
					let Some(ty) = backend_of(port, &mut report) else {
						return report;
					};
					func.emit(
						current,
						ir::Op::Store {
							ty,
							value: io[index].clone(),
							ptr: ir::Operand::Arg((ret_start + index) as u32),
						},
						line,
					);
				}
				func.emit(
					current,
					ir::Op::Ret {
						ty: Some(ir::Type::I32),
						value: Some(ir::Operand::const_i32(exec_input_id as i32)),
					},
					line,
				);
			}

			NodeKind::If => {
				func.emit(
					current,
					ir::Op::CondBr {
						cond: io[0].clone(),
						then_dest: output_blocks[0],
						else_dest: output_blocks[1],
					},
					line,
				);
			}

			NodeKind::ConstInt(value) => {
				func.emit(
					current,
					ir::Op::Store {
						ty: ir::Type::I32,
						value: ir::Operand::const_i32(*value),
						ptr: io[0].clone(),
					},
					line,
				);
				fall_through(func, &mut report);
			}

			NodeKind::ConstBool(value) => {
				func.emit(
					current,
					ir::Op::Store {
						ty: ir::Type::I1,
						value: ir::Operand::const_i1(*value),
						ptr: io[0].clone(),
					},
					line,
				);
				fall_through(func, &mut report);
			}

			NodeKind::ConstFloat(value) => {
				func.emit(
					current,
					ir::Op::Store {
						ty: ir::Type::F64,
						value: ir::Operand::const_double(*value),
						ptr: io[0].clone(),
					},
					line,
				);
				fall_through(func, &mut report);
			}

			NodeKind::StrLiteral(text) => {
				let global = module.add_global_string(text);
				func.emit(
					current,
					ir::Op::Store {
						ty: ir::Type::I8.pointer_to(),
						value: ir::Operand::Global(global),
						ptr: io[0].clone(),
					},
					line,
				);
				fall_through(func, &mut report);
			}

			NodeKind::CCall { symbol } => {
				let mut params = Vec::with_capacity(self.data_inputs().len());
				for port in self.data_inputs() {
					let Some(ty) = backend_of(port, &mut report) else {
						return report;
					};
					params.push(ty);
				}
				let ret = match self.data_outputs().first() {
					Some(port) => match backend_of(port, &mut report) {
						Some(ty) => Some(ty),
						None => return report,
					},
					None => None,
				};
				module.declare_function(symbol, params.clone(), ret.clone());

				let input_count = self.data_inputs().len();
				let args = params.into_iter().zip(io[..input_count].iter().cloned()).collect();
				let result = func.emit(
					current,
					ir::Op::Call {
						ret: ret.clone(),
						callee: symbol.clone(),
						args,
					},
					line,
				);
				if let (Some(ty), Some(result)) = (ret, result) {
					func.emit(
						current,
						ir::Op::Store {
							ty,
							value: ir::Operand::Value(result),
							ptr: io[input_count].clone(),
						},
						line,
					);
				}
				fall_through(func, &mut report);
			}

			NodeKind::FuncCall {
				module: callee_module,
				function,
			} => {
				let mangled = mangle_function_name(callee_module, function);

				let input_count = self.data_inputs().len();
				let mut args: Vec<(ir::Type, ir::Operand)> =
					vec![(ir::Type::I32, ir::Operand::const_i32(exec_input_id as i32))];
				for (port, value) in self.data_inputs().iter().zip(io[..input_count].iter()) {
					let Some(ty) = backend_of(port, &mut report) else {
						return report;
					};
					args.push((ty, value.clone()));
				}
				for (port, pointer) in self.data_outputs().iter().zip(io[input_count..].iter()) {
					let Some(ty) = backend_of(port, &mut report) else {
						return report;
					};
					args.push((ty.pointer_to(), pointer.clone()));
				}

				// Cross-module calls get an external declaration; own-module
				// targets were declared before any body was compiled.
				if module.function(&mangled).is_none() {
					let params = args.iter().map(|(ty, _)| ty.clone()).collect();
					module.declare_function(&mangled, params, Some(ir::Type::I32));
				}

				let result = func
					.emit(
						current,
						ir::Op::Call {
							ret: Some(ir::Type::I32),
							callee: mangled,
							args,
						},
						line,
					)
					.expect("call with a return type produces a value");

				// The return value selects which exec output the callee
				// took.
				if output_blocks.is_empty() {
					func.emit(
						current,
						ir::Op::Ret {
							ty: Some(ir::Type::I32),
							value: Some(ir::Operand::const_i32(0)),
						},
						line,
					);
				} else {
					let cases = output_blocks
						.iter()
						.enumerate()
						.map(|(index, dest)| (index as i64, *dest))
						.collect();
					func.emit(
						current,
						ir::Op::Switch {
							ty: ir::Type::I32,
							value: ir::Operand::Value(result),
							default: output_blocks[0],
							cases,
						},
						line,
					);
				}
			}

			NodeKind::StructMake { .. } => {
				let Some(port) = self.data_outputs().first() else {
					return report;
				};
				let Some(agg_ty) = backend_of(port, &mut report) else {
					return report;
				};
				let input_count = self.data_inputs().len();
				let mut agg = ir::Operand::Undef(agg_ty.clone());
				for (index, port) in self.data_inputs().iter().enumerate() {
					let Some(value_ty) = backend_of(port, &mut report) else {
						return report;
					};
					let inserted = func
						.emit(
							current,
							ir::Op::InsertValue {
								agg_ty: agg_ty.clone(),
								agg,
								value_ty,
								value: io[index].clone(),
								index,
							},
							line,
						)
						.expect("insertvalue produces a value");
					agg = ir::Operand::Value(inserted);
				}
				func.emit(
					current,
					ir::Op::Store {
						ty: agg_ty,
						value: agg,
						ptr: io[input_count].clone(),
					},
					line,
				);
			}

			NodeKind::StructBreak { .. } => {
				let Some(port) = self.data_inputs().first() else {
					return report;
				};
				let Some(agg_ty) = backend_of(port, &mut report) else {
					return report;
				};
				for (index, port) in self.data_outputs().iter().enumerate() {
					let Some(field_ty) = backend_of(port, &mut report) else {
						return report;
					};
					let field = func
						.emit(
							current,
							ir::Op::ExtractValue {
								agg_ty: agg_ty.clone(),
								agg: io[0].clone(),
								index,
							},
							line,
						)
						.expect("extractvalue produces a value");
					func.emit(
						current,
						ir::Op::Store {
							ty: field_ty,
							value: ir::Operand::Value(field),
							ptr: io[1 + index].clone(),
						},
						line,
					);
				}
			}

			NodeKind::LocalGet { local } => {
				let Some(port) = self.data_outputs().first() else {
					return report;
				};
				let Some(ty) = backend_of(port, &mut report) else {
					return report;
				};
				let Some(cell) = locals.get(local) else {
					report.add_entry(
						"EUKN",
						"Local variable is not declared in this function",
						json!({ "Local": local, "Node Type": self.qualified_name() }),
					);
					return report;
				};
				let loaded = func
					.emit(
						current,
						ir::Op::Load {
							ty: ty.clone(),
							ptr: ir::Operand::Value(*cell),
						},
						line,
					)
					.expect("load produces a value");
				func.emit(
					current,
					ir::Op::Store {
						ty,
						value: ir::Operand::Value(loaded),
						ptr: io[0].clone(),
					},
					line,
				);
			}

			NodeKind::LocalSet { local } => {
				let Some(port) = self.data_inputs().first() else {
					return report;
				};
				let Some(ty) = backend_of(port, &mut report) else {
					return report;
				};
				let Some(cell) = locals.get(local) else {
					report.add_entry(
						"EUKN",
						"Local variable is not declared in this function",
						json!({ "Local": local, "Node Type": self.qualified_name() }),
					);
					return report;
				};
				func.emit(
					current,
					ir::Op::Store {
						ty,
						value: io[0].clone(),
						ptr: ir::Operand::Value(*cell),
					},
					line,
				);
				fall_through(func, &mut report);
			}
		}

		report
	}
}
