//! Direct execution of a module.
//!
//! This is what `chi interpret` and `chi run` use: no JIT, just a small
//! evaluator over the instruction set. Allocas live in one arena of cells so
//! pointers can be passed down call frames (the calling convention passes
//! output cells by pointer). `puts` and `putchar` are implemented natively
//! against a caller-provided sink; everything else must be defined in the
//! module.

use std::io::Write;

use crate::instruction::Op;
use crate::module::{Function, Module};
use crate::types::Type;
use crate::value::Operand;

/// A runtime fault. Traps abort execution; they are errors in the input IR
/// or in the program itself, not in the interpreter.
#[derive(Debug, thiserror::Error)]
pub enum Trap {
	#[error("call to unknown function `{0}`")]
	UnknownFunction(String),
	#[error("function `{0}` is declared but never defined")]
	Undefined(String),
	#[error("function `{0}` called with the wrong number of arguments")]
	Arity(String),
	#[error("block `{block}` of `{function}` has no terminator")]
	MissingTerminator { function: String, block: String },
	#[error("use of an undefined register in `{0}`")]
	UnboundValue(String),
	#[error("expected a {0}")]
	Expected(&'static str),
	#[error("reference to an unknown global")]
	UnknownGlobal,
	#[error("module has no `main` function")]
	NoMain,
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// A runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Val {
	Int(i64),
	Float(f64),
	/// Pointer into the alloca arena.
	Cell(usize),
	/// Pointer to a module global (its first byte).
	Str(u32),
	Struct(Vec<Val>),
	/// The zero pointer.
	Null,
}

fn zero_of(ty: &Type) -> Val {
	match ty {
		Type::I1 | Type::I8 | Type::I16 | Type::I32 | Type::I64 => Val::Int(0),
		Type::F32 | Type::F64 => Val::Float(0.0),
		Type::Ptr(_) => Val::Null,
		Type::Struct(fields) => Val::Struct(fields.iter().map(zero_of).collect()),
	}
}

/// Execute the module's `main` and return the process exit code.
pub fn run_main(module: &Module, out: &mut dyn Write) -> Result<i32, Trap> {
	let mut interp = Interpreter {
		module,
		out,
		cells: Vec::new(),
	};
	if module.function("main").is_none() {
		return Err(Trap::NoMain);
	}
	match interp.call("main", Vec::new())? {
		Some(Val::Int(code)) => Ok(code as i32),
		_ => Ok(0),
	}
}

struct Interpreter<'m, 'o> {
	module: &'m Module,
	out: &'o mut dyn Write,
	cells: Vec<Val>,
}

impl<'m> Interpreter<'m, '_> {
	fn call(&mut self, name: &str, args: Vec<Val>) -> Result<Option<Val>, Trap> {
		let func: &'m Function = match self.module.function(name) {
			Some(func) => func,
			None => return self.native(name, args),
		};
		if func.is_declaration() {
			return self.native(name, args);
		}
		if args.len() != func.params.len() {
			return Err(Trap::Arity(name.to_string()));
		}
		self.exec(func, args)
	}

	/// The `puts`-style glue the language guarantees.
	fn native(&mut self, name: &str, args: Vec<Val>) -> Result<Option<Val>, Trap> {
		match name {
			"puts" => {
				let text = match args.first() {
					Some(Val::Str(global)) => self.global_bytes(*global)?,
					_ => return Err(Trap::Expected("string pointer")),
				};
				self.out.write_all(text)?;
				self.out.write_all(b"\n")?;
				Ok(Some(Val::Int(0)))
			}
			"putchar" => {
				let ch = match args.first() {
					Some(Val::Int(ch)) => *ch,
					_ => return Err(Trap::Expected("character")),
				};
				self.out.write_all(&[ch as u8])?;
				Ok(Some(Val::Int(ch)))
			}
			_ => {
				if self.module.function(name).is_some() {
					Err(Trap::Undefined(name.to_string()))
				} else {
					Err(Trap::UnknownFunction(name.to_string()))
				}
			}
		}
	}

	fn global_bytes(&self, global: u32) -> Result<&'m [u8], Trap> {
		let bytes = &self
			.module
			.globals
			.get(global as usize)
			.ok_or(Trap::UnknownGlobal)?
			.bytes;
		let nul = bytes.iter().position(|&byte| byte == 0).unwrap_or(bytes.len());
		Ok(&bytes[..nul])
	}

	fn exec(&mut self, func: &'m Function, args: Vec<Val>) -> Result<Option<Val>, Trap> {
		let mut regs: Vec<Option<Val>> = vec![None; func.value_count() as usize];
		let mut block_index = 0_usize;

		'blocks: loop {
			let block = &func.blocks[block_index];
			for inst in &block.insts {
				let eval = |operand: &Operand, regs: &[Option<Val>]| -> Result<Val, Trap> {
					match operand {
						Operand::Value(id) => regs
							.get(id.0 as usize)
							.and_then(Clone::clone)
							.ok_or_else(|| Trap::UnboundValue(func.name.clone())),
						Operand::Arg(index) => args
							.get(*index as usize)
							.cloned()
							.ok_or_else(|| Trap::Arity(func.name.clone())),
						Operand::Global(id) => Ok(Val::Str(id.0)),
						Operand::ConstInt { value, .. } => Ok(Val::Int(*value)),
						Operand::ConstFloat { value, .. } => Ok(Val::Float(*value)),
						Operand::Undef(ty) => Ok(zero_of(ty)),
					}
				};
				let mut set = |dest, value: Val, regs: &mut Vec<Option<Val>>| {
					if let Some(crate::value::ValueId(id)) = dest {
						regs[id as usize] = Some(value);
					}
				};

				match &inst.op {
					Op::Alloca { ty } => {
						self.cells.push(zero_of(ty));
						set(inst.dest, Val::Cell(self.cells.len() - 1), &mut regs);
					}
					Op::Load { ptr, .. } => {
						let value = match eval(ptr, &regs)? {
							Val::Cell(index) => self.cells[index].clone(),
							_ => return Err(Trap::Expected("pointer")),
						};
						set(inst.dest, value, &mut regs);
					}
					Op::Store { value, ptr, .. } => {
						let value = eval(value, &regs)?;
						match eval(ptr, &regs)? {
							Val::Cell(index) => self.cells[index] = value,
							_ => return Err(Trap::Expected("pointer")),
						}
					}
					Op::Call { callee, args: call_args, .. } => {
						let mut values = Vec::with_capacity(call_args.len());
						for (_, operand) in call_args {
							values.push(eval(operand, &regs)?);
						}
						let result = self.call(callee, values)?;
						if inst.dest.is_some() {
							let value = result.ok_or(Trap::Expected("return value"))?;
							set(inst.dest, value, &mut regs);
						}
					}
					Op::InsertValue { agg, value, index, .. } => {
						let mut fields = match eval(agg, &regs)? {
							Val::Struct(fields) => fields,
							_ => return Err(Trap::Expected("struct")),
						};
						let value = eval(value, &regs)?;
						if *index >= fields.len() {
							return Err(Trap::Expected("struct field"));
						}
						fields[*index] = value;
						set(inst.dest, Val::Struct(fields), &mut regs);
					}
					Op::ExtractValue { agg, index, .. } => {
						let fields = match eval(agg, &regs)? {
							Val::Struct(fields) => fields,
							_ => return Err(Trap::Expected("struct")),
						};
						let value = fields.get(*index).cloned().ok_or(Trap::Expected("struct field"))?;
						set(inst.dest, value, &mut regs);
					}
					Op::Br { dest } => {
						block_index = dest.0 as usize;
						continue 'blocks;
					}
					Op::CondBr {
						cond,
						then_dest,
						else_dest,
					} => {
						let taken = match eval(cond, &regs)? {
							Val::Int(0) => *else_dest,
							Val::Int(_) => *then_dest,
							_ => return Err(Trap::Expected("boolean")),
						};
						block_index = taken.0 as usize;
						continue 'blocks;
					}
					Op::Switch { value, default, cases, .. } => {
						let scrutinee = match eval(value, &regs)? {
							Val::Int(value) => value,
							_ => return Err(Trap::Expected("integer")),
						};
						let dest = cases
							.iter()
							.find(|(case_value, _)| *case_value == scrutinee)
							.map(|(_, dest)| *dest)
							.unwrap_or(*default);
						block_index = dest.0 as usize;
						continue 'blocks;
					}
					Op::Ret { value, .. } => {
						return match value {
							Some(operand) => Ok(Some(eval(operand, &regs)?)),
							None => Ok(None),
						};
					}
				}
			}
			return Err(Trap::MissingTerminator {
				function: func.name.clone(),
				block: block.label.clone(),
			});
		}
	}
}
