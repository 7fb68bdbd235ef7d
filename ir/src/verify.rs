//! Module well-formedness checks.
//!
//! The builder makes it easy to produce structurally broken IR (a block left
//! unterminated, a branch into a block that was never created, an operand
//! from another function). Verification catches those before the module is
//! printed, encoded, or executed; the compiler runs it on everything it
//! generates.

use crate::instruction::Op;
use crate::module::{Block, Function, Module};
use crate::types::Type;
use crate::value::Operand;

/// A structural defect in a module.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
	#[error("function `{function}` is defined more than once")]
	DuplicateFunction { function: String },
	#[error("block `{block}` of `{function}` has no terminator")]
	UnterminatedBlock { function: String, block: String },
	#[error("block `{block}` of `{function}` has a terminator before its end")]
	TerminatorMidBlock { function: String, block: String },
	#[error("block `{block}` of `{function}` branches to a block that doesn't exist")]
	BadBlockRef { function: String, block: String },
	#[error("`{function}` uses register %t{value} which is never defined")]
	UndefinedValue { function: String, value: u32 },
	#[error("`{function}` uses argument %a{index} but takes {arity}")]
	BadArgRef { function: String, index: u32, arity: usize },
	#[error("`{function}` references global {index} of {count}")]
	BadGlobalRef { function: String, index: u32, count: usize },
	#[error("`{function}` calls `{callee}`, which is not present in the module")]
	UnknownCallee { function: String, callee: String },
	#[error("`{function}` calls `{callee}` with {given} arguments, expected {expected}")]
	CallArity {
		function: String,
		callee: String,
		given: usize,
		expected: usize,
	},
	#[error("integer constant typed {0} in `{1}`")]
	BadIntType(Type, String),
	#[error("float constant typed {0} in `{1}`")]
	BadFloatType(Type, String),
}

fn check_operand(module: &Module, func: &Function, operand: &Operand) -> Result<(), VerifyError> {
	match operand {
		Operand::Value(id) => {
			if id.0 >= func.value_count() {
				return Err(VerifyError::UndefinedValue {
					function: func.name.clone(),
					value: id.0,
				});
			}
		}
		Operand::Arg(index) => {
			if *index as usize >= func.params.len() {
				return Err(VerifyError::BadArgRef {
					function: func.name.clone(),
					index: *index,
					arity: func.params.len(),
				});
			}
		}
		Operand::Global(id) => {
			if id.0 as usize >= module.globals.len() {
				return Err(VerifyError::BadGlobalRef {
					function: func.name.clone(),
					index: id.0,
					count: module.globals.len(),
				});
			}
		}
		Operand::ConstInt { ty, .. } => {
			if !ty.is_integer() {
				return Err(VerifyError::BadIntType(ty.clone(), func.name.clone()));
			}
		}
		Operand::ConstFloat { ty, .. } => {
			if !ty.is_float() {
				return Err(VerifyError::BadFloatType(ty.clone(), func.name.clone()));
			}
		}
		Operand::Undef(_) => {}
	}
	Ok(())
}

fn check_block_ref(func: &Function, block: &Block, dest: crate::value::BlockId) -> Result<(), VerifyError> {
	if dest.0 as usize >= func.blocks.len() {
		return Err(VerifyError::BadBlockRef {
			function: func.name.clone(),
			block: block.label.clone(),
		});
	}
	Ok(())
}

fn check_function(module: &Module, func: &Function) -> Result<(), VerifyError> {
	for block in &func.blocks {
		if !block.is_terminated() {
			return Err(VerifyError::UnterminatedBlock {
				function: func.name.clone(),
				block: block.label.clone(),
			});
		}
		for (index, inst) in block.insts.iter().enumerate() {
			if inst.op.is_terminator() && index + 1 != block.insts.len() {
				return Err(VerifyError::TerminatorMidBlock {
					function: func.name.clone(),
					block: block.label.clone(),
				});
			}

			match &inst.op {
				Op::Alloca { .. } => {}
				Op::Load { ptr, .. } => check_operand(module, func, ptr)?,
				Op::Store { value, ptr, .. } => {
					check_operand(module, func, value)?;
					check_operand(module, func, ptr)?;
				}
				Op::Call { callee, args, .. } => {
					for (_, operand) in args {
						check_operand(module, func, operand)?;
					}
					let Some(target) = module.function(callee) else {
						return Err(VerifyError::UnknownCallee {
							function: func.name.clone(),
							callee: callee.clone(),
						});
					};
					if target.params.len() != args.len() {
						return Err(VerifyError::CallArity {
							function: func.name.clone(),
							callee: callee.clone(),
							given: args.len(),
							expected: target.params.len(),
						});
					}
				}
				Op::InsertValue { agg, value, .. } => {
					check_operand(module, func, agg)?;
					check_operand(module, func, value)?;
				}
				Op::ExtractValue { agg, .. } => check_operand(module, func, agg)?,
				Op::Br { dest } => check_block_ref(func, block, *dest)?,
				Op::CondBr {
					cond,
					then_dest,
					else_dest,
				} => {
					check_operand(module, func, cond)?;
					check_block_ref(func, block, *then_dest)?;
					check_block_ref(func, block, *else_dest)?;
				}
				Op::Switch { value, default, cases, .. } => {
					check_operand(module, func, value)?;
					check_block_ref(func, block, *default)?;
					for (_, dest) in cases {
						check_block_ref(func, block, *dest)?;
					}
				}
				Op::Ret { value, .. } => {
					if let Some(value) = value {
						check_operand(module, func, value)?;
					}
				}
			}
		}
	}
	Ok(())
}

/// Check a whole module. The first defect is returned; a verified module is
/// safe to print, encode, and interpret without hitting structural traps.
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
	for (index, func) in module.functions.iter().enumerate() {
		if module.functions[..index].iter().any(|other| other.name == func.name) {
			return Err(VerifyError::DuplicateFunction {
				function: func.name.clone(),
			});
		}
		check_function(module, func)?;
	}
	Ok(())
}
