//! Module, function and block containers, plus the builder methods the
//! compiler drives.

use crate::instruction::{Inst, Op};
use crate::types::Type;
use crate::value::{BlockId, GlobalId, ValueId};

/// A named constant byte string (NUL-terminated).
#[derive(Clone, Debug, PartialEq)]
pub struct Global {
	pub name: String,
	pub bytes: Vec<u8>,
}

/// A basic block: a label and its instructions. The last instruction of a
/// well-formed block is a terminator.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
	pub label: String,
	pub insts: Vec<Inst>,
}

impl Block {
	pub fn is_terminated(&self) -> bool {
		self.insts.last().is_some_and(|inst| inst.op.is_terminator())
	}
}

/// A function. An empty block list makes it a declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
	pub name: String,
	pub params: Vec<Type>,
	pub ret: Option<Type>,
	pub blocks: Vec<Block>,
	next_value: u32,
}

impl Function {
	pub fn new(name: impl Into<String>, params: Vec<Type>, ret: Option<Type>) -> Self {
		Self {
			name: name.into(),
			params,
			ret,
			blocks: Vec::new(),
			next_value: 0,
		}
	}

	pub fn is_declaration(&self) -> bool {
		self.blocks.is_empty()
	}

	/// Number of registers defined so far; registers are dense in `0..count`.
	pub fn value_count(&self) -> u32 {
		self.next_value
	}

	/// Append an empty block and return its id. Labels are expected to be
	/// unique within the function; the builder does not rename.
	pub fn add_block(&mut self, label: impl Into<String>) -> BlockId {
		let id = BlockId(self.blocks.len() as u32);
		self.blocks.push(Block {
			label: label.into(),
			insts: Vec::new(),
		});
		id
	}

	pub fn block(&self, id: BlockId) -> Option<&Block> {
		self.blocks.get(id.0 as usize)
	}

	pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
		self.blocks.get_mut(id.0 as usize)
	}

	/// Find a block by label.
	pub fn block_by_label(&self, label: &str) -> Option<BlockId> {
		self.blocks
			.iter()
			.position(|block| block.label == label)
			.map(|index| BlockId(index as u32))
	}

	/// Append `op` to `block`, allocating a destination register when the
	/// operation produces one. Returns that register.
	pub fn emit(&mut self, block: BlockId, op: Op, line: Option<u32>) -> Option<ValueId> {
		let dest = if op.produces_value() {
			let id = ValueId(self.next_value);
			self.next_value += 1;
			Some(id)
		} else {
			None
		};
		self.blocks[block.0 as usize].insts.push(Inst { dest, op, line });
		dest
	}

	/// Recompute the register counter from instruction destinations. The
	/// parser and decoder call this after reconstructing a function.
	pub fn recompute_value_count(&mut self) {
		let max = self
			.blocks
			.iter()
			.flat_map(|block| &block.insts)
			.filter_map(|inst| inst.dest)
			.map(|ValueId(id)| id + 1)
			.max();
		self.next_value = max.unwrap_or(0);
	}
}

/// A compilation unit: globals plus functions, with enough debug metadata to
/// point diagnostics back at the source file the graph came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
	pub name: String,
	pub source_filename: String,
	pub globals: Vec<Global>,
	pub functions: Vec<Function>,
}

impl Module {
	pub fn new(name: impl Into<String>, source_filename: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			source_filename: source_filename.into(),
			globals: Vec::new(),
			functions: Vec::new(),
		}
	}

	/// Intern a NUL-terminated string constant; identical strings share one
	/// global.
	pub fn add_global_string(&mut self, text: &str) -> GlobalId {
		let mut bytes = text.as_bytes().to_vec();
		bytes.push(0);
		if let Some(index) = self.globals.iter().position(|global| global.bytes == bytes) {
			return GlobalId(index as u32);
		}
		let id = GlobalId(self.globals.len() as u32);
		self.globals.push(Global {
			name: format!("str.{}", id.0),
			bytes,
		});
		id
	}

	pub fn global(&self, id: GlobalId) -> Option<&Global> {
		self.globals.get(id.0 as usize)
	}

	/// Ensure a declaration for `name` exists. Existing functions (defined or
	/// declared) are left untouched.
	pub fn declare_function(&mut self, name: &str, params: Vec<Type>, ret: Option<Type>) {
		if self.function(name).is_none() {
			self.functions.push(Function::new(name, params, ret));
		}
	}

	/// Install a definition, replacing a pre-existing declaration of the same
	/// name.
	pub fn define_function(&mut self, func: Function) {
		if let Some(index) = self.functions.iter().position(|f| f.name == func.name) {
			self.functions[index] = func;
		} else {
			self.functions.push(func);
		}
	}

	pub fn function(&self, name: &str) -> Option<&Function> {
		self.functions.iter().find(|func| func.name == name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::Operand;

	#[test]
	fn emit_allocates_dense_registers() {
		let mut func = Function::new("f", vec![], Some(Type::I32));
		let entry = func.add_block("entry");
		let a = func.emit(entry, Op::Alloca { ty: Type::I32 }, None).unwrap();
		let b = func.emit(entry, Op::Alloca { ty: Type::I1 }, None).unwrap();
		assert_eq!((a, b), (ValueId(0), ValueId(1)));
		let none = func.emit(
			entry,
			Op::Ret {
				ty: Some(Type::I32),
				value: Some(Operand::const_i32(0)),
			},
			None,
		);
		assert_eq!(none, None);
		assert_eq!(func.value_count(), 2);
		assert!(func.block(entry).unwrap().is_terminated());
	}

	#[test]
	fn global_strings_are_interned() {
		let mut module = Module::new("m", "m.chimod");
		let a = module.add_global_string("hello");
		let b = module.add_global_string("hello");
		let c = module.add_global_string("world");
		assert_eq!(a, b);
		assert_ne!(a, c);
		assert_eq!(module.global(a).unwrap().bytes, b"hello\0");
	}

	#[test]
	fn define_replaces_declaration() {
		let mut module = Module::new("m", "m.chimod");
		module.declare_function("f", vec![Type::I32], Some(Type::I32));
		assert!(module.function("f").unwrap().is_declaration());

		let mut func = Function::new("f", vec![Type::I32], Some(Type::I32));
		let entry = func.add_block("entry");
		func.emit(
			entry,
			Op::Ret {
				ty: Some(Type::I32),
				value: Some(Operand::Arg(0)),
			},
			None,
		);
		module.define_function(func);
		assert!(!module.function("f").unwrap().is_declaration());
		assert_eq!(module.functions.len(), 1);
	}
}
