//! Textual emission.
//!
//! The format is LLVM-flavoured: the same instruction mnemonics and type
//! spellings, `%t<n>` registers, `%a<n>` arguments, `!dbg !<line>` debug
//! attachments resolved through a `!DILocation` footer, and one
//! `!DICompileUnit` record naming the source file the module was compiled
//! from. [`crate::parse::parse_module`] reads this form back.

use std::collections::BTreeSet;
use std::fmt;

use crate::instruction::{Inst, Op};
use crate::module::{Function, Global, Module};
use crate::value::{BlockId, Operand};

/// Format a symbol for `@` position, quoting anything that is not a plain
/// identifier (mangled names contain `/`).
fn symbol(name: &str) -> String {
	let plain = !name.is_empty()
		&& name
			.chars()
			.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '$'))
		&& !name.starts_with(|ch: char| ch.is_ascii_digit());
	if plain {
		format!("@{name}")
	} else {
		format!("@\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
	}
}

fn write_bytes_as_c_string(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
	write!(f, "c\"")?;
	for &byte in bytes {
		if (0x20..=0x7e).contains(&byte) && byte != b'"' && byte != b'\\' {
			write!(f, "{}", byte as char)?;
		} else {
			write!(f, "\\{byte:02X}")?;
		}
	}
	write!(f, "\"")
}

fn write_operand(f: &mut fmt::Formatter<'_>, module: &Module, operand: &Operand) -> fmt::Result {
	match operand {
		Operand::Value(id) => write!(f, "%t{}", id.0),
		Operand::Arg(index) => write!(f, "%a{index}"),
		Operand::Global(id) => {
			let name = module.global(*id).map_or("<bad global>", |global| global.name.as_str());
			write!(f, "{}", symbol(name))
		}
		Operand::ConstInt { value, .. } => write!(f, "{value}"),
		Operand::ConstFloat { value, .. } => write!(f, "0x{:016X}", value.to_bits()),
		Operand::Undef(_) => write!(f, "undef"),
	}
}

fn label_of(func: &Function, id: BlockId) -> &str {
	func.block(id).map_or("<bad block>", |block| block.label.as_str())
}

fn write_inst(f: &mut fmt::Formatter<'_>, module: &Module, func: &Function, inst: &Inst) -> fmt::Result {
	write!(f, "\t")?;
	if let Some(dest) = inst.dest {
		write!(f, "%t{} = ", dest.0)?;
	}
	match &inst.op {
		Op::Alloca { ty } => write!(f, "alloca {ty}")?,
		Op::Load { ty, ptr } => {
			write!(f, "load {ty}, {ty}* ")?;
			write_operand(f, module, ptr)?;
		}
		Op::Store { ty, value, ptr } => {
			write!(f, "store {ty} ")?;
			write_operand(f, module, value)?;
			write!(f, ", {ty}* ")?;
			write_operand(f, module, ptr)?;
		}
		Op::Call { ret, callee, args } => {
			match ret {
				Some(ty) => write!(f, "call {ty} ")?,
				None => write!(f, "call void ")?,
			}
			write!(f, "{}(", symbol(callee))?;
			for (index, (ty, operand)) in args.iter().enumerate() {
				if index > 0 {
					write!(f, ", ")?;
				}
				write!(f, "{ty} ")?;
				write_operand(f, module, operand)?;
			}
			write!(f, ")")?;
		}
		Op::InsertValue {
			agg_ty,
			agg,
			value_ty,
			value,
			index,
		} => {
			write!(f, "insertvalue {agg_ty} ")?;
			write_operand(f, module, agg)?;
			write!(f, ", {value_ty} ")?;
			write_operand(f, module, value)?;
			write!(f, ", {index}")?;
		}
		Op::ExtractValue { agg_ty, agg, index } => {
			write!(f, "extractvalue {agg_ty} ")?;
			write_operand(f, module, agg)?;
			write!(f, ", {index}")?;
		}
		Op::Br { dest } => write!(f, "br label %{}", label_of(func, *dest))?,
		Op::CondBr {
			cond,
			then_dest,
			else_dest,
		} => {
			write!(f, "br i1 ")?;
			write_operand(f, module, cond)?;
			write!(
				f,
				", label %{}, label %{}",
				label_of(func, *then_dest),
				label_of(func, *else_dest)
			)?;
		}
		Op::Switch {
			ty,
			value,
			default,
			cases,
		} => {
			write!(f, "switch {ty} ")?;
			write_operand(f, module, value)?;
			write!(f, ", label %{} [", label_of(func, *default))?;
			for (case_value, dest) in cases {
				write!(f, " {ty} {case_value}, label %{}", label_of(func, *dest))?;
			}
			write!(f, " ]")?;
		}
		Op::Ret { ty, value } => match (ty, value) {
			(Some(ty), Some(value)) => {
				write!(f, "ret {ty} ")?;
				write_operand(f, module, value)?;
			}
			_ => write!(f, "ret void")?,
		},
	}
	if let Some(line) = inst.line {
		write!(f, ", !dbg !{line}")?;
	}
	Ok(())
}

fn write_global(f: &mut fmt::Formatter<'_>, global: &Global) -> fmt::Result {
	write!(f, "{} = private constant [{} x i8] ", symbol(&global.name), global.bytes.len())?;
	write_bytes_as_c_string(f, &global.bytes)?;
	writeln!(f)
}

fn write_function(f: &mut fmt::Formatter<'_>, module: &Module, func: &Function) -> fmt::Result {
	let ret = func.ret.as_ref().map_or_else(|| "void".to_string(), ToString::to_string);
	if func.is_declaration() {
		write!(f, "declare {ret} {}(", symbol(&func.name))?;
		for (index, ty) in func.params.iter().enumerate() {
			if index > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{ty}")?;
		}
		return writeln!(f, ")");
	}

	write!(f, "define {ret} {}(", symbol(&func.name))?;
	for (index, ty) in func.params.iter().enumerate() {
		if index > 0 {
			write!(f, ", ")?;
		}
		write!(f, "{ty} %a{index}")?;
	}
	writeln!(f, ") {{")?;
	for (index, block) in func.blocks.iter().enumerate() {
		if index > 0 {
			writeln!(f)?;
		}
		writeln!(f, "{}:", block.label)?;
		for inst in &block.insts {
			write_inst(f, module, func, inst)?;
			writeln!(f)?;
		}
	}
	writeln!(f, "}}")
}

impl fmt::Display for Module {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "; ModuleID = '{}'", self.name)?;
		writeln!(f, "source_filename = \"{}\"", self.source_filename)?;

		if !self.globals.is_empty() {
			writeln!(f)?;
			for global in &self.globals {
				write_global(f, global)?;
			}
		}

		for func in &self.functions {
			writeln!(f)?;
			write_function(f, self, func)?;
		}

		// Debug metadata footer: the compile unit plus one location record
		// per distinct source line referenced above.
		let lines: BTreeSet<u32> = self
			.functions
			.iter()
			.flat_map(|func| &func.blocks)
			.flat_map(|block| &block.insts)
			.filter_map(|inst| inst.line)
			.collect();
		writeln!(f)?;
		writeln!(
			f,
			"!0 = !DICompileUnit(file: \"{}\", producer: \"chi compiler\")",
			self.source_filename
		)?;
		for line in lines {
			writeln!(f, "!{line} = !DILocation(line: {line}, scope: !0)")?;
		}
		Ok(())
	}
}
