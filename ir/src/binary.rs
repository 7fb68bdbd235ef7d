//! Binary (bitcode-style) encoding of a module.
//!
//! The stream is `CHIB` + a version byte + LEB128-encoded sections. It
//! carries exactly the same information as the textual form, so
//! encode → decode is lossless and `chi interpret` accepts either off stdin
//! (sniffed by magic).

use crate::instruction::{Inst, Op};
use crate::module::{Block, Function, Global, Module};
use crate::types::Type;
use crate::value::{BlockId, GlobalId, Operand, ValueId};

/// Stream magic.
pub const MAGIC: [u8; 4] = *b"CHIB";
const VERSION: u8 = 1;

/// Whether a byte stream looks like chi bitcode rather than textual IR.
pub fn is_binary(bytes: &[u8]) -> bool {
	bytes.starts_with(&MAGIC)
}

/// A malformed bitcode stream.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
	#[error("not a chi bitcode stream")]
	BadMagic,
	#[error("unsupported bitcode version {0}")]
	BadVersion(u8),
	#[error("unexpected end of stream")]
	UnexpectedEof,
	#[error("malformed varint")]
	InvalidVarint,
	#[error("string payload is not UTF-8")]
	BadString,
	#[error("unknown {what} tag {tag}")]
	BadTag { what: &'static str, tag: u8 },
}

fn write_uleb(out: &mut Vec<u8>, mut value: u64) {
	loop {
		let mut byte = (value & 0x7f) as u8;
		value >>= 7;
		if value != 0 {
			byte |= 0x80;
		}
		out.push(byte);
		if value == 0 {
			break;
		}
	}
}

fn write_sleb(out: &mut Vec<u8>, mut value: i64) {
	loop {
		let byte = (value & 0x7f) as u8;
		value >>= 7;
		let sign_clear = byte & 0x40 == 0;
		if (value == 0 && sign_clear) || (value == -1 && !sign_clear) {
			out.push(byte);
			break;
		}
		out.push(byte | 0x80);
	}
}

struct Reader<'a> {
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> Reader<'a> {
	fn byte(&mut self) -> Result<u8, DecodeError> {
		let byte = *self.bytes.get(self.pos).ok_or(DecodeError::UnexpectedEof)?;
		self.pos += 1;
		Ok(byte)
	}

	fn uleb(&mut self) -> Result<u64, DecodeError> {
		let mut value: u64 = 0;
		let mut shift: u32 = 0;
		for step in 0..10 {
			let byte = self.byte()?;
			let payload = byte & 0x7f;
			if step == 9 && payload > 1 {
				return Err(DecodeError::InvalidVarint);
			}
			value |= u64::from(payload) << shift;
			if byte & 0x80 == 0 {
				return Ok(value);
			}
			shift += 7;
		}
		Err(DecodeError::InvalidVarint)
	}

	fn sleb(&mut self) -> Result<i64, DecodeError> {
		let mut value: i64 = 0;
		let mut shift: u32 = 0;
		let mut last: u8 = 0;
		for step in 0..10 {
			let byte = self.byte()?;
			last = byte;
			let payload = byte & 0x7f;
			if step == 9 && payload != 0x00 && payload != 0x7f {
				return Err(DecodeError::InvalidVarint);
			}
			value |= i64::from(payload) << shift;
			shift += 7;
			if byte & 0x80 == 0 {
				break;
			}
		}
		if last & 0x80 != 0 {
			return Err(DecodeError::InvalidVarint);
		}
		if shift < 64 && last & 0x40 != 0 {
			value |= (!0_i64) << shift;
		}
		Ok(value)
	}

	fn len(&mut self) -> Result<usize, DecodeError> {
		usize::try_from(self.uleb()?).map_err(|_| DecodeError::InvalidVarint)
	}

	fn raw(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
		let end = self.pos.checked_add(len).ok_or(DecodeError::UnexpectedEof)?;
		let slice = self.bytes.get(self.pos..end).ok_or(DecodeError::UnexpectedEof)?;
		self.pos = end;
		Ok(slice)
	}

	fn string(&mut self) -> Result<String, DecodeError> {
		let len = self.len()?;
		let raw = self.raw(len)?;
		String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::BadString)
	}
}

fn write_string(out: &mut Vec<u8>, text: &str) {
	write_uleb(out, text.len() as u64);
	out.extend_from_slice(text.as_bytes());
}

fn write_type(out: &mut Vec<u8>, ty: &Type) {
	match ty {
		Type::I1 => out.push(0),
		Type::I8 => out.push(1),
		Type::I16 => out.push(2),
		Type::I32 => out.push(3),
		Type::I64 => out.push(4),
		Type::F32 => out.push(5),
		Type::F64 => out.push(6),
		Type::Ptr(inner) => {
			out.push(7);
			write_type(out, inner);
		}
		Type::Struct(fields) => {
			out.push(8);
			write_uleb(out, fields.len() as u64);
			for field in fields {
				write_type(out, field);
			}
		}
	}
}

fn read_type(reader: &mut Reader<'_>) -> Result<Type, DecodeError> {
	Ok(match reader.byte()? {
		0 => Type::I1,
		1 => Type::I8,
		2 => Type::I16,
		3 => Type::I32,
		4 => Type::I64,
		5 => Type::F32,
		6 => Type::F64,
		7 => read_type(reader)?.pointer_to(),
		8 => {
			let count = reader.len()?;
			let mut fields = Vec::with_capacity(count.min(64));
			for _ in 0..count {
				fields.push(read_type(reader)?);
			}
			Type::Struct(fields)
		}
		tag => return Err(DecodeError::BadTag { what: "type", tag }),
	})
}

fn write_opt_type(out: &mut Vec<u8>, ty: Option<&Type>) {
	match ty {
		None => out.push(0),
		Some(ty) => {
			out.push(1);
			write_type(out, ty);
		}
	}
}

fn read_opt_type(reader: &mut Reader<'_>) -> Result<Option<Type>, DecodeError> {
	match reader.byte()? {
		0 => Ok(None),
		1 => Ok(Some(read_type(reader)?)),
		tag => Err(DecodeError::BadTag { what: "optional type", tag }),
	}
}

fn write_operand(out: &mut Vec<u8>, operand: &Operand) {
	match operand {
		Operand::Value(id) => {
			out.push(0);
			write_uleb(out, u64::from(id.0));
		}
		Operand::Arg(index) => {
			out.push(1);
			write_uleb(out, u64::from(*index));
		}
		Operand::Global(id) => {
			out.push(2);
			write_uleb(out, u64::from(id.0));
		}
		Operand::ConstInt { ty, value } => {
			out.push(3);
			write_type(out, ty);
			write_sleb(out, *value);
		}
		Operand::ConstFloat { ty, value } => {
			out.push(4);
			write_type(out, ty);
			out.extend_from_slice(&value.to_bits().to_le_bytes());
		}
		Operand::Undef(ty) => {
			out.push(5);
			write_type(out, ty);
		}
	}
}

fn read_operand(reader: &mut Reader<'_>) -> Result<Operand, DecodeError> {
	Ok(match reader.byte()? {
		0 => Operand::Value(ValueId(reader.uleb()? as u32)),
		1 => Operand::Arg(reader.uleb()? as u32),
		2 => Operand::Global(GlobalId(reader.uleb()? as u32)),
		3 => {
			let ty = read_type(reader)?;
			let value = reader.sleb()?;
			Operand::ConstInt { ty, value }
		}
		4 => {
			let ty = read_type(reader)?;
			let raw = reader.raw(8)?;
			let mut bytes = [0_u8; 8];
			bytes.copy_from_slice(raw);
			Operand::ConstFloat {
				ty,
				value: f64::from_bits(u64::from_le_bytes(bytes)),
			}
		}
		5 => Operand::Undef(read_type(reader)?),
		tag => return Err(DecodeError::BadTag { what: "operand", tag }),
	})
}

fn write_block_ref(out: &mut Vec<u8>, id: BlockId) {
	write_uleb(out, u64::from(id.0));
}

fn read_block_ref(reader: &mut Reader<'_>) -> Result<BlockId, DecodeError> {
	Ok(BlockId(reader.uleb()? as u32))
}

fn write_inst(out: &mut Vec<u8>, inst: &Inst) {
	match inst.dest {
		None => out.push(0),
		Some(id) => {
			out.push(1);
			write_uleb(out, u64::from(id.0));
		}
	}
	match &inst.op {
		Op::Alloca { ty } => {
			out.push(0);
			write_type(out, ty);
		}
		Op::Load { ty, ptr } => {
			out.push(1);
			write_type(out, ty);
			write_operand(out, ptr);
		}
		Op::Store { ty, value, ptr } => {
			out.push(2);
			write_type(out, ty);
			write_operand(out, value);
			write_operand(out, ptr);
		}
		Op::Call { ret, callee, args } => {
			out.push(3);
			write_opt_type(out, ret.as_ref());
			write_string(out, callee);
			write_uleb(out, args.len() as u64);
			for (ty, operand) in args {
				write_type(out, ty);
				write_operand(out, operand);
			}
		}
		Op::InsertValue {
			agg_ty,
			agg,
			value_ty,
			value,
			index,
		} => {
			out.push(4);
			write_type(out, agg_ty);
			write_operand(out, agg);
			write_type(out, value_ty);
			write_operand(out, value);
			write_uleb(out, *index as u64);
		}
		Op::ExtractValue { agg_ty, agg, index } => {
			out.push(5);
			write_type(out, agg_ty);
			write_operand(out, agg);
			write_uleb(out, *index as u64);
		}
		Op::Br { dest } => {
			out.push(6);
			write_block_ref(out, *dest);
		}
		Op::CondBr {
			cond,
			then_dest,
			else_dest,
		} => {
			out.push(7);
			write_operand(out, cond);
			write_block_ref(out, *then_dest);
			write_block_ref(out, *else_dest);
		}
		Op::Switch {
			ty,
			value,
			default,
			cases,
		} => {
			out.push(8);
			write_type(out, ty);
			write_operand(out, value);
			write_block_ref(out, *default);
			write_uleb(out, cases.len() as u64);
			for (case_value, dest) in cases {
				write_sleb(out, *case_value);
				write_block_ref(out, *dest);
			}
		}
		Op::Ret { ty, value } => {
			out.push(9);
			write_opt_type(out, ty.as_ref());
			if let Some(value) = value {
				write_operand(out, value);
			}
		}
	}
	match inst.line {
		None => out.push(0),
		Some(line) => {
			out.push(1);
			write_uleb(out, u64::from(line));
		}
	}
}

fn read_inst(reader: &mut Reader<'_>) -> Result<Inst, DecodeError> {
	let dest = match reader.byte()? {
		0 => None,
		1 => Some(ValueId(reader.uleb()? as u32)),
		tag => return Err(DecodeError::BadTag { what: "destination", tag }),
	};
	let op = match reader.byte()? {
		0 => Op::Alloca { ty: read_type(reader)? },
		1 => {
			let ty = read_type(reader)?;
			let ptr = read_operand(reader)?;
			Op::Load { ty, ptr }
		}
		2 => {
			let ty = read_type(reader)?;
			let value = read_operand(reader)?;
			let ptr = read_operand(reader)?;
			Op::Store { ty, value, ptr }
		}
		3 => {
			let ret = read_opt_type(reader)?;
			let callee = reader.string()?;
			let count = reader.len()?;
			let mut args = Vec::with_capacity(count.min(64));
			for _ in 0..count {
				let ty = read_type(reader)?;
				let operand = read_operand(reader)?;
				args.push((ty, operand));
			}
			Op::Call { ret, callee, args }
		}
		4 => {
			let agg_ty = read_type(reader)?;
			let agg = read_operand(reader)?;
			let value_ty = read_type(reader)?;
			let value = read_operand(reader)?;
			let index = reader.len()?;
			Op::InsertValue {
				agg_ty,
				agg,
				value_ty,
				value,
				index,
			}
		}
		5 => {
			let agg_ty = read_type(reader)?;
			let agg = read_operand(reader)?;
			let index = reader.len()?;
			Op::ExtractValue { agg_ty, agg, index }
		}
		6 => Op::Br {
			dest: read_block_ref(reader)?,
		},
		7 => {
			let cond = read_operand(reader)?;
			let then_dest = read_block_ref(reader)?;
			let else_dest = read_block_ref(reader)?;
			Op::CondBr {
				cond,
				then_dest,
				else_dest,
			}
		}
		8 => {
			let ty = read_type(reader)?;
			let value = read_operand(reader)?;
			let default = read_block_ref(reader)?;
			let count = reader.len()?;
			let mut cases = Vec::with_capacity(count.min(64));
			for _ in 0..count {
				let case_value = reader.sleb()?;
				let dest = read_block_ref(reader)?;
				cases.push((case_value, dest));
			}
			Op::Switch {
				ty,
				value,
				default,
				cases,
			}
		}
		9 => {
			let ty = read_opt_type(reader)?;
			let value = match &ty {
				Some(_) => Some(read_operand(reader)?),
				None => None,
			};
			Op::Ret { ty, value }
		}
		tag => return Err(DecodeError::BadTag { what: "instruction", tag }),
	};
	let line = match reader.byte()? {
		0 => None,
		1 => Some(reader.uleb()? as u32),
		tag => return Err(DecodeError::BadTag { what: "debug line", tag }),
	};
	Ok(Inst { dest, op, line })
}

/// Encode a module to the binary stream.
pub fn encode(module: &Module) -> Vec<u8> {
	let mut out = Vec::new();
	out.extend_from_slice(&MAGIC);
	out.push(VERSION);
	write_string(&mut out, &module.name);
	write_string(&mut out, &module.source_filename);

	write_uleb(&mut out, module.globals.len() as u64);
	for global in &module.globals {
		write_string(&mut out, &global.name);
		write_uleb(&mut out, global.bytes.len() as u64);
		out.extend_from_slice(&global.bytes);
	}

	write_uleb(&mut out, module.functions.len() as u64);
	for func in &module.functions {
		write_string(&mut out, &func.name);
		write_uleb(&mut out, func.params.len() as u64);
		for param in &func.params {
			write_type(&mut out, param);
		}
		write_opt_type(&mut out, func.ret.as_ref());
		write_uleb(&mut out, func.blocks.len() as u64);
		for block in &func.blocks {
			write_string(&mut out, &block.label);
			write_uleb(&mut out, block.insts.len() as u64);
			for inst in &block.insts {
				write_inst(&mut out, inst);
			}
		}
	}
	out
}

/// Decode a binary stream back into a module.
pub fn decode(bytes: &[u8]) -> Result<Module, DecodeError> {
	if !is_binary(bytes) {
		return Err(DecodeError::BadMagic);
	}
	let mut reader = Reader { bytes, pos: MAGIC.len() };
	let version = reader.byte()?;
	if version != VERSION {
		return Err(DecodeError::BadVersion(version));
	}

	let name = reader.string()?;
	let source_filename = reader.string()?;
	let mut module = Module::new(name, source_filename);

	let global_count = reader.len()?;
	for _ in 0..global_count {
		let name = reader.string()?;
		let len = reader.len()?;
		let bytes = reader.raw(len)?.to_vec();
		module.globals.push(Global { name, bytes });
	}

	let function_count = reader.len()?;
	for _ in 0..function_count {
		let name = reader.string()?;
		let param_count = reader.len()?;
		let mut params = Vec::with_capacity(param_count.min(64));
		for _ in 0..param_count {
			params.push(read_type(&mut reader)?);
		}
		let ret = read_opt_type(&mut reader)?;
		let mut func = Function::new(name, params, ret);
		let block_count = reader.len()?;
		for _ in 0..block_count {
			let label = reader.string()?;
			let block = func.add_block(label);
			let inst_count = reader.len()?;
			for _ in 0..inst_count {
				let inst = read_inst(&mut reader)?;
				func.blocks[block.0 as usize].insts.push(inst);
			}
		}
		func.recompute_value_count();
		module.functions.push(func);
	}
	Ok(module)
}
