//! Parser for the textual IR form.
//!
//! `chi interpret` accepts on stdin exactly what `chi compile` printed, so
//! this parser reads back everything [`crate::text`] emits: globals,
//! declarations, definitions, `!dbg` attachments, and the metadata footer
//! (which only repeats information already present and is skipped).

use std::collections::HashMap;

use crate::instruction::Op;
use crate::module::{Function, Global, Module};
use crate::types::Type;
use crate::value::{BlockId, GlobalId, Operand, ValueId};

/// A textual-IR syntax error, positioned by 1-based source line.
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
	pub line: usize,
	pub message: String,
}

fn err(line: usize, message: impl Into<String>) -> ParseError {
	ParseError {
		line,
		message: message.into(),
	}
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
	Ident(String),
	Int(i64),
	HexInt(u64),
	/// `%name`
	Percent(String),
	/// `@name` or `@"name"`
	At(String),
	/// `!name-or-digits`
	Bang(String),
	/// `c"..."`
	CStr(Vec<u8>),
	/// `"..."`
	Str(String),
	Punct(char),
}

fn lex(line: usize, text: &str) -> Result<Vec<Tok>, ParseError> {
	let mut toks = Vec::new();
	let bytes: Vec<char> = text.chars().collect();
	let mut pos = 0;

	let ident_start = |ch: char| ch.is_ascii_alphabetic() || matches!(ch, '_' | '.' | '$');
	let ident_char = |ch: char| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '$');

	while pos < bytes.len() {
		let ch = bytes[pos];
		match ch {
			' ' | '\t' => pos += 1,
			';' => break,
			'=' | ',' | '(' | ')' | '[' | ']' | '{' | '}' | '*' | ':' => {
				toks.push(Tok::Punct(ch));
				pos += 1;
			}
			'%' | '@' | '!' => {
				pos += 1;
				if ch == '@' && bytes.get(pos) == Some(&'"') {
					let (string, next) = lex_string(line, &bytes, pos + 1)?;
					toks.push(Tok::At(string));
					pos = next;
					continue;
				}
				let start = pos;
				while pos < bytes.len() && ident_char(bytes[pos]) {
					pos += 1;
				}
				if start == pos {
					return Err(err(line, format!("dangling `{ch}`")));
				}
				let name: String = bytes[start..pos].iter().collect();
				toks.push(match ch {
					'%' => Tok::Percent(name),
					'@' => Tok::At(name),
					_ => Tok::Bang(name),
				});
			}
			'"' => {
				let (string, next) = lex_string(line, &bytes, pos + 1)?;
				toks.push(Tok::Str(string));
				pos = next;
			}
			'c' if bytes.get(pos + 1) == Some(&'"') => {
				let (raw, next) = lex_c_string(line, &bytes, pos + 2)?;
				toks.push(Tok::CStr(raw));
				pos = next;
			}
			'-' => {
				pos += 1;
				let start = pos;
				while pos < bytes.len() && bytes[pos].is_ascii_digit() {
					pos += 1;
				}
				if start == pos {
					return Err(err(line, "dangling `-`"));
				}
				let digits: String = bytes[start..pos].iter().collect();
				let value: i64 = digits.parse().map_err(|_| err(line, "integer out of range"))?;
				toks.push(Tok::Int(-value));
			}
			'0' if bytes.get(pos + 1) == Some(&'x') => {
				pos += 2;
				let start = pos;
				while pos < bytes.len() && bytes[pos].is_ascii_hexdigit() {
					pos += 1;
				}
				let digits: String = bytes[start..pos].iter().collect();
				let value = u64::from_str_radix(&digits, 16).map_err(|_| err(line, "bad hex literal"))?;
				toks.push(Tok::HexInt(value));
			}
			_ if ch.is_ascii_digit() => {
				let start = pos;
				while pos < bytes.len() && bytes[pos].is_ascii_digit() {
					pos += 1;
				}
				let digits: String = bytes[start..pos].iter().collect();
				let value: i64 = digits.parse().map_err(|_| err(line, "integer out of range"))?;
				toks.push(Tok::Int(value));
			}
			_ if ident_start(ch) => {
				let start = pos;
				while pos < bytes.len() && ident_char(bytes[pos]) {
					pos += 1;
				}
				toks.push(Tok::Ident(bytes[start..pos].iter().collect()));
			}
			_ => return Err(err(line, format!("unexpected character `{ch}`"))),
		}
	}
	Ok(toks)
}

fn lex_string(line: usize, bytes: &[char], mut pos: usize) -> Result<(String, usize), ParseError> {
	let mut out = String::new();
	while pos < bytes.len() {
		match bytes[pos] {
			'"' => return Ok((out, pos + 1)),
			'\\' => {
				let escaped = bytes.get(pos + 1).ok_or_else(|| err(line, "unterminated escape"))?;
				out.push(*escaped);
				pos += 2;
			}
			ch => {
				out.push(ch);
				pos += 1;
			}
		}
	}
	Err(err(line, "unterminated string"))
}

fn lex_c_string(line: usize, bytes: &[char], mut pos: usize) -> Result<(Vec<u8>, usize), ParseError> {
	let mut out = Vec::new();
	while pos < bytes.len() {
		match bytes[pos] {
			'"' => return Ok((out, pos + 1)),
			'\\' => {
				let hi = bytes.get(pos + 1).and_then(|ch| ch.to_digit(16));
				let lo = bytes.get(pos + 2).and_then(|ch| ch.to_digit(16));
				match (hi, lo) {
					(Some(hi), Some(lo)) => out.push((hi * 16 + lo) as u8),
					_ => return Err(err(line, "bad \\XX escape in c-string")),
				}
				pos += 3;
			}
			ch => {
				let mut buffer = [0_u8; 4];
				out.extend_from_slice(ch.encode_utf8(&mut buffer).as_bytes());
				pos += 1;
			}
		}
	}
	Err(err(line, "unterminated c-string"))
}

/// Cursor over one line's tokens.
struct Cursor<'a> {
	toks: &'a [Tok],
	pos: usize,
	line: usize,
}

impl<'a> Cursor<'a> {
	fn new(line: usize, toks: &'a [Tok]) -> Self {
		Self { toks, pos: 0, line }
	}

	fn peek(&self) -> Option<&'a Tok> {
		self.toks.get(self.pos)
	}

	fn next(&mut self) -> Result<&'a Tok, ParseError> {
		let tok = self.toks.get(self.pos).ok_or_else(|| err(self.line, "unexpected end of line"))?;
		self.pos += 1;
		Ok(tok)
	}

	fn eat_punct(&mut self, ch: char) -> bool {
		if self.peek() == Some(&Tok::Punct(ch)) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn expect_punct(&mut self, ch: char) -> Result<(), ParseError> {
		match self.next()? {
			Tok::Punct(found) if *found == ch => Ok(()),
			tok => Err(err(self.line, format!("expected `{ch}`, found {tok:?}"))),
		}
	}

	fn expect_ident(&mut self, word: &str) -> Result<(), ParseError> {
		match self.next()? {
			Tok::Ident(found) if found == word => Ok(()),
			tok => Err(err(self.line, format!("expected `{word}`, found {tok:?}"))),
		}
	}

	fn ident(&mut self) -> Result<&'a str, ParseError> {
		match self.next()? {
			Tok::Ident(name) => Ok(name),
			tok => Err(err(self.line, format!("expected identifier, found {tok:?}"))),
		}
	}

	fn int(&mut self) -> Result<i64, ParseError> {
		match self.next()? {
			Tok::Int(value) => Ok(*value),
			tok => Err(err(self.line, format!("expected integer, found {tok:?}"))),
		}
	}

	fn at_name(&mut self) -> Result<&'a str, ParseError> {
		match self.next()? {
			Tok::At(name) => Ok(name),
			tok => Err(err(self.line, format!("expected symbol, found {tok:?}"))),
		}
	}

	fn done(&self) -> bool {
		self.pos >= self.toks.len()
	}

	/// `i32`, `i8*`, `{ i32, i1 }` (with trailing stars) or `void` → `None`.
	fn ret_type(&mut self) -> Result<Option<Type>, ParseError> {
		if let Some(Tok::Ident(word)) = self.peek()
			&& word == "void"
		{
			self.pos += 1;
			return Ok(None);
		}
		self.ty().map(Some)
	}

	fn ty(&mut self) -> Result<Type, ParseError> {
		let mut base = match self.next()? {
			Tok::Ident(name) => {
				Type::parse(name).ok_or_else(|| err(self.line, format!("unknown type `{name}`")))?
			}
			Tok::Punct('{') => {
				let mut fields = Vec::new();
				if !self.eat_punct('}') {
					loop {
						fields.push(self.ty()?);
						if self.eat_punct('}') {
							break;
						}
						self.expect_punct(',')?;
					}
				}
				Type::Struct(fields)
			}
			tok => return Err(err(self.line, format!("expected type, found {tok:?}"))),
		};
		while self.eat_punct('*') {
			base = base.pointer_to();
		}
		Ok(base)
	}
}

/// Resolution tables shared while parsing one function body.
struct FuncContext<'a> {
	globals: &'a HashMap<String, GlobalId>,
	labels: &'a HashMap<String, BlockId>,
}

impl Cursor<'_> {
	fn operand(&mut self, ty: &Type, ctx: &FuncContext<'_>) -> Result<Operand, ParseError> {
		match self.next()? {
			Tok::Percent(name) => {
				if let Some(digits) = name.strip_prefix('t')
					&& let Ok(id) = digits.parse::<u32>()
				{
					return Ok(Operand::Value(ValueId(id)));
				}
				if let Some(digits) = name.strip_prefix('a')
					&& let Ok(index) = digits.parse::<u32>()
				{
					return Ok(Operand::Arg(index));
				}
				Err(err(self.line, format!("unknown register `%{name}`")))
			}
			Tok::At(name) => ctx
				.globals
				.get(name)
				.copied()
				.map(Operand::Global)
				.ok_or_else(|| err(self.line, format!("unknown global `@{name}`"))),
			Tok::Int(value) => {
				if ty.is_float() {
					Ok(Operand::ConstFloat {
						ty: ty.clone(),
						value: *value as f64,
					})
				} else {
					Ok(Operand::ConstInt {
						ty: ty.clone(),
						value: *value,
					})
				}
			}
			Tok::HexInt(bits) => Ok(Operand::ConstFloat {
				ty: ty.clone(),
				value: f64::from_bits(*bits),
			}),
			Tok::Ident(word) if word == "undef" => Ok(Operand::Undef(ty.clone())),
			tok => Err(err(self.line, format!("expected operand, found {tok:?}"))),
		}
	}

	/// `label %name` → block id.
	fn label_ref(&mut self, ctx: &FuncContext<'_>) -> Result<BlockId, ParseError> {
		self.expect_ident("label")?;
		match self.next()? {
			Tok::Percent(name) => ctx
				.labels
				.get(name)
				.copied()
				.ok_or_else(|| err(self.line, format!("unknown label `%{name}`"))),
			tok => Err(err(self.line, format!("expected label, found {tok:?}"))),
		}
	}

	/// Trailing `, !dbg !N`.
	fn debug_line(&mut self) -> Result<Option<u32>, ParseError> {
		if self.done() {
			return Ok(None);
		}
		self.expect_punct(',')?;
		match self.next()? {
			Tok::Bang(word) if word == "dbg" => {}
			tok => return Err(err(self.line, format!("expected `!dbg`, found {tok:?}"))),
		}
		match self.next()? {
			Tok::Bang(digits) => digits
				.parse::<u32>()
				.map(Some)
				.map_err(|_| err(self.line, "bad !dbg reference")),
			tok => Err(err(self.line, format!("expected metadata id, found {tok:?}"))),
		}
	}
}

/// Parse a whole module from its textual form.
pub fn parse_module(text: &str) -> Result<Module, ParseError> {
	let mut module = Module::new("", "");
	let mut global_ids: HashMap<String, GlobalId> = HashMap::new();

	let lines: Vec<&str> = text.lines().collect();
	let mut index = 0;

	while index < lines.len() {
		let line_number = index + 1;
		let raw = lines[index].trim();
		index += 1;

		if raw.is_empty() {
			continue;
		}
		if let Some(rest) = raw.strip_prefix("; ModuleID = '") {
			if let Some(name) = rest.strip_suffix('\'') {
				module.name = name.to_string();
			}
			continue;
		}
		if raw.starts_with(';') || raw.starts_with('!') {
			continue;
		}
		if raw.starts_with("source_filename") {
			let toks = lex(line_number, raw)?;
			let mut cursor = Cursor::new(line_number, &toks);
			cursor.expect_ident("source_filename")?;
			cursor.expect_punct('=')?;
			match cursor.next()? {
				Tok::Str(name) => module.source_filename = name.clone(),
				tok => return Err(err(line_number, format!("expected string, found {tok:?}"))),
			}
			continue;
		}
		if raw.starts_with('@') {
			let toks = lex(line_number, raw)?;
			let mut cursor = Cursor::new(line_number, &toks);
			let name = cursor.at_name()?.to_string();
			cursor.expect_punct('=')?;
			cursor.expect_ident("private")?;
			cursor.expect_ident("constant")?;
			cursor.expect_punct('[')?;
			let declared_len = cursor.int()?;
			cursor.expect_ident("x")?;
			cursor.expect_ident("i8")?;
			cursor.expect_punct(']')?;
			let bytes = match cursor.next()? {
				Tok::CStr(bytes) => bytes.clone(),
				tok => return Err(err(line_number, format!("expected c-string, found {tok:?}"))),
			};
			if bytes.len() as i64 != declared_len {
				return Err(err(line_number, "global length does not match initializer"));
			}
			let id = GlobalId(module.globals.len() as u32);
			global_ids.insert(name.clone(), id);
			module.globals.push(Global { name, bytes });
			continue;
		}
		if raw.starts_with("declare") {
			let toks = lex(line_number, raw)?;
			let mut cursor = Cursor::new(line_number, &toks);
			cursor.expect_ident("declare")?;
			let ret = cursor.ret_type()?;
			let name = cursor.at_name()?.to_string();
			cursor.expect_punct('(')?;
			let mut params = Vec::new();
			if !cursor.eat_punct(')') {
				loop {
					params.push(cursor.ty()?);
					if cursor.eat_punct(')') {
						break;
					}
					cursor.expect_punct(',')?;
				}
			}
			module.functions.push(Function::new(name, params, ret));
			continue;
		}
		if raw.starts_with("define") {
			// Collect the body up to the closing brace, then parse in two
			// passes so forward label references resolve.
			let header_line = line_number;
			let mut body: Vec<(usize, &str)> = Vec::new();
			loop {
				if index >= lines.len() {
					return Err(err(header_line, "unterminated function body"));
				}
				let body_line = lines[index].trim();
				index += 1;
				if body_line == "}" {
					break;
				}
				if !body_line.is_empty() {
					body.push((index, body_line));
				}
			}
			let func = parse_function(header_line, raw, &body, &global_ids)?;
			module.functions.push(func);
			continue;
		}
		return Err(err(line_number, format!("unexpected line `{raw}`")));
	}

	for func in &mut module.functions {
		func.recompute_value_count();
	}
	Ok(module)
}

fn parse_function(
	header_line: usize,
	header: &str,
	body: &[(usize, &str)],
	globals: &HashMap<String, GlobalId>,
) -> Result<Function, ParseError> {
	let toks = lex(header_line, header)?;
	let mut cursor = Cursor::new(header_line, &toks);
	cursor.expect_ident("define")?;
	let ret = cursor.ret_type()?;
	let name = cursor.at_name()?.to_string();
	cursor.expect_punct('(')?;
	let mut params = Vec::new();
	if !cursor.eat_punct(')') {
		loop {
			params.push(cursor.ty()?);
			// The argument name is positional; check and discard.
			match cursor.next()? {
				Tok::Percent(_) => {}
				tok => return Err(err(header_line, format!("expected argument name, found {tok:?}"))),
			}
			if cursor.eat_punct(')') {
				break;
			}
			cursor.expect_punct(',')?;
		}
	}
	cursor.expect_punct('{')?;

	let mut func = Function::new(name, params, ret);

	// First pass: block labels, in order.
	let mut labels: HashMap<String, BlockId> = HashMap::new();
	for (line_number, text) in body {
		if let Some(label) = text.strip_suffix(':')
			&& !text.contains(' ')
		{
			let id = func.add_block(label);
			if labels.insert(label.to_string(), id).is_some() {
				return Err(err(*line_number, format!("duplicate label `{label}`")));
			}
		}
	}
	if func.blocks.is_empty() {
		return Err(err(header_line, "function body has no blocks"));
	}

	// Second pass: instructions.
	let ctx = FuncContext { globals, labels: &labels };
	let mut current: Option<BlockId> = None;
	for (line_number, text) in body {
		if let Some(label) = text.strip_suffix(':')
			&& !text.contains(' ')
		{
			current = labels.get(label).copied();
			continue;
		}
		let block = current.ok_or_else(|| err(*line_number, "instruction before first label"))?;
		let toks = lex(*line_number, text)?;
		let mut cursor = Cursor::new(*line_number, &toks);
		let (dest, op, line) = parse_inst(&mut cursor, &ctx)?;
		let emitted = func.emit(block, op, line);
		if emitted.is_some() != dest.is_some() {
			return Err(err(*line_number, "destination does not match instruction"));
		}
		// The printer emits registers densely in definition order, so the
		// freshly allocated id must agree with the parsed one.
		if let (Some(emitted), Some(dest)) = (emitted, dest)
			&& emitted != dest
		{
			return Err(err(*line_number, format!("register %t{} out of order", dest.0)));
		}
	}
	Ok(func)
}

type ParsedInst = (Option<ValueId>, Op, Option<u32>);

fn parse_inst(cursor: &mut Cursor<'_>, ctx: &FuncContext<'_>) -> Result<ParsedInst, ParseError> {
	let dest = if let Some(Tok::Percent(name)) = cursor.peek() {
		let digits = name
			.strip_prefix('t')
			.ok_or_else(|| err(cursor.line, "expected temporary register"))?;
		let id = digits.parse::<u32>().map_err(|_| err(cursor.line, "bad register"))?;
		cursor.next()?;
		cursor.expect_punct('=')?;
		Some(ValueId(id))
	} else {
		None
	};

	let mnemonic = cursor.ident()?.to_string();
	let op = match mnemonic.as_str() {
		"alloca" => Op::Alloca { ty: cursor.ty()? },
		"load" => {
			let ty = cursor.ty()?;
			cursor.expect_punct(',')?;
			let ptr_ty = cursor.ty()?;
			if ptr_ty.pointee() != Some(&ty) {
				return Err(err(cursor.line, "load pointer type mismatch"));
			}
			let ptr = cursor.operand(&ptr_ty, ctx)?;
			Op::Load { ty, ptr }
		}
		"store" => {
			let ty = cursor.ty()?;
			let value = cursor.operand(&ty, ctx)?;
			cursor.expect_punct(',')?;
			let ptr_ty = cursor.ty()?;
			if ptr_ty.pointee() != Some(&ty) {
				return Err(err(cursor.line, "store pointer type mismatch"));
			}
			let ptr = cursor.operand(&ptr_ty, ctx)?;
			Op::Store { ty, value, ptr }
		}
		"call" => {
			let ret = cursor.ret_type()?;
			let callee = cursor.at_name()?.to_string();
			cursor.expect_punct('(')?;
			let mut args = Vec::new();
			if !cursor.eat_punct(')') {
				loop {
					let ty = cursor.ty()?;
					let operand = cursor.operand(&ty, ctx)?;
					args.push((ty, operand));
					if cursor.eat_punct(')') {
						break;
					}
					cursor.expect_punct(',')?;
				}
			}
			Op::Call { ret, callee, args }
		}
		"insertvalue" => {
			let agg_ty = cursor.ty()?;
			let agg = cursor.operand(&agg_ty, ctx)?;
			cursor.expect_punct(',')?;
			let value_ty = cursor.ty()?;
			let value = cursor.operand(&value_ty, ctx)?;
			cursor.expect_punct(',')?;
			let index = cursor.int()? as usize;
			Op::InsertValue {
				agg_ty,
				agg,
				value_ty,
				value,
				index,
			}
		}
		"extractvalue" => {
			let agg_ty = cursor.ty()?;
			let agg = cursor.operand(&agg_ty, ctx)?;
			cursor.expect_punct(',')?;
			let index = cursor.int()? as usize;
			Op::ExtractValue { agg_ty, agg, index }
		}
		"br" => {
			if let Some(Tok::Ident(word)) = cursor.peek()
				&& word == "label"
			{
				Op::Br { dest: cursor.label_ref(ctx)? }
			} else {
				let ty = cursor.ty()?;
				if ty != Type::I1 {
					return Err(err(cursor.line, "conditional branch condition must be i1"));
				}
				let cond = cursor.operand(&ty, ctx)?;
				cursor.expect_punct(',')?;
				let then_dest = cursor.label_ref(ctx)?;
				cursor.expect_punct(',')?;
				let else_dest = cursor.label_ref(ctx)?;
				Op::CondBr {
					cond,
					then_dest,
					else_dest,
				}
			}
		}
		"switch" => {
			let ty = cursor.ty()?;
			let value = cursor.operand(&ty, ctx)?;
			cursor.expect_punct(',')?;
			let default = cursor.label_ref(ctx)?;
			cursor.expect_punct('[')?;
			let mut cases = Vec::new();
			while !cursor.eat_punct(']') {
				let case_ty = cursor.ty()?;
				if case_ty != ty {
					return Err(err(cursor.line, "switch case type mismatch"));
				}
				let case_value = cursor.int()?;
				cursor.expect_punct(',')?;
				let dest = cursor.label_ref(ctx)?;
				cases.push((case_value, dest));
			}
			Op::Switch {
				ty,
				value,
				default,
				cases,
			}
		}
		"ret" => {
			let ty = cursor.ret_type()?;
			match ty {
				Some(ty) => {
					let value = cursor.operand(&ty, ctx)?;
					Op::Ret {
						ty: Some(ty),
						value: Some(value),
					}
				}
				None => Op::Ret { ty: None, value: None },
			}
		}
		other => return Err(err(cursor.line, format!("unknown instruction `{other}`"))),
	};

	let line = cursor.debug_line()?;
	if !cursor.done() {
		return Err(err(cursor.line, "trailing tokens"));
	}
	Ok((dest, op, line))
}
