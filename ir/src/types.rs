//! IR types.

use std::fmt;

/// A first-class IR type.
///
/// Integers are sized, `float`/`double` follow the usual 32/64-bit split,
/// pointers are typed, and structs are anonymous ordered field lists.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
	I1,
	I8,
	I16,
	I32,
	I64,
	F32,
	F64,
	Ptr(Box<Type>),
	Struct(Vec<Type>),
}

impl Type {
	/// A pointer to this type.
	pub fn pointer_to(self) -> Self {
		Self::Ptr(Box::new(self))
	}

	/// The pointed-to type, if this is a pointer.
	pub fn pointee(&self) -> Option<&Self> {
		match self {
			Self::Ptr(inner) => Some(inner),
			_ => None,
		}
	}

	pub fn is_integer(&self) -> bool {
		matches!(self, Self::I1 | Self::I8 | Self::I16 | Self::I32 | Self::I64)
	}

	pub fn is_float(&self) -> bool {
		matches!(self, Self::F32 | Self::F64)
	}

	/// Parse a type atom the way the textual IR spells it: `i32`, `double`,
	/// `i8*`, `{ i32, i1 }`, including nesting.
	pub fn parse(text: &str) -> Option<Self> {
		let text = text.trim();

		// Trailing stars are pointer wrappers.
		if let Some(stripped) = text.strip_suffix('*') {
			return Self::parse(stripped).map(Self::pointer_to);
		}

		if let Some(body) = text.strip_prefix('{') {
			let body = body.strip_suffix('}')?;
			let fields = split_struct_fields(body)?;
			let mut parsed = Vec::with_capacity(fields.len());
			for field in fields {
				parsed.push(Self::parse(field)?);
			}
			return Some(Self::Struct(parsed));
		}

		match text {
			"i1" => Some(Self::I1),
			"i8" => Some(Self::I8),
			"i16" => Some(Self::I16),
			"i32" => Some(Self::I32),
			"i64" => Some(Self::I64),
			"float" => Some(Self::F32),
			"double" => Some(Self::F64),
			_ => None,
		}
	}
}

/// Split `i32, { i1, i8 }, i64` into top-level fields, respecting nesting.
fn split_struct_fields(body: &str) -> Option<Vec<&str>> {
	let body = body.trim();
	if body.is_empty() {
		return Some(Vec::new());
	}
	let mut fields = Vec::new();
	let mut depth = 0_usize;
	let mut start = 0_usize;
	for (index, ch) in body.char_indices() {
		match ch {
			'{' => depth += 1,
			'}' => depth = depth.checked_sub(1)?,
			',' if depth == 0 => {
				fields.push(&body[start..index]);
				start = index + 1;
			}
			_ => {}
		}
	}
	if depth != 0 {
		return None;
	}
	fields.push(&body[start..]);
	Some(fields)
}

impl fmt::Display for Type {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::I1 => write!(f, "i1"),
			Self::I8 => write!(f, "i8"),
			Self::I16 => write!(f, "i16"),
			Self::I32 => write!(f, "i32"),
			Self::I64 => write!(f, "i64"),
			Self::F32 => write!(f, "float"),
			Self::F64 => write!(f, "double"),
			Self::Ptr(inner) => write!(f, "{inner}*"),
			Self::Struct(fields) => {
				write!(f, "{{ ")?;
				for (index, field) in fields.iter().enumerate() {
					if index > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{field}")?;
				}
				write!(f, " }}")
			}
		}
	}
}
