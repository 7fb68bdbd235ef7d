//! Data types and qualified type references.

use std::fmt;

use chi_ir as ir;

/// A named reference to a backend type: the owning module, the local name,
/// and the backend handle the module resolved it to.
///
/// Two data types are equal when their backend handles agree *and* their
/// qualified names agree; modules guarantee that the same qualified name
/// always resolves to the same backend handle, so the two notions coincide
/// for types produced through a [`crate::Context`].
#[derive(Clone, Debug, Default)]
pub struct DataType {
	module: String,
	name: String,
	backend: Option<ir::Type>,
}

impl DataType {
	pub fn new(module: impl Into<String>, name: impl Into<String>, backend: ir::Type) -> Self {
		Self {
			module: module.into(),
			name: name.into(),
			backend: Some(backend),
		}
	}

	/// The default-constructed type is invalid; everything built through a
	/// module is valid.
	pub fn valid(&self) -> bool {
		self.backend.is_some() && !self.module.is_empty()
	}

	/// Full name of the owning module.
	pub fn module(&self) -> &str {
		&self.module
	}

	/// Name local to the owning module.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// `"<module_full_name>:<name>"`.
	pub fn qualified_name(&self) -> String {
		format!("{}:{}", self.module, self.name)
	}

	pub fn backend(&self) -> Option<&ir::Type> {
		self.backend.as_ref()
	}
}

impl PartialEq for DataType {
	fn eq(&self, other: &Self) -> bool {
		self.backend == other.backend && self.module == other.module && self.name == other.name
	}
}

impl fmt::Display for DataType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.qualified_name())
	}
}

/// A `(name, type)` pair, used uniformly for function I/O lists, struct
/// fields and local variables.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedDataType {
	pub name: String,
	pub ty: DataType,
}

impl NamedDataType {
	pub fn new(name: impl Into<String>, ty: DataType) -> Self {
		Self { name: name.into(), ty }
	}
}

impl fmt::Display for NamedDataType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{{{}, {}}}", self.name, self.ty.qualified_name())
	}
}

/// Split a colon-qualified reference: `"lang:i32"` → `("lang", "i32")`.
///
/// Only the first colon splits, so struct types of nested modules
/// (`"github.com/x/y:Point"`) keep their module path intact.
pub fn split_qualified(text: &str) -> Option<(&str, &str)> {
	let colon = text.find(':')?;
	Some((&text[..colon], &text[colon + 1..]))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_is_invalid() {
		let ty = DataType::default();
		assert!(!ty.valid());
	}

	#[test]
	fn equality_needs_backend_and_name() {
		let a = DataType::new("lang", "i32", ir::Type::I32);
		let b = DataType::new("lang", "i32", ir::Type::I32);
		let c = DataType::new("lang", "i1", ir::Type::I1);
		assert_eq!(a, b);
		assert_ne!(a, c);
		assert_eq!(a.qualified_name(), "lang:i32");
	}

	#[test]
	fn split_qualified_takes_first_colon() {
		assert_eq!(split_qualified("lang:i8*"), Some(("lang", "i8*")));
		assert_eq!(split_qualified("github.com/x/y:Point"), Some(("github.com/x/y", "Point")));
		assert_eq!(split_qualified("unqualified"), None);
	}
}
