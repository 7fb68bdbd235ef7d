//! User-declared record types.

use chi_ir as ir;

use crate::data_type::{DataType, NamedDataType};

/// A named record type with an ordered field list.
///
/// Each struct makes two pure node types resolvable in its module:
/// `_make_<Name>` (fields in, struct out) and `_break_<Name>` (struct in,
/// fields out). Editing the field list changes what those node types look
/// like from then on; nodes already placed keep their old signature and are
/// surfaced by the validator instead of being rewired.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphStruct {
	name: String,
	fields: Vec<NamedDataType>,
}

impl GraphStruct {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			fields: Vec::new(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn fields(&self) -> &[NamedDataType] {
		&self.fields
	}

	/// The data type this struct declares, owned by `module`. `None` while
	/// any field's backend type is missing.
	pub fn data_type(&self, module: &str) -> Option<DataType> {
		let mut backends = Vec::with_capacity(self.fields.len());
		for field in &self.fields {
			backends.push(field.ty.backend()?.clone());
		}
		Some(DataType::new(module, &self.name, ir::Type::Struct(backends)))
	}

	/// Insert before `before`, clipped to the end.
	pub fn add_field(&mut self, ty: DataType, name: &str, before: usize) {
		let index = before.min(self.fields.len());
		self.fields.insert(index, NamedDataType::new(name, ty));
	}

	/// Out-of-range indices are a no-op.
	pub fn remove_field(&mut self, index: usize) {
		if index < self.fields.len() {
			self.fields.remove(index);
		}
	}

	pub fn rename_field(&mut self, index: usize, new_name: &str) {
		if let Some(field) = self.fields.get_mut(index) {
			field.name = new_name.to_string();
		}
	}

	pub fn retype_field(&mut self, index: usize, new_type: DataType) {
		if let Some(field) = self.fields.get_mut(index) {
			field.ty = new_type;
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn i32_ty() -> DataType {
		DataType::new("lang", "i32", ir::Type::I32)
	}

	#[test]
	fn data_type_mirrors_fields() {
		let mut point = GraphStruct::new("Point");
		point.add_field(i32_ty(), "x", usize::MAX);
		point.add_field(i32_ty(), "y", usize::MAX);
		let ty = point.data_type("test/main").unwrap();
		assert_eq!(ty.qualified_name(), "test/main:Point");
		assert_eq!(ty.backend(), Some(&ir::Type::Struct(vec![ir::Type::I32, ir::Type::I32])));
	}

	#[test]
	fn field_edits_clip_and_noop() {
		let mut record = GraphStruct::new("R");
		record.add_field(i32_ty(), "a", 10);
		assert_eq!(record.fields().len(), 1);
		record.remove_field(5);
		assert_eq!(record.fields().len(), 1);
		record.rename_field(0, "b");
		assert_eq!(record.fields()[0].name, "b");
	}
}
