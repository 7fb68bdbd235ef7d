//! The builtin `lang` module: primitive types and the control-flow node
//! types every graph needs.

use std::collections::BTreeSet;

use serde_json::{Value, json};

use chi_ir as ir;
use chi_support::Report;

use crate::context::Context;
use crate::data_type::{DataType, NamedDataType, split_qualified};
use crate::module::ChiModule;
use crate::node_type::{NodeKind, NodeType};

/// Always loaded; owns the primitive type atoms and `entry`, `exit`, `if`,
/// the constant literals and `strliteral`.
#[derive(Debug, Default)]
pub struct LangModule {
	dependencies: BTreeSet<String>,
}

impl LangModule {
	pub fn new() -> Self {
		Self::default()
	}
}

/// Parse the `{data: [{doc: "mod:type"}], exec: [names]}` configuration that
/// entry and exit nodes carry. Malformed pieces degrade with warnings so a
/// damaged file still loads as far as it can.
fn parse_io_config(
	ctx: &Context,
	owner: &str,
	config: &Value,
	report: &mut Report,
) -> (Vec<NamedDataType>, Vec<String>) {
	let mut data = Vec::new();
	match config.get("data") {
		Some(Value::Array(entries)) => {
			for entry in entries {
				let Some(object) = entry.as_object() else {
					report.add_entry(
						"WUKN",
						format!("Data entries for {owner} must be objects"),
						json!({ "Given Data": entry }),
					);
					continue;
				};
				for (doc_string, qualified) in object {
					let Some(qualified) = qualified.as_str() else {
						report.add_entry(
							"WUKN",
							format!("Type references for {owner} must be strings"),
							json!({ "Given Data": qualified }),
						);
						continue;
					};
					let Some((module, name)) = split_qualified(qualified) else {
						report.add_entry(
							"EUKN",
							format!("Type reference for {owner} is not colon-qualified"),
							json!({ "Given Type": qualified }),
						);
						continue;
					};
					if let Some(ty) = ctx.type_from_module(module, name, report) {
						data.push(NamedDataType::new(doc_string.clone(), ty));
					}
				}
			}
		}
		Some(other) => report.add_entry(
			"WUKN",
			format!("Data for {owner} must be an array"),
			json!({ "Given Data": other }),
		),
		None => report.add_entry(
			"WUKN",
			format!("Data for {owner} must have a data element"),
			json!({ "Data JSON": config }),
		),
	}

	let mut exec = Vec::new();
	match config.get("exec") {
		Some(Value::Array(entries)) => {
			for entry in entries {
				exec.push(entry.as_str().unwrap_or_default().to_string());
			}
		}
		Some(other) => report.add_entry(
			"WUKN",
			format!("Exec element for {owner} must be an array"),
			json!({ "Given Data": other }),
		),
		None => report.add_entry(
			"WUKN",
			format!("Data for {owner} must have an exec element"),
			json!({ "Data JSON": config }),
		),
	}

	(data, exec)
}

impl ChiModule for LangModule {
	fn full_name(&self) -> &str {
		"lang"
	}

	fn dependencies(&self) -> &BTreeSet<String> {
		&self.dependencies
	}

	fn type_names(&self) -> Vec<String> {
		["i1", "i8", "i8*", "i16", "i32", "i64", "float", "double"]
			.into_iter()
			.map(String::from)
			.collect()
	}

	fn node_type_names(&self) -> Vec<String> {
		["const-bool", "const-float", "const-int", "entry", "exit", "if", "strliteral"]
			.into_iter()
			.map(String::from)
			.collect()
	}

	// Any primitive atom the backend parses is a lang type.
	fn type_from_name(&self, name: &str) -> Option<DataType> {
		let backend = ir::Type::parse(name)?;
		Some(DataType::new("lang", name, backend))
	}

	fn node_type_from_name(&self, ctx: &Context, name: &str, config: &Value, report: &mut Report) -> Option<NodeType> {
		let ty = |name: &str| self.type_from_name(name).expect("lang primitive");
		match name {
			"if" => Some(NodeType::new(
				"lang",
				"if",
				"Branch on a bool",
				NodeKind::If,
				vec![NamedDataType::new("condition", ty("i1"))],
				Vec::new(),
				vec![String::new()],
				vec!["True".into(), "False".into()],
			)),
			"entry" => {
				let mut sub = Report::new();
				let (data, exec) = parse_io_config(ctx, "lang:entry", config, &mut sub);
				let clean = sub.success();
				*report += sub;
				if !clean {
					return None;
				}
				Some(NodeType::entry(data, exec))
			}
			"exit" => {
				let mut sub = Report::new();
				let (data, exec) = parse_io_config(ctx, "lang:exit", config, &mut sub);
				let clean = sub.success();
				*report += sub;
				if !clean {
					return None;
				}
				Some(NodeType::exit(data, exec))
			}
			"const-int" => {
				let value = match config.as_i64() {
					Some(value) => value as i32,
					None => {
						report.add_entry(
							"WUKN",
							"Data for lang:const-int must be an integer",
							json!({ "Given Data": config }),
						);
						0
					}
				};
				Some(NodeType::new(
					"lang",
					"const-int",
					"Integer literal",
					NodeKind::ConstInt(value),
					Vec::new(),
					vec![NamedDataType::new("out", ty("i32"))],
					vec![String::new()],
					vec![String::new()],
				))
			}
			"const-bool" => {
				let value = match config.as_bool() {
					Some(value) => value,
					None => {
						report.add_entry(
							"WUKN",
							"Data for lang:const-bool must be a boolean",
							json!({ "Given Data": config }),
						);
						false
					}
				};
				Some(NodeType::new(
					"lang",
					"const-bool",
					"Boolean literal",
					NodeKind::ConstBool(value),
					Vec::new(),
					vec![NamedDataType::new("out", ty("i1"))],
					vec![String::new()],
					vec![String::new()],
				))
			}
			"const-float" => {
				let value = match config.as_f64() {
					Some(value) => value,
					None => {
						report.add_entry(
							"WUKN",
							"Data for lang:const-float must be a number",
							json!({ "Given Data": config }),
						);
						0.0
					}
				};
				Some(NodeType::new(
					"lang",
					"const-float",
					"Floating point literal",
					NodeKind::ConstFloat(value),
					Vec::new(),
					vec![NamedDataType::new("out", ty("double"))],
					vec![String::new()],
					vec![String::new()],
				))
			}
			"strliteral" => {
				let value = match config.as_str() {
					Some(value) => value.to_string(),
					None => {
						report.add_entry(
							"WUKN",
							"Data for lang:strliteral must be a string",
							json!({ "Given Data": config }),
						);
						String::new()
					}
				};
				Some(NodeType::new(
					"lang",
					"strliteral",
					"String literal",
					NodeKind::StrLiteral(value),
					Vec::new(),
					vec![NamedDataType::new("string", ty("i8*"))],
					vec![String::new()],
					vec![String::new()],
				))
			}
			_ => {
				report.add_entry(
					"E37",
					"Failed to find node in module",
					json!({ "Module": "lang", "Requested Node Type": name }),
				);
				None
			}
		}
	}
}
