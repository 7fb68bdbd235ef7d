//! Loading modules from a workspace on disk: dependency resolution through
//! `<workspace>/src/<full_name>.chimod`, and saving back.

use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde_json::json;

use chi_core::{Context, Report};
use chi_ir::interp::run_main;

/// A fresh scratch workspace under the system temp directory.
struct Workspace {
	root: PathBuf,
}

impl Workspace {
	fn new(tag: &str) -> Self {
		let root = std::env::temp_dir().join(format!("chi-workspace-{}-{tag}", std::process::id()));
		std::fs::create_dir_all(root.join("src")).expect("create workspace");
		Self { root }
	}

	fn write_module(&self, full_name: &str, value: &serde_json::Value) {
		let path = self.root.join("src").join(format!("{full_name}.chimod"));
		std::fs::create_dir_all(path.parent().unwrap()).expect("create module directory");
		std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).expect("write module");
	}
}

impl Drop for Workspace {
	fn drop(&mut self) {
		let _ = std::fs::remove_dir_all(&self.root);
	}
}

/// A library module declaring a struct, no functions.
fn dep_module() -> serde_json::Value {
	json!({
		"dependencies": ["lang"],
		"types": {
			"Pair": {
				"type": "struct",
				"data": [
					{ "first": "lang:i32" },
					{ "second": "lang:i32" }
				]
			}
		},
		"graphs": []
	})
}

/// A main module whose local variable uses the dependency's struct type.
fn main_module() -> serde_json::Value {
	json!({
		"dependencies": ["c", "lang", "test/dep"],
		"types": {},
		"graphs": [{
			"type": "function",
			"name": "main",
			"description": "",
			"data_inputs": [],
			"data_outputs": [],
			"exec_inputs": [""],
			"exec_outputs": [""],
			"local_variables": { "scratch": "test/dep:Pair" },
			"nodes": {
				"00000000-0000-0000-0000-000000000001": {
					"type": "lang:entry",
					"location": [0, 0],
					"data": { "data": [], "exec": [""] }
				},
				"00000000-0000-0000-0000-000000000002": {
					"type": "lang:strliteral",
					"location": [1, 0],
					"data": "from disk"
				},
				"00000000-0000-0000-0000-000000000003": {
					"type": "c:puts",
					"location": [2, 0],
					"data": {}
				},
				"00000000-0000-0000-0000-000000000004": {
					"type": "lang:exit",
					"location": [3, 0],
					"data": { "data": [], "exec": [""] }
				}
			},
			"connections": [
				{ "type": "exec", "input": ["00000000-0000-0000-0000-000000000001", 0], "output": ["00000000-0000-0000-0000-000000000002", 0] },
				{ "type": "exec", "input": ["00000000-0000-0000-0000-000000000002", 0], "output": ["00000000-0000-0000-0000-000000000003", 0] },
				{ "type": "exec", "input": ["00000000-0000-0000-0000-000000000003", 0], "output": ["00000000-0000-0000-0000-000000000004", 0] },
				{ "type": "data", "input": ["00000000-0000-0000-0000-000000000002", 0], "output": ["00000000-0000-0000-0000-000000000003", 0] }
			]
		}]
	})
}

#[test]
fn loading_pulls_in_declared_dependencies() {
	let workspace = Workspace::new("deps");
	workspace.write_module("test/dep", &dep_module());
	workspace.write_module("test/main", &main_module());

	let mut ctx = Context::new(&workspace.root);
	let mut report = Report::new();
	assert!(ctx.load_module("test/main", &mut report), "{report}");
	assert!(report.success(), "{report}");

	// The dependency came along, and its struct resolved the local's type.
	assert!(ctx.has_module("test/dep"));
	let main = ctx.graph_module("test/main").unwrap().function_from_name("main").unwrap();
	assert_eq!(main.local_variables()[0].ty.qualified_name(), "test/dep:Pair");
}

#[test]
fn a_loaded_workspace_module_compiles_and_runs() {
	let workspace = Workspace::new("run");
	workspace.write_module("test/dep", &dep_module());
	workspace.write_module("test/main", &main_module());

	let mut ctx = Context::new(&workspace.root);
	let mut report = Report::new();
	assert!(ctx.load_module("test/main", &mut report), "{report}");

	let ir_module = ctx.compile_module("test/main", &mut report).expect("compiles");
	assert!(report.success(), "{report}");

	let mut out = Vec::new();
	assert_eq!(run_main(&ir_module, &mut out).unwrap(), 0);
	assert_eq!(out, b"from disk\n");
}

#[test]
fn save_to_disk_round_trips_through_the_loader() {
	let workspace = Workspace::new("save");
	workspace.write_module("test/dep", &dep_module());
	workspace.write_module("test/main", &main_module());

	let mut ctx = Context::new(&workspace.root);
	let mut report = Report::new();
	assert!(ctx.load_module("test/main", &mut report), "{report}");

	// Mutate something observable, then save.
	{
		let func = ctx.graph_module_mut("test/main").unwrap().function_mut("main").unwrap();
		func.set_description("saved from a test");
	}
	let save_report = ctx.graph_module("test/main").unwrap().save_to_disk();
	assert!(save_report.success(), "{save_report}");

	let mut ctx2 = Context::new(&workspace.root);
	let mut report2 = Report::new();
	assert!(ctx2.load_module("test/main", &mut report2), "{report2}");
	assert!(report2.success(), "{report2}");
	let reloaded = ctx2.graph_module("test/main").unwrap().function_from_name("main").unwrap();
	assert_eq!(reloaded.description(), "saved from a test");
	assert_eq!(reloaded.node_count(), 4);
}

#[test]
fn missing_modules_report_what_was_sought() {
	let workspace = Workspace::new("missing");
	let mut ctx = Context::new(&workspace.root);
	let mut report = Report::new();
	assert!(!ctx.load_module("test/nowhere", &mut report));
	assert!(report.has_code("EUKN"));
	assert!(!ctx.has_module("test/nowhere"));
}
