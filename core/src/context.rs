//! The process-wide module registry.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use chi_ir as ir;
use chi_support::Report;

use crate::clib::CModule;
use crate::data_type::DataType;
use crate::graph_module::GraphModule;
use crate::json;
use crate::lang::LangModule;
use crate::module::ChiModule;
use crate::node_type::NodeType;

/// Owns every loaded module and resolves `module:name` references.
///
/// A context is single-threaded: modules, functions and nodes are mutated in
/// place through it, and nothing it owns is shared across threads.
pub struct Context {
	workspace: PathBuf,
	modules: Vec<Box<dyn ChiModule>>,
}

impl Context {
	/// Create a context rooted at `workspace`. The builtin `lang` and `c`
	/// modules are always loaded.
	pub fn new(workspace: impl Into<PathBuf>) -> Self {
		Self {
			workspace: workspace.into(),
			modules: vec![Box::new(LangModule::new()), Box::new(CModule::new())],
		}
	}

	pub fn workspace(&self) -> &Path {
		&self.workspace
	}

	/// Where a module's `.chimod` file lives: `<workspace>/src/<name>.chimod`.
	pub fn module_path(&self, full_name: &str) -> PathBuf {
		self.workspace.join("src").join(format!("{full_name}.chimod"))
	}

	pub fn module(&self, full_name: &str) -> Option<&dyn ChiModule> {
		self.modules
			.iter()
			.find(|module| module.full_name() == full_name)
			.map(Box::as_ref)
	}

	pub fn has_module(&self, full_name: &str) -> bool {
		self.module(full_name).is_some()
	}

	/// Full names of every loaded module, in load order.
	pub fn module_names(&self) -> Vec<&str> {
		self.modules.iter().map(|module| module.full_name()).collect()
	}

	pub fn graph_module(&self, full_name: &str) -> Option<&GraphModule> {
		self.module(full_name)?.as_graph()
	}

	pub fn graph_module_mut(&mut self, full_name: &str) -> Option<&mut GraphModule> {
		self.modules
			.iter_mut()
			.find(|module| module.full_name() == full_name)?
			.as_graph_mut()
	}

	/// Register an empty graph module (or return the existing one).
	pub fn new_graph_module(&mut self, full_name: &str) -> &mut GraphModule {
		if !self.has_module(full_name) {
			let path = self.module_path(full_name);
			self.modules.push(Box::new(GraphModule::new(full_name, path)));
		}
		self.graph_module_mut(full_name).expect("just registered")
	}

	/// Resolve a data type. The returned value stays valid for the life of
	/// the owning module.
	pub fn type_from_module(&self, module: &str, name: &str, report: &mut Report) -> Option<DataType> {
		let Some(owner) = self.module(module) else {
			report.add_entry(
				"EUKN",
				"Could not find module",
				json!({ "Requested Module": module, "Requested Type": name }),
			);
			return None;
		};
		let ty = owner.type_from_name(name);
		if ty.is_none() {
			report.add_entry(
				"EUKN",
				"Could not find type in module",
				json!({ "Module": module, "Requested Type": name }),
			);
		}
		ty
	}

	/// Construct a freshly owned node type configured by `config`.
	pub fn node_type_from_module(&self, module: &str, name: &str, config: &Value, report: &mut Report) -> Option<NodeType> {
		let Some(owner) = self.module(module) else {
			report.add_entry(
				"EUKN",
				"Could not find module",
				json!({ "Requested Module": module, "Requested Node Type": name }),
			);
			return None;
		};
		owner.node_type_from_name(self, name, config, report)
	}

	/// Load a graph module (and, first, its declared dependencies) from the
	/// workspace. Loading an already-loaded module is a no-op.
	pub fn load_module(&mut self, full_name: &str, report: &mut Report) -> bool {
		if self.has_module(full_name) {
			return true;
		}
		let path = self.module_path(full_name);
		log::info!("loading module `{full_name}` from {}", path.display());
		let text = match std::fs::read_to_string(&path) {
			Ok(text) => text,
			Err(error) => {
				report.add_entry(
					"EUKN",
					"Failed to read module file",
					json!({ "Module File": path.display().to_string(), "Error": error.to_string() }),
				);
				return false;
			}
		};
		let value: Value = match serde_json::from_str(&text) {
			Ok(value) => value,
			Err(error) => {
				report.add_entry(
					"EUKN",
					"Module file is not valid JSON",
					json!({ "Module File": path.display().to_string(), "Error": error.to_string() }),
				);
				return false;
			}
		};
		json::deserialize::load_graph_module(self, full_name, path, &value, report)
	}

	/// Load a graph module from an in-memory JSON value (tests and the CLI's
	/// direct-file mode use this).
	pub fn load_module_json(&mut self, full_name: &str, value: &Value, report: &mut Report) -> bool {
		let path = self.module_path(full_name);
		json::deserialize::load_graph_module(self, full_name, path, value, report)
	}

	/// Lower a loaded graph module to backend IR. Nothing is produced unless
	/// every function validates and compiles.
	pub fn compile_module(&self, full_name: &str, report: &mut Report) -> Option<ir::Module> {
		let Some(module) = self.graph_module(full_name) else {
			report.add_entry(
				"EUKN",
				"Could not find module",
				json!({ "Requested Module": full_name }),
			);
			return None;
		};
		crate::codegen::generate_module(module, self, report)
	}
}
