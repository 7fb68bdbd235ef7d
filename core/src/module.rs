//! The module contract.

use std::collections::BTreeSet;

use serde_json::Value;

use chi_support::Report;

use crate::context::Context;
use crate::data_type::DataType;
use crate::graph_module::GraphModule;
use crate::node_type::NodeType;

/// A loaded module: a namespace of data types and node types.
///
/// The builtin `lang` and `c` modules implement this directly; user code
/// lives in [`GraphModule`]s, which additionally expose their graph functions
/// for editing and lowering.
pub trait ChiModule {
	/// Full path of the module, e.g. `"lang"` or `"github.com/x/y/main"`.
	fn full_name(&self) -> &str;

	/// The last path segment of [`Self::full_name`].
	fn short_name(&self) -> &str {
		self.full_name().rsplit('/').next().unwrap_or_default()
	}

	/// Full names of the modules this one depends on.
	fn dependencies(&self) -> &BTreeSet<String>;

	/// Local names of every data type this module can produce.
	fn type_names(&self) -> Vec<String>;

	/// Local names of every node type this module can produce.
	fn node_type_names(&self) -> Vec<String>;

	/// Resolve a data type by local name.
	fn type_from_name(&self, name: &str) -> Option<DataType>;

	/// Construct a fresh node type configured by `config` — the same value
	/// [`NodeType::to_json`] round-trips. Unknown names and malformed
	/// configuration are reported; a malformed literal degrades to a default
	/// with a warning rather than failing.
	fn node_type_from_name(&self, ctx: &Context, name: &str, config: &Value, report: &mut Report) -> Option<NodeType>;

	/// Downcast to a graph module.
	fn as_graph(&self) -> Option<&GraphModule> {
		None
	}

	/// Mutable downcast to a graph module.
	fn as_graph_mut(&mut self) -> Option<&mut GraphModule> {
		None
	}
}
