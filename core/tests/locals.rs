//! Local variable lifecycle: creation, rename, retype, removal, and how the
//! getter/setter node instances across the module follow along.

use pretty_assertions::assert_eq;
use serde_json::Value;

use chi_core::{Context, DataType, GraphFunction, NodeType, Report, validator};
use chi_support::NodeId;

fn id(n: u128) -> NodeId {
	uuid::Uuid::from_u128(n)
}

fn lang_type(ctx: &Context, name: &str) -> DataType {
	let mut report = Report::new();
	let ty = ctx.type_from_module("lang", name, &mut report).unwrap();
	assert!(report.success(), "{report}");
	ty
}

fn node_type(ctx: &Context, module: &str, name: &str, config: &Value) -> NodeType {
	let mut report = Report::new();
	let ty = ctx
		.node_type_from_module(module, name, config, &mut report)
		.expect("node type resolves");
	assert!(report.success(), "{report}");
	ty
}

struct Fixture {
	ctx: Context,
}

impl Fixture {
	fn func(&mut self) -> &mut GraphFunction {
		self.ctx
			.graph_module_mut("test/main")
			.unwrap()
			.function_mut("main")
			.unwrap()
	}

	fn func_ref(&self) -> &GraphFunction {
		self.ctx.graph_module("test/main").unwrap().function_from_name("main").unwrap()
	}
}

/// `main` returning one i32, with a local `x`, `const-int(42) -> _set_x` on
/// the exec path and `_get_x` feeding the exit's data input. This is the
/// "local round-trip" shape.
fn fixture() -> Fixture {
	let mut ctx = Context::new(".");
	{
		let module = ctx.new_graph_module("test/main");
		module.get_or_create_function("main", vec![], vec![], vec![String::new()], vec![String::new()]);
	}
	let i32_ty = lang_type(&ctx, "i32");
	{
		let func = ctx.graph_module_mut("test/main").unwrap().function_mut("main").unwrap();
		func.add_data_output(i32_ty.clone(), "out", usize::MAX);
		let (_, inserted) = func.get_or_create_local("x", i32_ty.clone());
		assert!(inserted);

		func.get_or_insert_entry_node(0.0, 0.0, Some(id(1)));
		let exit_type = func.create_exit_node_type();
		func.insert_node(exit_type, 0.0, 0.0, Some(id(2)));
	}

	let const42 = node_type(&ctx, "lang", "const-int", &serde_json::json!(42));
	let setter = node_type(&ctx, "test/main", "_set_x", &Value::Null);
	let getter = node_type(&ctx, "test/main", "_get_x", &Value::Null);

	let func = ctx.graph_module_mut("test/main").unwrap().function_mut("main").unwrap();
	func.insert_node(const42, 0.0, 0.0, Some(id(3)));
	func.insert_node(setter, 0.0, 0.0, Some(id(4)));
	func.insert_node(getter, 0.0, 0.0, Some(id(5)));

	for report in [
		func.connect_exec(id(1), 0, id(3), 0),
		func.connect_exec(id(3), 0, id(4), 0),
		func.connect_exec(id(4), 0, id(2), 0),
		func.connect_data(id(3), 0, id(4), 0),
		func.connect_data(id(5), 0, id(2), 0),
	] {
		assert!(report.success(), "{report}");
	}

	Fixture { ctx }
}

#[test]
fn the_fixture_validates() {
	let fx = fixture();
	let report = validator::validate_function(fx.func_ref());
	assert!(report.success(), "{report}");
}

#[test]
fn get_or_create_returns_the_existing_local() {
	let mut fx = fixture();
	let i1_ty = lang_type(&fx.ctx, "i1");
	// Same name, different type: the declaration's type is not changed.
	let (local, inserted) = fx.func().get_or_create_local("x", i1_ty);
	assert!(!inserted);
	assert_eq!(local.ty.qualified_name(), "lang:i32");
	assert_eq!(fx.func_ref().local_variables().len(), 1);
}

#[test]
fn getter_and_setter_signatures_mirror_the_local() {
	let fx = fixture();
	let func = fx.func_ref();
	let getter = func.node(id(5)).unwrap().node_type();
	assert!(getter.pure());
	assert_eq!(getter.data_outputs()[0].ty.qualified_name(), "lang:i32");

	let setter = func.node(id(4)).unwrap().node_type();
	assert!(!setter.pure());
	assert_eq!(setter.data_inputs()[0].ty.qualified_name(), "lang:i32");
	assert_eq!(setter.exec_inputs().len(), 1);
	assert_eq!(setter.exec_outputs().len(), 1);
}

#[test]
fn unknown_local_does_not_resolve() {
	let fx = fixture();
	let mut report = Report::new();
	let ty = fx
		.ctx
		.node_type_from_module("test/main", "_get_nope", &Value::Null, &mut report);
	assert!(ty.is_none());
	assert!(report.has_code("EUKN"));
}

#[test]
fn rename_local_retypes_instances_and_keeps_edges() {
	let mut fx = fixture();
	let renamed = fx
		.ctx
		.graph_module_mut("test/main")
		.unwrap()
		.rename_local("main", "x", "y");
	assert!(renamed);

	let func = fx.func_ref();
	assert_eq!(func.local_variables()[0].name, "y");
	assert_eq!(func.node(id(4)).unwrap().node_type().name(), "_set_y");
	assert_eq!(func.node(id(5)).unwrap().node_type().name(), "_get_y");
	// Value types were untouched, so the wiring survived.
	assert_eq!(func.node(id(4)).unwrap().input_data()[0], Some((id(3), 0)));
	assert_eq!(func.node(id(2)).unwrap().input_data()[0], Some((id(5), 0)));
	assert!(validator::validate_function(func).success());
}

#[test]
fn rename_local_refuses_collisions_and_unknowns() {
	let mut fx = fixture();
	let i1_ty = lang_type(&fx.ctx, "i1");
	fx.func().get_or_create_local("taken", i1_ty);

	let module = fx.ctx.graph_module_mut("test/main").unwrap();
	assert!(!module.rename_local("main", "x", "taken"));
	assert!(!module.rename_local("main", "missing", "z"));
	// Nothing moved.
	assert_eq!(fx.func_ref().local_variables()[0].name, "x");
}

#[test]
fn retype_local_disconnects_incompatible_edges() {
	let mut fx = fixture();
	let i1_ty = lang_type(&fx.ctx, "i1");

	let (retyped, report) = fx
		.ctx
		.graph_module_mut("test/main")
		.unwrap()
		.retype_local("main", "x", i1_ty);
	assert!(retyped);
	assert!(report.success(), "{report}");

	let func = fx.func_ref();
	// The nodes are still there with the new signature...
	assert_eq!(func.node(id(4)).unwrap().node_type().data_inputs()[0].ty.qualified_name(), "lang:i1");
	assert_eq!(func.node(id(5)).unwrap().node_type().data_outputs()[0].ty.qualified_name(), "lang:i1");
	// ...but the i32 edges are gone, on both sides.
	assert_eq!(func.node(id(4)).unwrap().input_data()[0], None);
	assert_eq!(func.node(id(3)).unwrap().output_data()[0], Vec::<(NodeId, usize)>::new());
	assert_eq!(func.node(id(2)).unwrap().input_data()[0], None);
	assert_eq!(func.node(id(5)).unwrap().output_data()[0], Vec::<(NodeId, usize)>::new());

	// The exit now has a dangling data input, which validation surfaces.
	let report = validator::validate_function(func);
	assert!(!report.success());
}

#[test]
fn remove_local_removes_instances_module_wide() {
	let mut fx = fixture();

	// A second function also using `x` through the module-level node types.
	{
		let module = fx.ctx.graph_module_mut("test/main").unwrap();
		module.get_or_create_function("other", vec![], vec![], vec![String::new()], vec![String::new()]);
	}
	let getter = node_type(&fx.ctx, "test/main", "_get_x", &Value::Null);
	{
		let module = fx.ctx.graph_module_mut("test/main").unwrap();
		let other = module.function_mut("other").unwrap();
		other.insert_node(getter, 0.0, 0.0, Some(id(40)));
	}

	let (removed, report) = fx.ctx.graph_module_mut("test/main").unwrap().remove_local("main", "x");
	assert!(removed);
	assert!(report.success(), "{report}");

	let module = fx.ctx.graph_module("test/main").unwrap();
	let main = module.function_from_name("main").unwrap();
	assert!(main.local_variables().is_empty());
	assert!(main.node(id(4)).is_none());
	assert!(main.node(id(5)).is_none());
	// The exit input fed by the getter is disconnected, not dangling.
	assert_eq!(main.node(id(2)).unwrap().input_data()[0], None);

	let other = module.function_from_name("other").unwrap();
	assert!(other.node(id(40)).is_none());

	let (removed_again, _) = fx.ctx.graph_module_mut("test/main").unwrap().remove_local("main", "x");
	assert!(!removed_again);
}
