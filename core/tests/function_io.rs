//! Creating and manipulating function inputs and outputs, and how the
//! entry/exit nodes track every mutation.

use pretty_assertions::assert_eq;
use serde_json::Value;

use chi_core::{Context, DataType, GraphFunction, NamedDataType, NodeType, Report};
use chi_support::NodeId;

fn id(n: u128) -> NodeId {
	uuid::Uuid::from_u128(n)
}

fn lang_type(ctx: &Context, name: &str) -> DataType {
	let mut report = Report::new();
	let ty = ctx.type_from_module("lang", name, &mut report).expect("lang type");
	assert!(report.success(), "{report}");
	ty
}

fn module_node_type(ctx: &Context, name: &str) -> NodeType {
	let mut report = Report::new();
	let ty = ctx
		.node_type_from_module("test/main", name, &Value::Null, &mut report)
		.expect("node type resolves");
	assert!(report.success(), "{report}");
	ty
}

struct Fixture {
	ctx: Context,
	entry: NodeId,
	exit1: NodeId,
	exit2: NodeId,
	set_node: NodeId,
	set_node2: NodeId,
	get_node: NodeId,
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

/// An empty `main` with one entry, two exits, a local `var: lang:i32` and
/// two setter and one getter node to observe disconnections with.
fn fixture() -> Fixture {
	let mut ctx = Context::new(".");
	let i32_ty = lang_type(&ctx, "i32");
	{
		let module = ctx.new_graph_module("test/main");
		let (func, inserted) = module.get_or_create_function("main", vec![], vec![], vec![], vec![]);
		assert!(inserted);

		let (entry, report) = func.get_or_insert_entry_node(0.0, 0.0, Some(id(1)));
		assert!(report.success(), "{report}");
		assert_eq!(entry, Some(id(1)));

		let exit_type = func.create_exit_node_type();
		let (exit1, report) = func.insert_node(exit_type.clone(), 0.0, 0.0, Some(id(2)));
		assert!(report.success(), "{report}");
		let (exit2, report) = func.insert_node(exit_type, 0.0, 0.0, Some(id(3)));
		assert!(report.success(), "{report}");
		assert_eq!((exit1, exit2), (Some(id(2)), Some(id(3))));

		func.get_or_create_local("var", i32_ty);
	}

	let setter = module_node_type(&ctx, "_set_var");
	let getter = module_node_type(&ctx, "_get_var");
	let func = ctx.graph_module_mut("test/main").unwrap().function_mut("main").unwrap();
	let (set_node, _) = func.insert_node(setter.clone(), 0.0, 0.0, Some(id(4)));
	let (set_node2, _) = func.insert_node(setter, 0.0, 0.0, Some(id(5)));
	let (get_node, _) = func.insert_node(getter, 0.0, 0.0, Some(id(6)));

	Fixture {
		ctx,
		entry: id(1),
		exit1: id(2),
		exit2: id(3),
		set_node: set_node.unwrap(),
		set_node2: set_node2.unwrap(),
		get_node: get_node.unwrap(),
	}
}

#[test]
fn adding_a_data_input_updates_the_entry_node() {
	let mut fx = fixture();
	let i32_ty = lang_type(&fx.ctx, "i32");
	let expected = NamedDataType::new("param1", i32_ty.clone());

	let entry = fx.entry;
	let set_node = fx.set_node;
	fx.func().add_data_input(i32_ty, "param1", usize::MAX);

	let func = fx.func_ref();
	assert_eq!(func.data_inputs(), [expected.clone()]);
	let entry_type = func.node(entry).unwrap().node_type();
	assert_eq!(entry_type.data_inputs().len(), 0);
	assert_eq!(entry_type.data_outputs(), [expected]);

	// Connect entry's fresh output so later mutations can be observed.
	let report = fx.func().connect_data(entry, 0, set_node, 0);
	assert!(report.success(), "{report}");
	let func = fx.func_ref();
	assert_eq!(func.node(entry).unwrap().output_data()[0], [(set_node, 0)]);
}

#[test]
fn inserting_data_inputs_before_and_after() {
	let mut fx = fixture();
	let i32_ty = lang_type(&fx.ctx, "i32");
	let i1_ty = lang_type(&fx.ctx, "i1");
	let first = NamedDataType::new("param1", i32_ty.clone());
	let second = NamedDataType::new("param2", i1_ty.clone());

	fx.func().add_data_input(i32_ty.clone(), "param1", usize::MAX);
	fx.func().add_data_input(i1_ty.clone(), "param2", 1);
	{
		let func = fx.func_ref();
		assert_eq!(func.data_inputs(), [first.clone(), second.clone()]);
		let entry_type = func.node(fx.entry).unwrap().node_type();
		assert_eq!(entry_type.data_outputs(), [first.clone(), second.clone()]);
	}

	// A fresh fixture, inserting at the front instead.
	let mut fx = fixture();
	fx.func().add_data_input(i32_ty, "param1", usize::MAX);
	fx.func().add_data_input(i1_ty, "param2", 0);
	let func = fx.func_ref();
	assert_eq!(func.data_inputs(), [second.clone(), first.clone()]);
	let entry_type = func.node(fx.entry).unwrap().node_type();
	assert_eq!(entry_type.data_outputs(), [second, first]);
}

#[test]
fn renaming_a_data_input_keeps_connections() {
	let mut fx = fixture();
	let i32_ty = lang_type(&fx.ctx, "i32");
	let entry = fx.entry;
	let set_node = fx.set_node;

	fx.func().add_data_input(i32_ty.clone(), "param1", usize::MAX);
	let report = fx.func().connect_data(entry, 0, set_node, 0);
	assert!(report.success(), "{report}");

	fx.func().rename_data_input(0, "param1renamed");

	let func = fx.func_ref();
	let renamed = NamedDataType::new("param1renamed", i32_ty);
	assert_eq!(func.data_inputs(), [renamed.clone()]);
	assert_eq!(func.node(entry).unwrap().node_type().data_outputs(), [renamed]);
	assert_eq!(func.node(entry).unwrap().output_data()[0], [(set_node, 0)]);
}

#[test]
fn renaming_with_the_wrong_index_changes_nothing() {
	let mut fx = fixture();
	let i32_ty = lang_type(&fx.ctx, "i32");
	let expected = NamedDataType::new("param1", i32_ty.clone());

	fx.func().add_data_input(i32_ty, "param1", usize::MAX);
	fx.func().rename_data_input(1, "param1renamed");

	let func = fx.func_ref();
	assert_eq!(func.data_inputs(), [expected.clone()]);
	assert_eq!(func.node(fx.entry).unwrap().node_type().data_outputs(), [expected]);
}

#[test]
fn retyping_a_data_input_disconnects_stale_edges() {
	let mut fx = fixture();
	let i32_ty = lang_type(&fx.ctx, "i32");
	let i1_ty = lang_type(&fx.ctx, "i1");
	let entry = fx.entry;
	let set_node = fx.set_node;

	fx.func().add_data_input(i32_ty, "param1", usize::MAX);
	let report = fx.func().connect_data(entry, 0, set_node, 0);
	assert!(report.success(), "{report}");

	fx.func().retype_data_input(0, i1_ty.clone());

	let func = fx.func_ref();
	let retyped = NamedDataType::new("param1", i1_ty);
	assert_eq!(func.data_inputs(), [retyped.clone()]);
	assert_eq!(func.node(entry).unwrap().node_type().data_outputs(), [retyped]);
	// The i32 edge into the setter cannot survive an i1 output.
	assert_eq!(func.node(entry).unwrap().output_data()[0], Vec::<(NodeId, usize)>::new());
	assert_eq!(func.node(set_node).unwrap().input_data()[0], None);
}

#[test]
fn retyping_with_the_wrong_index_keeps_connections() {
	let mut fx = fixture();
	let i32_ty = lang_type(&fx.ctx, "i32");
	let i1_ty = lang_type(&fx.ctx, "i1");
	let entry = fx.entry;
	let set_node = fx.set_node;

	fx.func().add_data_input(i32_ty.clone(), "param1", usize::MAX);
	let report = fx.func().connect_data(entry, 0, set_node, 0);
	assert!(report.success(), "{report}");

	fx.func().retype_data_input(1, i1_ty);

	let func = fx.func_ref();
	assert_eq!(func.data_inputs(), [NamedDataType::new("param1", i32_ty)]);
	assert_eq!(func.node(entry).unwrap().output_data()[0], [(set_node, 0)]);
}

#[test]
fn adding_a_data_output_updates_every_exit_node() {
	let mut fx = fixture();
	let i32_ty = lang_type(&fx.ctx, "i32");
	let expected = NamedDataType::new("outparam1", i32_ty.clone());
	let (get_node, exit1, exit2) = (fx.get_node, fx.exit1, fx.exit2);

	fx.func().add_data_output(i32_ty, "outparam1", usize::MAX);

	{
		let func = fx.func_ref();
		for exit in [exit1, exit2] {
			let ty = func.node(exit).unwrap().node_type();
			assert_eq!(ty.data_outputs().len(), 0);
			assert_eq!(ty.data_inputs(), [expected.clone()]);
		}
	}

	// The getter can feed both exits: data outputs are multi-fan-out.
	let report = fx.func().connect_data(get_node, 0, exit1, 0);
	assert!(report.success(), "{report}");
	let report = fx.func().connect_data(get_node, 0, exit2, 0);
	assert!(report.success(), "{report}");

	let func = fx.func_ref();
	assert_eq!(func.node(exit1).unwrap().input_data()[0], Some((get_node, 0)));
	assert_eq!(func.node(exit2).unwrap().input_data()[0], Some((get_node, 0)));
}

#[test]
fn retyping_a_data_output_disconnects_both_exits() {
	let mut fx = fixture();
	let i32_ty = lang_type(&fx.ctx, "i32");
	let i1_ty = lang_type(&fx.ctx, "i1");
	let (get_node, exit1, exit2) = (fx.get_node, fx.exit1, fx.exit2);

	fx.func().add_data_output(i32_ty, "outparam1", usize::MAX);
	fx.func().connect_data(get_node, 0, exit1, 0);
	fx.func().connect_data(get_node, 0, exit2, 0);

	fx.func().retype_data_output(0, i1_ty.clone());

	let func = fx.func_ref();
	let retyped = NamedDataType::new("outparam1", i1_ty);
	assert_eq!(func.data_outputs(), [retyped.clone()]);
	assert_eq!(func.node(exit1).unwrap().node_type().data_inputs(), [retyped.clone()]);
	assert_eq!(func.node(exit1).unwrap().input_data()[0], None);
	assert_eq!(func.node(exit2).unwrap().input_data()[0], None);
	assert_eq!(func.node(get_node).unwrap().output_data()[0], Vec::<(NodeId, usize)>::new());
}

#[test]
fn renaming_a_data_output_keeps_connections() {
	let mut fx = fixture();
	let i32_ty = lang_type(&fx.ctx, "i32");
	let (get_node, exit1, exit2) = (fx.get_node, fx.exit1, fx.exit2);

	fx.func().add_data_output(i32_ty.clone(), "outparam1", usize::MAX);
	fx.func().connect_data(get_node, 0, exit1, 0);
	fx.func().connect_data(get_node, 0, exit2, 0);

	fx.func().rename_data_output(0, "renamed");

	let func = fx.func_ref();
	let renamed = NamedDataType::new("renamed", i32_ty);
	assert_eq!(func.data_outputs(), [renamed.clone()]);
	assert_eq!(func.node(exit1).unwrap().node_type().data_inputs(), [renamed]);
	assert_eq!(func.node(exit1).unwrap().input_data()[0], Some((get_node, 0)));
	assert_eq!(func.node(exit2).unwrap().input_data()[0], Some((get_node, 0)));
}

#[test]
fn exec_inputs_mirror_onto_the_entry_node() {
	let mut fx = fixture();
	let (entry, set_node) = (fx.entry, fx.set_node);

	fx.func().add_exec_input("ein", usize::MAX);
	{
		let func = fx.func_ref();
		assert_eq!(func.exec_inputs(), ["ein"]);
		let entry_type = func.node(entry).unwrap().node_type();
		assert_eq!(entry_type.exec_inputs().len(), 0);
		assert_eq!(entry_type.exec_outputs(), ["ein"]);
	}

	let report = fx.func().connect_exec(entry, 0, set_node, 0);
	assert!(report.success(), "{report}");
	assert_eq!(fx.func_ref().node(entry).unwrap().output_exec()[0], Some((set_node, 0)));

	// Insertion before and after, like the data lists.
	fx.func().add_exec_input("ein2", 0);
	assert_eq!(fx.func_ref().exec_inputs(), ["ein2", "ein"]);
	assert_eq!(fx.func_ref().node(entry).unwrap().node_type().exec_outputs(), ["ein2", "ein"]);

	// Renaming through a bad index is a no-op; the connection survives all
	// of this because entry exec outputs only changed names and count.
	fx.func().rename_exec_input(5, "nope");
	assert_eq!(fx.func_ref().exec_inputs(), ["ein2", "ein"]);

	fx.func().rename_exec_input(0, "renamed");
	assert_eq!(fx.func_ref().exec_inputs(), ["renamed", "ein"]);
	assert_eq!(fx.func_ref().node(entry).unwrap().output_exec()[0], Some((set_node, 0)));
}

#[test]
fn exec_outputs_mirror_onto_exit_nodes() {
	let mut fx = fixture();
	let (set_node, set_node2, exit1, exit2) = (fx.set_node, fx.set_node2, fx.exit1, fx.exit2);

	fx.func().add_exec_output("eout", usize::MAX);
	{
		let func = fx.func_ref();
		assert_eq!(func.exec_outputs(), ["eout"]);
		for exit in [exit1, exit2] {
			let ty = func.node(exit).unwrap().node_type();
			assert_eq!(ty.exec_outputs().len(), 0);
			assert_eq!(ty.exec_inputs(), ["eout"]);
		}
	}

	let report = fx.func().connect_exec(set_node, 0, exit1, 0);
	assert!(report.success(), "{report}");
	let report = fx.func().connect_exec(set_node2, 0, exit2, 0);
	assert!(report.success(), "{report}");

	{
		let func = fx.func_ref();
		assert_eq!(func.node(exit1).unwrap().input_exec()[0], [(set_node, 0)]);
		assert_eq!(func.node(exit2).unwrap().input_exec()[0], [(set_node2, 0)]);
	}

	fx.func().add_exec_output("eout2", 0);
	{
		let func = fx.func_ref();
		assert_eq!(func.exec_outputs(), ["eout2", "eout"]);
		assert_eq!(func.node(exit1).unwrap().node_type().exec_inputs(), ["eout2", "eout"]);
	}

	// Exec inputs grew at the front; the back-pointers stay on slot 0
	// because exec slots are positional and the lists only grew at the end
	// of the resize. Renames with a bad index change nothing.
	fx.func().rename_exec_output(9, "nope");
	let func = fx.func_ref();
	assert_eq!(func.exec_outputs(), ["eout2", "eout"]);
	assert_eq!(func.node(exit1).unwrap().input_exec()[0], [(set_node, 0)]);
	assert_eq!(func.node(exit2).unwrap().input_exec()[0], [(set_node2, 0)]);
}

#[test]
fn entry_node_is_unique_and_signature_checked() {
	let mut fx = fixture();
	let entry = fx.entry;
	assert_eq!(fx.func_ref().entry_node(), Some(entry));

	// A second entry makes entry_node() refuse to pick one.
	let entry_type = fx.func_ref().create_entry_node_type();
	let (second, report) = fx.func().insert_node(entry_type, 0.0, 0.0, Some(id(99)));
	assert!(report.success(), "{report}");
	assert_eq!(fx.func_ref().entry_node(), None);

	let report = fx.func().remove_node(second.unwrap());
	assert!(report.success(), "{report}");
	assert_eq!(fx.func_ref().entry_node(), Some(entry));
}

#[test]
fn inserting_with_a_duplicate_id_fails() {
	let mut fx = fixture();
	let entry_type = fx.func_ref().create_entry_node_type();
	let (inserted, report) = fx.func().insert_node(entry_type, 0.0, 0.0, Some(id(1)));
	assert_eq!(inserted, None);
	assert!(!report.success());
	assert!(report.has_code("EUKN"));
	assert_eq!(fx.func_ref().node_count(), 6);
}
