//! The static checks that gate lowering.

use serde_json::Value;

use chi_core::{Context, GraphFunction, NodeType, Report, validator};
use chi_support::NodeId;

fn id(n: u128) -> NodeId {
	uuid::Uuid::from_u128(n)
}

fn node_type(ctx: &Context, module: &str, name: &str, config: &Value) -> NodeType {
	let mut report = Report::new();
	let ty = ctx
		.node_type_from_module(module, name, config, &mut report)
		.expect("node type resolves");
	assert!(report.success(), "{report}");
	ty
}

fn new_main(ctx: &mut Context) {
	let module = ctx.new_graph_module("test/main");
	module.get_or_create_function("main", vec![], vec![], vec![String::new()], vec![String::new()]);
}

fn func(ctx: &mut Context) -> &mut GraphFunction {
	ctx.graph_module_mut("test/main").unwrap().function_mut("main").unwrap()
}

fn func_ref(ctx: &Context) -> &GraphFunction {
	ctx.graph_module("test/main").unwrap().function_from_name("main").unwrap()
}

#[test]
fn a_function_without_an_entry_fails() {
	let mut ctx = Context::new(".");
	new_main(&mut ctx);
	let report = validator::validate_function(func_ref(&ctx));
	assert!(!report.success());
}

#[test]
fn an_unreachable_exit_fails() {
	let mut ctx = Context::new(".");
	new_main(&mut ctx);
	{
		let f = func(&mut ctx);
		f.get_or_insert_entry_node(0.0, 0.0, Some(id(1)));
		let exit = f.create_exit_node_type();
		f.insert_node(exit, 0.0, 0.0, Some(id(2)));
		// No exec edge from entry to exit.
	}
	let report = validator::validate_function(func_ref(&ctx));
	assert!(!report.success());
}

#[test]
fn a_minimal_entry_to_exit_function_validates() {
	let mut ctx = Context::new(".");
	new_main(&mut ctx);
	{
		let f = func(&mut ctx);
		f.get_or_insert_entry_node(0.0, 0.0, Some(id(1)));
		let exit = f.create_exit_node_type();
		f.insert_node(exit, 0.0, 0.0, Some(id(2)));
		let report = f.connect_exec(id(1), 0, id(2), 0);
		assert!(report.success(), "{report}");
	}
	let report = validator::validate_function(func_ref(&ctx));
	assert!(report.success(), "{report}");
}

#[test]
fn reached_nodes_with_dangling_data_inputs_fail() {
	let mut ctx = Context::new(".");
	new_main(&mut ctx);
	let puts = node_type(&ctx, "c", "puts", &Value::Null);
	{
		let f = func(&mut ctx);
		f.get_or_insert_entry_node(0.0, 0.0, Some(id(1)));
		f.insert_node(puts, 0.0, 0.0, Some(id(2)));
		let exit = f.create_exit_node_type();
		f.insert_node(exit, 0.0, 0.0, Some(id(3)));
		f.connect_exec(id(1), 0, id(2), 0);
		f.connect_exec(id(2), 0, id(3), 0);
		// puts's string input is left unconnected.
	}
	let report = validator::validate_function(func_ref(&ctx));
	assert!(!report.success());
}

#[test]
fn unreached_nodes_do_not_fail_data_checks() {
	let mut ctx = Context::new(".");
	new_main(&mut ctx);
	let puts = node_type(&ctx, "c", "puts", &Value::Null);
	{
		let f = func(&mut ctx);
		f.get_or_insert_entry_node(0.0, 0.0, Some(id(1)));
		let exit = f.create_exit_node_type();
		f.insert_node(exit, 0.0, 0.0, Some(id(2)));
		f.connect_exec(id(1), 0, id(2), 0);
		// A dangling puts node, not on any exec path.
		f.insert_node(puts, 0.0, 0.0, Some(id(9)));
	}
	let report = validator::validate_function(func_ref(&ctx));
	assert!(report.success(), "{report}");
}

#[test]
fn exec_cycles_fail() {
	let mut ctx = Context::new(".");
	new_main(&mut ctx);
	{
		let mut report = Report::new();
		let i32_ty = ctx.type_from_module("lang", "i32", &mut report).unwrap();
		func(&mut ctx).get_or_create_local("a", i32_ty);
	}
	let setter = node_type(&ctx, "test/main", "_set_a", &Value::Null);
	let const_one = node_type(&ctx, "lang", "const-int", &serde_json::json!(1));
	{
		let f = func(&mut ctx);
		f.get_or_insert_entry_node(0.0, 0.0, Some(id(1)));
		f.insert_node(setter.clone(), 0.0, 0.0, Some(id(2)));
		f.insert_node(setter, 0.0, 0.0, Some(id(3)));
		f.insert_node(const_one.clone(), 0.0, 0.0, Some(id(4)));
		let exit = f.create_exit_node_type();
		f.insert_node(exit, 0.0, 0.0, Some(id(5)));

		// entry -> set2 -> set3 -> set2: a cycle, though an exit exists
		// behind the const node's own path.
		f.connect_exec(id(1), 0, id(2), 0);
		f.connect_exec(id(2), 0, id(3), 0);
		f.connect_exec(id(3), 0, id(2), 0);
		f.connect_data(id(4), 0, id(2), 0);
		f.connect_data(id(4), 0, id(3), 0);
	}
	let report = validator::validate_function(func_ref(&ctx));
	assert!(!report.success());
}

#[test]
fn every_problem_is_reported_at_once() {
	let mut ctx = Context::new(".");
	new_main(&mut ctx);
	let puts = node_type(&ctx, "c", "puts", &Value::Null);
	{
		let f = func(&mut ctx);
		f.get_or_insert_entry_node(0.0, 0.0, Some(id(1)));
		// Two reached puts nodes, both with dangling inputs, and no exit.
		f.insert_node(puts.clone(), 0.0, 0.0, Some(id(2)));
		f.insert_node(puts, 0.0, 0.0, Some(id(3)));
		f.connect_exec(id(1), 0, id(2), 0);
		f.connect_exec(id(2), 0, id(3), 0);
	}
	let report = validator::validate_function(func_ref(&ctx));
	assert!(!report.success());
	// One entry for the missing exit, one per dangling input.
	assert!(report.entries().len() >= 3, "{report}");
}
