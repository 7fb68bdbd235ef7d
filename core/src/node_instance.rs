//! One node in a graph function.

use chi_support::NodeId;

use crate::node_type::NodeType;

/// An endpoint of a connection: the other node and the slot index on it.
pub type Endpoint = (NodeId, usize);

/// A placed node: its owned type, its position, and its connection slots.
///
/// The slot shapes encode the fan rules: a data input has one producer, an
/// exec output has one successor; the reverse directions are lists. Slot
/// vector lengths always match the node type's signature — `set_type`
/// resizing is handled by [`crate::GraphFunction::set_node_type`], which also
/// severs whatever no longer fits.
#[derive(Clone, Debug)]
pub struct NodeInstance {
	id: NodeId,
	ty: NodeType,
	x: f32,
	y: f32,
	/// Incoming exec edges per exec input: multi-fan-in.
	pub(crate) input_exec: Vec<Vec<Endpoint>>,
	/// Outgoing exec edge per exec output: single-fan-out.
	pub(crate) output_exec: Vec<Option<Endpoint>>,
	/// Producer per data input: single-fan-in.
	pub(crate) input_data: Vec<Option<Endpoint>>,
	/// Consumers per data output: multi-fan-out.
	pub(crate) output_data: Vec<Vec<Endpoint>>,
}

impl NodeInstance {
	pub(crate) fn new(id: NodeId, ty: NodeType, x: f32, y: f32) -> Self {
		let input_exec = vec![Vec::new(); ty.exec_inputs().len()];
		let output_exec = vec![None; ty.exec_outputs().len()];
		let input_data = vec![None; ty.data_inputs().len()];
		let output_data = vec![Vec::new(); ty.data_outputs().len()];
		Self {
			id,
			ty,
			x,
			y,
			input_exec,
			output_exec,
			input_data,
			output_data,
		}
	}

	pub fn id(&self) -> NodeId {
		self.id
	}

	pub fn node_type(&self) -> &NodeType {
		&self.ty
	}

	pub fn x(&self) -> f32 {
		self.x
	}

	pub fn y(&self) -> f32 {
		self.y
	}

	pub fn set_x(&mut self, x: f32) {
		self.x = x;
	}

	pub fn set_y(&mut self, y: f32) {
		self.y = y;
	}

	pub fn input_exec(&self) -> &[Vec<Endpoint>] {
		&self.input_exec
	}

	pub fn output_exec(&self) -> &[Option<Endpoint>] {
		&self.output_exec
	}

	pub fn input_data(&self) -> &[Option<Endpoint>] {
		&self.input_data
	}

	pub fn output_data(&self) -> &[Vec<Endpoint>] {
		&self.output_data
	}

	/// Install a new type and resize the slot vectors to its signature.
	/// The caller has already severed anything the new signature cannot
	/// keep.
	pub(crate) fn install_type(&mut self, ty: NodeType) {
		self.input_exec.resize(ty.exec_inputs().len(), Vec::new());
		self.output_exec.resize(ty.exec_outputs().len(), None);
		self.input_data.resize(ty.data_inputs().len(), None);
		self.output_data.resize(ty.data_outputs().len(), Vec::new());
		self.ty = ty;
	}
}
