//! Node identifiers.
//!
//! Nodes are keyed by 128-bit ids in canonical hyphenated form. The all-zero
//! (nil) id is reserved as "no node" and never considered valid.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use uuid::Uuid;

/// Unique identifier of a node within a graph function.
pub type NodeId = Uuid;

/// Parse a node id from its canonical string form.
///
/// Returns `None` for malformed text and for the nil id, which is never a
/// legal node id.
pub fn parse_node_id(text: &str) -> Option<NodeId> {
	let id = Uuid::parse_str(text).ok()?;
	if id.is_nil() { None } else { Some(id) }
}

/// A source of fresh node ids.
///
/// The random source is what interactive editing uses; the seeded source
/// produces a reproducible id stream so tests and determinism checks can
/// replay the same graph construction byte for byte.
#[derive(Debug)]
pub enum IdSource {
	/// Operating-system randomness.
	Random,
	/// A deterministic stream derived from a fixed seed.
	Seeded(ChaCha20Rng),
}

impl IdSource {
	/// An id source backed by OS randomness.
	pub fn random() -> Self {
		Self::Random
	}

	/// A deterministic id source; the same seed yields the same id sequence.
	pub fn seeded(seed: u64) -> Self {
		Self::Seeded(ChaCha20Rng::seed_from_u64(seed))
	}

	/// Produce the next id. Never returns the nil id.
	pub fn next_id(&mut self) -> NodeId {
		match self {
			Self::Random => Uuid::new_v4(),
			Self::Seeded(rng) => {
				let mut bytes = [0_u8; 16];
				rng.fill_bytes(&mut bytes);
				uuid::Builder::from_random_bytes(bytes).into_uuid()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_rejects_nil_and_garbage() {
		assert_eq!(parse_node_id("00000000-0000-0000-0000-000000000000"), None);
		assert_eq!(parse_node_id("not-an-id"), None);
		let id = parse_node_id("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap();
		assert_eq!(id.to_string(), "6ba7b810-9dad-11d1-80b4-00c04fd430c8");
	}

	#[test]
	fn seeded_source_is_reproducible() {
		let mut a = IdSource::seeded(7);
		let mut b = IdSource::seeded(7);
		for _ in 0..16 {
			assert_eq!(a.next_id(), b.next_id());
		}
		let mut c = IdSource::seeded(8);
		assert_ne!(IdSource::seeded(7).next_id(), c.next_id());
	}

	#[test]
	fn generated_ids_are_valid_and_distinct() {
		let mut src = IdSource::random();
		let a = src.next_id();
		let b = src.next_id();
		assert!(!a.is_nil());
		assert_ne!(a, b);
	}
}
