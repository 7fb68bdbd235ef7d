//! Accumulating diagnostics.
//!
//! Graph operations do not stop at the first problem: loading a module,
//! removing a node, or validating a function keeps going and collects every
//! diagnostic it encounters, so the user sees all of them at once. [`Report`]
//! is the carrier for that style: an ordered list of coded entries, merged
//! with `+=`.

use std::fmt;
use std::ops::AddAssign;

use serde_json::Value;

/// One diagnostic entry: a short machine code, a human message, and a
/// free-form JSON payload with whatever context the producer had on hand.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportEntry {
	/// Short code such as `E24` or `EUKN`; codes starting with `W` are warnings.
	pub code: String,
	/// Human-readable description.
	pub message: String,
	/// Structured context (requested ids, available slots, offending JSON, ...).
	pub data: Value,
}

impl ReportEntry {
	/// Warnings do not flip a report to failed.
	pub fn is_warning(&self) -> bool {
		self.code.starts_with('W')
	}
}

impl fmt::Display for ReportEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}] {}", self.code, self.message)?;
		if !self.data.is_null() {
			write!(f, "\n\t{}", self.data)?;
		}
		Ok(())
	}
}

/// An ordered accumulation of diagnostics.
///
/// A report is successful while it contains nothing but warnings. Emission
/// order is append order, so merging two reports with `+=` keeps each side's
/// internal ordering and places the right-hand entries after the left.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
	entries: Vec<ReportEntry>,
}

impl Report {
	/// An empty (successful) report.
	pub fn new() -> Self {
		Self::default()
	}

	/// A report holding a single entry.
	pub fn error(code: impl Into<String>, message: impl Into<String>, data: Value) -> Self {
		let mut report = Self::new();
		report.add_entry(code, message, data);
		report
	}

	/// Append an entry.
	pub fn add_entry(&mut self, code: impl Into<String>, message: impl Into<String>, data: Value) {
		self.entries.push(ReportEntry {
			code: code.into(),
			message: message.into(),
			data,
		});
	}

	/// True iff no entry is a hard error.
	pub fn success(&self) -> bool {
		self.entries.iter().all(ReportEntry::is_warning)
	}

	/// True iff nothing at all was recorded, not even warnings.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// The entries, in emission order.
	pub fn entries(&self) -> &[ReportEntry] {
		&self.entries
	}

	/// Whether any entry carries the given code. Handy in tests and in the
	/// CLI when deciding how to phrase a failure.
	pub fn has_code(&self, code: &str) -> bool {
		self.entries.iter().any(|entry| entry.code == code)
	}
}

impl AddAssign for Report {
	fn add_assign(&mut self, rhs: Self) {
		self.entries.extend(rhs.entries);
	}
}

impl fmt::Display for Report {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.entries.is_empty() {
			return write!(f, "success");
		}
		for (index, entry) in self.entries.iter().enumerate() {
			if index > 0 {
				writeln!(f)?;
			}
			write!(f, "{entry}")?;
		}
		Ok(())
	}
}

impl std::error::Error for Report {}
