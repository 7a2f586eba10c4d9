use std::fmt;

use derive_new::new;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod console;
pub mod controller;
pub mod extract;
pub mod live;
pub mod page;
pub mod policy;
pub mod resolver;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod text;

/// Opaque handle to an element of the most recent page read.
///
/// Only meaningful until the next refresh of the page; never persisted.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Bounding box of an element, in CSS pixels relative to the viewport
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize, new)]
pub struct BoundingBox {
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
}

impl BoundingBox {
	pub fn top(&self) -> f64 {
		self.y
	}

	pub fn bottom(&self) -> f64 {
		self.y + self.height
	}

	/// Whether the element occupies any space at all (mirrors `offsetWidth > 0 && offsetHeight > 0`)
	pub fn is_rendered(&self) -> bool {
		self.width > 0.0 && self.height > 0.0
	}
}

/// A clickable answer option found on the page
#[derive(Clone, Debug, PartialEq, new)]
pub struct OptionCandidate {
	/// Handle used to trigger the selection
	pub node: NodeId,
	/// Cleaned display text, never empty
	pub text: String,
}

/// Result of one extraction pass over the page
#[derive(Clone, Debug, Default, PartialEq, new)]
pub struct Observation {
	/// Label of the current challenge, empty if none was found
	pub context: String,
	/// Question text, empty if none was found
	pub question: String,
	/// Candidate options in document order
	pub options: Vec<OptionCandidate>,
}

impl Observation {
	/// Outer key of the answer table
	pub fn context_key(&self) -> String {
		text::normalize(&self.context)
	}

	/// Inner key of the answer table
	pub fn question_key(&self) -> String {
		text::normalize(&self.question)
	}

	/// An observation is only worth resolving if it has options and at least one key
	pub fn is_usable(&self) -> bool {
		!self.options.is_empty() && !(self.context_key().is_empty() && self.question_key().is_empty())
	}
}

impl fmt::Display for Observation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if !self.context.is_empty() {
			writeln!(f, "[{}]", self.context)?;
		}
		if self.question.is_empty() {
			writeln!(f, "(no question text)")?;
		} else {
			writeln!(f, "{}", self.question)?;
		}
		writeln!(f)?;
		for (i, option) in self.options.iter().enumerate() {
			writeln!(f, "( ) {}. {}", i + 1, option.text)?;
		}
		Ok(())
	}
}
