//! Node table produced by one read of the page.
//!
//! The live page fills it from a single script evaluation; tests build it by hand as a fixture.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, NodeId, page::PageProvider};

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct NodeInfo {
	/// Lowercase tag name
	pub tag: String,
	pub text: String,
	/// `None` when the element has no layout box
	#[serde(default)]
	pub bbox: Option<BoundingBox>,
	#[serde(default)]
	pub parent: Option<NodeId>,
	#[serde(default)]
	pub actionable: Option<NodeId>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DomSnapshot {
	#[serde(default)]
	pub url: String,
	nodes: Vec<NodeInfo>,
	/// Selector -> matching nodes in document order
	matches: HashMap<String, Vec<NodeId>>,
}

impl DomSnapshot {
	pub fn new(url: impl Into<String>) -> Self {
		Self { url: url.into(), ..Self::default() }
	}

	/// Append a node; nodes added later come later in document order
	pub fn add(&mut self, tag: &str, text: &str, bbox: Option<BoundingBox>, parent: Option<NodeId>) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(NodeInfo {
			tag: tag.to_owned(),
			text: text.to_owned(),
			bbox,
			parent,
			actionable: None,
		});
		id
	}

	/// Record that `node` matches `selector`
	pub fn register(&mut self, selector: &str, node: NodeId) -> &mut Self {
		self.matches.entry(selector.to_owned()).or_default().push(node);
		self
	}

	pub fn set_actionable(&mut self, node: NodeId, descendant: NodeId) {
		if let Some(info) = self.nodes.get_mut(node.0) {
			info.actionable = Some(descendant);
		}
	}

	pub fn node(&self, id: NodeId) -> Option<&NodeInfo> {
		self.nodes.get(id.0)
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

impl PageProvider for DomSnapshot {
	fn query_all(&self, selector: &str) -> Vec<NodeId> {
		self.matches.get(selector).cloned().unwrap_or_default()
	}

	fn get_text(&self, node: NodeId) -> String {
		self.node(node).map(|n| n.text.clone()).unwrap_or_default()
	}

	fn get_bounding_box(&self, node: NodeId) -> Option<BoundingBox> {
		self.node(node)?.bbox
	}

	fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.node(node)?.parent
	}

	fn actionable_descendant(&self, node: NodeId) -> Option<NodeId> {
		self.node(node)?.actionable
	}
}
