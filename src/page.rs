//! Capabilities the engine needs from the host page.
//!
//! Reads are synchronous over the most recent page read; anything that talks to the browser is async.

use std::time::Duration;

use color_eyre::Result;
use derive_new::new;
use serde::Deserialize;

use crate::{BoundingBox, NodeId, policy::Selectors};

/// Read access to the current view of the page
pub trait PageProvider {
	/// Elements matching `selector`, in document order. Selectors the page was not read for yield nothing.
	fn query_all(&self, selector: &str) -> Vec<NodeId>;
	/// Raw text content of the element
	fn get_text(&self, node: NodeId) -> String;
	fn get_bounding_box(&self, node: NodeId) -> Option<BoundingBox>;
	/// Immediate container element
	fn parent(&self, node: NodeId) -> Option<NodeId>;
	/// First link/button inside the element
	fn actionable_descendant(&self, node: NodeId) -> Option<NodeId>;

	fn is_visible(&self, node: NodeId) -> bool {
		self.get_bounding_box(node).is_some_and(|b| b.is_rendered())
	}

	/// Interactive-looking elements that might be answer options
	fn list_interactive_elements(&self, selectors: &Selectors) -> Vec<NodeId> {
		self.query_all(&selectors.options)
	}
}

/// Operator shortcuts intercepted inside the page
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Shortcut {
	/// Ctrl+Alt+S
	ToggleRun,
	/// Ctrl+Alt+X
	ForceStop,
}

impl Shortcut {
	pub fn from_key(key: &str) -> Option<Self> {
		match key.to_lowercase().as_str() {
			"s" => Some(Shortcut::ToggleRun),
			"x" => Some(Shortcut::ForceStop),
			_ => None,
		}
	}
}

/// The operator clicked one of the options armed for capture
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, new)]
pub struct CaptureEvent {
	/// Which arming this click belongs to
	pub generation: u64,
	/// Index into the armed node list
	pub slot: usize,
}

/// A page the engine can act on
#[allow(async_fn_in_trait)]
pub trait PageDriver: PageProvider {
	/// Re-read the page. Invalidates every [NodeId] handed out before.
	async fn refresh(&mut self) -> Result<()>;
	/// Dispatch a click. `Ok(false)` if the element is gone.
	async fn click(&mut self, node: NodeId) -> Result<bool>;
	/// Attach one-shot listeners to `nodes`; clicks on them are queued for [PageDriver::take_captures].
	/// Re-arming silences earlier listeners. Returns the generation of this arming.
	async fn arm_capture(&mut self, nodes: &[NodeId]) -> Result<u64>;
	/// Silence every armed listener, so clicks the engine dispatches itself are never recorded
	async fn disarm_capture(&mut self) -> Result<()>;
	/// Drain the clicks recorded since the last call, oldest first
	async fn take_captures(&mut self) -> Result<Vec<CaptureEvent>>;
	/// Drain shortcuts pressed since the last call
	async fn take_shortcuts(&mut self) -> Result<Vec<Shortcut>>;
	async fn history_back(&mut self) -> Result<()>;
}

/// Source of in-tick delays
#[allow(async_fn_in_trait)]
pub trait Clock {
	async fn sleep(&self, duration: Duration);
}

/// Wall-clock delays on the tokio timer
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
	async fn sleep(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}
