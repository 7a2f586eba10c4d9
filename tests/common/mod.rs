#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, time::Duration};

use bee_headless::{
	BoundingBox, NodeId,
	page::{CaptureEvent, Clock, PageDriver, PageProvider, Shortcut},
	policy::Policy,
	snapshot::DomSnapshot,
};
use color_eyre::Result;

pub const URL: &str = "https://student.beereaders.com/challenge/7";

fn row(y: f64) -> Option<BoundingBox> {
	Some(BoundingBox::new(0.0, y, 240.0, 32.0))
}

/// Builds one page view against the default selectors
pub struct View {
	snap: DomSnapshot,
	policy: Policy,
	y: f64,
}

impl View {
	pub fn new() -> Self {
		Self {
			snap: DomSnapshot::new(URL),
			policy: Policy::default(),
			y: 0.0,
		}
	}

	fn next_row(&mut self) -> Option<BoundingBox> {
		self.y += 50.0;
		row(self.y)
	}

	/// Challenge title; marks the view as being inside a challenge
	pub fn title(mut self, text: &str) -> Self {
		let bbox = self.next_row();
		let node = self.snap.add("div", text, bbox, None);
		let selectors = self.policy.selectors.clone();
		self.snap.register(&selectors.context_title[0], node).register(&selectors.in_context, node);
		self
	}

	pub fn question(mut self, text: &str) -> Self {
		let bbox = self.next_row();
		let node = self.snap.add("div", text, bbox, None);
		let selector = self.policy.selectors.question_container.clone();
		self.snap.register(&selector, node);
		self
	}

	/// Option buttons sharing one container
	pub fn options(mut self, texts: &[&str]) -> Self {
		let bbox = self.next_row();
		let list = self.snap.add("div", &texts.join(" "), bbox, None);
		let selector = self.policy.selectors.options.clone();
		for text in texts {
			let bbox = self.next_row();
			let node = self.snap.add("button", text, bbox, Some(list));
			self.snap.register(&selector, node);
		}
		self
	}

	/// Button answering every control selector
	pub fn control(mut self, text: &str) -> Self {
		let bbox = self.next_row();
		let node = self.snap.add("button", text, bbox, None);
		let s = &self.policy.selectors;
		let mut selectors = vec![s.advance_controls.clone(), s.restart_controls.clone(), s.enter_controls.clone()];
		selectors.sort();
		selectors.dedup();
		for selector in selectors {
			self.snap.register(&selector, node);
		}
		self
	}

	/// Overview card whose first link reads `link`
	pub fn card(mut self, text: &str, link: &str) -> Self {
		let bbox = self.next_row();
		let card = self.snap.add("div", &format!("{text} {link}"), bbox, None);
		let bbox = self.next_row();
		let anchor = self.snap.add("a", link, bbox, Some(card));
		let selector = self.policy.selectors.cards.clone();
		self.snap.register(&selector, card);
		self.snap.set_actionable(card, anchor);
		self
	}

	pub fn back_button(mut self) -> Self {
		let bbox = self.next_row();
		let node = self.snap.add("button", "", bbox, None);
		let selector = self.policy.selectors.back_controls.clone();
		self.snap.register(&selector, node);
		self
	}

	pub fn build(self) -> DomSnapshot {
		self.snap
	}
}

/// Scripted page: a set of views, click transitions between them, and a simulated operator
#[derive(Debug, Default)]
pub struct FakePage {
	views: Vec<DomSnapshot>,
	current: usize,
	transitions: HashMap<(usize, NodeId), usize>,
	pub clicks: Vec<String>,
	pub refreshes: usize,
	pub history_backs: usize,
	/// One-shot click listeners: element, arming generation, slot
	listeners: Vec<(NodeId, u64, usize)>,
	generation: u64,
	/// Generation whose listeners record; 0 when disarmed
	live: u64,
	captures: Vec<CaptureEvent>,
	pub disarms: usize,
	shortcuts: Vec<Shortcut>,
}

impl FakePage {
	pub fn new(view: DomSnapshot) -> Self {
		Self { views: vec![view], ..Self::default() }
	}

	/// Returns the index of the new view
	pub fn add_view(&mut self, view: DomSnapshot) -> usize {
		self.views.push(view);
		self.views.len() - 1
	}

	pub fn show(&mut self, view: usize) {
		self.current = view;
	}

	pub fn current(&self) -> usize {
		self.current
	}

	fn view(&self) -> &DomSnapshot {
		&self.views[self.current]
	}

	/// Clicking the element reading `text` in `view` switches to `next`
	pub fn on_click(&mut self, view: usize, text: &str, next: usize) {
		let shown = std::mem::replace(&mut self.current, view);
		let node = self.element(text);
		self.current = shown;
		self.transitions.insert((view, node), next);
	}

	fn element(&self, text: &str) -> NodeId {
		let snap = self.view();
		(0..snap.len()).map(NodeId).find(|&n| snap.get_text(n) == text).expect("no such element")
	}

	/// Listeners on `node` fire once; only those of the live arming record
	fn fire_listeners(&mut self, node: NodeId) {
		let live = self.live;
		let mut recorded = Vec::new();
		self.listeners.retain(|&(n, generation, slot)| {
			if n != node {
				return true;
			}
			if generation == live && live != 0 {
				recorded.push(CaptureEvent::new(generation, slot));
			}
			false
		});
		self.captures.extend(recorded);
	}

	/// The operator clicks the element reading `text`
	pub fn operator_picks(&mut self, text: &str) {
		let node = self.element(text);
		self.fire_listeners(node);
	}

	/// A recorded click the engine has not drained yet, from any arming
	pub fn operator_picks_from(&mut self, generation: u64, slot: usize) {
		self.captures.push(CaptureEvent::new(generation, slot));
	}

	/// Clicks recorded and not yet drained
	pub fn captured(&self) -> &[CaptureEvent] {
		&self.captures
	}

	pub fn press(&mut self, shortcut: Shortcut) {
		self.shortcuts.push(shortcut);
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}
}

impl PageProvider for FakePage {
	fn query_all(&self, selector: &str) -> Vec<NodeId> {
		self.view().query_all(selector)
	}

	fn get_text(&self, node: NodeId) -> String {
		self.view().get_text(node)
	}

	fn get_bounding_box(&self, node: NodeId) -> Option<BoundingBox> {
		self.view().get_bounding_box(node)
	}

	fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.view().parent(node)
	}

	fn actionable_descendant(&self, node: NodeId) -> Option<NodeId> {
		self.view().actionable_descendant(node)
	}
}

impl PageDriver for FakePage {
	async fn refresh(&mut self) -> Result<()> {
		self.refreshes += 1;
		Ok(())
	}

	async fn click(&mut self, node: NodeId) -> Result<bool> {
		if self.view().node(node).is_none() {
			return Ok(false);
		}
		self.clicks.push(self.view().get_text(node));
		self.fire_listeners(node);
		if let Some(&next) = self.transitions.get(&(self.current, node)) {
			self.current = next;
		}
		Ok(true)
	}

	async fn arm_capture(&mut self, nodes: &[NodeId]) -> Result<u64> {
		self.generation += 1;
		self.live = self.generation;
		let generation = self.generation;
		self.listeners.extend(nodes.iter().enumerate().map(|(slot, &node)| (node, generation, slot)));
		Ok(generation)
	}

	async fn disarm_capture(&mut self) -> Result<()> {
		self.live = 0;
		self.disarms += 1;
		Ok(())
	}

	async fn take_captures(&mut self) -> Result<Vec<CaptureEvent>> {
		Ok(std::mem::take(&mut self.captures))
	}

	async fn take_shortcuts(&mut self) -> Result<Vec<Shortcut>> {
		Ok(std::mem::take(&mut self.shortcuts))
	}

	async fn history_back(&mut self) -> Result<()> {
		self.history_backs += 1;
		Ok(())
	}
}

/// Records requested delays instead of waiting
#[derive(Debug, Default)]
pub struct RecordingClock {
	pub sleeps: RefCell<Vec<Duration>>,
}

impl Clock for RecordingClock {
	async fn sleep(&self, duration: Duration) {
		self.sleeps.borrow_mut().push(duration);
	}
}

/// The standard three-capital question, optionally with a "Siguiente" control
pub fn capitals(with_next: bool) -> DomSnapshot {
	let view = View::new()
		.title("Reto 7: Capitales")
		.question("¿Cuál es la capital de Francia?")
		.options(&["Madrid", "Paris", "Rome"]);
	if with_next { view.control("Siguiente").build() } else { view.build() }
}
