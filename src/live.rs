//! [PageDriver] over a real browser tab.
//!
//! Each refresh evaluates one script that collects every element the policy asks about into `window.__bhEls` and returns the node table;
//! a [NodeId] is an index into that array, so the page's own markup is never touched. The same script installs the document-level shortcut listener.

use chromiumoxide::Page;
use color_eyre::{Result, eyre::eyre};

use crate::{
	BoundingBox, NodeId,
	page::{CaptureEvent, PageDriver, PageProvider, Shortcut},
	policy::Policy,
	snapshot::DomSnapshot,
};

/// Called as `(SNAPSHOT_JS)(queries, actionableSelector)`
const SNAPSHOT_JS: &str = r#"
	function(queries, actionableSel) {
		const MAX_TEXT = 4000;

		if (!window.__bhHooks) {
			window.__bhHooks = true;
			window.__bhKeys = [];
			window.addEventListener('keydown', e => {
				if (!(e.ctrlKey && e.altKey)) return;
				const k = (e.key || '').toLowerCase();
				if (k === 's' || k === 'x') {
					window.__bhKeys.push(k);
					e.preventDefault();
				}
			}, true);
		}

		const els = [];
		const ids = new Map();
		const idOf = el => {
			if (ids.has(el)) return ids.get(el);
			const id = els.length;
			ids.set(el, id);
			els.push(el);
			return id;
		};

		const matches = {};
		for (const sel of queries) {
			let found = [];
			try { found = Array.from(document.querySelectorAll(sel)); } catch (e) { found = []; }
			matches[sel] = found.map(idOf);
		}

		const matched = els.length;
		const actionable = {};
		for (let i = 0; i < matched; i++) {
			const el = els[i];
			if (el.parentElement) idOf(el.parentElement);
			const inner = el.querySelector(actionableSel);
			if (inner) actionable[i] = idOf(inner);
		}

		const nodes = els.map((el, i) => {
			const r = el.getBoundingClientRect();
			const rendered = el.offsetWidth > 0 && el.offsetHeight > 0;
			const raw = el.innerText || el.textContent || '';
			return {
				tag: el.tagName.toLowerCase(),
				text: raw.length > MAX_TEXT ? raw.slice(0, MAX_TEXT) : raw,
				bbox: rendered ? { x: r.left, y: r.top, width: r.width || el.offsetWidth, height: r.height || el.offsetHeight } : null,
				parent: el.parentElement && ids.has(el.parentElement) ? ids.get(el.parentElement) : null,
				actionable: i in actionable ? actionable[i] : null,
			};
		});

		window.__bhEls = els;
		return JSON.stringify({ url: location.href, nodes: nodes, matches: matches });
	}
"#;

/// Called as `(ARM_JS)(generation, ids)`. Listeners of older armings go quiet once the generation moves on.
const ARM_JS: &str = r#"
	function(generation, ids) {
		window.__bhArm = generation;
		if (!window.__bhCaptures) window.__bhCaptures = [];
		const els = window.__bhEls || [];
		ids.forEach((id, slot) => {
			const el = els[id];
			if (!el || !el.isConnected) return;
			el.addEventListener('click', () => {
				if (window.__bhArm !== generation) return;
				window.__bhCaptures.push({ generation: generation, slot: slot });
			}, { once: true, capture: true });
		});
		return true;
	}
"#;

const DISARM_JS: &str = "(function() { window.__bhArm = 0; return true; })()";

const TAKE_CAPTURES_JS: &str = r#"
	(function() {
		const c = window.__bhCaptures || [];
		window.__bhCaptures = [];
		return JSON.stringify(c);
	})()
"#;

const TAKE_KEYS_JS: &str = r#"
	(function() {
		const keys = window.__bhKeys || [];
		window.__bhKeys = [];
		return JSON.stringify(keys);
	})()
"#;

pub struct LivePage {
	page: Page,
	queries: Vec<String>,
	actionable: String,
	snapshot: DomSnapshot,
	generation: u64,
}

impl LivePage {
	pub fn new(page: Page, policy: &Policy) -> Self {
		Self {
			page,
			queries: policy.selectors.all(),
			actionable: policy.selectors.card_actionable.clone(),
			snapshot: DomSnapshot::default(),
			generation: 0,
		}
	}

	/// Evaluate `script` and read its result as a string
	async fn eval_string(&self, script: String, what: &str) -> Result<String> {
		let result = self.page.evaluate(script).await.map_err(|e| eyre!("Failed to {what}: {e}"))?;
		result
			.value()
			.and_then(|v| v.as_str())
			.map(str::to_owned)
			.ok_or_else(|| eyre!("Failed to {what}: script returned no string"))
	}

	async fn eval_bool(&self, script: String, what: &str) -> Result<bool> {
		let result = self.page.evaluate(script).await.map_err(|e| eyre!("Failed to {what}: {e}"))?;
		Ok(result.value().and_then(|v| v.as_bool()).unwrap_or(false))
	}
}

impl PageProvider for LivePage {
	fn query_all(&self, selector: &str) -> Vec<NodeId> {
		self.snapshot.query_all(selector)
	}

	fn get_text(&self, node: NodeId) -> String {
		self.snapshot.get_text(node)
	}

	fn get_bounding_box(&self, node: NodeId) -> Option<BoundingBox> {
		self.snapshot.get_bounding_box(node)
	}

	fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.snapshot.parent(node)
	}

	fn actionable_descendant(&self, node: NodeId) -> Option<NodeId> {
		self.snapshot.actionable_descendant(node)
	}
}

impl PageDriver for LivePage {
	async fn refresh(&mut self) -> Result<()> {
		let queries = serde_json::to_string(&self.queries).map_err(|e| eyre!("Failed to encode selectors: {e}"))?;
		let actionable = serde_json::to_string(&self.actionable).map_err(|e| eyre!("Failed to encode selector: {e}"))?;
		let json = self.eval_string(format!("({SNAPSHOT_JS})({queries}, {actionable})"), "read page").await?;
		self.snapshot = serde_json::from_str(&json).map_err(|e| eyre!("Failed to parse page snapshot: {e}"))?;
		tracing::debug!("Read {} node(s) from {}", self.snapshot.len(), self.snapshot.url);
		Ok(())
	}

	async fn click(&mut self, node: NodeId) -> Result<bool> {
		let script = format!(
			r#"
			(function() {{
				const el = (window.__bhEls || [])[{}];
				if (!el || !el.isConnected) return false;
				el.click();
				return true;
			}})()
			"#,
			node.0
		);
		let clicked = self.eval_bool(script, "click element").await?;
		if !clicked {
			tracing::debug!("Element {node} is gone");
		}
		Ok(clicked)
	}

	async fn arm_capture(&mut self, nodes: &[NodeId]) -> Result<u64> {
		self.generation += 1;
		let ids = serde_json::to_string(nodes).map_err(|e| eyre!("Failed to encode node ids: {e}"))?;
		self.eval_bool(format!("({ARM_JS})({}, {ids})", self.generation), "arm capture").await?;
		Ok(self.generation)
	}

	async fn disarm_capture(&mut self) -> Result<()> {
		self.eval_bool(DISARM_JS.to_owned(), "disarm capture").await?;
		Ok(())
	}

	async fn take_captures(&mut self) -> Result<Vec<CaptureEvent>> {
		let json = self.eval_string(TAKE_CAPTURES_JS.to_owned(), "read captures").await?;
		serde_json::from_str(&json).map_err(|e| eyre!("Failed to parse captures: {e}"))
	}

	async fn take_shortcuts(&mut self) -> Result<Vec<Shortcut>> {
		let json = self.eval_string(TAKE_KEYS_JS.to_owned(), "read shortcuts").await?;
		let keys: Vec<String> = serde_json::from_str(&json).map_err(|e| eyre!("Failed to parse shortcuts: {e}"))?;
		Ok(keys.iter().filter_map(|k| Shortcut::from_key(k)).collect())
	}

	async fn history_back(&mut self) -> Result<()> {
		self.page.evaluate("history.back()").await.map_err(|e| eyre!("Failed to go back: {e}"))?;
		Ok(())
	}
}
