//! Turns one observation into at most one click, or arms a capture to learn from the operator.

use std::{sync::Arc, time::Duration};

use color_eyre::Result;
use v_utils::log;

use crate::{
	extract::{extract, find_control},
	page::{Clock, PageDriver},
	policy::Policy,
	store::{AnswerStore, StateStore},
	text::best_match,
};

/// What a single resolution attempt did
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution {
	/// No options, or neither a context nor a question to key on
	NothingToResolve,
	/// Clicked the option matching the stored answer
	Answered { option: String, advanced: bool },
	/// A stored answer exists but no option matches it
	NoMatch { answer: String },
	/// Unknown question; waiting for the operator's choice
	Learning { question: String },
	/// Unknown question, learning is off
	Unknown { question: String },
}

impl Resolution {
	pub fn acted(&self) -> bool {
		matches!(self, Resolution::Answered { .. })
	}
}

/// Options armed for capture, with the keys their answer will be filed under
#[derive(Clone, Debug)]
struct PendingCapture {
	/// First arming of this same question; re-arming it keeps clicks on earlier listeners valid
	since: u64,
	generation: u64,
	context_key: String,
	question_key: String,
	options: Vec<String>,
}

impl PendingCapture {
	fn covers(&self, generation: u64) -> bool {
		(self.since..=self.generation).contains(&generation)
	}
}

#[derive(Debug)]
pub struct Resolver {
	policy: Arc<Policy>,
	advance_delay: Duration,
	pending: Option<PendingCapture>,
}

impl Resolver {
	pub fn new(policy: Arc<Policy>, advance_delay: Duration) -> Self {
		Self {
			policy,
			advance_delay,
			pending: None,
		}
	}

	/// Whether an operator choice is currently awaited
	pub fn is_capturing(&self) -> bool {
		self.pending.is_some()
	}

	/// Resolve the current page once. `true` if an option was selected.
	pub async fn resolve_once<P: PageDriver, C: Clock>(&mut self, page: &mut P, clock: &C, store: &AnswerStore, learning: bool) -> Result<bool> {
		Ok(self.resolve(page, clock, store, learning).await?.acted())
	}

	pub async fn resolve<P: PageDriver, C: Clock>(&mut self, page: &mut P, clock: &C, store: &AnswerStore, learning: bool) -> Result<Resolution> {
		page.refresh().await?;
		let observation = extract(&*page, &self.policy);
		tracing::debug!("Observed:\n{observation}");
		if !observation.is_usable() {
			return Ok(Resolution::NothingToResolve);
		}
		let context_key = observation.context_key();
		let question_key = observation.question_key();

		if let Some(answer) = store.lookup(&context_key, &question_key) {
			let Some(i) = best_match(observation.options.iter().map(|o| o.text.as_str()), answer, &self.policy.thresholds) else {
				tracing::info!("Stored answer {answer:?} matches none of {} option(s)", observation.options.len());
				return Ok(Resolution::NoMatch { answer: answer.to_owned() });
			};
			let option = &observation.options[i];
			if self.pending.is_some() {
				// an armed listener on a reused button would take our own click for the operator's
				page.disarm_capture().await?;
			}
			if !page.click(option.node).await? {
				tracing::warn!("Option {:?} vanished before it could be clicked", option.text);
				return Ok(Resolution::NoMatch { answer: answer.to_owned() });
			}
			log!("Answered: {} -> {}", observation.question, option.text);
			let option = option.text.clone();

			clock.sleep(self.advance_delay).await;
			let advanced = self.advance(page).await?;
			return Ok(Resolution::Answered { option, advanced });
		}

		if !learning {
			tracing::debug!("No stored answer for {question_key:?} in {context_key:?}");
			return Ok(Resolution::Unknown { question: observation.question });
		}

		let nodes: Vec<_> = observation.options.iter().map(|o| o.node).collect();
		let options: Vec<String> = observation.options.into_iter().map(|o| o.text).collect();
		let generation = page.arm_capture(&nodes).await?;
		let since = match &self.pending {
			Some(p) if p.context_key == context_key && p.question_key == question_key && p.options == options => p.since,
			_ => {
				log!("Learning: pick the right option for {:?}", observation.question);
				generation
			}
		};
		self.pending = Some(PendingCapture {
			since,
			generation,
			context_key,
			question_key,
			options,
		});
		Ok(Resolution::Learning { question: observation.question })
	}

	/// Click the visible advance control, if any
	async fn advance<P: PageDriver>(&self, page: &mut P) -> Result<bool> {
		page.refresh().await?;
		match find_control(&*page, &self.policy.selectors.advance_controls, &self.policy.advance) {
			Some(next) => page.click(next).await,
			None => Ok(false),
		}
	}

	/// Record the operator's choice for the armed question, persisting it immediately.
	///
	/// Returns the learned `(question, answer)` keys, if a capture was pending and fired.
	pub async fn collect_capture<P: PageDriver, S: StateStore>(&mut self, page: &mut P, store: &mut AnswerStore, storage: &mut S) -> Result<Option<(String, String)>> {
		if self.pending.is_none() {
			return Ok(None);
		}
		let events = page.take_captures().await?;
		let hit = self.pending.as_ref().and_then(|p| events.iter().find(|e| p.covers(e.generation)).copied());
		let (Some(event), Some(pending)) = (hit, self.pending.take_if(|_| hit.is_some())) else {
			if !events.is_empty() {
				tracing::debug!("Dropping {} capture(s) from superseded armings", events.len());
			}
			return Ok(None);
		};
		page.disarm_capture().await?;
		let Some(answer) = pending.options.get(event.slot) else {
			tracing::warn!("Capture slot {} out of range", event.slot);
			return Ok(None);
		};

		store.learn(&pending.context_key, &pending.question_key, answer);
		store.save(storage)?;
		log!("Learned: {} -> {}", pending.question_key, answer);
		Ok(Some((pending.question_key, answer.clone())))
	}
}
