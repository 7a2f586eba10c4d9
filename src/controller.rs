//! Polling state machine: solve, advance, retry at the end of a sequence, and optionally reopen the same challenge.

use std::{fmt, sync::Arc, time::Duration};

use color_eyre::Result;
use tokio::time::{Interval, MissedTickBehavior};
use v_utils::log;

use crate::{
	extract::{context_label, find_back_control, find_card, find_control, in_context},
	page::{Clock, PageDriver, Shortcut},
	policy::Policy,
	resolver::{Resolution, Resolver},
	state::RunState,
	store::{AnswerStore, StateStore},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
	Idle,
	Polling,
}

/// Fixed delays of the run loop
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timing {
	pub poll_interval: Duration,
	/// Between selecting an option and looking for the advance control
	pub advance_delay: Duration,
	/// After clicking a restart control
	pub retry_delay: Duration,
}

impl Default for Timing {
	fn default() -> Self {
		Self {
			poll_interval: Duration::from_millis(800),
			advance_delay: Duration::from_millis(150),
			retry_delay: Duration::from_millis(500),
		}
	}
}

/// Cancellable repeating timer. A cancelled ticker never fires, so it can sit in a `select!` unconditionally.
#[derive(Debug)]
pub struct Ticker {
	period: Duration,
	interval: Option<Interval>,
}

impl Ticker {
	pub fn new(period: Duration) -> Self {
		Self { period, interval: None }
	}

	pub fn start(&mut self) {
		if self.interval.is_none() {
			let mut interval = tokio::time::interval(self.period);
			interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
			self.interval = Some(interval);
		}
	}

	pub fn cancel(&mut self) {
		self.interval = None;
	}

	pub fn is_active(&self) -> bool {
		self.interval.is_some()
	}

	/// Start or cancel to match `phase`
	pub fn follow(&mut self, phase: Phase) {
		match phase {
			Phase::Polling => self.start(),
			Phase::Idle => self.cancel(),
		}
	}

	pub async fn tick(&mut self) {
		match &mut self.interval {
			Some(interval) => {
				interval.tick().await;
			}
			None => std::future::pending().await,
		}
	}
}

/// Owns the page, the answer table and the run flags, and drives them
pub struct Autopilot<P, S, C> {
	page: P,
	storage: S,
	clock: C,
	policy: Arc<Policy>,
	timing: Timing,
	store: AnswerStore,
	state: RunState,
	resolver: Resolver,
}

impl<P: PageDriver, S: StateStore, C: Clock> Autopilot<P, S, C> {
	/// Restore answers and run flags from `storage`; starts out polling if the last session was left running
	pub fn new(page: P, storage: S, clock: C, policy: Arc<Policy>, timing: Timing) -> Self {
		let store = AnswerStore::load(&storage);
		let state = RunState::init(&storage);
		tracing::info!("Restored {} answer(s); running: {}", store.len(), state.running);
		Self {
			resolver: Resolver::new(policy.clone(), timing.advance_delay),
			page,
			storage,
			clock,
			policy,
			timing,
			store,
			state,
		}
	}

	pub fn phase(&self) -> Phase {
		if self.state.running { Phase::Polling } else { Phase::Idle }
	}

	pub fn state(&self) -> &RunState {
		&self.state
	}

	pub fn store(&self) -> &AnswerStore {
		&self.store
	}

	pub fn storage(&self) -> &S {
		&self.storage
	}

	pub fn page(&self) -> &P {
		&self.page
	}

	pub fn page_mut(&mut self) -> &mut P {
		&mut self.page
	}

	/// Persist only actual changes, so no-op ticks leave storage untouched
	fn set_state(&mut self, next: RunState) -> Result<()> {
		if next != self.state {
			next.save(&mut self.storage)?;
			self.state = next;
		}
		Ok(())
	}

	async fn current_context(&mut self) -> Result<String> {
		self.page.refresh().await?;
		Ok(context_label(&self.page, &self.policy))
	}

	/// Idle -> Polling, capturing the current context as the loop target
	pub async fn start(&mut self) -> Result<()> {
		let context = self.current_context().await?;
		self.set_state(self.state.clone().start(&context))?;
		log!("Autopilot ON");
		Ok(())
	}

	/// Polling -> Idle
	pub fn stop(&mut self) -> Result<()> {
		self.set_state(self.state.clone().stop())?;
		log!("Autopilot OFF");
		Ok(())
	}

	pub async fn toggle_run(&mut self) -> Result<Phase> {
		match self.phase() {
			Phase::Idle => self.start().await?,
			Phase::Polling => self.stop()?,
		}
		Ok(self.phase())
	}

	pub fn toggle_learning(&mut self) -> Result<bool> {
		self.set_state(self.state.clone().toggle_learning())?;
		log!("Learning mode: {}", if self.state.learning { "ON" } else { "OFF" });
		Ok(self.state.learning)
	}

	pub async fn toggle_looping(&mut self) -> Result<bool> {
		let context = if self.state.looping { String::new() } else { self.current_context().await? };
		self.set_state(self.state.clone().toggle_looping(&context))?;
		log!("Loop: {} (reopens the same challenge when the overview shows up)", if self.state.looping { "ON" } else { "OFF" });
		Ok(self.state.looping)
	}

	/// One resolution attempt regardless of phase
	pub async fn solve_now(&mut self) -> Result<Resolution> {
		self.resolver.resolve(&mut self.page, &self.clock, &self.store, self.state.learning).await
	}

	/// Housekeeping that runs in every phase: in-page shortcuts and pending learning captures
	pub async fn watch(&mut self) -> Result<()> {
		for shortcut in self.page.take_shortcuts().await? {
			tracing::debug!("Shortcut: {shortcut:?}");
			match shortcut {
				Shortcut::ToggleRun => {
					self.toggle_run().await?;
				}
				Shortcut::ForceStop =>
					if self.state.running {
						self.stop()?;
					},
			}
		}
		self.resolver.collect_capture(&mut self.page, &mut self.store, &mut self.storage).await?;
		Ok(())
	}

	/// One polling tick. No-op while idle.
	pub async fn tick(&mut self) -> Result<()> {
		if !self.state.running {
			return Ok(());
		}

		self.page.refresh().await?;
		if let Some(retry) = find_control(&self.page, &self.policy.selectors.restart_controls, &self.policy.restart) {
			log!("Sequence finished, restarting");
			self.page.click(retry).await?;
			self.clock.sleep(self.timing.retry_delay).await;
			if self.state.looping {
				let context = self.current_context().await?;
				self.set_state(self.state.clone().capture(&context))?;
			}
			return Ok(());
		}

		self.resolver.resolve_once(&mut self.page, &self.clock, &self.store, self.state.learning).await?;

		if self.state.looping {
			self.page.refresh().await?;
			self.follow_loop().await?;
		}
		Ok(())
	}

	/// Inside a challenge, make sure there is a target; on any other view, head back into the target
	async fn follow_loop(&mut self) -> Result<()> {
		if in_context(&self.page, &self.policy) {
			if self.state.target_context.is_none() {
				let context = context_label(&self.page, &self.policy);
				self.set_state(self.state.clone().capture(&context))?;
			}
			return Ok(());
		}

		let Some(target) = self.state.target_context.clone() else {
			return Ok(());
		};
		if let Some(enter) = find_control(&self.page, &self.policy.selectors.enter_controls, &self.policy.enter) {
			tracing::info!("Entering the questions of {target:?}");
			self.page.click(enter).await?;
		} else if let Some(card) = find_card(&self.page, &self.policy, &target) {
			log!("Reopening {target}");
			self.page.click(card).await?;
		}
		Ok(())
	}

	/// Click the page's back control, or go back in history
	pub async fn go_back(&mut self) -> Result<()> {
		self.page.refresh().await?;
		match find_back_control(&self.page, &self.policy) {
			Some(back) => {
				self.page.click(back).await?;
			}
			None => self.page.history_back().await?,
		}
		Ok(())
	}

	/// Merge an operator payload; a malformed one leaves the table as it was
	pub fn import(&mut self, payload: &str) -> Result<usize> {
		let written = self.store.import(payload)?;
		self.store.save(&mut self.storage)?;
		Ok(written)
	}

	pub fn export(&self) -> Result<String> {
		self.store.to_json_pretty()
	}

	pub fn clear(&mut self) -> Result<()> {
		self.store.clear();
		self.store.save(&mut self.storage)
	}

	pub fn status(&self) -> Status {
		Status {
			phase: self.phase(),
			state: self.state.clone(),
			answers: self.store.len(),
			capturing: self.resolver.is_capturing(),
		}
	}
}

/// Snapshot of the autopilot for the operator
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Status {
	pub phase: Phase,
	pub state: RunState,
	pub answers: usize,
	pub capturing: bool,
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let on_off = |b: bool| if b { "ON" } else { "OFF" };
		writeln!(f, "autopilot: {}", if self.phase == Phase::Polling { "AUTO" } else { "OFF" })?;
		writeln!(f, "learning:  {}{}", on_off(self.state.learning), if self.capturing { " (waiting for a pick)" } else { "" })?;
		writeln!(f, "loop:      {}", on_off(self.state.looping))?;
		writeln!(f, "target:    {}", self.state.target_context.as_deref().unwrap_or("-"))?;
		write!(f, "answers:   {}", self.answers)
	}
}
