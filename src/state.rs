//! Process-wide run flags, persisted so they survive reloads and restarts.

use color_eyre::Result;

use crate::{store::StateStore, text::clean};

pub const RUN_KEY: &str = "beeware-run";
pub const LEARN_KEY: &str = "beeware-learn";
pub const LOOP_KEY: &str = "beeware-loop";
pub const TARGET_KEY: &str = "beeware-target";

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunState {
	/// Polling loop active
	pub running: bool,
	/// Capture the operator's next choice for unseen questions
	pub learning: bool,
	/// Reopen the target context after a sequence completes
	pub looping: bool,
	/// Last captured context label
	pub target_context: Option<String>,
}

fn read_flag(storage: &impl StateStore, key: &str) -> bool {
	match storage.get(key).as_deref() {
		None | Some("false") => false,
		Some("true") => true,
		Some(other) => {
			tracing::warn!("Ignoring unreadable value {other:?} for {key}");
			false
		}
	}
}

impl RunState {
	/// Restore from persisted values; anything missing or unreadable takes its default
	pub fn init(storage: &impl StateStore) -> Self {
		Self {
			running: read_flag(storage, RUN_KEY),
			learning: read_flag(storage, LEARN_KEY),
			looping: read_flag(storage, LOOP_KEY),
			target_context: storage.get(TARGET_KEY).map(|t| clean(&t)).filter(|t| !t.is_empty()),
		}
	}

	pub fn save(&self, storage: &mut impl StateStore) -> Result<()> {
		storage.set(RUN_KEY, &self.running.to_string())?;
		storage.set(LEARN_KEY, &self.learning.to_string())?;
		storage.set(LOOP_KEY, &self.looping.to_string())?;
		storage.set(TARGET_KEY, self.target_context.as_deref().unwrap_or(""))?;
		Ok(())
	}

	/// Start polling, taking `context` as the loop target when there is one
	pub fn start(self, context: &str) -> Self {
		Self { running: true, ..self }.capture(context)
	}

	pub fn stop(self) -> Self {
		Self { running: false, ..self }
	}

	pub fn toggle_learning(self) -> Self {
		Self { learning: !self.learning, ..self }
	}

	/// Flip loop mode; switching it on captures `context` as the target
	pub fn toggle_looping(self, context: &str) -> Self {
		let looping = !self.looping;
		let next = Self { looping, ..self };
		if looping { next.capture(context) } else { next }
	}

	/// Remember `context` as the loop target. Empty labels keep the previous target.
	pub fn capture(self, context: &str) -> Self {
		let context = clean(context);
		if context.is_empty() {
			return self;
		}
		tracing::info!("Loop target: {context}");
		Self {
			target_context: Some(context),
			..self
		}
	}
}
