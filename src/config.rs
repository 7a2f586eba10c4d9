use std::time::Duration;

use v_utils::macros::{MyConfigPrimitives, Settings};

use crate::controller::Timing;

#[derive(Clone, Debug, Default, MyConfigPrimitives, Settings)]
pub struct AppConfig {
	/// Run with visible browser window (non-headless mode)
	#[serde(default)]
	pub visible: bool,
	/// Polling period of the autopilot in ms (default: 800)
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// Delay between selecting an option and looking for the advance control in ms (default: 150)
	#[serde(default = "default_advance_delay_ms")]
	pub advance_delay_ms: u64,
	/// Delay after clicking a restart control in ms (default: 500)
	#[serde(default = "default_retry_delay_ms")]
	pub retry_delay_ms: u64,
	/// Directory holding the per-origin storage files (default: XDG state dir)
	#[serde(default)]
	pub state_dir: Option<String>,
	/// JSON file overriding thresholds, selectors and phrase lists
	#[serde(default)]
	pub policy_file: Option<String>,
	/// Command to run when the autopilot stops (receives message as argument)
	#[serde(default)]
	pub stop_hook: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
	800
}

fn default_advance_delay_ms() -> u64 {
	150
}

fn default_retry_delay_ms() -> u64 {
	500
}

impl AppConfig {
	pub fn timing(&self) -> Timing {
		let ms = |v: u64, fallback: fn() -> u64| Duration::from_millis(if v == 0 { fallback() } else { v });
		Timing {
			poll_interval: ms(self.poll_interval_ms, default_poll_interval_ms),
			advance_delay: Duration::from_millis(self.advance_delay_ms),
			retry_delay: Duration::from_millis(self.retry_delay_ms),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zero_poll_interval_falls_back_to_default() {
		let config = AppConfig {
			retry_delay_ms: 250,
			..AppConfig::default()
		};
		let timing = config.timing();
		assert_eq!(timing.poll_interval, Duration::from_millis(800));
		assert_eq!(timing.advance_delay, Duration::ZERO);
		assert_eq!(timing.retry_delay, Duration::from_millis(250));
	}
}
