//! Tunable heuristics: match thresholds, selector lists and control phrase lists.
//!
//! Everything here is policy rather than structure. Defaults target the host page's Spanish UI with English synonyms;
//! a JSON policy file can replace any part of it (see [Policy::load_overrides]).

use std::path::Path;

use color_eyre::{Result, eyre::eyre};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Minimum effective score for an automated selection
pub const ACCEPT_THRESHOLD: f64 = 0.55;
/// Effective score granted to an option that contains the stored answer
pub const CONTAINMENT_SCORE: f64 = 0.95;
/// Option groups are ranked by how close their size is to this
pub const EXPECTED_OPTION_COUNT: usize = 4;
/// Smallest sibling group accepted as the option set
pub const MIN_GROUP_SIZE: usize = 2;
/// How many loose candidates to take when no group qualifies
pub const FALLBACK_OPTION_COUNT: usize = 4;
/// Question text must be strictly longer than this (filters labels and icons)
pub const MIN_QUESTION_LEN: usize = 6;
/// A question block must end at least this many pixels above the topmost option
pub const QUESTION_GAP_PX: f64 = 6.0;

pub const DEFAULT_OPTION_DENYLIST: &[&str] = &["siguiente", "comprobar", "enviar", "continuar", "next", "check", "submit", "continue", "start"];
pub const DEFAULT_ADVANCE_PHRASES: &[&str] = &["siguiente", "comprobar", "enviar", "check", "submit", "continuar", "next", "continue"];
pub const DEFAULT_RESTART_PHRASES: &[&str] = &["reintentar", "intentar", "comenzar", "empezar", "retry", "try again", "restart"];
pub const DEFAULT_ENTER_PHRASES: &[&str] = &["ir a las preguntas", "ver preguntas", "responder preguntas", "go to questions", "start quiz"];

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Thresholds {
	pub accept: f64,
	pub containment_score: f64,
}

impl Default for Thresholds {
	fn default() -> Self {
		Self {
			accept: ACCEPT_THRESHOLD,
			containment_score: CONTAINMENT_SCORE,
		}
	}
}

/// CSS selectors the heuristics query. Each is answered in document order.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Selectors {
	/// Tried in order; the first visible match names the current challenge
	pub context_title: Vec<String>,
	/// Present only while inside a challenge
	pub in_context: String,
	/// Interactive-looking elements that may be answer options
	pub options: String,
	/// Designated element holding the full question, when the page has one
	pub question_container: String,
	/// Text-bearing blocks searched above the options for the question
	pub question_blocks: String,
	/// Controls that may advance to the next question
	pub advance_controls: String,
	/// Controls that may restart a finished sequence
	pub restart_controls: String,
	/// Controls leading from a challenge's intro into its questions
	pub enter_controls: String,
	/// Cards or links on the overview listing challenges
	pub cards: String,
	/// First match inside a card is what gets clicked
	pub card_actionable: String,
	pub back_controls: String,
}

impl Default for Selectors {
	fn default() -> Self {
		Self {
			context_title: vec![r#"[data-cy="mainContainer-title"]"#.into(), ".challenge-title".into(), "h1".into(), "h2".into()],
			in_context: r#"[data-cy="mainContainer-title"], .challenge-title"#.into(),
			options: r#"button,[role="button"],.v-btn,.q-btn,.v-list-item,.option,.answer,.choice,.selectable"#.into(),
			question_container: r#"[data-cy="question-text"], .question-text"#.into(),
			question_blocks: "h1,h2,h3,h4,.text-h1,.text-h2,.text-h3,.text-h4,.question,.v-card__text,p,div".into(),
			advance_controls: r#"button,[role="button"],.v-btn,.q-btn"#.into(),
			restart_controls: r#"button,[role="button"],.v-btn,.q-btn,a"#.into(),
			enter_controls: r#"button,[role="button"],.v-btn,.q-btn,a"#.into(),
			cards: r#"[data-cy="challenge-card"],.challenge-card,.v-card,article,a,div"#.into(),
			card_actionable: r#"a,button,[role="button"]"#.into(),
			back_controls: r#"[data-cy="challenge-back"],.mdi-arrow-left,button[aria-label*="atrás" i],button[aria-label*="volver" i]"#.into(),
		}
	}
}

impl Selectors {
	/// Every selector a page read must answer
	pub fn all(&self) -> Vec<String> {
		let mut all = self.context_title.clone();
		all.extend(
			[
				&self.in_context,
				&self.options,
				&self.question_container,
				&self.question_blocks,
				&self.advance_controls,
				&self.restart_controls,
				&self.enter_controls,
				&self.cards,
				&self.back_controls,
			]
			.into_iter()
			.cloned(),
		);
		// identical selectors are read once
		all.sort();
		all.dedup();
		all
	}
}

/// Phrase lists, matched case-insensitively as substrings of normalized text
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Phrases {
	/// Candidates containing any of these are navigation, not options
	pub option_denylist: Vec<String>,
	pub advance: Vec<String>,
	pub restart: Vec<String>,
	/// Transition from a challenge's intro into its questions
	pub enter: Vec<String>,
}

impl Default for Phrases {
	fn default() -> Self {
		let owned = |list: &[&str]| -> Vec<String> { list.iter().map(|s| s.to_string()).collect() };
		Self {
			option_denylist: owned(DEFAULT_OPTION_DENYLIST),
			advance: owned(DEFAULT_ADVANCE_PHRASES),
			restart: owned(DEFAULT_RESTART_PHRASES),
			enter: owned(DEFAULT_ENTER_PHRASES),
		}
	}
}

/// Case-insensitive alternation over a phrase list
#[derive(Clone, Debug)]
pub struct PhraseMatcher(Option<Regex>);

impl PhraseMatcher {
	pub fn new<S: AsRef<str>>(phrases: &[S]) -> Result<Self> {
		let alternatives: Vec<String> = phrases.iter().map(|p| p.as_ref().trim()).filter(|p| !p.is_empty()).map(regex::escape).collect();
		if alternatives.is_empty() {
			return Ok(Self(None));
		}
		let re = RegexBuilder::new(&alternatives.join("|"))
			.case_insensitive(true)
			.build()
			.map_err(|e| eyre!("Failed to compile phrase list: {e}"))?;
		Ok(Self(Some(re)))
	}

	pub fn is_match(&self, text: &str) -> bool {
		self.0.as_ref().is_some_and(|re| re.is_match(text))
	}
}

/// On-disk shape of a policy file; every part is optional
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyFile {
	pub thresholds: Option<Thresholds>,
	pub selectors: Option<Selectors>,
	pub phrases: Option<Phrases>,
	pub expected_option_count: Option<usize>,
	pub min_question_len: Option<usize>,
}

/// Compiled heuristics shared by the extractor, resolver and controller
#[derive(Clone, Debug)]
pub struct Policy {
	pub thresholds: Thresholds,
	pub selectors: Selectors,
	pub phrases: Phrases,
	pub expected_option_count: usize,
	pub min_question_len: usize,
	pub option_denylist: PhraseMatcher,
	pub advance: PhraseMatcher,
	pub restart: PhraseMatcher,
	pub enter: PhraseMatcher,
}

impl Policy {
	pub fn new(thresholds: Thresholds, selectors: Selectors, phrases: Phrases) -> Result<Self> {
		Ok(Self {
			option_denylist: PhraseMatcher::new(&phrases.option_denylist)?,
			advance: PhraseMatcher::new(&phrases.advance)?,
			restart: PhraseMatcher::new(&phrases.restart)?,
			enter: PhraseMatcher::new(&phrases.enter)?,
			thresholds,
			selectors,
			phrases,
			expected_option_count: EXPECTED_OPTION_COUNT,
			min_question_len: MIN_QUESTION_LEN,
		})
	}

	/// Defaults with whatever the policy file overrides
	pub fn from_file(file: PolicyFile) -> Result<Self> {
		let mut policy = Self::new(
			file.thresholds.unwrap_or_default(),
			file.selectors.unwrap_or_default(),
			file.phrases.unwrap_or_default(),
		)?;
		if let Some(n) = file.expected_option_count {
			policy.expected_option_count = n;
		}
		if let Some(n) = file.min_question_len {
			policy.min_question_len = n;
		}
		Ok(policy)
	}

	/// Read a JSON policy file from disk
	pub fn load_overrides(path: &Path) -> Result<Self> {
		let raw = std::fs::read_to_string(path).map_err(|e| eyre!("Failed to read policy file {}: {e}", path.display()))?;
		let file: PolicyFile = serde_json::from_str(&raw).map_err(|e| eyre!("Failed to parse policy file {}: {e}", path.display()))?;
		Self::from_file(file)
	}
}

impl Default for Policy {
	fn default() -> Self {
		let phrases = Phrases::default();
		// default phrases are plain words, escaping makes them valid patterns
		let compile = |list: &[String]| PhraseMatcher::new(list).unwrap_or(PhraseMatcher(None));
		Self {
			option_denylist: compile(&phrases.option_denylist),
			advance: compile(&phrases.advance),
			restart: compile(&phrases.restart),
			enter: compile(&phrases.enter),
			thresholds: Thresholds::default(),
			selectors: Selectors::default(),
			phrases,
			expected_option_count: EXPECTED_OPTION_COUNT,
			min_question_len: MIN_QUESTION_LEN,
		}
	}
}
