//! Persistence boundary and the answer table kept behind it.

use std::{
	collections::BTreeMap,
	path::{Path, PathBuf},
};

use color_eyre::{Result, eyre::eyre};
use serde::{Deserialize, Serialize};

use crate::text::normalize;

/// Key holding the JSON-encoded answer table
pub const ANSWERS_KEY: &str = "beeware-db";

/// Synchronous string key-value storage scoped to one origin.
///
/// Every `set` must be durable when it returns: a page navigation right after must not lose it.
pub trait StateStore {
	fn get(&self, key: &str) -> Option<String>;
	fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Volatile storage, for tests and throwaway runs
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryStore {
	entries: BTreeMap<String, String>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StateStore for MemoryStore {
	fn get(&self, key: &str) -> Option<String> {
		self.entries.get(key).cloned()
	}

	fn set(&mut self, key: &str, value: &str) -> Result<()> {
		self.entries.insert(key.to_owned(), value.to_owned());
		Ok(())
	}
}

/// One JSON object file per origin, rewritten in full on every `set`
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	entries: BTreeMap<String, String>,
}

impl FileStore {
	/// Open (or lazily create) the store at `path`. An unreadable file starts empty.
	pub fn open(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let entries = match std::fs::read_to_string(&path) {
			Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
				tracing::warn!("Storage file {} is corrupted, starting empty: {e}", path.display());
				BTreeMap::new()
			}),
			Err(_) => BTreeMap::new(),
		};
		Self { path, entries }
	}

	/// Store file for the origin of `url` inside `dir`
	pub fn for_origin(dir: &Path, url: &str) -> Self {
		Self::open(dir.join(format!("{}.json", origin_label(url))))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl StateStore for FileStore {
	fn get(&self, key: &str) -> Option<String> {
		self.entries.get(key).cloned()
	}

	fn set(&mut self, key: &str, value: &str) -> Result<()> {
		self.entries.insert(key.to_owned(), value.to_owned());
		if let Some(dir) = self.path.parent() {
			std::fs::create_dir_all(dir).map_err(|e| eyre!("Failed to create storage dir {}: {e}", dir.display()))?;
		}
		let json = serde_json::to_string_pretty(&self.entries).map_err(|e| eyre!("Failed to encode storage: {e}"))?;
		std::fs::write(&self.path, json).map_err(|e| eyre!("Failed to write storage file {}: {e}", self.path.display()))?;
		Ok(())
	}
}

/// Filesystem-safe label for the origin (scheme + host + port) of a URL
pub fn origin_label(url: &str) -> String {
	let (scheme, rest) = url.split_once("://").unwrap_or(("", url));
	let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
	let host = host.rsplit('@').next().unwrap_or(host);
	let label = if scheme.is_empty() { host.to_string() } else { format!("{scheme}_{host}") };
	let safe: String = label.chars().map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' }).collect();
	if safe.is_empty() { "local".to_string() } else { safe }
}

/// Two-level answer table: context key -> question key -> answer text.
///
/// Keys are normalized; answers are kept verbatim for display and fuzzy re-matching.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnswerStore {
	contexts: BTreeMap<String, BTreeMap<String, String>>,
}

/// Accepted import shapes
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportPayload {
	Nested(BTreeMap<String, BTreeMap<String, String>>),
	/// Older exports had no context level
	Flat(BTreeMap<String, String>),
}

impl AnswerStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Exact lookup by already normalized keys
	pub fn get(&self, context_key: &str, question_key: &str) -> Option<&str> {
		self.contexts.get(context_key)?.get(question_key).map(String::as_str)
	}

	/// Exact lookup, falling back to the context-free bucket when a context was given
	pub fn lookup(&self, context_key: &str, question_key: &str) -> Option<&str> {
		self.get(context_key, question_key).or_else(|| if context_key.is_empty() { None } else { self.get("", question_key) })
	}

	/// Record an answer; last write wins
	pub fn learn(&mut self, context: &str, question: &str, answer: &str) {
		self.contexts.entry(normalize(context)).or_default().insert(normalize(question), answer.to_owned());
	}

	/// Merge `other` in: new questions are added, existing ones overwritten. Returns how many entries were written.
	pub fn merge(&mut self, other: AnswerStore) -> usize {
		let mut written = 0;
		for (context, questions) in other.contexts {
			let target = self.contexts.entry(context).or_default();
			for (question, answer) in questions {
				target.insert(question, answer);
				written += 1;
			}
		}
		written
	}

	pub fn clear(&mut self) {
		self.contexts.clear();
	}

	/// Total number of stored answers
	pub fn len(&self) -> usize {
		self.contexts.values().map(BTreeMap::len).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Parse an operator-supplied payload, normalizing its keys
	pub fn parse_import(payload: &str) -> Result<Self> {
		let parsed: ImportPayload = serde_json::from_str(payload).map_err(|e| eyre!("Invalid JSON: {e}"))?;
		let mut store = Self::new();
		match parsed {
			ImportPayload::Nested(contexts) =>
				for (context, questions) in contexts {
					for (question, answer) in questions {
						store.learn(&context, &question, &answer);
					}
				},
			ImportPayload::Flat(questions) =>
				for (question, answer) in questions {
					store.learn("", &question, &answer);
				},
		}
		Ok(store)
	}

	/// Merge an import payload. A payload that fails to parse leaves `self` untouched.
	pub fn import(&mut self, payload: &str) -> Result<usize> {
		let incoming = Self::parse_import(payload)?;
		Ok(self.merge(incoming))
	}

	/// Pretty-printed two-level JSON, the export format
	pub fn to_json_pretty(&self) -> Result<String> {
		serde_json::to_string_pretty(self).map_err(|e| eyre!("Failed to encode answers: {e}"))
	}

	/// Read the table from storage. A corrupted value resets to empty rather than failing.
	pub fn load(storage: &impl StateStore) -> Self {
		let Some(raw) = storage.get(ANSWERS_KEY) else {
			return Self::new();
		};
		serde_json::from_str(&raw).unwrap_or_else(|e| {
			tracing::warn!("Stored answers are corrupted, starting with an empty table: {e}");
			Self::new()
		})
	}

	pub fn save(&self, storage: &mut impl StateStore) -> Result<()> {
		let json = serde_json::to_string(self).map_err(|e| eyre!("Failed to encode answers: {e}"))?;
		storage.set(ANSWERS_KEY, &json)
	}
}
