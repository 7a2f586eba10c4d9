//! Text canonicalization and fuzzy matching of option text against stored answers.

use std::collections::HashSet;

use crate::policy::Thresholds;

/// Collapse whitespace (nbsp included) and straighten curly quotes, keeping case
pub fn clean(s: &str) -> String {
	let straightened: String = s
		.chars()
		.map(|c| match c {
			'\u{00A0}' => ' ',
			'“' | '”' | '«' | '»' => '"',
			'‘' | '’' => '\'',
			c => c,
		})
		.collect();
	straightened.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical comparison form: [clean] + lowercase. Idempotent.
pub fn normalize(s: &str) -> String {
	clean(s).to_lowercase()
}

/// Unique word tokens of an already normalized string
fn tokens(normalized: &str) -> HashSet<&str> {
	normalized.split(|c: char| !(c.is_alphanumeric() || c == '_')).filter(|t| !t.is_empty()).collect()
}

/// Token-overlap similarity in `[0, 1]`.
///
/// Fraction of the smaller token set that also appears in the larger one, so a short phrase fully contained in a long one scores 1.
pub fn similarity(candidate: &str, target: &str) -> f64 {
	let a = normalize(candidate);
	let b = normalize(target);
	if a.is_empty() || b.is_empty() {
		return 0.0;
	}
	if a == b {
		return 1.0;
	}
	let ta = tokens(&a);
	let tb = tokens(&b);
	let shared = ta.intersection(&tb).count();
	shared as f64 / ta.len().min(tb.len()).max(1) as f64
}

/// Whether `target`'s normalized text appears inside `candidate`'s.
///
/// An empty target is never contained: it would otherwise match every option.
pub fn contains(candidate: &str, target: &str) -> bool {
	let needle = normalize(target);
	!needle.is_empty() && normalize(candidate).contains(&needle)
}

/// Score used for option selection: token similarity, lifted to the containment score on substring hits
pub fn effective_score(candidate: &str, target: &str, thresholds: &Thresholds) -> f64 {
	let sim = similarity(candidate, target);
	if contains(candidate, target) { sim.max(thresholds.containment_score) } else { sim }
}

/// Pick the candidate best matching `target`.
///
/// Highest effective score wins (first on ties) if it clears the acceptance threshold; otherwise the first strict substring match, if any.
pub fn best_match<'a, I>(candidates: I, target: &str, thresholds: &Thresholds) -> Option<usize>
where
	I: IntoIterator<Item = &'a str>,
	I::IntoIter: Clone, {
	let candidates = candidates.into_iter();

	let mut best: Option<(usize, f64)> = None;
	for (i, candidate) in candidates.clone().enumerate() {
		let score = effective_score(candidate, target, thresholds);
		tracing::debug!(candidate, target, score, "option score");
		if score > best.map(|(_, s)| s).unwrap_or(0.0) {
			best = Some((i, score));
		}
	}
	if let Some((i, score)) = best
		&& score >= thresholds.accept
	{
		return Some(i);
	}

	candidates.enumerate().find(|(_, candidate)| contains(candidate, target)).map(|(i, _)| i)
}
