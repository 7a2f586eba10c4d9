//! Heuristics locating the challenge label, the question and its options in an unlabelled page.
//!
//! Pure functions over [PageProvider]. A miss is never an error, it comes back as emptiness.

use crate::{
	NodeId, Observation, OptionCandidate,
	page::PageProvider,
	policy::{FALLBACK_OPTION_COUNT, MIN_GROUP_SIZE, PhraseMatcher, Policy, QUESTION_GAP_PX},
	text::{clean, contains, normalize},
};

/// Current challenge label: first visible match of the title selectors, tried in order
pub fn context_label<P: PageProvider + ?Sized>(page: &P, policy: &Policy) -> String {
	policy
		.selectors
		.context_title
		.iter()
		.flat_map(|selector| page.query_all(selector))
		.filter(|&node| page.is_visible(node))
		.map(|node| clean(&page.get_text(node)))
		.find(|text| !text.is_empty())
		.unwrap_or_default()
}

/// Whether the page currently shows a challenge (as opposed to an overview)
pub fn in_context<P: PageProvider + ?Sized>(page: &P, policy: &Policy) -> bool {
	!page.query_all(&policy.selectors.in_context).is_empty()
}

/// Answer options: rendered, non-empty, not navigation, clustered under one container
pub fn find_options<P: PageProvider + ?Sized>(page: &P, policy: &Policy) -> Vec<OptionCandidate> {
	let candidates: Vec<(Option<NodeId>, OptionCandidate)> = page
		.list_interactive_elements(&policy.selectors)
		.into_iter()
		.filter(|&node| page.is_visible(node))
		.filter_map(|node| {
			let text = clean(&page.get_text(node));
			let normalized = text.to_lowercase();
			if normalized.is_empty() || policy.option_denylist.is_match(&normalized) {
				return None;
			}
			Some((page.parent(node), OptionCandidate::new(node, text)))
		})
		.collect();

	// groups in order of first appearance, so ties go to the earliest container
	let mut groups: Vec<(NodeId, Vec<&OptionCandidate>)> = Vec::new();
	for (parent, candidate) in &candidates {
		let Some(parent) = parent else { continue };
		match groups.iter_mut().find(|(p, _)| p == parent) {
			Some((_, members)) => members.push(candidate),
			None => groups.push((*parent, vec![candidate])),
		}
	}

	let best = groups
		.iter()
		.filter(|(_, members)| members.len() >= MIN_GROUP_SIZE)
		.min_by_key(|(_, members)| members.len().abs_diff(policy.expected_option_count));
	match best {
		Some((parent, members)) => {
			tracing::debug!("Option group under {parent}: {} member(s)", members.len());
			members.iter().map(|&c| c.clone()).collect()
		}
		None => candidates.iter().take(FALLBACK_OPTION_COUNT).map(|(_, c)| c.clone()).collect(),
	}
}

/// Question text: the designated container if it holds enough text, else the last text block sitting above the options
pub fn find_question<P: PageProvider + ?Sized>(page: &P, policy: &Policy, options: &[OptionCandidate]) -> String {
	let long_enough = |text: &String| text.chars().count() > policy.min_question_len;

	let designated = page
		.query_all(&policy.selectors.question_container)
		.into_iter()
		.filter(|&node| page.is_visible(node))
		.map(|node| clean(&page.get_text(node)))
		.find(long_enough);
	if let Some(text) = designated {
		return text;
	}

	let Some(top) = options
		.iter()
		.filter_map(|o| page.get_bounding_box(o.node))
		.map(|b| b.top())
		.min_by(|a, b| a.total_cmp(b))
	else {
		return String::new();
	};

	page.query_all(&policy.selectors.question_blocks)
		.into_iter()
		.filter(|&node| page.get_bounding_box(node).is_some_and(|b| b.is_rendered() && b.bottom() < top - QUESTION_GAP_PX))
		.map(|node| clean(&page.get_text(node)))
		.filter(long_enough)
		.last()
		.unwrap_or_default()
}

/// One extraction pass
pub fn extract<P: PageProvider + ?Sized>(page: &P, policy: &Policy) -> Observation {
	let context = context_label(page, policy);
	let options = find_options(page, policy);
	let question = find_question(page, policy, &options);
	Observation::new(context, question, options)
}

/// First visible element under `selector` whose text matches `phrases`
pub fn find_control<P: PageProvider + ?Sized>(page: &P, selector: &str, phrases: &PhraseMatcher) -> Option<NodeId> {
	page.query_all(selector)
		.into_iter()
		.find(|&node| page.is_visible(node) && phrases.is_match(&normalize(&page.get_text(node))))
}

/// Element to click to reopen the challenge labelled `target` from an overview.
///
/// Among visible cards mentioning the label, the one with the least text is the most specific; its first actionable descendant is preferred over the card itself.
pub fn find_card<P: PageProvider + ?Sized>(page: &P, policy: &Policy, target: &str) -> Option<NodeId> {
	let card = page
		.query_all(&policy.selectors.cards)
		.into_iter()
		.filter(|&node| page.is_visible(node))
		.map(|node| (node, page.get_text(node)))
		.filter(|(_, text)| contains(text, target))
		.min_by_key(|(_, text)| normalize(text).len())
		.map(|(node, _)| node)?;
	Some(page.actionable_descendant(card).unwrap_or(card))
}

/// Visible "back" control, if the page has one
pub fn find_back_control<P: PageProvider + ?Sized>(page: &P, policy: &Policy) -> Option<NodeId> {
	page.query_all(&policy.selectors.back_controls).into_iter().find(|&node| page.is_visible(node))
}
