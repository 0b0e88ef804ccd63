use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{
	NodeRef,
	delta::TagChanges,
	tag::{NEXT_TAG_DELIMITER, TAG_DETAILS_DELIMITER},
};

/// One `(tag, count)` entry of a tag scope cache. Counts are always positive once stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDetails {
	pub name: String,
	pub count: u64,
}
impl TagDetails {
	pub fn new(name: impl Into<String>, count: u64) -> Self {
		Self { name: name.into(), count }
	}
}

/// Read-side view of a tag scope and its cached counts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagScope {
	pub node_ref: NodeRef,
	pub tags: Vec<TagDetails>,
}
impl TagScope {
	pub fn new(node_ref: NodeRef, tags: Vec<TagDetails>) -> Self {
		Self { node_ref, tags }
	}

	pub fn tag(&self, name: &str) -> Option<&TagDetails> {
		self.tags.iter().find(|details| details.name == name)
	}

	pub fn is_tag_in_scope(&self, name: &str) -> bool {
		self.tag(name).is_some()
	}

	/// The `top_n` most used tags.
	pub fn top_tags(&self, top_n: usize) -> &[TagDetails] {
		&self.tags[..top_n.min(self.tags.len())]
	}
}

/// Parses the serialized cache. Unreadable lines are dropped rather than failing the whole read.
pub fn read_tag_details(raw: &str) -> Vec<TagDetails> {
	let mut result = Vec::new();

	for line in raw.split(NEXT_TAG_DELIMITER) {
		if line.is_empty() {
			continue;
		}

		let mut values = line.split(TAG_DETAILS_DELIMITER);
		let name = values.next().unwrap_or_default();
		let Some(count) = values.next() else {
			tracing::debug!(tag = name, "No count for tag.");

			continue;
		};
		let Ok(count) = count.trim().parse::<u64>() else {
			tracing::debug!(tag = name, count, "Invalid tag count.");

			continue;
		};

		if count == 0 {
			tracing::debug!(tag = name, "Dropping zero count for tag.");

			continue;
		}

		if values.next().is_some() {
			tracing::debug!(tag = name, "Ignoring extra fields for tag.");
		}

		result.push(TagDetails::new(name, count));
	}

	result
}

pub fn tag_details_to_string(tags: &[TagDetails]) -> String {
	let mut out = String::with_capacity(tags.len() * 16);

	for (idx, details) in tags.iter().enumerate() {
		if idx > 0 {
			out.push(NEXT_TAG_DELIMITER);
		}

		out.push_str(&details.name);
		out.push(TAG_DETAILS_DELIMITER);
		out.push_str(&details.count.to_string());
	}

	out
}

/// Most used first; ties fall back to a case-insensitive name order.
pub fn compare_tag_details(a: &TagDetails, b: &TagDetails) -> Ordering {
	b.count
		.cmp(&a.count)
		.then_with(|| compare_tag_names(&a.name, &b.name))
}

pub fn compare_tag_names(a: &str, b: &str) -> Ordering {
	a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

pub fn sort_tag_details(tags: &mut [TagDetails]) {
	tags.sort_by(compare_tag_details);
}

/// Applies a merged net-change map and re-sorts. Entries that reach zero are pruned.
pub fn apply_tag_changes(tags: &mut Vec<TagDetails>, changes: &TagChanges) {
	for (name, net) in changes.iter() {
		if *net == 0 {
			continue;
		}

		let position = tags.iter().position(|details| &details.name == name);

		if *net > 0 {
			match position {
				Some(idx) => tags[idx].count = tags[idx].count.saturating_add(net.unsigned_abs()),
				None => tags.push(TagDetails::new(name.clone(), net.unsigned_abs())),
			}
		} else if let Some(idx) = position {
			let remaining = tags[idx].count.saturating_sub(net.unsigned_abs());

			if remaining == 0 {
				tags.remove(idx);
			} else {
				tags[idx].count = remaining;
			}
		}
	}

	sort_tag_details(tags);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sort_prefers_count_then_name() {
		let mut tags = vec![
			TagDetails::new("beta", 2),
			TagDetails::new("Alpha", 2),
			TagDetails::new("gamma", 5),
			TagDetails::new("delta", 1),
		];

		sort_tag_details(&mut tags);

		let names: Vec<&str> = tags.iter().map(|details| details.name.as_str()).collect();

		assert_eq!(names, vec!["gamma", "Alpha", "beta", "delta"]);
	}
}
