use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::NodeRef;

/// Per-node tag intents: `true` for added, `false` for removed.
pub type TagUpdates = BTreeMap<String, bool>;

/// Net signed change per tag name.
pub type TagChanges = BTreeMap<String, i64>;

/// In-transaction tag intents keyed by node.
///
/// An add followed by a remove of the same tag on the same node (or the reverse) cancels out, so
/// at most one intent per `(node, tag)` survives to commit.
#[derive(Debug, Default, Clone)]
pub struct PendingTagUpdates {
	nodes: HashMap<NodeRef, TagUpdates>,
	order: Vec<NodeRef>,
}
impl PendingTagUpdates {
	pub fn queue(&mut self, node: &NodeRef, tag: &str, add: bool) {
		if !self.nodes.contains_key(node) {
			self.order.push(node.clone());
		}

		let updates = self.nodes.entry(node.clone()).or_default();

		match updates.get(tag) {
			None => {
				updates.insert(tag.to_string(), add);
			},
			Some(current) if *current != add => {
				updates.remove(tag);
			},
			Some(_) => {},
		}
	}

	pub fn get(&self, node: &NodeRef) -> Option<&TagUpdates> {
		self.nodes.get(node)
	}

	/// Removes and returns the pending intent for `(node, tag)`.
	pub fn take(&mut self, node: &NodeRef, tag: &str) -> Option<bool> {
		self.nodes.get_mut(node)?.remove(tag)
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.values().all(|updates| updates.is_empty())
	}

	/// Non-empty intents in first-touched order.
	pub fn drain(&mut self) -> Vec<(NodeRef, TagUpdates)> {
		let mut nodes = std::mem::take(&mut self.nodes);

		std::mem::take(&mut self.order)
			.into_iter()
			.filter_map(|node| {
				let updates = nodes.remove(&node)?;

				(!updates.is_empty()).then_some((node, updates))
			})
			.collect()
	}
}

/// Turns intents into unit deltas.
pub fn to_changes(updates: &TagUpdates) -> TagChanges {
	updates.iter().map(|(tag, add)| (tag.clone(), if *add { 1 } else { -1 })).collect()
}

/// Sums `other` into `into`.
pub fn merge_changes(into: &mut TagChanges, other: &TagChanges) {
	for (tag, delta) in other {
		*into.entry(tag.clone()).or_insert(0) += delta;
	}
}

pub fn changes_to_json(changes: &TagChanges) -> Value {
	Value::Object(changes.iter().map(|(tag, delta)| (tag.clone(), Value::from(*delta))).collect())
}

/// Decodes the `tags` payload of a change record.
pub fn changes_from_json(value: &Value) -> Result<TagChanges, String> {
	let Some(object) = value.as_object() else {
		return Err(format!("Expected an object of tag deltas, found {value}."));
	};
	let mut changes = TagChanges::new();

	for (tag, delta) in object {
		let Some(delta) = delta.as_i64() else {
			return Err(format!("Tag {tag:?} has a non-integer delta {delta}."));
		};

		changes.insert(tag.clone(), delta);
	}

	Ok(changes)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::StoreRef;

	#[test]
	fn opposite_intents_cancel() {
		let node = NodeRef::generate(&StoreRef::default());
		let mut pending = PendingTagUpdates::default();

		pending.queue(&node, "alpha", true);
		pending.queue(&node, "alpha", false);

		assert!(pending.is_empty());
		assert!(pending.drain().is_empty());
	}

	#[test]
	fn repeated_intents_are_recorded_once() {
		let node = NodeRef::generate(&StoreRef::default());
		let mut pending = PendingTagUpdates::default();

		pending.queue(&node, "alpha", true);
		pending.queue(&node, "alpha", true);

		let drained = pending.drain();

		assert_eq!(drained.len(), 1);
		assert_eq!(to_changes(&drained[0].1), TagChanges::from([("alpha".to_string(), 1)]));
	}

	#[test]
	fn take_removes_only_the_named_intent() {
		let node = NodeRef::generate(&StoreRef::default());
		let mut pending = PendingTagUpdates::default();

		pending.queue(&node, "alpha", true);
		pending.queue(&node, "beta", false);

		assert_eq!(pending.take(&node, "alpha"), Some(true));
		assert_eq!(pending.take(&node, "alpha"), None);
		assert_eq!(pending.get(&node), Some(&TagUpdates::from([("beta".to_string(), false)])));
	}

	#[test]
	fn json_payload_round_trip_rejects_non_integers() {
		let changes = TagChanges::from([("alpha".to_string(), 2), ("beta".to_string(), -1)]);
		let json = changes_to_json(&changes);

		assert_eq!(changes_from_json(&json), Ok(changes));
		assert!(changes_from_json(&serde_json::json!({ "alpha": "one" })).is_err());
		assert!(changes_from_json(&serde_json::json!(["alpha"])).is_err());
	}
}
