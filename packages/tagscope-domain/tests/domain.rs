use ahash::AHashSet;

use tagscope_domain::{
	NodeRef, StoreRef, TagChanges, TagDetails,
	delta::{self, PendingTagUpdates},
	tag_details::{self, apply_tag_changes, read_tag_details, tag_details_to_string},
};

fn changes(entries: &[(&str, i64)]) -> TagChanges {
	entries.iter().map(|(tag, delta)| (tag.to_string(), *delta)).collect()
}

#[test]
fn serialized_cache_round_trips_in_order() {
	let tags = vec![
		TagDetails::new("zulu", 7),
		TagDetails::new("alpha", 3),
		TagDetails::new("with space", 1),
		TagDetails::new("ünïcödé", 1),
	];
	let raw = tag_details_to_string(&tags);

	assert_eq!(raw, "zulu|7\nalpha|3\nwith space|1\nünïcödé|1");
	assert_eq!(read_tag_details(&raw), tags);
	assert_eq!(tag_details_to_string(&[]), "");
	assert!(read_tag_details("").is_empty());
}

#[test]
fn unreadable_cache_lines_are_dropped() {
	let raw = "alpha|2\nnocount\nbeta|x\ngamma|4|extra|fields\ndelta|\nepsilon|0";
	let tags = read_tag_details(raw);

	assert_eq!(tags, vec![TagDetails::new("alpha", 2), TagDetails::new("gamma", 4)]);
}

#[test]
fn merge_is_independent_of_order_and_batching() {
	let deltas = [changes(&[("x", 1)]), changes(&[("x", -1)]), changes(&[("y", 1)])];
	let orders: [[usize; 3]; 6] =
		[[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
	let mut outcomes = AHashSet::new();

	for order in orders {
		// One merged batch.
		let mut merged = TagChanges::new();

		for idx in order {
			delta::merge_changes(&mut merged, &deltas[idx]);
		}

		let mut batched = Vec::new();

		apply_tag_changes(&mut batched, &merged);
		outcomes.insert(tag_details_to_string(&batched));

		// One batch per record.
		let mut sequential = Vec::new();

		for idx in order {
			apply_tag_changes(&mut sequential, &deltas[idx]);
		}

		// A remove that lands before its add has nothing to decrement, so only merged batches are
		// order independent at the record level.
		let add_at = order.iter().position(|idx| *idx == 0);
		let remove_at = order.iter().position(|idx| *idx == 1);

		if add_at < remove_at {
			outcomes.insert(tag_details_to_string(&sequential));
		}
	}

	assert_eq!(outcomes.len(), 1);
	assert!(outcomes.contains("y|1"));
}

#[test]
fn decrement_to_zero_prunes_and_further_decrements_are_no_ops() {
	let mut tags = vec![TagDetails::new("alpha", 2), TagDetails::new("beta", 1)];

	apply_tag_changes(&mut tags, &changes(&[("alpha", -2)]));
	assert_eq!(tags, vec![TagDetails::new("beta", 1)]);

	apply_tag_changes(&mut tags, &changes(&[("alpha", -1), ("beta", -5)]));
	assert!(tags.is_empty());
}

#[test]
fn positive_nets_create_and_grow_entries() {
	let mut tags = vec![TagDetails::new("alpha", 1)];

	apply_tag_changes(&mut tags, &changes(&[("alpha", 2), ("beta", 4), ("gamma", 0)]));

	assert_eq!(tags, vec![TagDetails::new("beta", 4), TagDetails::new("alpha", 3)]);
}

#[test]
fn conflation_clips_to_a_single_direction() {
	let node = NodeRef::generate(&StoreRef::default());
	let sequences: [(&[bool], Option<bool>); 5] = [
		(&[true, false], None),
		(&[false, true], None),
		(&[true, true, false], None),
		(&[true, false, true], Some(true)),
		(&[false], Some(false)),
	];

	for (sequence, expected) in sequences {
		let mut pending = PendingTagUpdates::default();

		for add in sequence {
			pending.queue(&node, "alpha", *add);
		}

		let drained = pending.drain();
		let actual = drained.first().and_then(|(_, updates)| updates.get("alpha").copied());

		assert_eq!(actual, expected, "Unexpected net intent for {sequence:?}.");
	}
}

#[test]
fn tag_scope_view_exposes_top_tags() {
	let scope = tagscope_domain::TagScope::new(
		NodeRef::generate(&StoreRef::default()),
		vec![TagDetails::new("alpha", 3), TagDetails::new("beta", 1)],
	);

	assert_eq!(scope.top_tags(1), &[TagDetails::new("alpha", 3)]);
	assert_eq!(scope.top_tags(10).len(), 2);
	assert!(scope.is_tag_in_scope("beta"));
	assert_eq!(scope.tag("gamma"), None);
	assert_eq!(tag_details::compare_tag_names("Beta", "alpha"), std::cmp::Ordering::Greater);
}
