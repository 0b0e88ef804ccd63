use std::time::Duration;

use serde_json::json;

use tagscope_domain::{Aspect, StoreRef};
use tagscope_storage::{
	AccessContext, ChangeLog, Error, LockAttempt, LockService, NewChangeRecord, NodeStore,
	memory::{MemoryChangeLog, MemoryLockService, MemoryNodeStore},
};

fn record(node: &str, tags: serde_json::Value) -> NewChangeRecord {
	NewChangeRecord { node: node.to_string(), tags }
}

#[tokio::test]
async fn change_log_queries_by_node_in_append_order() {
	let log = MemoryChangeLog::new();
	let ids = log
		.append(&[
			record("scope-a", json!({ "alpha": 1 })),
			record("scope-b", json!({ "beta": 1 })),
			record("scope-a", json!({ "alpha": -1 })),
		])
		.await
		.expect("Failed to append records.");

	assert_eq!(ids.len(), 3);

	let batch = log.query_by_node("scope-a", 10).await.expect("Failed to query records.");

	assert_eq!(batch.len(), 2);
	assert!(batch[0].change_id < batch[1].change_id);
	assert_eq!(batch[1].tags, json!({ "alpha": -1 }));

	let capped = log.query_by_node("scope-a", 1).await.expect("Failed to query records.");

	assert_eq!(capped.len(), 1);
	assert_eq!(capped[0].change_id, batch[0].change_id);
}

#[tokio::test]
async fn change_log_lists_distinct_pending_nodes_and_clears() {
	let log = MemoryChangeLog::new();

	log.append(&[
		record("scope-a", json!({ "alpha": 1 })),
		record("scope-a", json!({ "alpha": 1 })),
		record("scope-b", json!({ "beta": 1 })),
	])
	.await
	.expect("Failed to append records.");

	let pending = log.list_pending_nodes(10).await.expect("Failed to list pending nodes.");

	assert_eq!(pending, vec!["scope-a".to_string(), "scope-b".to_string()]);

	let ids: Vec<i64> = log
		.query_by_node("scope-a", 10)
		.await
		.expect("Failed to query records.")
		.into_iter()
		.map(|record| record.change_id)
		.collect();

	assert_eq!(log.clear(&ids).await.expect("Failed to clear records."), 2);
	assert_eq!(log.clear(&ids).await.expect("Failed to clear records."), 0);
	assert_eq!(
		log.list_pending_nodes(10).await.expect("Failed to list pending nodes."),
		vec!["scope-b".to_string()]
	);
}

#[tokio::test]
async fn lease_is_exclusive_until_released_or_expired() {
	let locks = MemoryLockService::new();
	let lease = Duration::from_millis(50);
	let LockAttempt::Acquired(first) =
		locks.try_acquire("TagScope_a", lease).await.expect("Failed to try lock.")
	else {
		panic!("Expected the first attempt to acquire the lease.");
	};

	assert_eq!(
		locks.try_acquire("TagScope_a", lease).await.expect("Failed to try lock."),
		LockAttempt::Denied
	);
	assert!(locks.try_acquire("TagScope_b", lease).await.expect("Failed to try lock.").is_acquired());
	assert!(locks.release(&first).await.expect("Failed to release lock."));
	assert!(!locks.release(&first).await.expect("Failed to release lock."));

	let LockAttempt::Acquired(second) =
		locks.try_acquire("TagScope_a", lease).await.expect("Failed to try lock.")
	else {
		panic!("Expected the lease to be free after release.");
	};

	tokio::time::sleep(Duration::from_millis(80)).await;

	assert!(locks.try_acquire("TagScope_a", lease).await.expect("Failed to try lock.").is_acquired());
	// The expired holder must not release the new lease.
	assert!(!locks.release(&second).await.expect("Failed to release lock."));
}

#[tokio::test]
async fn restricted_nodes_are_only_readable_by_system_and_listed_users() {
	let store = MemoryNodeStore::new();
	let spaces = StoreRef::default();
	let root = store.create_node(&spaces, None, &[Aspect::TagScope]).await.expect("Failed to create root.");
	let folder = store.create_node(&spaces, Some(&root), &[]).await.expect("Failed to create folder.");

	store.restrict(&root, &["admin"]).await.expect("Failed to restrict root.");

	let system = AccessContext::system();
	let guest = AccessContext::user("guest");
	let admin = AccessContext::user("admin");

	assert_eq!(store.primary_parent(&guest, &folder).await.expect("Failed to read parent."), Some(root.clone()));
	assert!(store.exists(&system, &root).await.expect("Failed to check node."));
	assert!(!store.exists(&guest, &root).await.expect("Failed to check node."));
	assert!(matches!(
		store.has_aspect(&guest, &root, Aspect::TagScope).await,
		Err(Error::AccessDenied(_))
	));
	assert!(store.has_aspect(&admin, &root, Aspect::TagScope).await.expect("Failed to read aspect."));
	assert!(store.has_aspect(&system, &root, Aspect::TagScope).await.expect("Failed to read aspect."));
}

#[tokio::test]
async fn tag_nodes_are_unique_per_store_and_renamed_in_place() {
	let store = MemoryNodeStore::new();
	let spaces = StoreRef::default();
	let alpha = store.create_tag(&spaces, "alpha").await.expect("Failed to create tag.");
	let again = store.create_tag(&spaces, "alpha").await.expect("Failed to create tag.");
	let beta = store.create_tag(&spaces, "beta").await.expect("Failed to create tag.");

	assert_eq!(alpha, again);
	assert!(matches!(store.rename_tag(&alpha.node_ref, "beta").await, Err(Error::Conflict(_))));

	store.rename_tag(&alpha.node_ref, "gamma").await.expect("Failed to rename tag.");

	let renamed = store.get_tag(&alpha.node_ref).await.expect("Failed to read tag.").expect("Tag must exist.");

	assert_eq!(renamed.name, "gamma");
	assert_eq!(
		store
			.list_tags(&spaces)
			.await
			.expect("Failed to list tags.")
			.into_iter()
			.map(|tag| tag.name)
			.collect::<Vec<_>>(),
		vec!["beta".to_string(), "gamma".to_string()]
	);

	store.delete_tag(&beta.node_ref).await.expect("Failed to delete tag.");

	assert!(store.find_tag(&spaces, "beta").await.expect("Failed to find tag.").is_none());
	assert!(matches!(store.delete_tag(&beta.node_ref).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn tagged_node_search_respects_subtree_and_marker() {
	let store = MemoryNodeStore::new();
	let spaces = StoreRef::default();
	let root = store.create_node(&spaces, None, &[]).await.expect("Failed to create root.");
	let left = store.create_node(&spaces, Some(&root), &[]).await.expect("Failed to create node.");
	let right = store.create_node(&spaces, Some(&root), &[]).await.expect("Failed to create node.");
	let in_left =
		store.create_node(&spaces, Some(&left), &[Aspect::Taggable]).await.expect("Failed to create node.");
	let in_right =
		store.create_node(&spaces, Some(&right), &[Aspect::Taggable]).await.expect("Failed to create node.");
	let unmarked = store.create_node(&spaces, Some(&left), &[]).await.expect("Failed to create node.");
	let tag = store.create_tag(&spaces, "alpha").await.expect("Failed to create tag.");

	for node in [&in_left, &in_right, &unmarked] {
		store
			.set_node_tags(node, std::slice::from_ref(&tag.node_ref))
			.await
			.expect("Failed to set tags.");
	}

	let mut everywhere = vec![in_left.clone(), in_right.clone()];

	everywhere.sort();

	assert_eq!(
		store.find_tagged_nodes(&spaces, &tag.node_ref, None).await.expect("Failed to search."),
		everywhere
	);
	assert_eq!(
		store.find_tagged_nodes(&spaces, &tag.node_ref, Some(&left)).await.expect("Failed to search."),
		vec![in_left.clone()]
	);

	store.delete_node(&left).await.expect("Failed to delete node.");

	assert!(!store.exists(&AccessContext::system(), &in_left).await.expect("Failed to check node."));
	assert_eq!(
		store.find_tagged_nodes(&spaces, &tag.node_ref, None).await.expect("Failed to search."),
		vec![in_right]
	);
}

#[tokio::test]
async fn structural_helpers_report_previous_parent_and_copy_tags() {
	let store = MemoryNodeStore::new();
	let spaces = StoreRef::default();
	let root = store.create_node(&spaces, None, &[]).await.expect("Failed to create root.");
	let from = store.create_node(&spaces, Some(&root), &[]).await.expect("Failed to create node.");
	let to = store.create_node(&spaces, Some(&root), &[]).await.expect("Failed to create node.");
	let doc = store.create_node(&spaces, Some(&from), &[Aspect::Taggable]).await.expect("Failed to create node.");
	let tag = store.create_tag(&spaces, "alpha").await.expect("Failed to create tag.");

	store.set_node_tags(&doc, std::slice::from_ref(&tag.node_ref)).await.expect("Failed to set tags.");
	store.write_tag_cache(&doc, Some("alpha|1")).await.expect("Failed to write cache.");

	assert_eq!(store.move_node(&doc, &to).await.expect("Failed to move node."), Some(from));
	assert!(matches!(store.move_node(&root, &doc).await, Err(Error::InvalidArgument(_))));

	let copy = store.copy_node(&doc, &root).await.expect("Failed to copy node.");

	assert_eq!(store.node_tags(&copy).await.expect("Failed to read tags."), vec![tag.clone()]);
	assert_eq!(store.read_tag_cache(&copy).await.expect("Failed to read cache."), None);

	let working_copy = store.check_out(&doc).await.expect("Failed to check out node.");
	let system = AccessContext::system();

	assert!(store.has_aspect(&system, &working_copy, Aspect::WorkingCopy).await.expect("Failed to read aspect."));
	assert_eq!(store.primary_parent(&system, &working_copy).await.expect("Failed to read parent."), Some(to));
}
