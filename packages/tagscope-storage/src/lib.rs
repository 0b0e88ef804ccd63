pub mod change_log;
pub mod db;
pub mod lease;
pub mod memory;
pub mod models;
pub mod nodes;
pub mod schema;

mod error;

use std::{future::Future, pin::Pin, time::Duration};

pub use error::Error;
pub use models::{AccessContext, ChangeRecord, LockAttempt, LockToken, NewChangeRecord};

use tagscope_domain::{Aspect, NodeRef, StoreRef, Tag};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The content graph: nodes, their markers, containment, tag nodes and tag assignments.
///
/// Writes never raise node events. Derived updates such as the tag scope cache go through the
/// same calls as user edits, so callers decide what gets observed.
pub trait NodeStore
where
	Self: Send + Sync,
{
	fn exists<'a>(
		&'a self,
		access: &'a AccessContext,
		node: &'a NodeRef,
	) -> BoxFuture<'a, Result<bool>>;

	fn has_aspect<'a>(
		&'a self,
		access: &'a AccessContext,
		node: &'a NodeRef,
		aspect: Aspect,
	) -> BoxFuture<'a, Result<bool>>;

	fn add_aspect<'a>(&'a self, node: &'a NodeRef, aspect: Aspect) -> BoxFuture<'a, Result<()>>;

	fn remove_aspect<'a>(&'a self, node: &'a NodeRef, aspect: Aspect) -> BoxFuture<'a, Result<()>>;

	/// `None` for a root or for a node the caller cannot see.
	fn primary_parent<'a>(
		&'a self,
		access: &'a AccessContext,
		node: &'a NodeRef,
	) -> BoxFuture<'a, Result<Option<NodeRef>>>;

	fn children<'a>(
		&'a self,
		access: &'a AccessContext,
		node: &'a NodeRef,
	) -> BoxFuture<'a, Result<Vec<NodeRef>>>;

	/// Tags assigned to `node` in assignment order.
	fn node_tags<'a>(&'a self, node: &'a NodeRef) -> BoxFuture<'a, Result<Vec<Tag>>>;

	fn set_node_tags<'a>(
		&'a self,
		node: &'a NodeRef,
		tags: &'a [NodeRef],
	) -> BoxFuture<'a, Result<()>>;

	fn find_tag<'a>(
		&'a self,
		store: &'a StoreRef,
		name: &'a str,
	) -> BoxFuture<'a, Result<Option<Tag>>>;

	fn get_tag<'a>(&'a self, tag: &'a NodeRef) -> BoxFuture<'a, Result<Option<Tag>>>;

	/// Returns the existing tag when `name` is already taken.
	fn create_tag<'a>(&'a self, store: &'a StoreRef, name: &'a str) -> BoxFuture<'a, Result<Tag>>;

	fn rename_tag<'a>(&'a self, tag: &'a NodeRef, name: &'a str) -> BoxFuture<'a, Result<()>>;

	fn delete_tag<'a>(&'a self, tag: &'a NodeRef) -> BoxFuture<'a, Result<()>>;

	fn list_tags<'a>(&'a self, store: &'a StoreRef) -> BoxFuture<'a, Result<Vec<Tag>>>;

	/// Nodes carrying `tag`, optionally restricted to the subtree rooted at `under`.
	fn find_tagged_nodes<'a>(
		&'a self,
		store: &'a StoreRef,
		tag: &'a NodeRef,
		under: Option<&'a NodeRef>,
	) -> BoxFuture<'a, Result<Vec<NodeRef>>>;

	fn read_tag_cache<'a>(&'a self, node: &'a NodeRef) -> BoxFuture<'a, Result<Option<String>>>;

	/// `None` removes the cache property.
	fn write_tag_cache<'a>(
		&'a self,
		node: &'a NodeRef,
		cache: Option<&'a str>,
	) -> BoxFuture<'a, Result<()>>;
}

/// Durable queue of per-scope tag deltas.
pub trait ChangeLog
where
	Self: Send + Sync,
{
	/// Appends all records or none of them.
	fn append<'a>(&'a self, records: &'a [NewChangeRecord]) -> BoxFuture<'a, Result<Vec<i64>>>;

	/// Oldest first.
	fn query_by_node<'a>(
		&'a self,
		node: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<ChangeRecord>>>;

	/// Distinct scope references that still have at least one record.
	fn list_pending_nodes<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<String>>>;

	fn clear<'a>(&'a self, change_ids: &'a [i64]) -> BoxFuture<'a, Result<u64>>;
}

/// Non-blocking lease locks.
pub trait LockService
where
	Self: Send + Sync,
{
	/// Never waits. A live lease held by someone else yields [`LockAttempt::Denied`].
	fn try_acquire<'a>(
		&'a self,
		key: &'a str,
		lease: Duration,
	) -> BoxFuture<'a, Result<LockAttempt>>;

	/// Returns `false` when the lease had already expired and been taken over.
	fn release<'a>(&'a self, token: &'a LockToken) -> BoxFuture<'a, Result<bool>>;
}
