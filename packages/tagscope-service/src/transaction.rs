//! Explicit unit-of-work context for tag mutations.
//!
//! Tag assignments, renames and tag deletions are staged here and only reach the node store at
//! commit, together with the change records derived from them. A rollback, or dropping the
//! transaction, leaves the store as it was.

use std::{
	collections::{BTreeMap, BTreeSet},
	sync::Arc,
};

use uuid::Uuid;

use tagscope_domain::{NodeRef, PendingTagUpdates, StoreRef, TagChanges, delta};

use crate::{BoxFuture, Result};

pub trait TransactionListener
where
	Self: Send + Sync,
{
	/// Listeners are bound at most once per kind and transaction.
	fn kind(&self) -> &'static str;

	/// Runs before the transaction completes. An error aborts the commit.
	fn before_commit<'a>(&'a self, tx: &'a mut Transaction) -> BoxFuture<'a, Result<()>>;

	/// Runs once the transaction's durable work is done. Failures here are the listener's to log.
	fn after_commit<'a>(&'a self, tx: &'a Transaction) -> BoxFuture<'a, ()>;
}

/// A change record appended by a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedChange {
	pub change_id: i64,
	pub scope: NodeRef,
}

#[derive(Clone, Debug, Default)]
pub struct CommitSummary {
	pub transaction_id: Uuid,
	pub queued: Vec<QueuedChange>,
}
impl CommitSummary {
	/// Scopes with a new change record, in append order.
	pub fn scopes(&self) -> Vec<NodeRef> {
		self.queued.iter().map(|change| change.scope.clone()).collect()
	}
}

/// A node's tag assignment as committed (`before`) and as it will be written (`after`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedTags {
	pub before: Vec<NodeRef>,
	pub after: Vec<NodeRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedRename {
	pub from: String,
	pub to: String,
}

/// Node store writes held back until commit.
#[derive(Clone, Debug, Default)]
pub struct StagedWrites {
	pub tags: BTreeMap<NodeRef, StagedTags>,
	pub renames: BTreeMap<NodeRef, StagedRename>,
	pub deletions: BTreeSet<NodeRef>,
}
impl StagedWrites {
	pub fn is_empty(&self) -> bool {
		self.tags.is_empty() && self.renames.is_empty() && self.deletions.is_empty()
	}
}

pub struct Transaction {
	id: Uuid,
	pending: PendingTagUpdates,
	scope_changes: BTreeMap<NodeRef, TagChanges>,
	staged: StagedWrites,
	listeners: Vec<Arc<dyn TransactionListener>>,
	queued: Vec<QueuedChange>,
}
impl Transaction {
	pub fn new() -> Self {
		Self {
			id: Uuid::new_v4(),
			pending: PendingTagUpdates::default(),
			scope_changes: BTreeMap::new(),
			staged: StagedWrites::default(),
			listeners: Vec::new(),
			queued: Vec::new(),
		}
	}

	pub fn id(&self) -> Uuid {
		self.id
	}

	/// Returns `false` when a listener of the same kind is already bound.
	pub fn bind_listener(&mut self, listener: Arc<dyn TransactionListener>) -> bool {
		if self.listeners.iter().any(|bound| bound.kind() == listener.kind()) {
			return false;
		}

		self.listeners.push(listener);

		true
	}

	pub fn pending(&self) -> &PendingTagUpdates {
		&self.pending
	}

	pub fn pending_mut(&mut self) -> &mut PendingTagUpdates {
		&mut self.pending
	}

	/// Adds `changes` to what this transaction will record against `scope`.
	pub fn queue_scope_changes(&mut self, scope: &NodeRef, changes: &TagChanges) {
		delta::merge_changes(self.scope_changes.entry(scope.clone()).or_default(), changes);
	}

	/// Buffered per-scope deltas with net-zero tags and empty scopes dropped.
	pub fn take_scope_changes(&mut self) -> Vec<(NodeRef, TagChanges)> {
		std::mem::take(&mut self.scope_changes)
			.into_iter()
			.filter_map(|(scope, mut changes)| {
				changes.retain(|_, net| *net != 0);

				(!changes.is_empty()).then_some((scope, changes))
			})
			.collect()
	}

	/// The node's tag list as this transaction will leave it, if it touched the node.
	pub fn staged_tags(&self, node: &NodeRef) -> Option<&[NodeRef]> {
		self.staged.tags.get(node).map(|staged| staged.after.as_slice())
	}

	pub fn staged_tag_nodes(&self) -> impl Iterator<Item = (&NodeRef, &[NodeRef])> {
		self.staged.tags.iter().map(|(node, staged)| (node, staged.after.as_slice()))
	}

	/// `before` is only kept the first time a node is staged.
	pub fn stage_tags(&mut self, node: &NodeRef, before: Vec<NodeRef>, after: Vec<NodeRef>) {
		let staged = self
			.staged
			.tags
			.entry(node.clone())
			.or_insert_with(|| StagedTags { before, after: Vec::new() });

		staged.after = after;

		if staged.after == staged.before {
			self.staged.tags.remove(node);
		}
	}

	/// The name a staged rename gives `tag`.
	pub fn renamed(&self, tag: &NodeRef) -> Option<&str> {
		self.staged.renames.get(tag).map(|rename| rename.to.as_str())
	}

	/// The tag a staged rename moves onto `name` within `store`.
	pub fn renamed_to(&self, store: &StoreRef, name: &str) -> Option<&NodeRef> {
		self.staged
			.renames
			.iter()
			.find(|(tag, rename)| &tag.store == store && rename.to == name)
			.map(|(tag, _)| tag)
	}

	/// `from` is only kept the first time a tag is renamed. Renaming back drops the entry.
	pub fn stage_rename(&mut self, tag: &NodeRef, from: &str, to: &str) {
		let rename = self
			.staged
			.renames
			.entry(tag.clone())
			.or_insert_with(|| StagedRename { from: from.to_string(), to: String::new() });

		rename.to = to.to_string();

		if rename.to == rename.from {
			self.staged.renames.remove(tag);
		}
	}

	pub fn stage_delete(&mut self, tag: &NodeRef) {
		self.staged.deletions.insert(tag.clone());
	}

	/// Returns `true` when `tag` was staged for deletion.
	pub fn unstage_delete(&mut self, tag: &NodeRef) -> bool {
		self.staged.deletions.remove(tag)
	}

	pub fn is_deleted(&self, tag: &NodeRef) -> bool {
		self.staged.deletions.contains(tag)
	}

	pub fn take_staged(&mut self) -> StagedWrites {
		std::mem::take(&mut self.staged)
	}

	pub fn record_queued(&mut self, change: QueuedChange) {
		self.queued.push(change);
	}

	pub fn queued(&self) -> &[QueuedChange] {
		&self.queued
	}

	pub async fn commit(mut self) -> Result<CommitSummary> {
		let listeners = std::mem::take(&mut self.listeners);

		for listener in &listeners {
			listener.before_commit(&mut self).await?;
		}

		for listener in &listeners {
			listener.after_commit(&self).await;
		}

		tracing::debug!(
			transaction = %self.id,
			queued = self.queued.len(),
			"Committed tagging transaction."
		);

		Ok(CommitSummary { transaction_id: self.id, queued: self.queued })
	}

	/// Discards every intent, buffered delta and staged write.
	pub fn rollback(self) {
		tracing::debug!(
			transaction = %self.id,
			staged_nodes = self.staged.tags.len(),
			"Rolled back tagging transaction."
		);
	}
}
impl Default for Transaction {
	fn default() -> Self {
		Self::new()
	}
}
