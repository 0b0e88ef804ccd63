use std::sync::Arc;

use tokio::runtime::Handle;

use tagscope_domain::{
	Aspect, NodeRef, PagingRequest, PagingResults, StoreRef, Tag, TagUpdates, delta,
	tag::{normalize_tag_name, prepare_new_tag_name, validate_new_tag_name},
	tag_details::compare_tag_names,
};
use tagscope_storage::{AccessContext, ChangeLog, NewChangeRecord, NodeStore};

use crate::{
	BoxFuture, Dispatch, Error, Result,
	aggregator::ScopeAggregator,
	events::{ChildAssoc, EventDispatcher, NodeEvent, NodeEventHandler},
	resolver::ScopeResolver,
	transaction::{QueuedChange, StagedWrites, Transaction, TransactionListener},
};

const SCOPE_CHANGE_HOOK: &str = "tag_scope_changes";

enum NodeWrite {
	Tags { node: NodeRef, tags: Vec<NodeRef> },
	Rename { tag: NodeRef, name: String },
}

/// Turns a transaction's tag intents into change records at commit, then triggers aggregation.
pub struct ScopeChangeHook {
	nodes: Arc<dyn NodeStore>,
	resolver: ScopeResolver,
	change_log: Arc<dyn ChangeLog>,
	aggregator: Arc<ScopeAggregator>,
	dispatch: Dispatch,
}
impl ScopeChangeHook {
	pub fn new(
		nodes: Arc<dyn NodeStore>,
		resolver: ScopeResolver,
		change_log: Arc<dyn ChangeLog>,
		aggregator: Arc<ScopeAggregator>,
		dispatch: Dispatch,
	) -> Self {
		Self { nodes, resolver, change_log, aggregator, dispatch }
	}

	/// Resolves the pending intents, applies the staged node writes, then appends the change
	/// records. A failed append reverts the writes so the store and the change log stay in step.
	/// Tag deletions run last, once the records are durable.
	async fn flush(&self, tx: &mut Transaction) -> Result<()> {
		let system = AccessContext::system();

		for (node, updates) in tx.pending_mut().drain() {
			if !self.nodes.exists(&system, &node).await? {
				tracing::debug!(node = %node, "Tagged node was deleted before commit; skipping.");

				continue;
			}

			self.resolver.record_updates(tx, &node, &updates).await?;
		}

		let changes = tx.take_scope_changes();
		let staged = tx.take_staged();
		let undo = self.apply_writes(self.planned_writes(&staged).await?).await?;

		if !changes.is_empty() {
			let records: Vec<NewChangeRecord> = changes
				.iter()
				.map(|(scope, changes)| NewChangeRecord {
					node: scope.to_string(),
					tags: delta::changes_to_json(changes),
				})
				.collect();
			let change_ids = match self.change_log.append(&records).await {
				Ok(change_ids) => change_ids,
				Err(err) => {
					self.revert_writes(undo).await;

					return Err(err.into());
				},
			};

			for ((scope, _), change_id) in changes.into_iter().zip(change_ids) {
				tx.record_queued(QueuedChange { change_id, scope });
			}

			tracing::debug!(
				transaction = %tx.id(),
				records = records.len(),
				"Queued tag scope change records."
			);
		}

		for tag in &staged.deletions {
			if let Err(err) = self.nodes.delete_tag(tag).await {
				tracing::warn!(tag = %tag, error = %err, "Failed to delete untagged tag node.");
			}
		}

		Ok(())
	}

	/// Pairs every staged write with the write that undoes it.
	async fn planned_writes(&self, staged: &StagedWrites) -> Result<Vec<(NodeWrite, NodeWrite)>> {
		let system = AccessContext::system();
		let mut writes = Vec::with_capacity(staged.renames.len() + staged.tags.len());

		for (tag, rename) in &staged.renames {
			writes.push((
				NodeWrite::Rename { tag: tag.clone(), name: rename.to.clone() },
				NodeWrite::Rename { tag: tag.clone(), name: rename.from.clone() },
			));
		}

		for (node, tags) in &staged.tags {
			if !self.nodes.exists(&system, node).await? {
				tracing::debug!(node = %node, "Staged tags target a deleted node; skipping.");

				continue;
			}

			writes.push((
				NodeWrite::Tags { node: node.clone(), tags: tags.after.clone() },
				NodeWrite::Tags { node: node.clone(), tags: tags.before.clone() },
			));
		}

		Ok(writes)
	}

	/// Returns the undo writes for everything applied. On failure the applied part is reverted.
	async fn apply_writes(&self, writes: Vec<(NodeWrite, NodeWrite)>) -> Result<Vec<NodeWrite>> {
		let mut undo = Vec::with_capacity(writes.len());

		for (write, inverse) in writes {
			if let Err(err) = self.write(&write).await {
				self.revert_writes(undo).await;

				return Err(err);
			}

			undo.push(inverse);
		}

		Ok(undo)
	}

	async fn revert_writes(&self, undo: Vec<NodeWrite>) {
		for write in undo.into_iter().rev() {
			if let Err(err) = self.write(&write).await {
				tracing::error!(error = %err, "Failed to revert a staged tag write.");
			}
		}
	}

	async fn write(&self, write: &NodeWrite) -> Result<()> {
		match write {
			NodeWrite::Tags { node, tags } => self.nodes.set_node_tags(node, tags).await?,
			NodeWrite::Rename { tag, name } => self.nodes.rename_tag(tag, name).await?,
		}

		Ok(())
	}

	async fn trigger_aggregation(&self, tx: &Transaction) {
		let mut scopes: Vec<NodeRef> = Vec::new();

		for change in tx.queued() {
			if !scopes.contains(&change.scope) {
				scopes.push(change.scope.clone());
			}
		}

		if scopes.is_empty() {
			return;
		}

		match self.dispatch {
			Dispatch::Inline =>
				if let Err(err) = self.aggregator.aggregate(&scopes).await {
					tracing::error!(error = %err, "Tag scope aggregation after commit failed.");
				},
			Dispatch::Background => match Handle::try_current() {
				Ok(handle) => {
					let aggregator = self.aggregator.clone();

					handle.spawn(async move {
						if let Err(err) = aggregator.aggregate(&scopes).await {
							tracing::error!(error = %err, "Background tag scope aggregation failed.");
						}
					});
				},
				Err(_) => {
					tracing::warn!(
						scopes = scopes.len(),
						"No runtime for background aggregation; leaving it to the recovery sweep."
					);
				},
			},
			Dispatch::Deferred => {
				tracing::debug!(scopes = scopes.len(), "Tag scope aggregation deferred to the sweep.");
			},
		}
	}
}

impl TransactionListener for ScopeChangeHook {
	fn kind(&self) -> &'static str {
		SCOPE_CHANGE_HOOK
	}

	fn before_commit<'a>(&'a self, tx: &'a mut Transaction) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.flush(tx))
	}

	fn after_commit<'a>(&'a self, tx: &'a Transaction) -> BoxFuture<'a, ()> {
		Box::pin(self.trigger_aggregation(tx))
	}
}

/// Tag membership of nodes and the per-transaction deltas it produces.
pub struct TagTracker {
	nodes: Arc<dyn NodeStore>,
	resolver: ScopeResolver,
	hook: Arc<ScopeChangeHook>,
}
impl TagTracker {
	pub fn new(nodes: Arc<dyn NodeStore>, resolver: ScopeResolver, hook: Arc<ScopeChangeHook>) -> Self {
		Self { nodes, resolver, hook }
	}

	/// Lower-cases and validates `name`, then returns the existing or new tag.
	pub async fn create_tag(&self, store: &StoreRef, name: &str) -> Result<Tag> {
		let name = prepare_new_tag_name(name)?;

		Ok(self.nodes.create_tag(store, &name).await?)
	}

	pub async fn get_tag(&self, store: &StoreRef, name: &str) -> Result<Option<Tag>> {
		Ok(self.nodes.find_tag(store, &normalize_tag_name(name)).await?)
	}

	pub async fn is_tag(&self, store: &StoreRef, name: &str) -> Result<bool> {
		Ok(self.get_tag(store, name).await?.is_some())
	}

	/// Adding a tag the node already carries changes nothing and queues nothing.
	pub async fn add_tag(&self, tx: &mut Transaction, node: &NodeRef, name: &str) -> Result<Tag> {
		let name = prepare_new_tag_name(name)?;
		let tag = self.resolve_tag(tx, &node.store, &name).await?;

		self.ensure_taggable(node).await?;

		let current = self.current_tag_refs(tx, node).await?;

		if current.contains(&tag.node_ref) {
			return Ok(tag);
		}

		let mut refs = current.clone();

		refs.push(tag.node_ref.clone());

		self.stage(tx, node, current, refs);
		self.queue(tx, node, &tag.name, true);

		Ok(tag)
	}

	pub async fn add_tags(
		&self,
		tx: &mut Transaction,
		node: &NodeRef,
		names: &[&str],
	) -> Result<Vec<(String, Tag)>> {
		let mut added = Vec::with_capacity(names.len());

		for name in names {
			let tag = self.add_tag(tx, node, name).await?;

			added.push((name.to_string(), tag));
		}

		Ok(added)
	}

	/// Queues a removal only when the node actually carried the tag.
	pub async fn remove_tag(&self, tx: &mut Transaction, node: &NodeRef, name: &str) -> Result<()> {
		let name = normalize_tag_name(name);
		let Some(tag) = self.lookup_tag(tx, &node.store, &name).await? else {
			return Ok(());
		};

		if !self.is_taggable(node).await? {
			return Ok(());
		}

		let current = self.current_tag_refs(tx, node).await?;

		if !current.contains(&tag.node_ref) {
			return Ok(());
		}

		let refs: Vec<NodeRef> =
			current.iter().filter(|assigned| *assigned != &tag.node_ref).cloned().collect();

		self.stage(tx, node, current, refs);
		self.queue(tx, node, &tag.name, false);

		Ok(())
	}

	pub async fn remove_tags(&self, tx: &mut Transaction, node: &NodeRef, names: &[&str]) -> Result<()> {
		for name in names {
			self.remove_tag(tx, node, name).await?;
		}

		Ok(())
	}

	/// Replaces the node's tags. Only the symmetric difference produces deltas.
	pub async fn set_tags(&self, tx: &mut Transaction, node: &NodeRef, names: &[&str]) -> Result<()> {
		let prepared = names
			.iter()
			.map(|name| prepare_new_tag_name(name))
			.collect::<Result<Vec<_>, _>>()?;

		self.ensure_taggable(node).await?;

		let current = self.current_tags(tx, node).await?;
		let before: Vec<NodeRef> = current.iter().map(|tag| tag.node_ref.clone()).collect();
		let mut old_names: Vec<String> = current.into_iter().map(|tag| tag.name).collect();
		let mut refs: Vec<NodeRef> = Vec::with_capacity(prepared.len());

		for name in prepared {
			let tag = self.resolve_tag(tx, &node.store, &name).await?;

			if refs.contains(&tag.node_ref) {
				continue;
			}

			refs.push(tag.node_ref.clone());

			match old_names.iter().position(|old| old == &tag.name) {
				Some(idx) => {
					old_names.remove(idx);
				},
				None => self.queue(tx, node, &tag.name, true),
			}
		}

		for old in old_names {
			self.queue(tx, node, &old, false);
		}

		self.stage(tx, node, before, refs);

		Ok(())
	}

	pub async fn clear_tags(&self, tx: &mut Transaction, node: &NodeRef) -> Result<()> {
		self.set_tags(tx, node, &[]).await
	}

	pub async fn has_tag(&self, node: &NodeRef, name: &str) -> Result<bool> {
		let name = normalize_tag_name(name);

		Ok(self.nodes.node_tags(node).await?.iter().any(|tag| tag.name == name))
	}

	/// Committed tag names in assignment order.
	pub async fn get_tags(&self, node: &NodeRef) -> Result<Vec<String>> {
		Ok(self.nodes.node_tags(node).await?.into_iter().map(|tag| tag.name).collect())
	}

	/// Sorts the node's whole tag list by name before cutting the page.
	pub async fn get_tags_paged(
		&self,
		node: &NodeRef,
		paging: PagingRequest,
	) -> Result<PagingResults<Tag>> {
		let mut tags = self.nodes.node_tags(node).await?;

		tags.sort_by(|a, b| compare_tag_names(&a.name, &b.name));

		Ok(PagingResults::from_sorted(tags, paging))
	}

	pub async fn find_tagged_nodes(
		&self,
		store: &StoreRef,
		name: &str,
		under: Option<&NodeRef>,
	) -> Result<Vec<NodeRef>> {
		let Some(tag) = self.get_tag(store, name).await? else {
			return Ok(Vec::new());
		};

		Ok(self.nodes.find_tagged_nodes(store, &tag.node_ref, under).await?)
	}

	/// Untags every carrier through the normal removal path. The tag node itself is deleted
	/// once the commit has recorded the removals.
	pub async fn delete_tag(&self, tx: &mut Transaction, store: &StoreRef, name: &str) -> Result<()> {
		let name = normalize_tag_name(name);
		let Some(tag) = self.lookup_tag(tx, store, &name).await? else {
			return Ok(());
		};

		for node in self.carriers(tx, store, &tag.node_ref).await? {
			self.remove_tag(tx, &node, &tag.name).await?;
		}

		tx.stage_delete(&tag.node_ref);
		self.bind(tx);

		Ok(())
	}

	/// Renames a tag node and moves its counts from the old name to the new one.
	pub async fn change_tag(
		&self,
		tx: &mut Transaction,
		events: &EventDispatcher,
		store: &StoreRef,
		existing: &str,
		new: &str,
	) -> Result<Tag> {
		if existing.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "Existing tag cannot be blank.".to_string() });
		}
		if new.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "New tag cannot be blank.".to_string() });
		}

		let existing = normalize_tag_name(existing);
		let new = normalize_tag_name(new);

		if existing == new {
			return Err(Error::InvalidRequest {
				message: "New and existing tags are the same.".to_string(),
			});
		}

		validate_new_tag_name(&new)?;

		let Some(tag) = self.lookup_tag(tx, store, &existing).await? else {
			return Err(Error::NotFound { message: format!("Tag {existing:?} not found.") });
		};
		let taken = self.lookup_tag(tx, store, &new).await?.is_some()
			|| self
				.nodes
				.find_tag(store, &new)
				.await?
				.is_some_and(|found| found.node_ref != tag.node_ref);

		if taken {
			return Err(Error::Conflict { message: format!("Tag {new:?} already exists.") });
		}

		let carriers = self.carriers(tx, store, &tag.node_ref).await?;

		tx.stage_rename(&tag.node_ref, &existing, &new);

		for node in &carriers {
			let refs = self.current_tag_refs(tx, node).await?;

			events
				.dispatch(
					tx,
					&NodeEvent::OnUpdateProperties {
						node: node.clone(),
						before: refs.clone(),
						after: refs,
					},
				)
				.await?;

			self.queue(tx, node, &existing, false);
			self.queue(tx, node, &new, true);
		}

		self.bind(tx);

		tracing::debug!(from = %existing, to = %new, nodes = carriers.len(), "Renamed tag.");

		Ok(Tag { node_ref: tag.node_ref, name: new })
	}

	pub async fn handle_event(&self, tx: &mut Transaction, event: &NodeEvent) -> Result<()> {
		match event {
			NodeEvent::OnCreateNode { node } => self.on_create_node(tx, node).await,
			NodeEvent::OnUpdateProperties { node, before, after } =>
				self.on_update_properties(tx, node, before, after).await,
			NodeEvent::BeforeDeleteNode { node } => self.before_delete_node(tx, node).await,
			NodeEvent::OnMoveNode { old, new } => self.on_move_node(tx, old, new).await,
			NodeEvent::BeforeCopy { target, .. } => self.before_copy(tx, target).await,
			NodeEvent::OnCopyComplete { target, .. } => self.on_copy_complete(tx, target).await,
			NodeEvent::AfterCheckOut { working_copy } => self.after_check_out(tx, working_copy).await,
		}
	}

	async fn on_create_node(&self, tx: &mut Transaction, node: &NodeRef) -> Result<()> {
		if !self.is_taggable(node).await? {
			return Ok(());
		}

		for tag in self.current_tags(tx, node).await? {
			self.queue(tx, node, &tag.name, true);
		}

		Ok(())
	}

	/// Diffs tag references by identity. Removed tags whose node is already gone are skipped.
	async fn on_update_properties(
		&self,
		tx: &mut Transaction,
		node: &NodeRef,
		before: &[NodeRef],
		after: &[NodeRef],
	) -> Result<()> {
		let mut added: Vec<&NodeRef> = after.iter().collect();

		for tag_ref in before {
			if let Some(idx) = added.iter().position(|candidate| *candidate == tag_ref) {
				added.remove(idx);

				continue;
			}

			match self.tag_name(tx, tag_ref).await? {
				Some(name) => self.queue(tx, node, &name, false),
				None => tracing::debug!(tag = %tag_ref, "Removed tag no longer exists; skipping."),
			}
		}

		for tag_ref in added {
			if let Some(name) = self.tag_name(tx, tag_ref).await? {
				self.queue(tx, node, &name, true);
			}
		}

		Ok(())
	}

	async fn before_delete_node(&self, tx: &mut Transaction, node: &NodeRef) -> Result<()> {
		let system = AccessContext::system();

		if !self.nodes.exists(&system, node).await?
			|| !self.is_taggable(node).await?
			|| self.is_working_copy(node).await?
		{
			return Ok(());
		}

		let parent = self.nodes.primary_parent(&system, node).await?;

		self.update_all_scope_tags(tx, node, parent.as_ref(), false).await
	}

	/// The old location comes from `old`; looking it up now would already see the new parent.
	async fn on_move_node(&self, tx: &mut Transaction, old: &ChildAssoc, new: &ChildAssoc) -> Result<()> {
		if old.parent == new.parent {
			return Ok(());
		}

		let system = AccessContext::system();

		if self.is_taggable(&old.child).await? {
			let scope_parent = if old.is_primary {
				Some(old.parent.clone())
			} else {
				self.nodes.primary_parent(&system, &old.parent).await?
			};

			self.update_all_scope_tags(tx, &old.child, scope_parent.as_ref(), false).await?;
		}

		if self.is_taggable(&new.child).await? {
			let parent = self.nodes.primary_parent(&system, &new.child).await?;

			self.update_all_scope_tags(tx, &new.child, parent.as_ref(), true).await?;
		}

		Ok(())
	}

	async fn before_copy(&self, tx: &mut Transaction, target: &NodeRef) -> Result<()> {
		if !self.is_taggable(target).await? {
			return Ok(());
		}

		let parent = self.nodes.primary_parent(&AccessContext::system(), target).await?;

		self.update_all_scope_tags(tx, target, parent.as_ref(), false).await
	}

	async fn on_copy_complete(&self, tx: &mut Transaction, target: &NodeRef) -> Result<()> {
		if !self.is_taggable(target).await? {
			return Ok(());
		}

		let parent = self.nodes.primary_parent(&AccessContext::system(), target).await?;

		self.update_all_scope_tags(tx, target, parent.as_ref(), true).await
	}

	async fn after_check_out(&self, tx: &mut Transaction, working_copy: &NodeRef) -> Result<()> {
		let system = AccessContext::system();

		if !self.nodes.exists(&system, working_copy).await?
			|| !self.is_taggable(working_copy).await?
			|| !self.is_working_copy(working_copy).await?
		{
			return Ok(());
		}

		let parent = self.nodes.primary_parent(&system, working_copy).await?;

		self.update_all_scope_tags(tx, working_copy, parent.as_ref(), false).await
	}

	/// Records all of `node`'s tags against the scopes of `parent` right away.
	///
	/// A pending intent in the same direction is being applied here and is dequeued. One in the
	/// opposite direction never reached a scope, so both cancel.
	async fn update_all_scope_tags(
		&self,
		tx: &mut Transaction,
		node: &NodeRef,
		parent: Option<&NodeRef>,
		add: bool,
	) -> Result<()> {
		let Some(parent) = parent else {
			return Ok(());
		};
		let mut updates = TagUpdates::new();

		for tag in self.current_tags(tx, node).await? {
			match tx.pending_mut().take(node, &tag.name) {
				Some(pending) if pending != add => continue,
				_ => {
					updates.insert(tag.name, add);
				},
			}
		}

		if updates.is_empty() {
			return Ok(());
		}

		self.resolver.record_updates(tx, parent, &updates).await?;
		self.bind(tx);

		Ok(())
	}

	/// Finds `name` as this transaction sees it: staged renames and deletions applied.
	async fn lookup_tag(&self, tx: &Transaction, store: &StoreRef, name: &str) -> Result<Option<Tag>> {
		if let Some(tag_ref) = tx.renamed_to(store, name) {
			return Ok(Some(Tag { node_ref: tag_ref.clone(), name: name.to_string() }));
		}

		match self.nodes.find_tag(store, name).await? {
			Some(tag) if tx.renamed(&tag.node_ref).is_some() || tx.is_deleted(&tag.node_ref) =>
				Ok(None),
			found => Ok(found),
		}
	}

	/// Like [`Self::lookup_tag`], creating the tag when it does not exist yet.
	async fn resolve_tag(&self, tx: &mut Transaction, store: &StoreRef, name: &str) -> Result<Tag> {
		if let Some(tag) = self.lookup_tag(tx, store, name).await? {
			return Ok(tag);
		}

		let tag = self.nodes.create_tag(store, name).await?;

		if tx.renamed(&tag.node_ref).is_some() {
			return Err(Error::Conflict {
				message: format!("Tag {name:?} is being renamed in this transaction."),
			});
		}
		if tx.unstage_delete(&tag.node_ref) {
			tracing::debug!(tag = %name, "Tag is used again; keeping it.");
		}

		Ok(tag)
	}

	async fn tag_name(&self, tx: &Transaction, tag_ref: &NodeRef) -> Result<Option<String>> {
		if let Some(name) = tx.renamed(tag_ref) {
			return Ok(Some(name.to_string()));
		}

		Ok(self.nodes.get_tag(tag_ref).await?.map(|tag| tag.name))
	}

	async fn current_tag_refs(&self, tx: &Transaction, node: &NodeRef) -> Result<Vec<NodeRef>> {
		match tx.staged_tags(node) {
			Some(refs) => Ok(refs.to_vec()),
			None => Ok(self.nodes.node_tags(node).await?.into_iter().map(|tag| tag.node_ref).collect()),
		}
	}

	/// The node's tags with this transaction's staged writes applied.
	async fn current_tags(&self, tx: &Transaction, node: &NodeRef) -> Result<Vec<Tag>> {
		let mut tags = match tx.staged_tags(node) {
			Some(refs) => {
				let mut tags = Vec::with_capacity(refs.len());

				for tag_ref in refs {
					if let Some(tag) = self.nodes.get_tag(tag_ref).await? {
						tags.push(tag);
					}
				}

				tags
			},
			None => self.nodes.node_tags(node).await?,
		};

		for tag in &mut tags {
			if let Some(name) = tx.renamed(&tag.node_ref) {
				tag.name = name.to_string();
			}
		}

		Ok(tags)
	}

	/// Nodes carrying `tag` once this transaction's staged assignments are applied.
	async fn carriers(&self, tx: &Transaction, store: &StoreRef, tag: &NodeRef) -> Result<Vec<NodeRef>> {
		let mut nodes = self.nodes.find_tagged_nodes(store, tag, None).await?;

		nodes.retain(|node| tx.staged_tags(node).is_none_or(|refs| refs.contains(tag)));

		for (node, refs) in tx.staged_tag_nodes() {
			if &node.store == store && refs.contains(tag) && !nodes.contains(node) {
				nodes.push(node.clone());
			}
		}

		Ok(nodes)
	}

	/// The Taggable aspect is written right away; without tags it carries no counts.
	async fn ensure_taggable(&self, node: &NodeRef) -> Result<()> {
		if !self.is_taggable(node).await? {
			self.nodes.add_aspect(node, Aspect::Taggable).await?;
		}

		Ok(())
	}

	async fn is_taggable(&self, node: &NodeRef) -> Result<bool> {
		Ok(self.nodes.has_aspect(&AccessContext::system(), node, Aspect::Taggable).await?)
	}

	async fn is_working_copy(&self, node: &NodeRef) -> Result<bool> {
		Ok(self.nodes.has_aspect(&AccessContext::system(), node, Aspect::WorkingCopy).await?)
	}

	fn stage(&self, tx: &mut Transaction, node: &NodeRef, before: Vec<NodeRef>, after: Vec<NodeRef>) {
		tx.stage_tags(node, before, after);
		self.bind(tx);
	}

	fn queue(&self, tx: &mut Transaction, node: &NodeRef, tag: &str, add: bool) {
		tx.pending_mut().queue(node, tag, add);
		self.bind(tx);
	}

	fn bind(&self, tx: &mut Transaction) {
		tx.bind_listener(self.hook.clone());
	}
}

/// Routes structural node events into the tracker.
pub struct TrackerEvents {
	tracker: Arc<TagTracker>,
}
impl TrackerEvents {
	pub fn new(tracker: Arc<TagTracker>) -> Self {
		Self { tracker }
	}
}
impl NodeEventHandler for TrackerEvents {
	fn handle<'a>(
		&'a self,
		tx: &'a mut Transaction,
		event: &'a NodeEvent,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.tracker.handle_event(tx, event))
	}
}
