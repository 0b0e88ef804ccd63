//! In-process backends for tests and single-process embedders.

use std::{
	collections::{BTreeMap, BTreeSet, HashMap},
	time::{Duration, Instant},
};

use tokio::sync::Mutex;
use uuid::Uuid;

use tagscope_domain::{Aspect, NodeRef, StoreRef, Tag};

use crate::{
	AccessContext, BoxFuture, ChangeLog, ChangeRecord, Error, LockAttempt, LockService, LockToken,
	NewChangeRecord, NodeStore, Result,
};

#[derive(Debug, Default)]
pub struct MemoryNodeStore {
	state: Mutex<NodeState>,
}

#[derive(Debug, Default)]
struct NodeState {
	nodes: HashMap<NodeRef, NodeEntry>,
	tags: HashMap<NodeRef, Tag>,
}
impl NodeState {
	fn node(&self, node: &NodeRef) -> Result<&NodeEntry> {
		self.nodes.get(node).ok_or_else(|| Error::NotFound(format!("Node {node} does not exist.")))
	}

	fn node_mut(&mut self, node: &NodeRef) -> Result<&mut NodeEntry> {
		self.nodes
			.get_mut(node)
			.ok_or_else(|| Error::NotFound(format!("Node {node} does not exist.")))
	}

	fn readable(&self, access: &AccessContext, node: &NodeRef) -> Result<Option<&NodeEntry>> {
		let Some(entry) = self.nodes.get(node) else {
			return Ok(None);
		};

		if entry.can_read(access) {
			Ok(Some(entry))
		} else {
			Err(Error::AccessDenied(format!("Node {node} is not readable.")))
		}
	}

	fn is_under(&self, node: &NodeRef, ancestor: &NodeRef) -> bool {
		let mut current = Some(node);

		while let Some(candidate) = current {
			if candidate == ancestor {
				return true;
			}

			current = self.nodes.get(candidate).and_then(|entry| entry.parent.as_ref());
		}

		false
	}

	fn subtree(&self, root: &NodeRef) -> Vec<NodeRef> {
		let mut out = Vec::new();
		let mut stack = vec![root.clone()];

		while let Some(node) = stack.pop() {
			stack.extend(
				self.nodes
					.iter()
					.filter(|(_, entry)| entry.parent.as_ref() == Some(&node))
					.map(|(child, _)| child.clone()),
			);
			out.push(node);
		}

		out
	}
}

#[derive(Clone, Debug)]
struct NodeEntry {
	parent: Option<NodeRef>,
	aspects: BTreeSet<Aspect>,
	tags: Vec<NodeRef>,
	tag_cache: Option<String>,
	readers: Option<BTreeSet<String>>,
}
impl NodeEntry {
	fn can_read(&self, access: &AccessContext) -> bool {
		match (access, &self.readers) {
			(AccessContext::System, _) | (_, None) => true,
			(AccessContext::User(user), Some(readers)) => readers.contains(user),
		}
	}
}

impl MemoryNodeStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn create_node(
		&self,
		store: &StoreRef,
		parent: Option<&NodeRef>,
		aspects: &[Aspect],
	) -> Result<NodeRef> {
		let mut state = self.state.lock().await;

		if let Some(parent) = parent {
			state.node(parent)?;
		}

		let node = NodeRef::generate(store);

		state.nodes.insert(
			node.clone(),
			NodeEntry {
				parent: parent.cloned(),
				aspects: aspects.iter().copied().collect(),
				tags: Vec::new(),
				tag_cache: None,
				readers: None,
			},
		);

		Ok(node)
	}

	/// Re-parents `node` and returns the parent it had before the move.
	pub async fn move_node(&self, node: &NodeRef, new_parent: &NodeRef) -> Result<Option<NodeRef>> {
		let mut state = self.state.lock().await;

		state.node(new_parent)?;

		if state.is_under(new_parent, node) {
			return Err(Error::InvalidArgument(format!(
				"Cannot move {node} below its own descendant {new_parent}."
			)));
		}

		let entry = state.node_mut(node)?;

		Ok(entry.parent.replace(new_parent.clone()))
	}

	/// Shallow copy: aspects and tag assignments are carried over, the scope cache is not.
	pub async fn copy_node(&self, node: &NodeRef, new_parent: &NodeRef) -> Result<NodeRef> {
		let mut state = self.state.lock().await;

		state.node(new_parent)?;

		let source = state.node(node)?.clone();
		let copy = NodeRef::generate(&node.store);

		state.nodes.insert(
			copy.clone(),
			NodeEntry { parent: Some(new_parent.clone()), tag_cache: None, ..source },
		);

		Ok(copy)
	}

	/// Copies `node` next to itself and marks the copy as its working copy.
	pub async fn check_out(&self, node: &NodeRef) -> Result<NodeRef> {
		let parent = {
			let state = self.state.lock().await;

			state.node(node)?.parent.clone().ok_or_else(|| {
				Error::InvalidArgument(format!("Cannot check out root node {node}."))
			})?
		};
		let working_copy = self.copy_node(node, &parent).await?;

		self.state.lock().await.node_mut(&working_copy)?.aspects.insert(Aspect::WorkingCopy);

		Ok(working_copy)
	}

	/// Deletes `node` and everything below it.
	pub async fn delete_node(&self, node: &NodeRef) -> Result<()> {
		let mut state = self.state.lock().await;

		state.node(node)?;

		for doomed in state.subtree(node) {
			state.nodes.remove(&doomed);
		}

		Ok(())
	}

	/// Limits reads of `node` to `readers`. System access is never restricted.
	pub async fn restrict(&self, node: &NodeRef, readers: &[&str]) -> Result<()> {
		let mut state = self.state.lock().await;

		state.node_mut(node)?.readers = Some(readers.iter().map(|reader| reader.to_string()).collect());

		Ok(())
	}

	async fn exists_inner(&self, access: &AccessContext, node: &NodeRef) -> Result<bool> {
		let state = self.state.lock().await;

		Ok(state.nodes.get(node).is_some_and(|entry| entry.can_read(access)))
	}

	async fn has_aspect_inner(
		&self,
		access: &AccessContext,
		node: &NodeRef,
		aspect: Aspect,
	) -> Result<bool> {
		let state = self.state.lock().await;

		Ok(state.readable(access, node)?.is_some_and(|entry| entry.aspects.contains(&aspect)))
	}

	async fn set_aspect(&self, node: &NodeRef, aspect: Aspect, present: bool) -> Result<()> {
		let mut state = self.state.lock().await;
		let entry = state.node_mut(node)?;

		if present {
			entry.aspects.insert(aspect);
		} else {
			entry.aspects.remove(&aspect);
		}

		Ok(())
	}

	async fn primary_parent_inner(
		&self,
		access: &AccessContext,
		node: &NodeRef,
	) -> Result<Option<NodeRef>> {
		let state = self.state.lock().await;

		Ok(state.readable(access, node)?.and_then(|entry| entry.parent.clone()))
	}

	async fn children_inner(&self, access: &AccessContext, node: &NodeRef) -> Result<Vec<NodeRef>> {
		let state = self.state.lock().await;

		if state.readable(access, node)?.is_none() {
			return Ok(Vec::new());
		}

		let mut children: Vec<NodeRef> = state
			.nodes
			.iter()
			.filter(|(_, entry)| entry.parent.as_ref() == Some(node) && entry.can_read(access))
			.map(|(child, _)| child.clone())
			.collect();

		children.sort();

		Ok(children)
	}

	async fn node_tags_inner(&self, node: &NodeRef) -> Result<Vec<Tag>> {
		let state = self.state.lock().await;
		let entry = state.node(node)?;

		Ok(entry.tags.iter().filter_map(|tag| state.tags.get(tag).cloned()).collect())
	}

	async fn set_node_tags_inner(&self, node: &NodeRef, tags: &[NodeRef]) -> Result<()> {
		let mut state = self.state.lock().await;

		if let Some(missing) = tags.iter().find(|tag| !state.tags.contains_key(*tag)) {
			return Err(Error::NotFound(format!("Tag {missing} does not exist.")));
		}

		let entry = state.node_mut(node)?;
		let mut seen = BTreeSet::new();

		entry.tags = tags.iter().filter(|tag| seen.insert((*tag).clone())).cloned().collect();

		Ok(())
	}

	async fn find_tag_inner(&self, store: &StoreRef, name: &str) -> Result<Option<Tag>> {
		let state = self.state.lock().await;

		Ok(state.tags.values().find(|tag| &tag.node_ref.store == store && tag.name == name).cloned())
	}

	async fn get_tag_inner(&self, tag: &NodeRef) -> Result<Option<Tag>> {
		Ok(self.state.lock().await.tags.get(tag).cloned())
	}

	async fn create_tag_inner(&self, store: &StoreRef, name: &str) -> Result<Tag> {
		let mut state = self.state.lock().await;

		if let Some(existing) =
			state.tags.values().find(|tag| &tag.node_ref.store == store && tag.name == name)
		{
			return Ok(existing.clone());
		}

		let tag = Tag { node_ref: NodeRef::generate(store), name: name.to_string() };

		state.tags.insert(tag.node_ref.clone(), tag.clone());

		Ok(tag)
	}

	async fn rename_tag_inner(&self, tag: &NodeRef, name: &str) -> Result<()> {
		let mut state = self.state.lock().await;

		if state.tags.values().any(|other| {
			other.node_ref.store == tag.store && other.name == name && &other.node_ref != tag
		}) {
			return Err(Error::Conflict(format!("Tag {name:?} already exists.")));
		}

		let entry = state
			.tags
			.get_mut(tag)
			.ok_or_else(|| Error::NotFound(format!("Tag {tag} does not exist.")))?;

		entry.name = name.to_string();

		Ok(())
	}

	async fn delete_tag_inner(&self, tag: &NodeRef) -> Result<()> {
		let mut state = self.state.lock().await;

		state.tags.remove(tag).ok_or_else(|| Error::NotFound(format!("Tag {tag} does not exist.")))?;

		for entry in state.nodes.values_mut() {
			entry.tags.retain(|assigned| assigned != tag);
		}

		Ok(())
	}

	async fn list_tags_inner(&self, store: &StoreRef) -> Result<Vec<Tag>> {
		let state = self.state.lock().await;
		let mut tags: Vec<Tag> =
			state.tags.values().filter(|tag| &tag.node_ref.store == store).cloned().collect();

		tags.sort_by(|a, b| a.name.cmp(&b.name));

		Ok(tags)
	}

	async fn find_tagged_nodes_inner(
		&self,
		store: &StoreRef,
		tag: &NodeRef,
		under: Option<&NodeRef>,
	) -> Result<Vec<NodeRef>> {
		let state = self.state.lock().await;
		let mut nodes: Vec<NodeRef> = state
			.nodes
			.iter()
			.filter(|(node, entry)| {
				&node.store == store
					&& entry.aspects.contains(&Aspect::Taggable)
					&& entry.tags.contains(tag)
					&& under.is_none_or(|root| state.is_under(node, root))
			})
			.map(|(node, _)| node.clone())
			.collect();

		nodes.sort();

		Ok(nodes)
	}

	async fn read_tag_cache_inner(&self, node: &NodeRef) -> Result<Option<String>> {
		let state = self.state.lock().await;

		Ok(state.node(node)?.tag_cache.clone())
	}

	async fn write_tag_cache_inner(&self, node: &NodeRef, cache: Option<&str>) -> Result<()> {
		let mut state = self.state.lock().await;

		state.node_mut(node)?.tag_cache = cache.map(str::to_string);

		Ok(())
	}
}

impl NodeStore for MemoryNodeStore {
	fn exists<'a>(
		&'a self,
		access: &'a AccessContext,
		node: &'a NodeRef,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.exists_inner(access, node))
	}

	fn has_aspect<'a>(
		&'a self,
		access: &'a AccessContext,
		node: &'a NodeRef,
		aspect: Aspect,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.has_aspect_inner(access, node, aspect))
	}

	fn add_aspect<'a>(&'a self, node: &'a NodeRef, aspect: Aspect) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.set_aspect(node, aspect, true))
	}

	fn remove_aspect<'a>(&'a self, node: &'a NodeRef, aspect: Aspect) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.set_aspect(node, aspect, false))
	}

	fn primary_parent<'a>(
		&'a self,
		access: &'a AccessContext,
		node: &'a NodeRef,
	) -> BoxFuture<'a, Result<Option<NodeRef>>> {
		Box::pin(self.primary_parent_inner(access, node))
	}

	fn children<'a>(
		&'a self,
		access: &'a AccessContext,
		node: &'a NodeRef,
	) -> BoxFuture<'a, Result<Vec<NodeRef>>> {
		Box::pin(self.children_inner(access, node))
	}

	fn node_tags<'a>(&'a self, node: &'a NodeRef) -> BoxFuture<'a, Result<Vec<Tag>>> {
		Box::pin(self.node_tags_inner(node))
	}

	fn set_node_tags<'a>(
		&'a self,
		node: &'a NodeRef,
		tags: &'a [NodeRef],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.set_node_tags_inner(node, tags))
	}

	fn find_tag<'a>(
		&'a self,
		store: &'a StoreRef,
		name: &'a str,
	) -> BoxFuture<'a, Result<Option<Tag>>> {
		Box::pin(self.find_tag_inner(store, name))
	}

	fn get_tag<'a>(&'a self, tag: &'a NodeRef) -> BoxFuture<'a, Result<Option<Tag>>> {
		Box::pin(self.get_tag_inner(tag))
	}

	fn create_tag<'a>(&'a self, store: &'a StoreRef, name: &'a str) -> BoxFuture<'a, Result<Tag>> {
		Box::pin(self.create_tag_inner(store, name))
	}

	fn rename_tag<'a>(&'a self, tag: &'a NodeRef, name: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.rename_tag_inner(tag, name))
	}

	fn delete_tag<'a>(&'a self, tag: &'a NodeRef) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.delete_tag_inner(tag))
	}

	fn list_tags<'a>(&'a self, store: &'a StoreRef) -> BoxFuture<'a, Result<Vec<Tag>>> {
		Box::pin(self.list_tags_inner(store))
	}

	fn find_tagged_nodes<'a>(
		&'a self,
		store: &'a StoreRef,
		tag: &'a NodeRef,
		under: Option<&'a NodeRef>,
	) -> BoxFuture<'a, Result<Vec<NodeRef>>> {
		Box::pin(self.find_tagged_nodes_inner(store, tag, under))
	}

	fn read_tag_cache<'a>(&'a self, node: &'a NodeRef) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(self.read_tag_cache_inner(node))
	}

	fn write_tag_cache<'a>(
		&'a self,
		node: &'a NodeRef,
		cache: Option<&'a str>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.write_tag_cache_inner(node, cache))
	}
}

#[derive(Debug, Default)]
pub struct MemoryChangeLog {
	state: Mutex<ChangeLogState>,
}

#[derive(Debug, Default)]
struct ChangeLogState {
	last_id: i64,
	records: BTreeMap<i64, ChangeRecord>,
}

impl MemoryChangeLog {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		self.state.lock().await.records.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}

	async fn append_inner(&self, records: &[NewChangeRecord]) -> Result<Vec<i64>> {
		let mut state = self.state.lock().await;
		let mut ids = Vec::with_capacity(records.len());

		for record in records {
			state.last_id += 1;

			let change_id = state.last_id;

			state.records.insert(
				change_id,
				ChangeRecord { change_id, node: record.node.clone(), tags: record.tags.clone() },
			);
			ids.push(change_id);
		}

		Ok(ids)
	}

	async fn query_by_node_inner(&self, node: &str, limit: usize) -> Result<Vec<ChangeRecord>> {
		let state = self.state.lock().await;

		Ok(state.records.values().filter(|record| record.node == node).take(limit).cloned().collect())
	}

	async fn list_pending_nodes_inner(&self, limit: usize) -> Result<Vec<String>> {
		let state = self.state.lock().await;
		let mut seen = BTreeSet::new();

		Ok(state
			.records
			.values()
			.filter(|record| seen.insert(record.node.as_str()))
			.take(limit)
			.map(|record| record.node.clone())
			.collect())
	}

	async fn clear_inner(&self, change_ids: &[i64]) -> Result<u64> {
		let mut state = self.state.lock().await;

		Ok(change_ids.iter().filter(|id| state.records.remove(*id).is_some()).count() as u64)
	}
}

impl ChangeLog for MemoryChangeLog {
	fn append<'a>(&'a self, records: &'a [NewChangeRecord]) -> BoxFuture<'a, Result<Vec<i64>>> {
		Box::pin(self.append_inner(records))
	}

	fn query_by_node<'a>(
		&'a self,
		node: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<ChangeRecord>>> {
		Box::pin(self.query_by_node_inner(node, limit))
	}

	fn list_pending_nodes<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(self.list_pending_nodes_inner(limit))
	}

	fn clear<'a>(&'a self, change_ids: &'a [i64]) -> BoxFuture<'a, Result<u64>> {
		Box::pin(self.clear_inner(change_ids))
	}
}

#[derive(Debug, Default)]
pub struct MemoryLockService {
	leases: Mutex<HashMap<String, (Uuid, Instant)>>,
}
impl MemoryLockService {
	pub fn new() -> Self {
		Self::default()
	}

	async fn try_acquire_inner(&self, key: &str, lease: Duration) -> Result<LockAttempt> {
		let mut leases = self.leases.lock().await;
		let now = Instant::now();

		if leases.get(key).is_some_and(|(_, expires_at)| *expires_at > now) {
			return Ok(LockAttempt::Denied);
		}

		let token = Uuid::new_v4();

		leases.insert(key.to_string(), (token, now + lease));

		Ok(LockAttempt::Acquired(LockToken { key: key.to_string(), token, lease }))
	}

	async fn release_inner(&self, token: &LockToken) -> Result<bool> {
		let mut leases = self.leases.lock().await;

		if leases.get(&token.key).is_some_and(|(held, _)| *held == token.token) {
			leases.remove(&token.key);

			return Ok(true);
		}

		Ok(false)
	}
}

impl LockService for MemoryLockService {
	fn try_acquire<'a>(
		&'a self,
		key: &'a str,
		lease: Duration,
	) -> BoxFuture<'a, Result<LockAttempt>> {
		Box::pin(self.try_acquire_inner(key, lease))
	}

	fn release<'a>(&'a self, token: &'a LockToken) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.release_inner(token))
	}
}
