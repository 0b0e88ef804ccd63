use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::Serialize;

use tagscope_domain::{
	Aspect, NodeRef, TagDetails,
	tag_details::{sort_tag_details, tag_details_to_string},
};
use tagscope_storage::{AccessContext, LockAttempt};

use crate::{
	Error, Result, TaggingService,
	lease::{self, LeaseGuard},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RefreshOutcome {
	Refreshed { tags: usize, records_cleared: u64 },
	/// An aggregator or another refresh holds the scope's lease.
	Locked,
}

impl TaggingService {
	/// Marks `node` as a tag scope and counts its subtree right away.
	pub async fn add_tag_scope(&self, node: &NodeRef) -> Result<RefreshOutcome> {
		let system = AccessContext::system();

		if !self.backends.nodes.exists(&system, node).await? {
			return Err(Error::NotFound { message: format!("Node {node} not found.") });
		}
		if !self.backends.nodes.has_aspect(&system, node, Aspect::TagScope).await? {
			self.backends.nodes.add_aspect(node, Aspect::TagScope).await?;

			tracing::info!(scope = %node, "Added tag scope.");
		}

		self.refresh_tag_scope(node).await
	}

	/// Drops the scope marker and its cache. Outstanding records are discarded by the next drain.
	pub async fn remove_tag_scope(&self, node: &NodeRef) -> Result<()> {
		let system = AccessContext::system();

		if !self.backends.nodes.has_aspect(&system, node, Aspect::TagScope).await? {
			return Ok(());
		}

		self.backends.nodes.write_tag_cache(node, None).await?;
		self.backends.nodes.remove_aspect(node, Aspect::TagScope).await?;

		tracing::info!(scope = %node, "Removed tag scope.");

		Ok(())
	}

	/// Recounts the scope's tags from its subtree and replaces the cache.
	///
	/// Records present when the lease was taken are covered by the recount and cleared. Records
	/// appended during the recount stay queued, so a tag change racing with the walk can be
	/// counted twice until the next refresh.
	pub async fn refresh_tag_scope(&self, node: &NodeRef) -> Result<RefreshOutcome> {
		let key = lease::lock_key(node);
		let token = match self.backends.locks.try_acquire(&key, self.lease).await? {
			LockAttempt::Acquired(token) => token,
			LockAttempt::Denied => {
				tracing::debug!(scope = %node, "Tag scope is locked; skipping refresh.");

				return Ok(RefreshOutcome::Locked);
			},
		};
		let guard = LeaseGuard::new(self.backends.locks.clone(), token);
		let result = self.recount(node).await;

		guard.release().await;

		result
	}

	async fn recount(&self, scope: &NodeRef) -> Result<RefreshOutcome> {
		let scope_key = scope.to_string();
		let snapshot: Vec<i64> = self
			.backends
			.change_log
			.query_by_node(&scope_key, usize::MAX)
			.await?
			.into_iter()
			.map(|record| record.change_id)
			.collect();
		let mut tags: Vec<TagDetails> = self
			.count_subtree_tags(scope)
			.await?
			.into_iter()
			.map(|(name, count)| TagDetails::new(name, count))
			.collect();

		sort_tag_details(&mut tags);

		let serialized = (!tags.is_empty()).then(|| tag_details_to_string(&tags));

		self.backends.nodes.write_tag_cache(scope, serialized.as_deref()).await?;

		let records_cleared = if snapshot.is_empty() {
			0
		} else {
			self.backends.change_log.clear(&snapshot).await?
		};

		tracing::info!(
			scope = %scope,
			tags = tags.len(),
			records_cleared,
			"Refreshed tag scope."
		);

		Ok(RefreshOutcome::Refreshed { tags: tags.len(), records_cleared })
	}

	async fn count_subtree_tags(&self, root: &NodeRef) -> Result<BTreeMap<String, u64>> {
		let system = AccessContext::system();
		let nodes = &self.backends.nodes;
		let mut counts = BTreeMap::new();
		let mut visited = HashSet::new();
		let mut queue = VecDeque::from([root.clone()]);

		while let Some(node) = queue.pop_front() {
			if !visited.insert(node.clone()) {
				continue;
			}

			if nodes.has_aspect(&system, &node, Aspect::Taggable).await?
				&& !nodes.has_aspect(&system, &node, Aspect::WorkingCopy).await?
			{
				for tag in nodes.node_tags(&node).await? {
					*counts.entry(tag.name).or_insert(0) += 1;
				}
			}

			queue.extend(nodes.children(&system, &node).await?);
		}

		Ok(counts)
	}
}
