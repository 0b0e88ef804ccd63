use std::{collections::HashSet, sync::Arc};

use tagscope_domain::{Aspect, NodeRef, TagUpdates, delta};
use tagscope_storage::{AccessContext, NodeStore};

use crate::{Result, transaction::Transaction};

/// Finds the tag scopes on a node and its primary ancestors, nearest first.
#[derive(Clone)]
pub struct ScopeResolver {
	nodes: Arc<dyn NodeStore>,
}
impl ScopeResolver {
	pub fn new(nodes: Arc<dyn NodeStore>) -> Self {
		Self { nodes }
	}

	pub async fn resolve_first(
		&self,
		access: &AccessContext,
		node: &NodeRef,
	) -> Result<Option<NodeRef>> {
		Ok(self.walk(access, node, true).await?.into_iter().next())
	}

	pub async fn resolve_all(&self, access: &AccessContext, node: &NodeRef) -> Result<Vec<NodeRef>> {
		self.walk(access, node, false).await
	}

	/// Queues `updates` against every scope of `target`, `target` included.
	pub async fn record_updates(
		&self,
		tx: &mut Transaction,
		target: &NodeRef,
		updates: &TagUpdates,
	) -> Result<usize> {
		if updates.is_empty() {
			return Ok(0);
		}

		let scopes = self.resolve_all(&AccessContext::system(), target).await?;

		if scopes.is_empty() {
			tracing::debug!(node = %target, "No tag scopes found; no scope updates needed.");

			return Ok(0);
		}

		let changes = delta::to_changes(updates);

		for scope in &scopes {
			tx.queue_scope_changes(scope, &changes);
		}

		tracing::debug!(node = %target, scopes = scopes.len(), "Queued tag scope updates.");

		Ok(scopes.len())
	}

	async fn walk(
		&self,
		access: &AccessContext,
		node: &NodeRef,
		first_only: bool,
	) -> Result<Vec<NodeRef>> {
		let mut scopes = Vec::new();

		if !self.nodes.exists(access, node).await? {
			return Ok(scopes);
		}

		let mut visited = HashSet::new();
		let mut current = Some(node.clone());

		while let Some(candidate) = current {
			// Containment must be a tree; stop rather than spin on a corrupt parent chain.
			if !visited.insert(candidate.clone()) {
				tracing::warn!(node = %node, at = %candidate, "Parent chain loops back on itself.");

				break;
			}

			if self.nodes.has_aspect(access, &candidate, Aspect::TagScope).await? {
				scopes.push(candidate.clone());

				if first_only {
					break;
				}
			}

			current = self.nodes.primary_parent(access, &candidate).await?;
		}

		Ok(scopes)
	}
}
