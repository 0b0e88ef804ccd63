use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::time::Instant;

use tagscope_domain::{
	Aspect, NodeRef, TagChanges, delta,
	tag_details::{apply_tag_changes, read_tag_details, tag_details_to_string},
};
use tagscope_storage::{AccessContext, ChangeLog, ChangeRecord, LockAttempt, LockService, NodeStore};

use crate::{
	Error, Result,
	lease::{self, LeaseGuard},
};

/// What one aggregation pass did to one scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeOutcome {
	Updated { records_applied: usize, records_discarded: usize },
	/// Another aggregator holds the lease and will see the same backlog.
	Locked,
	/// The scope is gone or no longer marked; its records were acknowledged unread.
	Stale { records_discarded: usize },
	/// The lease ran short before the backlog was drained. The rest waits for the next pass.
	Partial { records_applied: usize, records_discarded: usize },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregationReport {
	pub scopes_updated: usize,
	pub scopes_skipped_locked: usize,
	pub scopes_skipped_stale: usize,
	pub scopes_partial: usize,
	pub records_applied: usize,
	pub records_discarded: usize,
}
impl AggregationReport {
	pub fn record(&mut self, outcome: ScopeOutcome) {
		match outcome {
			ScopeOutcome::Updated { records_applied, records_discarded } => {
				self.scopes_updated += 1;
				self.records_applied += records_applied;
				self.records_discarded += records_discarded;
			},
			ScopeOutcome::Locked => self.scopes_skipped_locked += 1,
			ScopeOutcome::Stale { records_discarded } => {
				self.scopes_skipped_stale += 1;
				self.records_discarded += records_discarded;
			},
			ScopeOutcome::Partial { records_applied, records_discarded } => {
				self.scopes_partial += 1;
				self.records_applied += records_applied;
				self.records_discarded += records_discarded;
			},
		}
	}

	pub fn merge(&mut self, other: &Self) {
		self.scopes_updated += other.scopes_updated;
		self.scopes_skipped_locked += other.scopes_skipped_locked;
		self.scopes_skipped_stale += other.scopes_skipped_stale;
		self.scopes_partial += other.scopes_partial;
		self.records_applied += other.records_applied;
		self.records_discarded += other.records_discarded;
	}
}

/// Drains a scope's change records under its lease and folds them into the scope's cache.
pub struct ScopeAggregator {
	nodes: Arc<dyn NodeStore>,
	change_log: Arc<dyn ChangeLog>,
	locks: Arc<dyn LockService>,
	batch_size: usize,
	lease: Duration,
}
impl ScopeAggregator {
	pub fn new(
		nodes: Arc<dyn NodeStore>,
		change_log: Arc<dyn ChangeLog>,
		locks: Arc<dyn LockService>,
		batch_size: usize,
		lease: Duration,
	) -> Self {
		Self { nodes, change_log, locks, batch_size: batch_size.max(1), lease }
	}

	pub fn batch_size(&self) -> usize {
		self.batch_size
	}

	pub async fn aggregate(&self, scopes: &[NodeRef]) -> Result<AggregationReport> {
		let mut report = AggregationReport::default();

		for scope in scopes {
			report.record(self.aggregate_scope(scope).await?);
		}

		tracing::debug!(
			scopes = scopes.len(),
			updated = report.scopes_updated,
			locked = report.scopes_skipped_locked,
			records = report.records_applied,
			"Tag scope aggregation finished."
		);

		Ok(report)
	}

	/// Runs one lease-guarded drain of `scope`.
	pub async fn aggregate_scope(&self, scope: &NodeRef) -> Result<ScopeOutcome> {
		let key = lease::lock_key(scope);
		let token = match self.locks.try_acquire(&key, self.lease).await? {
			LockAttempt::Acquired(token) => token,
			LockAttempt::Denied => {
				tracing::debug!(scope = %scope, "Tag scope is locked by another aggregator.");

				return Ok(ScopeOutcome::Locked);
			},
		};
		// Stop writing while a fifth of the lease is still left.
		let deadline = Instant::now() + (self.lease - self.lease / 5);
		let guard = LeaseGuard::new(self.locks.clone(), token);
		let result = self.drain(scope, deadline).await;

		guard.release().await;

		result.map_err(|err| {
			tracing::error!(scope = %scope, error = %err, "Tag scope aggregation failed.");

			if matches!(err, Error::Aggregation { .. }) {
				err
			} else {
				Error::Aggregation { scope: scope.to_string(), message: err.to_string() }
			}
		})
	}

	/// Aggregates a scope known only by its change log key.
	pub async fn aggregate_key(&self, scope_key: &str) -> Result<ScopeOutcome> {
		match scope_key.parse::<NodeRef>() {
			Ok(scope) => self.aggregate_scope(&scope).await,
			Err(err) => {
				tracing::warn!(
					scope = scope_key,
					error = %err,
					"Change records target an unreadable node reference; discarding them."
				);

				let records_discarded = self.discard_all(scope_key).await?;

				Ok(ScopeOutcome::Stale { records_discarded })
			},
		}
	}

	async fn drain(&self, scope: &NodeRef, deadline: Instant) -> Result<ScopeOutcome> {
		let scope_key = scope.to_string();

		if self.is_stale(scope).await? {
			tracing::debug!(scope = %scope, "Tag scope no longer exists; discarding its records.");

			let records_discarded = self.discard_all(&scope_key).await?;

			return Ok(ScopeOutcome::Stale { records_discarded });
		}

		let mut records_applied = 0;
		let mut records_discarded = 0;

		loop {
			let batch = self.change_log.query_by_node(&scope_key, self.batch_size).await?;

			if batch.is_empty() {
				break;
			}

			let mut merged = TagChanges::new();
			let mut change_ids = Vec::with_capacity(batch.len());
			let mut batch_applied = 0;

			for record in &batch {
				change_ids.push(record.change_id);

				match decode_record(&scope_key, record) {
					Ok(changes) => {
						delta::merge_changes(&mut merged, &changes);

						batch_applied += 1;
					},
					Err(message) => handle_change_entry_error(record, &message),
				}
			}

			if Instant::now() >= deadline {
				tracing::warn!(
					scope = %scope,
					records_applied,
					"Tag scope lease is running out; leaving the backlog to the next pass."
				);

				return Ok(ScopeOutcome::Partial { records_applied, records_discarded });
			}

			self.write_cache(scope, &merged).await?;
			self.acknowledge(&scope_key, &change_ids).await?;

			records_applied += batch_applied;
			records_discarded += batch.len() - batch_applied;
		}

		Ok(ScopeOutcome::Updated { records_applied, records_discarded })
	}

	async fn is_stale(&self, scope: &NodeRef) -> Result<bool> {
		let system = AccessContext::system();

		Ok(!self.nodes.exists(&system, scope).await?
			|| !self.nodes.has_aspect(&system, scope, Aspect::TagScope).await?)
	}

	async fn write_cache(&self, scope: &NodeRef, merged: &TagChanges) -> Result<()> {
		if merged.values().all(|net| *net == 0) {
			return Ok(());
		}

		let raw = self.nodes.read_tag_cache(scope).await?;
		let mut tags = raw.as_deref().map(read_tag_details).unwrap_or_default();

		apply_tag_changes(&mut tags, merged);

		let serialized = (!tags.is_empty()).then(|| tag_details_to_string(&tags));

		self.nodes.write_tag_cache(scope, serialized.as_deref()).await?;

		Ok(())
	}

	async fn discard_all(&self, scope_key: &str) -> Result<usize> {
		let mut discarded = 0;

		loop {
			let batch = self.change_log.query_by_node(scope_key, self.batch_size).await?;

			if batch.is_empty() {
				return Ok(discarded);
			}

			let change_ids: Vec<i64> = batch.iter().map(|record| record.change_id).collect();

			self.acknowledge(scope_key, &change_ids).await?;

			discarded += change_ids.len();
		}
	}

	async fn acknowledge(&self, scope_key: &str, change_ids: &[i64]) -> Result<()> {
		let cleared = self.change_log.clear(change_ids).await?;

		// Nothing cleared means the same batch would come back forever.
		if cleared == 0 {
			return Err(Error::Aggregation {
				scope: scope_key.to_string(),
				message: format!("Change log did not acknowledge {} record(s).", change_ids.len()),
			});
		}

		Ok(())
	}
}

fn decode_record(scope_key: &str, record: &ChangeRecord) -> Result<TagChanges, String> {
	if record.node != scope_key {
		return Err(format!("Record targets {} instead of {scope_key}.", record.node));
	}

	delta::changes_from_json(&record.tags)
}

fn handle_change_entry_error(record: &ChangeRecord, message: &str) {
	tracing::warn!(
		change_id = record.change_id,
		node = %record.node,
		error = message,
		"Skipping malformed tag scope change record."
	);
}
