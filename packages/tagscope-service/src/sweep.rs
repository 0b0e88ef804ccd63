use std::{collections::HashSet, sync::Arc};

use serde::Serialize;

use tagscope_storage::ChangeLog;

use crate::{
	Result,
	aggregator::{AggregationReport, ScopeAggregator},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
	pub passes: usize,
	pub scopes_handled: usize,
	pub scopes_failed: usize,
	pub aggregation: AggregationReport,
}

/// Finds scopes with outstanding change records and drains them.
///
/// Each scope is attempted at most once per run, so a scope whose lease is held elsewhere cannot
/// keep the sweep looping.
pub struct RecoverySweep {
	change_log: Arc<dyn ChangeLog>,
	aggregator: Arc<ScopeAggregator>,
	query_limit: usize,
}
impl RecoverySweep {
	pub fn new(
		change_log: Arc<dyn ChangeLog>,
		aggregator: Arc<ScopeAggregator>,
		batch_multiplier: usize,
	) -> Self {
		let query_limit = aggregator.batch_size().saturating_mul(batch_multiplier.max(1));

		Self { change_log, aggregator, query_limit }
	}

	pub async fn run(&self) -> Result<SweepReport> {
		let mut report = SweepReport::default();
		let mut handled = HashSet::new();

		loop {
			let pending = self.change_log.list_pending_nodes(self.query_limit).await?;

			if pending.is_empty() {
				break;
			}

			report.passes += 1;

			let fresh: Vec<String> =
				pending.into_iter().filter(|scope| !handled.contains(scope)).collect();

			if fresh.is_empty() {
				tracing::debug!(
					passes = report.passes,
					"Only already handled tag scopes have records left."
				);

				break;
			}

			for scope in fresh {
				handled.insert(scope.clone());

				report.scopes_handled += 1;

				match self.aggregator.aggregate_key(&scope).await {
					Ok(outcome) => report.aggregation.record(outcome),
					Err(err) => {
						report.scopes_failed += 1;

						tracing::error!(scope = %scope, error = %err, "Recovery sweep could not drain tag scope.");
					},
				}
			}
		}

		tracing::info!(
			passes = report.passes,
			scopes = report.scopes_handled,
			failed = report.scopes_failed,
			records = report.aggregation.records_applied,
			"Tag scope recovery sweep finished."
		);

		Ok(report)
	}
}
