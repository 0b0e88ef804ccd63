use std::time::Duration;

use color_eyre::Result;
use tokio::time;

use tagscope_config::Sweep;
use tagscope_service::{SweepReport, TaggingService};

pub struct WorkerState {
	pub service: TaggingService,
	pub sweep: Sweep,
}

/// Sweeps forever. A failed sweep is logged and retried on the next tick.
pub async fn run_worker(state: WorkerState) -> Result<()> {
	let interval = Duration::from_secs(state.sweep.interval_seconds);

	tracing::info!(
		interval_seconds = state.sweep.interval_seconds,
		run_on_start = state.sweep.run_on_start,
		dispatch = ?state.service.dispatch,
		"Tag scope worker started."
	);

	if !state.sweep.run_on_start {
		time::sleep(interval).await;
	}

	loop {
		if let Err(err) = sweep_once(&state).await {
			tracing::error!(error = %err, "Tag scope recovery sweep failed.");
		}

		time::sleep(interval).await;
	}
}

pub async fn sweep_once(state: &WorkerState) -> Result<SweepReport> {
	let report = state.service.sweep().await?;

	if report.scopes_failed > 0 {
		tracing::warn!(
			failed = report.scopes_failed,
			handled = report.scopes_handled,
			"Some tag scopes kept their change records."
		);
	}

	Ok(report)
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use tagscope_config::Aggregation;
	use tagscope_domain::{Aspect, StoreRef};
	use tagscope_service::Backends;
	use tagscope_storage::{
		NodeStore,
		memory::{MemoryChangeLog, MemoryLockService, MemoryNodeStore},
	};

	use super::*;

	#[tokio::test]
	async fn sweep_once_drains_deferred_records() {
		let nodes = Arc::new(MemoryNodeStore::new());
		let change_log = Arc::new(MemoryChangeLog::new());
		let backends = Backends::memory(
			nodes.clone(),
			change_log.clone(),
			Arc::new(MemoryLockService::new()),
		);
		let aggregation = Aggregation { dispatch: "deferred".to_string(), ..Default::default() };
		let service = TaggingService::new(backends, &aggregation).expect("Failed to build service.");
		let store = StoreRef::default();
		let scope = nodes
			.create_node(&store, None, &[Aspect::TagScope])
			.await
			.expect("Failed to create scope.");
		let doc = nodes.create_node(&store, Some(&scope), &[]).await.expect("Failed to create node.");
		let mut tx = service.begin();

		service.add_tag(&mut tx, &doc, "alpha").await.expect("Failed to add tag.");
		tx.commit().await.expect("Failed to commit.");

		let state = WorkerState { service, sweep: Sweep::default() };
		let report = sweep_once(&state).await.expect("Failed to sweep.");

		assert_eq!(report.scopes_handled, 1);
		assert!(change_log.is_empty().await);
		assert_eq!(
			nodes.read_tag_cache(&scope).await.expect("Failed to read cache.").as_deref(),
			Some("alpha|1")
		);
	}
}
