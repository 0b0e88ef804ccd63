pub mod aggregator;
pub mod events;
pub mod lease;
pub mod query;
pub mod refresh;
pub mod resolver;
pub mod sweep;
pub mod tracker;
pub mod transaction;

mod error;

pub use aggregator::{AggregationReport, ScopeAggregator, ScopeOutcome};
pub use error::{Error, Result};
pub use events::{ChildAssoc, EventDispatcher, NodeEvent, NodeEventHandler, NodeEventKind};
pub use refresh::RefreshOutcome;
pub use resolver::ScopeResolver;
pub use sweep::{RecoverySweep, SweepReport};
pub use tracker::{ScopeChangeHook, TagTracker, TrackerEvents};
pub use transaction::{CommitSummary, QueuedChange, Transaction, TransactionListener};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use tagscope_domain::{NodeRef, PagingRequest, PagingResults, StoreRef, Tag};
use tagscope_storage::{
	ChangeLog, LockService, NodeStore,
	db::Db,
	memory::{MemoryChangeLog, MemoryLockService, MemoryNodeStore},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// When a commit's touched scopes get aggregated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
	/// Spawned on the runtime; `commit` returns immediately.
	Background,
	/// Awaited before `commit` returns.
	Inline,
	/// Left for the recovery sweep.
	Deferred,
}
impl Dispatch {
	pub fn parse(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			tagscope_config::DISPATCH_BACKGROUND => Ok(Self::Background),
			tagscope_config::DISPATCH_INLINE => Ok(Self::Inline),
			tagscope_config::DISPATCH_DEFERRED => Ok(Self::Deferred),
			other => Err(Error::InvalidRequest {
				message: format!("Unknown aggregation dispatch mode {other:?}."),
			}),
		}
	}
}

/// The node store, change log and lease service the pipeline runs against.
#[derive(Clone)]
pub struct Backends {
	pub nodes: Arc<dyn NodeStore>,
	pub change_log: Arc<dyn ChangeLog>,
	pub locks: Arc<dyn LockService>,
}
impl Backends {
	pub fn postgres(db: Db) -> Self {
		let db = Arc::new(db);

		Self { nodes: db.clone(), change_log: db.clone(), locks: db }
	}

	pub fn memory(
		nodes: Arc<MemoryNodeStore>,
		change_log: Arc<MemoryChangeLog>,
		locks: Arc<MemoryLockService>,
	) -> Self {
		Self { nodes, change_log, locks }
	}
}

pub struct TaggingService {
	pub backends: Backends,
	pub dispatch: Dispatch,
	resolver: ScopeResolver,
	tracker: Arc<TagTracker>,
	aggregator: Arc<ScopeAggregator>,
	sweep: RecoverySweep,
	events: EventDispatcher,
	lease: Duration,
}
impl TaggingService {
	pub fn new(backends: Backends, cfg: &tagscope_config::Aggregation) -> Result<Self> {
		let dispatch = Dispatch::parse(&cfg.dispatch)?;
		let batch_size = usize::try_from(cfg.batch_size).unwrap_or(usize::MAX);
		let multiplier = usize::try_from(cfg.sweep_batch_multiplier).unwrap_or(usize::MAX);
		let lease = Duration::from_millis(cfg.lock_lease_ms);
		let resolver = ScopeResolver::new(backends.nodes.clone());
		let aggregator = Arc::new(ScopeAggregator::new(
			backends.nodes.clone(),
			backends.change_log.clone(),
			backends.locks.clone(),
			batch_size,
			lease,
		));
		let hook = Arc::new(ScopeChangeHook::new(
			backends.nodes.clone(),
			resolver.clone(),
			backends.change_log.clone(),
			aggregator.clone(),
			dispatch,
		));
		let tracker = Arc::new(TagTracker::new(backends.nodes.clone(), resolver.clone(), hook));
		let sweep = RecoverySweep::new(backends.change_log.clone(), aggregator.clone(), multiplier);
		let mut events = EventDispatcher::new();
		let handler = Arc::new(TrackerEvents::new(tracker.clone()));

		for kind in NodeEventKind::ALL {
			events.register(kind, handler.clone());
		}

		Ok(Self { backends, dispatch, resolver, tracker, aggregator, sweep, events, lease })
	}

	pub fn begin(&self) -> Transaction {
		Transaction::new()
	}

	pub fn tracker(&self) -> &TagTracker {
		&self.tracker
	}

	pub fn aggregator(&self) -> &ScopeAggregator {
		&self.aggregator
	}

	pub fn resolver(&self) -> &ScopeResolver {
		&self.resolver
	}

	/// Extra handlers run after the tracker's for the same event kind.
	pub fn events_mut(&mut self) -> &mut EventDispatcher {
		&mut self.events
	}

	/// Delivers a structural node event to the registered handlers.
	pub async fn fire(&self, tx: &mut Transaction, event: &NodeEvent) -> Result<()> {
		self.events.dispatch(tx, event).await
	}

	pub async fn create_tag(&self, store: &StoreRef, name: &str) -> Result<Tag> {
		self.tracker.create_tag(store, name).await
	}

	pub async fn add_tag(&self, tx: &mut Transaction, node: &NodeRef, name: &str) -> Result<Tag> {
		self.tracker.add_tag(tx, node, name).await
	}

	pub async fn add_tags(
		&self,
		tx: &mut Transaction,
		node: &NodeRef,
		names: &[&str],
	) -> Result<Vec<(String, Tag)>> {
		self.tracker.add_tags(tx, node, names).await
	}

	pub async fn remove_tag(&self, tx: &mut Transaction, node: &NodeRef, name: &str) -> Result<()> {
		self.tracker.remove_tag(tx, node, name).await
	}

	pub async fn remove_tags(&self, tx: &mut Transaction, node: &NodeRef, names: &[&str]) -> Result<()> {
		self.tracker.remove_tags(tx, node, names).await
	}

	pub async fn set_tags(&self, tx: &mut Transaction, node: &NodeRef, names: &[&str]) -> Result<()> {
		self.tracker.set_tags(tx, node, names).await
	}

	pub async fn clear_tags(&self, tx: &mut Transaction, node: &NodeRef) -> Result<()> {
		self.tracker.clear_tags(tx, node).await
	}

	pub async fn get_tags(&self, node: &NodeRef) -> Result<Vec<String>> {
		self.tracker.get_tags(node).await
	}

	pub async fn get_tags_paged(
		&self,
		node: &NodeRef,
		paging: PagingRequest,
	) -> Result<PagingResults<Tag>> {
		self.tracker.get_tags_paged(node, paging).await
	}

	pub async fn delete_tag(&self, tx: &mut Transaction, store: &StoreRef, name: &str) -> Result<()> {
		self.tracker.delete_tag(tx, store, name).await
	}

	pub async fn change_tag(
		&self,
		tx: &mut Transaction,
		store: &StoreRef,
		existing: &str,
		new: &str,
	) -> Result<Tag> {
		self.tracker.change_tag(tx, &self.events, store, existing, new).await
	}

	pub async fn find_tagged_nodes(
		&self,
		store: &StoreRef,
		name: &str,
		under: Option<&NodeRef>,
	) -> Result<Vec<NodeRef>> {
		self.tracker.find_tagged_nodes(store, name, under).await
	}

	/// Aggregates `scopes` now, whatever the dispatch mode.
	pub async fn aggregate(&self, scopes: &[NodeRef]) -> Result<AggregationReport> {
		self.aggregator.aggregate(scopes).await
	}

	pub async fn sweep(&self) -> Result<SweepReport> {
		self.sweep.run().await
	}
}
