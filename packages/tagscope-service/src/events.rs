//! Typed node-event dispatch.
//!
//! The host repository fires these around structural operations; each kind maps to an ordered list
//! of handlers that run inside the caller's [`Transaction`].

use std::{collections::BTreeMap, sync::Arc};

use tagscope_domain::NodeRef;

use crate::{BoxFuture, Result, transaction::Transaction};

/// A parent-child link as it was when the event was raised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildAssoc {
	pub parent: NodeRef,
	pub child: NodeRef,
	pub is_primary: bool,
}
impl ChildAssoc {
	pub fn primary(parent: NodeRef, child: NodeRef) -> Self {
		Self { parent, child, is_primary: true }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeEventKind {
	OnCreateNode,
	OnUpdateProperties,
	BeforeDeleteNode,
	OnMoveNode,
	BeforeCopy,
	OnCopyComplete,
	AfterCheckOut,
}
impl NodeEventKind {
	pub const ALL: [Self; 7] = [
		Self::OnCreateNode,
		Self::OnUpdateProperties,
		Self::BeforeDeleteNode,
		Self::OnMoveNode,
		Self::BeforeCopy,
		Self::OnCopyComplete,
		Self::AfterCheckOut,
	];
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeEvent {
	OnCreateNode {
		node: NodeRef,
	},
	/// `before` and `after` are the node's tag references around the property write.
	OnUpdateProperties {
		node: NodeRef,
		before: Vec<NodeRef>,
		after: Vec<NodeRef>,
	},
	BeforeDeleteNode {
		node: NodeRef,
	},
	OnMoveNode {
		old: ChildAssoc,
		new: ChildAssoc,
	},
	/// `target` is about to be overwritten with the content of `source`.
	BeforeCopy {
		source: NodeRef,
		target: NodeRef,
	},
	OnCopyComplete {
		source: NodeRef,
		target: NodeRef,
	},
	AfterCheckOut {
		working_copy: NodeRef,
	},
}
impl NodeEvent {
	pub fn kind(&self) -> NodeEventKind {
		match self {
			Self::OnCreateNode { .. } => NodeEventKind::OnCreateNode,
			Self::OnUpdateProperties { .. } => NodeEventKind::OnUpdateProperties,
			Self::BeforeDeleteNode { .. } => NodeEventKind::BeforeDeleteNode,
			Self::OnMoveNode { .. } => NodeEventKind::OnMoveNode,
			Self::BeforeCopy { .. } => NodeEventKind::BeforeCopy,
			Self::OnCopyComplete { .. } => NodeEventKind::OnCopyComplete,
			Self::AfterCheckOut { .. } => NodeEventKind::AfterCheckOut,
		}
	}
}

pub trait NodeEventHandler
where
	Self: Send + Sync,
{
	fn handle<'a>(
		&'a self,
		tx: &'a mut Transaction,
		event: &'a NodeEvent,
	) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone, Default)]
pub struct EventDispatcher {
	handlers: BTreeMap<NodeEventKind, Vec<Arc<dyn NodeEventHandler>>>,
}
impl EventDispatcher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `handler` to the list for `kind`. Handlers run in registration order.
	pub fn register(&mut self, kind: NodeEventKind, handler: Arc<dyn NodeEventHandler>) {
		self.handlers.entry(kind).or_default().push(handler);
	}

	pub fn handler_count(&self, kind: NodeEventKind) -> usize {
		self.handlers.get(&kind).map_or(0, Vec::len)
	}

	/// Stops at the first failing handler.
	pub async fn dispatch(&self, tx: &mut Transaction, event: &NodeEvent) -> Result<()> {
		let Some(handlers) = self.handlers.get(&event.kind()) else {
			return Ok(());
		};

		for handler in handlers {
			handler.handle(tx, event).await?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use tagscope_domain::StoreRef;

	use super::*;

	struct Recorder {
		label: &'static str,
		seen: Arc<Mutex<Vec<&'static str>>>,
	}
	impl NodeEventHandler for Recorder {
		fn handle<'a>(
			&'a self,
			_tx: &'a mut Transaction,
			_event: &'a NodeEvent,
		) -> BoxFuture<'a, Result<()>> {
			Box::pin(async move {
				self.seen.lock().expect("Recorder lock poisoned.").push(self.label);

				Ok(())
			})
		}
	}

	#[tokio::test]
	async fn handlers_run_in_registration_order_for_their_kind_only() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let mut dispatcher = EventDispatcher::new();

		dispatcher.register(
			NodeEventKind::BeforeDeleteNode,
			Arc::new(Recorder { label: "first", seen: seen.clone() }),
		);
		dispatcher.register(
			NodeEventKind::BeforeDeleteNode,
			Arc::new(Recorder { label: "second", seen: seen.clone() }),
		);
		dispatcher
			.register(NodeEventKind::OnCreateNode, Arc::new(Recorder { label: "create", seen: seen.clone() }));

		let node = NodeRef::generate(&StoreRef::default());
		let mut tx = Transaction::new();

		dispatcher
			.dispatch(&mut tx, &NodeEvent::BeforeDeleteNode { node: node.clone() })
			.await
			.expect("Dispatch must succeed.");
		dispatcher
			.dispatch(&mut tx, &NodeEvent::AfterCheckOut { working_copy: node })
			.await
			.expect("Dispatch must succeed.");

		assert_eq!(*seen.lock().expect("Recorder lock poisoned."), vec!["first", "second"]);
		assert_eq!(dispatcher.handler_count(NodeEventKind::AfterCheckOut), 0);
	}
}
