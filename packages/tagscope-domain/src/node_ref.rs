use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PROTOCOL: &str = "workspace";
pub const DEFAULT_IDENTIFIER: &str = "SpacesStore";

const PROTOCOL_SEPARATOR: &str = "://";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NodeRefError {
	#[error("Node reference {0:?} is missing the protocol separator.")]
	MissingProtocol(String),
	#[error("Node reference {0:?} is missing the node id.")]
	MissingId(String),
	#[error("Node reference {0:?} has an invalid node id.")]
	InvalidId(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreRef {
	pub protocol: String,
	pub identifier: String,
}
impl StoreRef {
	pub fn new(protocol: impl Into<String>, identifier: impl Into<String>) -> Self {
		Self { protocol: protocol.into(), identifier: identifier.into() }
	}
}
impl Default for StoreRef {
	fn default() -> Self {
		Self::new(DEFAULT_PROTOCOL, DEFAULT_IDENTIFIER)
	}
}
impl fmt::Display for StoreRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{PROTOCOL_SEPARATOR}{}", self.protocol, self.identifier)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
	pub store: StoreRef,
	pub id: Uuid,
}
impl NodeRef {
	pub fn new(store: StoreRef, id: Uuid) -> Self {
		Self { store, id }
	}

	pub fn generate(store: &StoreRef) -> Self {
		Self { store: store.clone(), id: Uuid::new_v4() }
	}
}
impl fmt::Display for NodeRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.store, self.id)
	}
}
impl FromStr for NodeRef {
	type Err = NodeRefError;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		let (protocol, rest) = raw
			.split_once(PROTOCOL_SEPARATOR)
			.ok_or_else(|| NodeRefError::MissingProtocol(raw.to_string()))?;
		let (identifier, id) =
			rest.rsplit_once('/').ok_or_else(|| NodeRefError::MissingId(raw.to_string()))?;

		if protocol.is_empty() || identifier.is_empty() || id.is_empty() {
			return Err(NodeRefError::MissingId(raw.to_string()));
		}

		let id = Uuid::parse_str(id).map_err(|_| NodeRefError::InvalidId(raw.to_string()))?;

		Ok(Self { store: StoreRef::new(protocol, identifier), id })
	}
}

/// Markers carried by nodes that the tagging pipeline cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aspect {
	Taggable,
	TagScope,
	WorkingCopy,
}
impl Aspect {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Taggable => "taggable",
			Self::TagScope => "tag_scope",
			Self::WorkingCopy => "working_copy",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"taggable" => Some(Self::Taggable),
			"tag_scope" => Some(Self::TagScope),
			"working_copy" => Some(Self::WorkingCopy),
			_ => None,
		}
	}
}

/// A tag node. Identity is the node reference; the name is the lower-cased label.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
	pub node_ref: NodeRef,
	pub name: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn node_ref_round_trips_through_display() {
		let node = NodeRef::generate(&StoreRef::default());
		let parsed: NodeRef = node.to_string().parse().expect("Rendered node ref must parse.");

		assert_eq!(parsed, node);
		assert!(node.to_string().starts_with("workspace://SpacesStore/"));
	}

	#[test]
	fn node_ref_rejects_malformed_input() {
		assert!(matches!("SpacesStore/abc".parse::<NodeRef>(), Err(NodeRefError::MissingProtocol(_))));
		assert!(matches!("workspace://SpacesStore".parse::<NodeRef>(), Err(NodeRefError::MissingId(_))));
		assert!(matches!(
			"workspace://SpacesStore/not-a-uuid".parse::<NodeRef>(),
			Err(NodeRefError::InvalidId(_))
		));
	}

	#[test]
	fn aspect_names_are_stable() {
		for aspect in [Aspect::Taggable, Aspect::TagScope, Aspect::WorkingCopy] {
			assert_eq!(Aspect::parse(aspect.as_str()), Some(aspect));
		}

		assert_eq!(Aspect::parse("versionable"), None);
	}
}
