use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use tagscope_domain::{NodeRef, StoreRef, Tag};

/// Privilege used for store reads.
///
/// Ancestor walks run as [`AccessContext::system`] because the caller may not be allowed to read
/// the containers above its own node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AccessContext {
	System,
	User(String),
}
impl AccessContext {
	pub fn system() -> Self {
		Self::System
	}

	pub fn user(name: impl Into<String>) -> Self {
		Self::User(name.into())
	}
}

/// A queued change record as it sits in the change log.
///
/// `tags` is kept raw so the consumer can report a malformed payload instead of failing the
/// whole query.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct ChangeRecord {
	pub change_id: i64,
	pub node: String,
	pub tags: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewChangeRecord {
	pub node: String,
	pub tags: Value,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct LockRow {
	pub lock_key: String,
	pub token: Uuid,
	pub expires_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LockToken {
	pub key: String,
	pub token: Uuid,
	pub lease: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockAttempt {
	Acquired(LockToken),
	Denied,
}
impl LockAttempt {
	pub fn is_acquired(&self) -> bool {
		matches!(self, Self::Acquired(_))
	}
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct TagRow {
	pub tag_id: Uuid,
	pub store_protocol: String,
	pub store_identifier: String,
	pub name: String,
}
impl TagRow {
	pub fn into_tag(self) -> Tag {
		Tag {
			node_ref: NodeRef::new(StoreRef::new(self.store_protocol, self.store_identifier), self.tag_id),
			name: self.name,
		}
	}
}
