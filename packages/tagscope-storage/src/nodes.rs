use std::collections::BTreeSet;

use sqlx::PgExecutor;
use uuid::Uuid;

use tagscope_domain::{Aspect, NodeRef, StoreRef, Tag};

use crate::{AccessContext, BoxFuture, Error, NodeStore, Result, db::Db, models::TagRow};

const TAG_COLUMNS: &str = "tag_id, store_protocol, store_identifier, name";

pub async fn create_node(
	db: &Db,
	store: &StoreRef,
	parent: Option<&NodeRef>,
	aspects: &[Aspect],
) -> Result<NodeRef> {
	let node = NodeRef::generate(store);
	let mut tx = db.pool.begin().await?;

	if let Some(parent) = parent {
		require_node(&mut *tx, parent).await?;
	}

	sqlx::query(
		"\
INSERT INTO tag_store_nodes (node_id, store_protocol, store_identifier, parent_id)
VALUES ($1,$2,$3,$4)",
	)
	.bind(node.id)
	.bind(store.protocol.as_str())
	.bind(store.identifier.as_str())
	.bind(parent.map(|parent| parent.id))
	.execute(&mut *tx)
	.await?;

	for aspect in aspects {
		insert_aspect(&mut *tx, &node, *aspect).await?;
	}

	tx.commit().await?;

	Ok(node)
}

/// Re-parents `node` and returns the parent it had before the move.
pub async fn move_node(db: &Db, node: &NodeRef, new_parent: &NodeRef) -> Result<Option<NodeRef>> {
	let mut tx = db.pool.begin().await?;

	require_node(&mut *tx, new_parent).await?;

	let old_parent: Option<Option<Uuid>> =
		sqlx::query_scalar("SELECT parent_id FROM tag_store_nodes WHERE node_id = $1 FOR UPDATE")
			.bind(node.id)
			.fetch_optional(&mut *tx)
			.await?;
	let Some(old_parent) = old_parent else {
		return Err(Error::NotFound(format!("Node {node} does not exist.")));
	};
	let cycle: bool = sqlx::query_scalar(
		"\
WITH RECURSIVE ancestry AS (
	SELECT node_id, parent_id FROM tag_store_nodes WHERE node_id = $1
	UNION ALL
	SELECT n.node_id, n.parent_id
	FROM tag_store_nodes n
	JOIN ancestry a ON n.node_id = a.parent_id
)
SELECT EXISTS (SELECT 1 FROM ancestry WHERE node_id = $2)",
	)
	.bind(new_parent.id)
	.bind(node.id)
	.fetch_one(&mut *tx)
	.await?;

	if cycle {
		return Err(Error::InvalidArgument(format!(
			"Cannot move {node} below its own descendant {new_parent}."
		)));
	}

	sqlx::query("UPDATE tag_store_nodes SET parent_id = $1, updated_at = now() WHERE node_id = $2")
		.bind(new_parent.id)
		.bind(node.id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(old_parent.map(|id| NodeRef::new(node.store.clone(), id)))
}

/// Deletes `node`; descendants go with it through the parent foreign key.
pub async fn delete_node<'e, E>(executor: E, node: &NodeRef) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM tag_store_nodes WHERE node_id = $1")
		.bind(node.id)
		.execute(executor)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("Node {node} does not exist.")));
	}

	Ok(())
}

pub async fn node_exists<'e, E>(executor: E, node: &NodeRef) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let exists = sqlx::query_scalar(
		"\
SELECT EXISTS (
	SELECT 1
	FROM tag_store_nodes
	WHERE node_id = $1 AND store_protocol = $2 AND store_identifier = $3
)",
	)
	.bind(node.id)
	.bind(node.store.protocol.as_str())
	.bind(node.store.identifier.as_str())
	.fetch_one(executor)
	.await?;

	Ok(exists)
}

pub async fn has_aspect<'e, E>(executor: E, node: &NodeRef, aspect: Aspect) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let present = sqlx::query_scalar(
		"SELECT EXISTS (SELECT 1 FROM tag_store_node_aspects WHERE node_id = $1 AND aspect = $2)",
	)
	.bind(node.id)
	.bind(aspect.as_str())
	.fetch_one(executor)
	.await?;

	Ok(present)
}

pub async fn primary_parent<'e, E>(executor: E, node: &NodeRef) -> Result<Option<NodeRef>>
where
	E: PgExecutor<'e>,
{
	let parent: Option<Option<Uuid>> =
		sqlx::query_scalar("SELECT parent_id FROM tag_store_nodes WHERE node_id = $1")
			.bind(node.id)
			.fetch_optional(executor)
			.await?;

	Ok(parent.flatten().map(|id| NodeRef::new(node.store.clone(), id)))
}

pub async fn children<'e, E>(executor: E, node: &NodeRef) -> Result<Vec<NodeRef>>
where
	E: PgExecutor<'e>,
{
	let ids: Vec<Uuid> = sqlx::query_scalar(
		"SELECT node_id FROM tag_store_nodes WHERE parent_id = $1 ORDER BY node_id",
	)
	.bind(node.id)
	.fetch_all(executor)
	.await?;

	Ok(ids.into_iter().map(|id| NodeRef::new(node.store.clone(), id)).collect())
}

pub async fn node_tags(db: &Db, node: &NodeRef) -> Result<Vec<Tag>> {
	let mut conn = db.pool.acquire().await?;

	require_node(&mut *conn, node).await?;

	let rows = sqlx::query_as::<_, TagRow>(
		"\
SELECT t.tag_id, t.store_protocol, t.store_identifier, t.name
FROM tag_store_node_tags nt
JOIN tag_store_tags t ON t.tag_id = nt.tag_id
WHERE nt.node_id = $1
ORDER BY nt.position ASC",
	)
	.bind(node.id)
	.fetch_all(&mut *conn)
	.await?;

	Ok(rows.into_iter().map(TagRow::into_tag).collect())
}

pub async fn set_node_tags(db: &Db, node: &NodeRef, tags: &[NodeRef]) -> Result<()> {
	let mut tx = db.pool.begin().await?;

	require_node(&mut *tx, node).await?;

	sqlx::query("DELETE FROM tag_store_node_tags WHERE node_id = $1")
		.bind(node.id)
		.execute(&mut *tx)
		.await?;

	let mut seen = BTreeSet::new();
	let mut position: i32 = 0;

	for tag in tags.iter().filter(|tag| seen.insert(tag.id)) {
		if get_tag(&mut *tx, tag).await?.is_none() {
			return Err(Error::NotFound(format!("Tag {tag} does not exist.")));
		}

		sqlx::query(
			"INSERT INTO tag_store_node_tags (node_id, tag_id, position) VALUES ($1,$2,$3)",
		)
		.bind(node.id)
		.bind(tag.id)
		.bind(position)
		.execute(&mut *tx)
		.await?;

		position += 1;
	}

	tx.commit().await?;

	Ok(())
}

pub async fn find_tag<'e, E>(executor: E, store: &StoreRef, name: &str) -> Result<Option<Tag>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, TagRow>(&format!(
		"\
SELECT {TAG_COLUMNS}
FROM tag_store_tags
WHERE store_protocol = $1 AND store_identifier = $2 AND name = $3"
	))
	.bind(store.protocol.as_str())
	.bind(store.identifier.as_str())
	.bind(name)
	.fetch_optional(executor)
	.await?;

	Ok(row.map(TagRow::into_tag))
}

pub async fn get_tag<'e, E>(executor: E, tag: &NodeRef) -> Result<Option<Tag>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, TagRow>(&format!(
		"SELECT {TAG_COLUMNS} FROM tag_store_tags WHERE tag_id = $1"
	))
	.bind(tag.id)
	.fetch_optional(executor)
	.await?;

	Ok(row.map(TagRow::into_tag))
}

pub async fn create_tag(db: &Db, store: &StoreRef, name: &str) -> Result<Tag> {
	let mut tx = db.pool.begin().await?;

	sqlx::query(
		"\
INSERT INTO tag_store_tags (tag_id, store_protocol, store_identifier, name)
VALUES ($1,$2,$3,$4)
ON CONFLICT (store_protocol, store_identifier, name) DO NOTHING",
	)
	.bind(Uuid::new_v4())
	.bind(store.protocol.as_str())
	.bind(store.identifier.as_str())
	.bind(name)
	.execute(&mut *tx)
	.await?;

	let tag = find_tag(&mut *tx, store, name)
		.await?
		.ok_or_else(|| Error::NotFound(format!("Tag {name:?} vanished after insert.")))?;

	tx.commit().await?;

	Ok(tag)
}

pub async fn rename_tag(db: &Db, tag: &NodeRef, name: &str) -> Result<()> {
	let mut tx = db.pool.begin().await?;

	if let Some(existing) = find_tag(&mut *tx, &tag.store, name).await?
		&& existing.node_ref != *tag
	{
		return Err(Error::Conflict(format!("Tag {name:?} already exists.")));
	}

	let result = sqlx::query("UPDATE tag_store_tags SET name = $1 WHERE tag_id = $2")
		.bind(name)
		.bind(tag.id)
		.execute(&mut *tx)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("Tag {tag} does not exist.")));
	}

	tx.commit().await?;

	Ok(())
}

pub async fn delete_tag<'e, E>(executor: E, tag: &NodeRef) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM tag_store_tags WHERE tag_id = $1")
		.bind(tag.id)
		.execute(executor)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("Tag {tag} does not exist.")));
	}

	Ok(())
}

pub async fn list_tags<'e, E>(executor: E, store: &StoreRef) -> Result<Vec<Tag>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, TagRow>(&format!(
		"\
SELECT {TAG_COLUMNS}
FROM tag_store_tags
WHERE store_protocol = $1 AND store_identifier = $2
ORDER BY name ASC"
	))
	.bind(store.protocol.as_str())
	.bind(store.identifier.as_str())
	.fetch_all(executor)
	.await?;

	Ok(rows.into_iter().map(TagRow::into_tag).collect())
}

pub async fn find_tagged_nodes<'e, E>(
	executor: E,
	store: &StoreRef,
	tag: &NodeRef,
	under: Option<&NodeRef>,
) -> Result<Vec<NodeRef>>
where
	E: PgExecutor<'e>,
{
	let ids: Vec<Uuid> = sqlx::query_scalar(
		"\
WITH RECURSIVE subtree AS (
	SELECT node_id FROM tag_store_nodes WHERE node_id = $4
	UNION ALL
	SELECT n.node_id
	FROM tag_store_nodes n
	JOIN subtree s ON n.parent_id = s.node_id
)
SELECT n.node_id
FROM tag_store_nodes n
JOIN tag_store_node_tags nt ON nt.node_id = n.node_id
JOIN tag_store_node_aspects a ON a.node_id = n.node_id AND a.aspect = 'taggable'
WHERE nt.tag_id = $1
	AND n.store_protocol = $2
	AND n.store_identifier = $3
	AND ($4::uuid IS NULL OR n.node_id IN (SELECT node_id FROM subtree))
ORDER BY n.node_id",
	)
	.bind(tag.id)
	.bind(store.protocol.as_str())
	.bind(store.identifier.as_str())
	.bind(under.map(|node| node.id))
	.fetch_all(executor)
	.await?;

	Ok(ids.into_iter().map(|id| NodeRef::new(store.clone(), id)).collect())
}

pub async fn read_tag_cache<'e, E>(executor: E, node: &NodeRef) -> Result<Option<String>>
where
	E: PgExecutor<'e>,
{
	let cache: Option<Option<String>> =
		sqlx::query_scalar("SELECT tag_cache FROM tag_store_nodes WHERE node_id = $1")
			.bind(node.id)
			.fetch_optional(executor)
			.await?;
	let Some(cache) = cache else {
		return Err(Error::NotFound(format!("Node {node} does not exist.")));
	};

	Ok(cache)
}

pub async fn write_tag_cache<'e, E>(executor: E, node: &NodeRef, cache: Option<&str>) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"UPDATE tag_store_nodes SET tag_cache = $1, updated_at = now() WHERE node_id = $2",
	)
	.bind(cache)
	.bind(node.id)
	.execute(executor)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("Node {node} does not exist.")));
	}

	Ok(())
}

async fn set_aspect(db: &Db, node: &NodeRef, aspect: Aspect, present: bool) -> Result<()> {
	let mut conn = db.pool.acquire().await?;

	require_node(&mut *conn, node).await?;

	if present {
		insert_aspect(&mut *conn, node, aspect).await?;
	} else {
		sqlx::query("DELETE FROM tag_store_node_aspects WHERE node_id = $1 AND aspect = $2")
			.bind(node.id)
			.bind(aspect.as_str())
			.execute(&mut *conn)
			.await?;
	}

	Ok(())
}

async fn insert_aspect<'e, E>(executor: E, node: &NodeRef, aspect: Aspect) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"INSERT INTO tag_store_node_aspects (node_id, aspect) VALUES ($1,$2) ON CONFLICT DO NOTHING",
	)
	.bind(node.id)
	.bind(aspect.as_str())
	.execute(executor)
	.await?;

	Ok(())
}

async fn require_node<'e, E>(executor: E, node: &NodeRef) -> Result<()>
where
	E: PgExecutor<'e>,
{
	if !node_exists(executor, node).await? {
		return Err(Error::NotFound(format!("Node {node} does not exist.")));
	}

	Ok(())
}

impl NodeStore for Db {
	fn exists<'a>(
		&'a self,
		_access: &'a AccessContext,
		node: &'a NodeRef,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(node_exists(&self.pool, node))
	}

	fn has_aspect<'a>(
		&'a self,
		_access: &'a AccessContext,
		node: &'a NodeRef,
		aspect: Aspect,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(has_aspect(&self.pool, node, aspect))
	}

	fn add_aspect<'a>(&'a self, node: &'a NodeRef, aspect: Aspect) -> BoxFuture<'a, Result<()>> {
		Box::pin(set_aspect(self, node, aspect, true))
	}

	fn remove_aspect<'a>(&'a self, node: &'a NodeRef, aspect: Aspect) -> BoxFuture<'a, Result<()>> {
		Box::pin(set_aspect(self, node, aspect, false))
	}

	fn primary_parent<'a>(
		&'a self,
		_access: &'a AccessContext,
		node: &'a NodeRef,
	) -> BoxFuture<'a, Result<Option<NodeRef>>> {
		Box::pin(primary_parent(&self.pool, node))
	}

	fn children<'a>(
		&'a self,
		_access: &'a AccessContext,
		node: &'a NodeRef,
	) -> BoxFuture<'a, Result<Vec<NodeRef>>> {
		Box::pin(children(&self.pool, node))
	}

	fn node_tags<'a>(&'a self, node: &'a NodeRef) -> BoxFuture<'a, Result<Vec<Tag>>> {
		Box::pin(node_tags(self, node))
	}

	fn set_node_tags<'a>(
		&'a self,
		node: &'a NodeRef,
		tags: &'a [NodeRef],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(set_node_tags(self, node, tags))
	}

	fn find_tag<'a>(
		&'a self,
		store: &'a StoreRef,
		name: &'a str,
	) -> BoxFuture<'a, Result<Option<Tag>>> {
		Box::pin(find_tag(&self.pool, store, name))
	}

	fn get_tag<'a>(&'a self, tag: &'a NodeRef) -> BoxFuture<'a, Result<Option<Tag>>> {
		Box::pin(get_tag(&self.pool, tag))
	}

	fn create_tag<'a>(&'a self, store: &'a StoreRef, name: &'a str) -> BoxFuture<'a, Result<Tag>> {
		Box::pin(create_tag(self, store, name))
	}

	fn rename_tag<'a>(&'a self, tag: &'a NodeRef, name: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(rename_tag(self, tag, name))
	}

	fn delete_tag<'a>(&'a self, tag: &'a NodeRef) -> BoxFuture<'a, Result<()>> {
		Box::pin(delete_tag(&self.pool, tag))
	}

	fn list_tags<'a>(&'a self, store: &'a StoreRef) -> BoxFuture<'a, Result<Vec<Tag>>> {
		Box::pin(list_tags(&self.pool, store))
	}

	fn find_tagged_nodes<'a>(
		&'a self,
		store: &'a StoreRef,
		tag: &'a NodeRef,
		under: Option<&'a NodeRef>,
	) -> BoxFuture<'a, Result<Vec<NodeRef>>> {
		Box::pin(find_tagged_nodes(&self.pool, store, tag, under))
	}

	fn read_tag_cache<'a>(&'a self, node: &'a NodeRef) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(read_tag_cache(&self.pool, node))
	}

	fn write_tag_cache<'a>(
		&'a self,
		node: &'a NodeRef,
		cache: Option<&'a str>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(write_tag_cache(&self.pool, node, cache))
	}
}
