use sqlx::PgExecutor;

use crate::{
	BoxFuture, ChangeLog, Result,
	db::Db,
	models::{ChangeRecord, NewChangeRecord},
};

pub async fn append_changes(db: &Db, records: &[NewChangeRecord]) -> Result<Vec<i64>> {
	let mut tx = db.pool.begin().await?;
	let mut ids = Vec::with_capacity(records.len());

	for record in records {
		let change_id: i64 = sqlx::query_scalar(
			"INSERT INTO tag_scope_changes (node, tags) VALUES ($1,$2) RETURNING change_id",
		)
		.bind(record.node.as_str())
		.bind(&record.tags)
		.fetch_one(&mut *tx)
		.await?;

		ids.push(change_id);
	}

	tx.commit().await?;

	Ok(ids)
}

pub async fn query_changes_by_node<'e, E>(
	executor: E,
	node: &str,
	limit: usize,
) -> Result<Vec<ChangeRecord>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, ChangeRecord>(
		"\
SELECT change_id, node, tags
FROM tag_scope_changes
WHERE node = $1
ORDER BY change_id ASC
LIMIT $2",
	)
	.bind(node)
	.bind(clamp_limit(limit))
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn list_pending_change_nodes<'e, E>(executor: E, limit: usize) -> Result<Vec<String>>
where
	E: PgExecutor<'e>,
{
	let nodes = sqlx::query_scalar(
		"\
SELECT node
FROM tag_scope_changes
GROUP BY node
ORDER BY MIN(change_id) ASC
LIMIT $1",
	)
	.bind(clamp_limit(limit))
	.fetch_all(executor)
	.await?;

	Ok(nodes)
}

pub async fn clear_changes<'e, E>(executor: E, change_ids: &[i64]) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	if change_ids.is_empty() {
		return Ok(0);
	}

	let result = sqlx::query("DELETE FROM tag_scope_changes WHERE change_id = ANY($1)")
		.bind(change_ids)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

fn clamp_limit(limit: usize) -> i64 {
	i64::try_from(limit).unwrap_or(i64::MAX)
}

impl ChangeLog for Db {
	fn append<'a>(&'a self, records: &'a [NewChangeRecord]) -> BoxFuture<'a, Result<Vec<i64>>> {
		Box::pin(append_changes(self, records))
	}

	fn query_by_node<'a>(
		&'a self,
		node: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<ChangeRecord>>> {
		Box::pin(query_changes_by_node(&self.pool, node, limit))
	}

	fn list_pending_nodes<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(list_pending_change_nodes(&self.pool, limit))
	}

	fn clear<'a>(&'a self, change_ids: &'a [i64]) -> BoxFuture<'a, Result<u64>> {
		Box::pin(clear_changes(&self.pool, change_ids))
	}
}
