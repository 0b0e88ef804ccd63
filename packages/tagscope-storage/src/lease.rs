use std::time::Duration;

use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	BoxFuture, Error, LockService, Result,
	db::Db,
	models::{LockAttempt, LockRow, LockToken},
};

/// Takes the lease when it is free or expired. Never waits on a live holder.
pub async fn try_acquire_lease<'e, E>(
	executor: E,
	key: &str,
	lease: Duration,
	now: OffsetDateTime,
) -> Result<LockAttempt>
where
	E: PgExecutor<'e>,
{
	let lease_span = time::Duration::try_from(lease)
		.map_err(|_| Error::InvalidArgument(format!("Lease {lease:?} is out of range.")))?;
	let row = sqlx::query_as::<_, LockRow>(
		"\
INSERT INTO tag_scope_locks (lock_key, token, expires_at)
VALUES ($1,$2,$3)
ON CONFLICT (lock_key) DO UPDATE
SET token = EXCLUDED.token,
	expires_at = EXCLUDED.expires_at
WHERE tag_scope_locks.expires_at <= $4
RETURNING lock_key, token, expires_at",
	)
	.bind(key)
	.bind(Uuid::new_v4())
	.bind(now + lease_span)
	.bind(now)
	.fetch_optional(executor)
	.await?;

	Ok(match row {
		Some(row) => LockAttempt::Acquired(LockToken { key: row.lock_key, token: row.token, lease }),
		None => LockAttempt::Denied,
	})
}

pub async fn release_lease<'e, E>(executor: E, token: &LockToken) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM tag_scope_locks WHERE lock_key = $1 AND token = $2")
		.bind(token.key.as_str())
		.bind(token.token)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() > 0)
}

impl LockService for Db {
	fn try_acquire<'a>(
		&'a self,
		key: &'a str,
		lease: Duration,
	) -> BoxFuture<'a, Result<LockAttempt>> {
		Box::pin(try_acquire_lease(&self.pool, key, lease, OffsetDateTime::now_utc()))
	}

	fn release<'a>(&'a self, token: &'a LockToken) -> BoxFuture<'a, Result<bool>> {
		Box::pin(release_lease(&self.pool, token))
	}
}
