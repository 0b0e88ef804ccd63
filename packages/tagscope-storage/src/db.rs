use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, schema};

/// Serializes concurrent `ensure_schema` runs across workers.
const SCHEMA_LOCK_ID: i64 = 7_120_115;

/// Postgres backend. Implements [`crate::NodeStore`], [`crate::ChangeLog`] and
/// [`crate::LockService`].
///
/// The node tables carry no permissions, so every [`crate::AccessContext`] reads as system.
#[derive(Clone, Debug)]
pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &tagscope_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		// The lock is released with the transaction, on commit or on any early return.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)")
			.bind(SCHEMA_LOCK_ID)
			.execute(&mut *tx)
			.await?;

		for statement in sql.split(';').map(str::trim).filter(|statement| !statement.is_empty()) {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		tracing::debug!("Tag store schema is up to date.");

		Ok(())
	}
}
