//! Throwaway Postgres databases for the `#[ignore]`d backend tests.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

pub const DSN_ENV: &str = "TAGSCOPE_PG_DSN";

const MAINTENANCE_DATABASES: [&str; 2] = ["postgres", "template1"];

/// A freshly created database, dropped by [`TestDatabase::cleanup`] or on drop.
pub struct TestDatabase {
	name: String,
	dsn: String,
	maintenance: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn).map_err(Error::InvalidDsn)?;
		let maintenance = maintenance_options(&base).await?;
		let name = format!("tagscope_test_{}", Uuid::new_v4().simple());
		let mut conn = PgConnection::connect_with(&maintenance).await?;

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str()).await?;
		conn.close().await?;

		let dsn = base.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, maintenance, dropped: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Drops the database now and reports what a drop could only print.
	pub async fn cleanup(mut self) -> Result<()> {
		self.dropped = true;

		drop_database(&self.maintenance, &self.name).await
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = std::mem::take(&mut self.name);
		let maintenance = self.maintenance.clone();
		// A failed test usually drops us inside its runtime; block on a private one instead.
		let handle = thread::spawn(move || {
			let result = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| err.to_string())
				.and_then(|runtime| {
					runtime
						.block_on(drop_database(&maintenance, &name))
						.map_err(|err| err.to_string())
				});

			if let Err(err) = result {
				eprintln!("Failed to drop test database {name}: {err}.");
			}
		});

		if handle.join().is_err() {
			eprintln!("Test database cleanup thread panicked.");
		}
	}
}

/// The base DSN, when the Postgres tests are enabled.
pub fn env_dsn() -> Option<String> {
	env::var(DSN_ENV).ok().filter(|dsn| !dsn.trim().is_empty())
}

async fn maintenance_options(base: &PgConnectOptions) -> Result<PgConnectOptions> {
	for database in MAINTENANCE_DATABASES {
		let options = base.clone().database(database);

		if let Ok(conn) = PgConnection::connect_with(&options).await {
			let _ = conn.close().await;

			return Ok(options);
		}
	}

	Err(Error::NoMaintenanceDatabase)
}

async fn drop_database(maintenance: &PgConnectOptions, name: &str) -> Result<()> {
	let mut conn = PgConnection::connect_with(maintenance).await?;

	// Pools opened by the test may still hold sessions.
	sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.execute(&mut conn)
	.await?;

	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str()).await?;

	Ok(())
}
