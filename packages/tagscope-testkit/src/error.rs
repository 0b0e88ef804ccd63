pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("TAGSCOPE_PG_DSN is not a usable Postgres DSN: {0}")]
	InvalidDsn(sqlx::Error),
	#[error("Neither the postgres nor the template1 database accepted a connection.")]
	NoMaintenanceDatabase,
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
}
