use serde::Deserialize;

pub const DISPATCH_BACKGROUND: &str = "background";
pub const DISPATCH_INLINE: &str = "inline";
pub const DISPATCH_DEFERRED: &str = "deferred";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub aggregation: Aggregation,
	#[serde(default)]
	pub sweep: Sweep,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
}

/// Scope aggregation tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct Aggregation {
	/// Change records drained per aggregation pass.
	#[serde(default = "default_batch_size")]
	pub batch_size: u32,
	/// Lease held on a scope while its backlog is drained.
	#[serde(default = "default_lock_lease_ms")]
	pub lock_lease_ms: u64,
	/// The recovery sweep looks at `batch_size * sweep_batch_multiplier` records per query.
	#[serde(default = "default_sweep_batch_multiplier")]
	pub sweep_batch_multiplier: u32,
	/// One of "background", "inline", or "deferred".
	#[serde(default = "default_dispatch")]
	pub dispatch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sweep {
	#[serde(default = "default_sweep_interval_seconds")]
	pub interval_seconds: u64,
	#[serde(default = "default_true")]
	pub run_on_start: bool,
}

impl Default for Aggregation {
	fn default() -> Self {
		Self {
			batch_size: default_batch_size(),
			lock_lease_ms: default_lock_lease_ms(),
			sweep_batch_multiplier: default_sweep_batch_multiplier(),
			dispatch: default_dispatch(),
		}
	}
}

impl Default for Sweep {
	fn default() -> Self {
		Self { interval_seconds: default_sweep_interval_seconds(), run_on_start: true }
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_pool_max_conns() -> u32 {
	8
}

fn default_batch_size() -> u32 {
	100
}

fn default_lock_lease_ms() -> u64 {
	2_500
}

fn default_sweep_batch_multiplier() -> u32 {
	5
}

fn default_dispatch() -> String {
	DISPATCH_BACKGROUND.to_string()
}

fn default_sweep_interval_seconds() -> u64 {
	300
}

fn default_true() -> bool {
	true
}
