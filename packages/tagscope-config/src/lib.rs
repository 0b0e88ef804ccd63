mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Aggregation, Config, DISPATCH_BACKGROUND, DISPATCH_DEFERRED, DISPATCH_INLINE, Postgres,
	Service, Storage, Sweep,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.aggregation.batch_size == 0 {
		return Err(Error::Validation {
			message: "aggregation.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.aggregation.lock_lease_ms == 0 {
		return Err(Error::Validation {
			message: "aggregation.lock_lease_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.aggregation.sweep_batch_multiplier == 0 {
		return Err(Error::Validation {
			message: "aggregation.sweep_batch_multiplier must be greater than zero.".to_string(),
		});
	}
	if !matches!(
		cfg.aggregation.dispatch.as_str(),
		DISPATCH_BACKGROUND | DISPATCH_INLINE | DISPATCH_DEFERRED
	) {
		return Err(Error::Validation {
			message: "aggregation.dispatch must be one of background, inline, or deferred."
				.to_string(),
		});
	}
	if cfg.sweep.interval_seconds == 0 {
		return Err(Error::Validation {
			message: "sweep.interval_seconds must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}

	let dispatch = cfg.aggregation.dispatch.trim().to_ascii_lowercase();

	cfg.aggregation.dispatch = dispatch;
}
