pub mod worker;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tagscope_service::{Backends, TaggingService};
use tagscope_storage::db::Db;

/// `<crate version>-<git sha>-<target triple>`, stamped by the build script.
pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

#[derive(Debug, Parser)]
#[command(version = VERSION, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
	/// Run a single recovery sweep and exit.
	#[arg(long)]
	pub once: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = tagscope_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;
	db.ensure_schema().await?;

	let service = TaggingService::new(Backends::postgres(db), &config.aggregation)?;
	let state = worker::WorkerState { service, sweep: config.sweep };

	if args.once {
		worker::sweep_once(&state).await?;

		return Ok(());
	}

	worker::run_worker(state).await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn args_parse_config_and_once() {
		let args = Args::try_parse_from(["tagscope-worker", "-c", "tagscope.toml", "--once"])
			.expect("Failed to parse args.");

		assert_eq!(args.config, std::path::PathBuf::from("tagscope.toml"));
		assert!(args.once);
		assert!(VERSION.starts_with(env!("CARGO_PKG_VERSION")));
	}
}
