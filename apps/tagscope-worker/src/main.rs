use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = tagscope_worker::Args::parse();
	tagscope_worker::run(args).await
}
