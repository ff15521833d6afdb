mod app;
mod command;
mod config;
mod logging;
mod render;

use std::path::PathBuf;

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    let config = config::load(&path).with_context(|| format!("loading {}", path.display()))?;
    logging::initialize(config.log_destination, &config.log_file);
    app::run(config).await
}
