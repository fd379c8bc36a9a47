mod agent;
mod analysis;
mod api;
mod config;
mod error;
mod gemini;
mod poller;
mod remote;
mod search;
mod staging;
mod templates;
mod upload;
mod utilities;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use log::info;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;

    // The agent is built once here and shared by every request.
    let state = api::AppState::from_config(&config);

    info!(
        "Serving {} on http://{}:{}",
        templates::PAGE_TITLE,
        config.bind_addr,
        config.port
    );
    api::run_api_server(state, &config.bind_addr, config.port).await?;
    Ok(())
}
