use crate::config::Config;
use crate::error::Result;
use clap::Subcommand;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum ShowResource {
    /// Show configuration and download paths
    Paths,
    /// Show the effective retry, poll and upload settings
    Settings,
}

impl ShowResource {
    pub async fn execute(&self) -> Result<()> {
        match self {
            ShowResource::Paths => show_paths(),
            ShowResource::Settings => show_settings(),
        }
    }
}

fn show_paths() -> Result<()> {
    let config_path = Config::config_file()?;
    let download_dir = Config::cache_dir()?;

    info!(path = ?config_path, "Config path");
    info!(path = ?download_dir, "Default download path");

    Ok(())
}

fn show_settings() -> Result<()> {
    let config = Config::load()?;
    let policy = config.retry.policy()?;
    let poll = config.poll.spec()?;

    info!(
        site = %config.sharepoint.site,
        drive = %config.sharepoint.drive,
        "Document library"
    );
    info!(
        max_attempts = policy.max_attempts,
        base_backoff = ?policy.base_backoff,
        "Retry policy"
    );
    info!(timeout = ?poll.timeout, interval = ?poll.interval, "Polling");
    info!(chunk_rows = config.upload.chunk_rows, "Range uploads");

    Ok(())
}
