use super::Session;
use crate::config::{Config, PollConfig};
use crate::error::{AppError, Result};
use crate::models::DriveItem;
use clap::Subcommand;
use dialoguer::Confirm;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum LatestKind {
    /// Most recently created file
    File {
        path: String,
        /// Also download the file to the cache directory
        #[arg(long)]
        download: bool,
    },
    /// Most recently created folder
    Folder { path: String },
}

impl LatestKind {
    pub async fn execute(&self) -> Result<()> {
        let session = Session::open().await?;
        match self {
            LatestKind::File { path, download } => {
                let file = session.client.most_recent_file(&session.ctx, path).await?;
                log_item(&file);

                if *download {
                    let url = file.download_url.as_deref().ok_or_else(|| {
                        AppError::Graph(format!("No download URL for '{}'", file.name))
                    })?;
                    session
                        .client
                        .download_to(url, &file.name, &Config::cache_dir()?)
                        .await?;
                }
            }
            LatestKind::Folder { path } => {
                let folder = session.client.most_recent_folder(&session.ctx, path).await?;
                log_item(&folder);
            }
        }
        Ok(())
    }
}

fn log_item(item: &DriveItem) {
    info!(
        id = %item.id,
        kind = ?item.kind,
        created = %item.created.format("%Y-%m-%d %H:%M:%S"),
        url = item.web_url.as_deref().unwrap_or_default(),
        "{}",
        item.name
    );
}

pub(super) async fn list(path: &str) -> Result<()> {
    let session = Session::open().await?;
    let listing = session.client.list_directory(&session.ctx, path).await?;

    for item in listing.folders.iter().chain(listing.files.iter()) {
        log_item(item);
    }
    info!(
        folders = listing.folders.len(),
        files = listing.files.len(),
        "Listed '{}'",
        path
    );
    Ok(())
}

pub(super) async fn download(folder: &str, name: &str, output: Option<&Path>) -> Result<()> {
    let session = Session::open().await?;
    let data = session
        .client
        .download_file_content(&session.ctx, folder, name)
        .await?;

    let dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => Config::cache_dir()?,
    };
    fs::create_dir_all(&dir)?;
    let path = dir.join(name);
    fs::write(&path, data)?;

    info!(path = ?path, "File downloaded");
    Ok(())
}

pub(super) async fn upload(
    file: &Path,
    folder: &str,
    name: Option<&str>,
    content_type: &str,
) -> Result<()> {
    let name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::Config(format!("No file name in {:?}", file)))?,
    };
    let data = fs::read(file)?;

    let session = Session::open().await?;
    session
        .client
        .upload_file(&session.ctx, folder, &name, data, content_type)
        .await
}

pub(super) async fn delete(folder: &str, name: &str, yes: bool) -> Result<()> {
    let session = Session::open().await?;
    let item = session.client.item_by_path(&session.ctx, folder, name).await?;

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete '{}/{}'?", folder, name))
            .default(false)
            .interact()
            .map_err(|e| AppError::Other(e.into()))?;
        if !confirmed {
            warn!("Deletion cancelled");
            return Ok(());
        }
    }

    session.client.delete_item(&session.ctx, &item).await
}

pub(super) async fn wait(
    folder: &str,
    name: &str,
    timeout: Option<f64>,
    interval: Option<f64>,
) -> Result<()> {
    let session = Session::open().await?;
    let poll = &session.config.poll;
    let spec = PollConfig {
        timeout_seconds: timeout.unwrap_or(poll.timeout_seconds),
        poll_interval_seconds: interval.unwrap_or(poll.poll_interval_seconds),
    }
    .spec()?;

    let item = session
        .client
        .wait_for_file(&session.ctx, folder, name, &spec)
        .await?;
    log_item(&item);
    Ok(())
}
