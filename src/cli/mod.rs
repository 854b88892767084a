mod files;
mod pivots;
mod sheets;
mod show;

use crate::config::Config;
use crate::error::Result;
use crate::graph::{DriveContext, GraphClient};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use files::LatestKind;
pub use pivots::PivotAction;
pub use sheets::LoadCsvArgs;
pub use show::ShowResource;

#[derive(Parser, Debug)]
#[command(name = "sharepoint-workbook")]
#[command(about = "Manage files and workbook ranges in a SharePoint document library", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Show { resource } => resource.execute().await,
            Commands::Ls { path } => files::list(path).await,
            Commands::Latest { kind } => kind.execute().await,
            Commands::Download {
                folder,
                name,
                output,
            } => files::download(folder, name, output.as_deref()).await,
            Commands::Upload {
                file,
                folder,
                name,
                content_type,
            } => files::upload(file, folder, name.as_deref(), content_type).await,
            Commands::Delete { folder, name, yes } => files::delete(folder, name, *yes).await,
            Commands::Wait {
                folder,
                name,
                timeout,
                interval,
            } => files::wait(folder, name, *timeout, *interval).await,
            Commands::LoadCsv(args) => args.execute().await,
            Commands::Pivots { action } => action.execute().await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Show {
        #[command(subcommand)]
        resource: ShowResource,
    },
    /// List folders and files under a path
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// Find the most recently created file or folder under a path
    Latest {
        #[command(subcommand)]
        kind: LatestKind,
    },
    /// Download a file
    Download {
        folder: String,
        name: String,
        /// Target directory (defaults to the cache directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Upload a local file
    Upload {
        file: PathBuf,
        folder: String,
        /// Remote file name (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },
    /// Delete a file
    Delete {
        folder: String,
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Wait until a file becomes visible
    Wait {
        folder: String,
        name: String,
        /// Seconds to wait in total (defaults to poll.timeout_seconds)
        #[arg(long)]
        timeout: Option<f64>,
        /// Seconds between lookups (defaults to poll.poll_interval_seconds)
        #[arg(long)]
        interval: Option<f64>,
    },
    /// Write the rows of a CSV file into a worksheet
    LoadCsv(LoadCsvArgs),
    /// List or refresh pivot tables
    Pivots {
        #[command(subcommand)]
        action: PivotAction,
    },
}

/// Loaded config plus an authenticated client bound to the configured library.
pub(crate) struct Session {
    pub config: Config,
    pub client: GraphClient,
    pub ctx: DriveContext,
}

impl Session {
    pub(crate) async fn open() -> Result<Self> {
        let config = Config::load()?;
        let client = GraphClient::new(&config).await?;
        let sharepoint = &config.sharepoint;
        let ctx = client
            .resolve_drive(&sharepoint.domain, &sharepoint.site, &sharepoint.drive)
            .await?;

        Ok(Self {
            config,
            client,
            ctx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load_csv_command() {
        let cli = Cli::try_parse_from([
            "sharepoint-workbook",
            "load-csv",
            "Reports",
            "book.xlsx",
            "--sheet",
            "Raw Data",
            "--csv",
            "rows.csv",
            "--clear",
            "A2:F10000",
        ])
        .unwrap();

        match cli.command {
            Commands::LoadCsv(args) => {
                assert_eq!(args.sheet, "Raw Data");
                assert_eq!(args.first_cell, "A2");
                assert_eq!(args.clear.as_deref(), Some("A2:F10000"));
                assert_eq!(args.chunk_rows, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_wait_overrides() {
        let cli = Cli::try_parse_from([
            "sharepoint-workbook",
            "wait",
            "Reports",
            "out.xlsx",
            "--timeout",
            "120",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Commands::Wait {
                timeout: Some(t),
                interval: None,
                ..
            } if t == 120.0
        ));
    }
}
