use super::Session;
use crate::error::Result;
use clap::Subcommand;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum PivotAction {
    /// List the pivot tables on a worksheet
    List {
        folder: String,
        name: String,
        #[arg(long)]
        sheet: String,
    },
    /// Refresh every pivot table on a worksheet, or just one
    Refresh {
        folder: String,
        name: String,
        #[arg(long)]
        sheet: String,
        #[arg(long)]
        pivot: Option<String>,
    },
}

impl PivotAction {
    pub async fn execute(&self) -> Result<()> {
        let session = Session::open().await?;
        match self {
            PivotAction::List {
                folder,
                name,
                sheet,
            } => {
                let workbook = session.client.item_by_path(&session.ctx, folder, name).await?;
                let pivots = session
                    .client
                    .list_pivot_tables(&session.ctx, &workbook.id, sheet)
                    .await?;

                let entries = pivots["value"].as_array().cloned().unwrap_or_default();
                for pivot in &entries {
                    info!(
                        id = pivot["id"].as_str().unwrap_or_default(),
                        "{}",
                        pivot["name"].as_str().unwrap_or_default()
                    );
                }
                info!(count = entries.len(), "Pivot tables on '{}'", sheet);
            }
            PivotAction::Refresh {
                folder,
                name,
                sheet,
                pivot,
            } => {
                let workbook = session.client.item_by_path(&session.ctx, folder, name).await?;
                match pivot {
                    Some(pivot) => {
                        session
                            .client
                            .refresh_pivot_table(&session.ctx, &workbook.id, sheet, pivot)
                            .await?
                    }
                    None => {
                        session
                            .client
                            .refresh_pivot_tables(&session.ctx, &workbook.id, sheet)
                            .await?
                    }
                }
            }
        }
        Ok(())
    }
}
