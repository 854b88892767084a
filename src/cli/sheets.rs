use super::Session;
use crate::error::Result;
use clap::Args;
use serde_json::{Number, Value};
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

/// Number format that makes Excel keep values as typed text.
const TEXT_FORMAT: &str = "@";

#[derive(Args, Debug)]
pub struct LoadCsvArgs {
    /// Folder holding the workbook
    pub folder: String,
    /// Workbook file name
    pub name: String,
    /// Worksheet to write into
    #[arg(long)]
    pub sheet: String,
    /// CSV file with the rows to write
    #[arg(long)]
    pub csv: PathBuf,
    /// Top-left cell of the written block
    #[arg(long, default_value = "A2")]
    pub first_cell: String,
    /// Range to clear before writing, e.g. A2:F10000
    #[arg(long)]
    pub clear: Option<String>,
    /// Range to format as text before writing, e.g. C2:C10000
    #[arg(long)]
    pub text_columns: Option<String>,
    /// Rows per range update (defaults to upload.chunk_rows)
    #[arg(long)]
    pub chunk_rows: Option<usize>,
    /// The CSV has no header row; write every line
    #[arg(long)]
    pub no_header: bool,
}

impl LoadCsvArgs {
    pub async fn execute(&self) -> Result<()> {
        let file = std::fs::File::open(&self.csv)?;
        let rows = read_rows(file, !self.no_header)?;
        info!(rows = rows.len(), "Read {:?}", self.csv);

        let session = Session::open().await?;
        let chunk_rows = self
            .chunk_rows
            .unwrap_or(session.config.upload.chunk_rows);
        let workbook = session
            .client
            .item_by_path(&session.ctx, &self.folder, &self.name)
            .await?;

        if let Some(range) = &self.clear {
            session
                .client
                .clear_range(&session.ctx, &workbook.id, &self.sheet, range)
                .await?;
        }
        if let Some(range) = &self.text_columns {
            session
                .client
                .set_number_format(&session.ctx, &workbook.id, &self.sheet, range, TEXT_FORMAT)
                .await?;
        }

        let outcomes = session
            .client
            .write_rows(
                &session.ctx,
                &workbook.id,
                &self.sheet,
                &self.first_cell,
                rows,
                chunk_rows,
            )
            .await?;

        info!(chunks = outcomes.len(), "Worksheet '{}' updated", self.sheet);
        Ok(())
    }
}

/// Read CSV records as worksheet rows.
fn read_rows<R: Read>(reader: R, has_headers: bool) -> Result<Vec<Vec<Value>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(cell_value).collect());
    }
    Ok(rows)
}

/// Fields that print back unchanged as a number are sent as numbers,
/// everything else as text so codes like `00501` survive.
fn cell_value(field: &str) -> Value {
    let number = match field.parse::<i64>() {
        Ok(int) => Some(Number::from(int)),
        Err(_) => field.parse::<f64>().ok().and_then(Number::from_f64),
    };
    if let Some(number) = number.filter(|n| n.to_string() == field) {
        return Value::Number(number);
    }
    Value::String(field.to_string())
}
