use crate::error::{AppError, Result};
use serde_json::Value;

/// Last column index Excel accepts (XFD).
const MAX_COLUMN: usize = 16_383;
/// Last row Excel accepts.
const MAX_ROW: usize = 1_048_576;

/// A contiguous slice of a larger row update.
///
/// `start_index` is inclusive and `end_index` exclusive, both counted from the
/// first row of the whole job.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDescriptor {
    start_index: usize,
    end_index: usize,
    payload: Vec<Vec<Value>>,
}

impl ChunkDescriptor {
    pub fn new(start_index: usize, payload: Vec<Vec<Value>>) -> Self {
        Self {
            start_index,
            end_index: start_index + payload.len(),
            payload,
        }
    }

    /// Split `rows` into chunks of at most `chunk_rows` rows.
    ///
    /// Rows are padded with empty strings to the widest row so every chunk
    /// maps onto a rectangular range.
    pub fn split(rows: Vec<Vec<Value>>, chunk_rows: usize) -> Result<Vec<Self>> {
        if chunk_rows == 0 {
            return Err(AppError::Config(
                "Chunk size must be at least one row".to_string(),
            ));
        }

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut chunks = Vec::with_capacity(rows.len().div_ceil(chunk_rows));
        let mut current = Vec::with_capacity(chunk_rows);
        let mut start_index = 0;

        for mut row in rows {
            row.resize(width, Value::String(String::new()));
            current.push(row);
            if current.len() == chunk_rows {
                let payload = std::mem::replace(&mut current, Vec::with_capacity(chunk_rows));
                let chunk = Self::new(start_index, payload);
                start_index = chunk.end_index;
                chunks.push(chunk);
            }
        }
        if !current.is_empty() {
            chunks.push(Self::new(start_index, current));
        }

        Ok(chunks)
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn end_index(&self) -> usize {
        self.end_index
    }

    pub fn payload(&self) -> &[Vec<Value>] {
        &self.payload
    }

    pub fn width(&self) -> usize {
        self.payload.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// A1-style address of this chunk when the job starts at `first_cell`.
    pub fn address(&self, first_cell: &str) -> Result<String> {
        let (column, row) = parse_cell(first_cell)?;
        let width = self.width().max(1);
        let top = row + self.start_index;
        let bottom = row + self.end_index.max(self.start_index + 1) - 1;

        Ok(format!(
            "{}{}:{}{}",
            column_letter(column),
            top,
            column_letter(column + width - 1),
            bottom
        ))
    }
}

/// Column letter for a 0-based column index (0 = A, 26 = AA).
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Parse an A1-style cell into a 0-based column index and a 1-based row.
pub fn parse_cell(cell: &str) -> Result<(usize, usize)> {
    let invalid = || AppError::Config(format!("Invalid cell reference '{}'", cell));

    let cell = cell.trim();
    let split = cell
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }

    let column = letters
        .to_ascii_uppercase()
        .bytes()
        .try_fold(0usize, |acc, b| {
            acc.checked_mul(26)?.checked_add((b - b'A' + 1) as usize)
        })
        .map(|n| n - 1)
        .filter(|&column| column <= MAX_COLUMN)
        .ok_or_else(invalid)?;
    let row: usize = digits.parse().map_err(|_| invalid())?;
    if row == 0 || row > MAX_ROW {
        return Err(invalid());
    }

    Ok((column, row))
}
