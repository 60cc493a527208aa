use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{HisaabError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    pub fn text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Rectangular sheet of cells. Ragged input rows are padded with `Empty`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl Grid {
    pub fn new(mut rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, Cell::Empty);
        }
        Self { rows, width }
    }

    /// Build a grid from string rows, the way a CSV sheet is read.
    #[cfg(test)]
    pub fn from_text_rows<S: AsRef<str>>(rows: &[Vec<S>]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|v| Cell::text(v.as_ref())).collect())
                .collect(),
        )
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, index: usize) -> &[Cell] {
        &self.rows[index]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.rows[row][col]
    }

    /// Whole sheet as whitespace-separated text, one line per row.
    pub fn to_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .filter(|c| !c.is_empty())
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join("  ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Loader kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SheetFormat {
    Csv,
    #[cfg(feature = "xlsx")]
    Workbook,
}

impl SheetFormat {
    pub fn detect(file_path: &Path) -> Option<Self> {
        let ext = file_path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(Self::Csv),
            #[cfg(feature = "xlsx")]
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Workbook),
            _ => None,
        }
    }

    pub fn load(&self, file_path: &Path) -> Result<Grid> {
        match self {
            Self::Csv => load_csv(file_path),
            #[cfg(feature = "xlsx")]
            Self::Workbook => load_workbook(file_path),
        }
    }
}

pub fn load_grid(file_path: &Path) -> Result<Grid> {
    let format = SheetFormat::detect(file_path).ok_or_else(|| {
        HisaabError::Validation(format!("unsupported statement file: {}", file_path.display()))
    })?;
    let grid = format.load(file_path)?;
    debug!(
        path = %file_path.display(),
        rows = grid.height(),
        cols = grid.width(),
        "loaded statement grid"
    );
    Ok(grid)
}

fn load_csv(file_path: &Path) -> Result<Grid> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(Cell::text).collect());
    }
    Ok(Grid::new(rows))
}

#[cfg(feature = "xlsx")]
fn load_workbook(file_path: &Path) -> Result<Grid> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| HisaabError::Spreadsheet(format!("failed to open workbook: {e}")))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| HisaabError::Spreadsheet("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| HisaabError::Spreadsheet(format!("failed to read sheet {sheet}: {e}")))?;

    // Range starts at the first used cell; keep absolute positions.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(|value| match value {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::text(s),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) => crate::dates::excel_serial_to_date(dt.as_f64())
                .map(Cell::Date)
                .unwrap_or(Cell::Empty),
            Data::DateTimeIso(s) => crate::dates::parse_locale_date(s, Default::default())
                .map(Cell::Date)
                .unwrap_or_else(|| Cell::text(s)),
            Data::DurationIso(s) => Cell::text(s),
            _ => Cell::Empty,
        }));
        rows.push(cells);
    }
    Ok(Grid::new(rows))
}
