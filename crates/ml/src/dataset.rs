//! Loading the historical sample table from a spreadsheet or CSV file and
//! turning selected columns into linfa datasets.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader};
use linfa::Dataset;
use ndarray::{Array1, Array2, Axis, Ix1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::error::{MlError, Result};

/// Records are `n_samples x n_features`, targets a single column.
pub type RegressionDataset = Dataset<f64, f64, Ix1>;

/// Smallest table that still gets a separate hold-out split.
pub const MIN_ROWS_FOR_SPLIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Excel,
    Csv,
}

impl TableFormat {
    pub fn from_file_name(name: &str) -> Result<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Excel),
            "csv" => Ok(Self::Csv),
            _ => Err(MlError::UnsupportedFormat(name.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else {
            trimmed
                .parse::<f64>()
                .map_or_else(|_| Self::Text(trimmed.to_string()), Self::Number)
        }
    }

    fn from_sheet(data: &Data) -> Self {
        match data {
            Data::Float(value) => Self::Number(*value),
            #[allow(clippy::cast_precision_loss)]
            Data::Int(value) => Self::Number(*value as f64),
            Data::String(text) => Self::parse(text),
            Data::Empty => Self::Empty,
            other => Self::Text(other.to_string()),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Rows of named columns as read from the source file. Values are only
/// checked for being numeric when a column is selected.
#[derive(Debug, Clone)]
pub struct SampleTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    /// 1-based position of each kept row in the source, blank rows included.
    row_numbers: Vec<usize>,
}

impl SampleTable {
    fn from_cells<I>(header: Vec<String>, body: I) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<Cell>>,
    {
        let width = header.len();
        let (row_numbers, rows): (Vec<usize>, Vec<Vec<Cell>>) = body
            .into_iter()
            .enumerate()
            .filter(|(_, row)| !row.iter().all(Cell::is_empty))
            .map(|(index, mut row)| {
                row.resize(width, Cell::Empty);
                (index + 1, row)
            })
            .unzip();

        if rows.is_empty() {
            return Err(MlError::EmptyTable);
        }

        debug!("Loaded table with {} rows and {} columns", rows.len(), width);
        Ok(Self { columns: header, rows, row_numbers })
    }

    /// Builds a table from already-numeric columns.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |(_, values)| values.len());
        if let Some((name, values)) = columns.iter().find(|(_, values)| values.len() != n_rows) {
            return Err(MlError::Shape(format!(
                "column {name} has {} rows, expected {n_rows}",
                values.len()
            )));
        }

        let header = columns.iter().map(|(name, _)| name.clone()).collect();
        let body = (0..n_rows).map(|row| {
            columns
                .iter()
                .map(|(_, values)| Cell::Number(values[row]))
                .collect()
        });
        Self::from_cells(header, body)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    /// Numeric values of one column. Row numbers in errors are 1-based data
    /// rows of the source, not counting the header but counting blank rows.
    pub fn column(&self, name: &str) -> Result<Array1<f64>> {
        let index = self
            .columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| MlError::MissingColumn(name.to_string()))?;

        self.rows
            .iter()
            .zip(&self.row_numbers)
            .map(|(cells, &row)| match &cells[index] {
                Cell::Number(value) if value.is_finite() => Ok(*value),
                Cell::Number(value) => Err(invalid_cell(name, row, value.to_string())),
                Cell::Text(text) => Err(invalid_cell(name, row, text.clone())),
                Cell::Empty => Err(invalid_cell(name, row, String::new())),
            })
            .collect()
    }

    /// Dataset with `features` as records (in the given order) and `target`
    /// as the single regression target.
    pub fn select(&self, features: &[&str], target: &str) -> Result<RegressionDataset> {
        let mut records = Array2::zeros((self.n_rows(), features.len()));
        for (j, feature) in features.iter().enumerate() {
            records.column_mut(j).assign(&self.column(feature)?);
        }
        let targets = self.column(target)?;

        Ok(Dataset::new(records, targets).with_feature_names(features.to_vec()))
    }
}

fn invalid_cell(column: &str, row: usize, value: String) -> MlError {
    MlError::InvalidCell { column: column.to_string(), row, value }
}

pub fn load_table(path: impl AsRef<Path>) -> Result<SampleTable> {
    let path = path.as_ref();
    let format = TableFormat::from_file_name(&path.to_string_lossy())?;
    debug!("Reading {:?} table from {}", format, path.display());

    match format {
        TableFormat::Excel => {
            if !path.exists() {
                return Err(MlError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            let mut workbook = open_workbook_auto(path)?;
            let range = workbook.worksheet_range_at(0).ok_or(MlError::NoWorksheet)??;
            table_from_rows(range.rows())
        }
        TableFormat::Csv => {
            let reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .trim(csv::Trim::All)
                .from_path(path)?;
            table_from_csv(reader)
        }
    }
}

pub fn load_table_from_bytes(bytes: Vec<u8>, format: TableFormat) -> Result<SampleTable> {
    match format {
        TableFormat::Excel => {
            let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
            let range = workbook.worksheet_range_at(0).ok_or(MlError::NoWorksheet)??;
            table_from_rows(range.rows())
        }
        TableFormat::Csv => {
            let reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .trim(csv::Trim::All)
                .from_reader(Cursor::new(bytes));
            table_from_csv(reader)
        }
    }
}

fn table_from_rows<'a>(mut rows: impl Iterator<Item = &'a [Data]>) -> Result<SampleTable> {
    let header = rows
        .next()
        .ok_or(MlError::EmptyTable)?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    let body: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(Cell::from_sheet).collect())
        .collect();
    SampleTable::from_cells(header, body)
}

fn table_from_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<SampleTable> {
    let header = reader.headers()?.iter().map(str::to_string).collect();
    let body = reader
        .records()
        .map(|record| record.map(|record| record.iter().map(Cell::parse).collect()))
        .collect::<std::result::Result<Vec<Vec<Cell>>, csv::Error>>()?;
    SampleTable::from_cells(header, body)
}

/// Seeded shuffled hold-out split. Returns `None` when the dataset is too
/// small to hold anything out.
pub fn train_test_split(
    dataset: &RegressionDataset,
    test_fraction: f64,
    seed: u64,
) -> Option<(RegressionDataset, RegressionDataset)> {
    let n = dataset.records().nrows();
    if n < MIN_ROWS_FOR_SPLIT || !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return None;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let n_test = n_test.clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test_idx, train_idx) = indices.split_at(n_test);

    let take = |idx: &[usize]| {
        Dataset::new(
            dataset.records().select(Axis(0), idx),
            dataset.targets().select(Axis(0), idx),
        )
        .with_feature_names(dataset.feature_names())
    };

    Some((take(train_idx), take(test_idx)))
}
