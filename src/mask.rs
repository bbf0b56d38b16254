//! Whitespace-delimited numeric grids, the on-disk mask format.
//!
//! Masks are plain text, one pupil row per line, values separated by blanks.
//! The loader only enforces what the optimization reads back: every row must
//! hold the same number of values and every value must parse as a float.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use itertools::Itertools;

#[derive(Debug, thiserror::Error)]
pub enum MaskError {
    #[error("failed to open the mask file {0:?}")]
    Open(PathBuf, #[source] std::io::Error),
    #[error("failed to read the mask file {0:?}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("{path:?}: row {row} holds {got} value(s), expected {expected}")]
    Ragged {
        path: PathBuf,
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("{path:?}: row {row}, column {column} is not a number")]
    NotANumber {
        path: PathBuf,
        row: usize,
        column: usize,
    },
    #[error("the mask file {0:?} holds no values")]
    Empty(PathBuf),
}
pub type Result<T> = std::result::Result<T, MaskError>;

/// One mask, a rows by columns grid of transmission values
#[derive(Debug, Clone, PartialEq)]
pub struct MaskGrid {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl MaskGrid {
    /// Load a whitespace-delimited grid, skipping blank lines
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| MaskError::Open(path.to_path_buf(), e))?;
        let mut rows = 0;
        let mut cols = 0;
        let mut values = Vec::new();
        for (line_index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| MaskError::Read(path.to_path_buf(), e))?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if rows == 0 {
                cols = fields.len();
            } else if fields.len() != cols {
                return Err(MaskError::Ragged {
                    path: path.to_path_buf(),
                    row: line_index + 1,
                    expected: cols,
                    got: fields.len(),
                });
            }
            for (column, field) in fields.iter().enumerate() {
                let value: f64 = field.parse().map_err(|_| MaskError::NotANumber {
                    path: path.to_path_buf(),
                    row: line_index + 1,
                    column: column + 1,
                })?;
                values.push(value);
            }
            rows += 1;
        }
        if rows == 0 {
            return Err(MaskError::Empty(path.to_path_buf()));
        }
        Ok(Self { rows, cols, values })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn cols(&self) -> usize {
        self.cols
    }
    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }
    /// Mean transmission over the grid
    pub fn transmission(&self) -> f64 {
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
    /// Smallest and largest value of the grid
    pub fn minmax(&self) -> (f64, f64) {
        match self.values.iter().minmax_by(|a, b| a.total_cmp(b)) {
            itertools::MinMaxResult::NoElements => (f64::NAN, f64::NAN),
            itertools::MinMaxResult::OneElement(&value) => (value, value),
            itertools::MinMaxResult::MinMax(&min, &max) => (min, max),
        }
    }
}
