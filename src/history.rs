//! Columnar storage for parameter history.
//!
//! Each record is a fixed-width row `[t, param_1, ..., param_m, id]`. Storage
//! is a flat, pre-allocated growable buffer, append-only: rows are never
//! rewritten once pushed. Downstream consumers (trace visualisers) group by
//! parameter column and render one series per chain id, so the column names
//! and their order are a compatibility contract.

use indexmap::IndexMap;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::errors::{PopMcmcError, PopMcmcResult};

/// Append-only table of parameter states, one row per (iteration, chain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTable {
    /// Column names: `t`, one per parameter, then `id`.
    columns: Vec<String>,
    /// Row-major storage; each record is `columns.len()` wide.
    values: Vec<f64>,
}

impl HistoryTable {
    /// Create an empty table with columns `[t, <params...>, id]`.
    pub fn for_params(param_names: &[String]) -> Self {
        Self::with_capacity(param_names, 0)
    }

    /// Create an empty table with room for `rows` records.
    pub fn with_capacity(param_names: &[String], rows: usize) -> Self {
        let mut columns = Vec::with_capacity(param_names.len() + 2);
        columns.push("t".to_string());
        columns.extend(param_names.iter().cloned());
        columns.push("id".to_string());
        let width = columns.len();
        Self {
            columns,
            values: Vec::with_capacity(rows * width),
        }
    }

    /// Append one record. Purely additive; earlier rows are never touched.
    pub fn push_row(&mut self, t: usize, params: &Array1<f64>, id: usize) {
        debug_assert_eq!(params.len() + 2, self.width());
        self.values.push(t as f64);
        self.values.extend(params.iter());
        self.values.push(id as f64);
    }

    /// Append every row of `other`, which must share this table's columns.
    pub fn append(&mut self, other: &HistoryTable) -> PopMcmcResult<()> {
        if self.columns != other.columns {
            return Err(PopMcmcError::Error(format!(
                "cannot append history tables with different columns: {:?} vs {:?}",
                self.columns, other.columns
            )));
        }
        self.values.extend_from_slice(&other.values);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Record width, i.e. the number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.values.len() / self.width()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The `i`-th record as a `[t, params..., id]` slice.
    pub fn row(&self, i: usize) -> &[f64] {
        let width = self.width();
        &self.values[i * width..(i + 1) * width]
    }

    /// All values of a named column, in insertion order.
    pub fn column(&self, name: &str) -> Option<Array1<f64>> {
        let index = self.columns.iter().position(|c| c == name)?;
        let width = self.width();
        Some(
            self.values
                .iter()
                .skip(index)
                .step_by(width)
                .cloned()
                .collect(),
        )
    }

    /// Map view of the whole table, keyed by column name.
    pub fn to_column_map(&self) -> IndexMap<String, Array1<f64>> {
        self.columns
            .iter()
            .filter_map(|name| Some((name.clone(), self.column(name)?)))
            .collect()
    }
}
