//! # Key matrices
//!
//! A key matrix `K` (rows of the base table × rows of a relation table) is a
//! 0/1 indicator matrix with exactly one non-zero per row: row `i` of the
//! joined matrix takes its relation features from row `j` of `R` where
//! `K[i, j] == 1`. They are stored as CSR so that `K·X` and `Kᵗ·X` never
//! materialize the `n × n_R` indicator.

use nalgebra_sparse::{CooMatrix, CsrMatrix};
use ndarray::{Array2, ArrayView2};

use crate::error::{MatrixError, Result};

pub mod csr;

pub trait KeyMatrixOps {
    /// `K·X` for a dense `X` with `K.ncols()` rows.
    fn mul_dense(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// `Kᵗ·X` for a dense `X` with `K.nrows()` rows.
    fn transpose_mul_dense(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// `X·K` for a dense `X` with `K.nrows()` columns.
    fn dense_mul(&self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    fn to_dense(&self) -> Array2<f64>;
}

/// Builds an indicator key matrix of shape `indices.len() × n_cols` with a
/// single one per row at column `indices[row]`.
pub fn indicator_from_indices(n_cols: usize, indices: &[usize]) -> Result<CsrMatrix<f64>> {
    let mut coo = CooMatrix::new(indices.len(), n_cols);
    for (row, &col) in indices.iter().enumerate() {
        if col >= n_cols {
            return Err(MatrixError::InvalidConfiguration(format!(
                "key index {} in row {} is out of range for {} relation rows",
                col, row, n_cols
            )));
        }
        coo.push(row, col, 1.0);
    }
    Ok(CsrMatrix::from(&coo))
}
