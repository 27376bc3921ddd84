//! # Factorized engine
//!
//! A normalized matrix `T = [S, K₁R₁, …, KₖRₖ]` is the result of joining a
//! base table `S` with `k` relation tables `Rᵢ` through key matrices `Kᵢ`.
//! This module keeps `T` un-joined and evaluates operators with the
//! factorized rewrite rules, so that no operation needs the `n × d` join
//! unless its result is itself `n × d`.

use std::fmt::Debug;
use std::sync::Arc;

use nalgebra_sparse::CsrMatrix;
use ndarray::{Array2, ArrayView2};

use crate::error::{MatrixError, Result};

mod table;

pub use table::MorpheusTable;

/// The factorized delegate handle held by a factorized normalized matrix.
///
/// Every method returns fresh values; a handle is never mutated after it is
/// built.
pub trait NormalizedTable: Debug + Send + Sync {
    /// Logical shape, accounting for transposition.
    fn shape(&self) -> (usize, usize);

    fn is_transposed(&self) -> bool;

    fn scalar_addition(&self, scalar: f64) -> Result<Array2<f64>>;

    fn scalar_multiplication(&self, scalar: f64) -> Result<Array2<f64>>;

    fn scalar_exponentiation(&self, exponent: f64) -> Result<Array2<f64>>;

    /// `T·X`
    fn left_matrix_multiplication(&self, other: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// `X·T`
    fn right_matrix_multiplication(&self, other: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// A handle for `Tᵗ` sharing the same join blocks.
    fn transpose(&self) -> Result<Arc<dyn NormalizedTable>>;

    /// `TᵗT`, or `TTᵗ` when the handle is transposed.
    fn cross_product(&self) -> Result<Array2<f64>>;

    fn materialize(&self) -> Result<Array2<f64>>;
}

/// The un-joined inputs of a normalized matrix.
#[derive(Debug)]
pub struct JoinBlocks {
    s: Array2<f64>,
    ks: Vec<CsrMatrix<f64>>,
    rs: Vec<Array2<f64>>,
    s_empty: bool,
    nrows: usize,
}

impl JoinBlocks {
    /// Validates the join inputs.
    ///
    /// The base block counts as empty when it has no columns; its row count
    /// is then taken from the key matrices.
    pub fn new(s: Array2<f64>, ks: Vec<CsrMatrix<f64>>, rs: Vec<Array2<f64>>) -> Result<Self> {
        if ks.len() != rs.len() {
            return Err(MatrixError::InvalidConfiguration(format!(
                "{} key matrices but {} relation matrices",
                ks.len(),
                rs.len()
            )));
        }

        let s_empty = s.ncols() == 0;
        let nrows = match (s_empty, ks.first()) {
            (false, _) => s.nrows(),
            (true, Some(k)) => k.nrows(),
            (true, None) => {
                return Err(MatrixError::InvalidConfiguration(
                    "a normalized matrix needs a base block or at least one join".to_string(),
                ))
            }
        };

        for (i, (k, r)) in ks.iter().zip(rs.iter()).enumerate() {
            if k.nrows() != nrows {
                return Err(MatrixError::InvalidConfiguration(format!(
                    "key matrix {} has {} rows, expected {}",
                    i,
                    k.nrows(),
                    nrows
                )));
            }
            if k.ncols() != r.nrows() {
                return Err(MatrixError::InvalidConfiguration(format!(
                    "key matrix {} references {} relation rows but relation {} has {}",
                    i,
                    k.ncols(),
                    i,
                    r.nrows()
                )));
            }
        }

        Ok(JoinBlocks {
            s,
            ks,
            rs,
            s_empty,
            nrows,
        })
    }

    pub fn s(&self) -> &Array2<f64> {
        &self.s
    }

    pub fn keys(&self) -> &[CsrMatrix<f64>] {
        &self.ks
    }

    pub fn relations(&self) -> &[Array2<f64>] {
        &self.rs
    }

    pub fn s_empty(&self) -> bool {
        self.s_empty
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// `dS + dR₁ + … + dRₖ`
    pub fn ncols(&self) -> usize {
        self.widths().iter().sum()
    }

    /// Shape of the un-transposed join.
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols())
    }

    /// Column widths of the base block followed by each relation block.
    pub(crate) fn widths(&self) -> Vec<usize> {
        let base = if self.s_empty { 0 } else { self.s.ncols() };
        std::iter::once(base)
            .chain(self.rs.iter().map(|r| r.ncols()))
            .collect()
    }

    /// Start column of each block in the join.
    pub(crate) fn offsets(&self) -> Vec<usize> {
        self.widths()
            .iter()
            .scan(0, |acc, &w| {
                let start = *acc;
                *acc += w;
                Some(start)
            })
            .collect()
    }
}
