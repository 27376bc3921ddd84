//! # Avatars
//!
//! An avatar is the dense computation context a normalized matrix delegates
//! to. Every dense sub-product, whether requested directly through the
//! facade or produced while evaluating a factorized rewrite, goes through
//! one of the named operations below.

use std::fmt::Debug;
use std::sync::Arc;

use ndarray::{Array2, ArrayView2};

use crate::error::Result;
use crate::morpheus::{JoinBlocks, MorpheusTable, NormalizedTable};

mod dense;

pub use dense::NdarrayAvatar;

/// Named dense operations a normalized matrix can delegate to.
///
/// Multiplication is named from the point of view of the receiver `matrix`:
/// `left_matrix_multiplication(a, b)` computes `a·b` and
/// `right_matrix_multiplication(a, b)` computes `b·a`.
pub trait Avatar: Debug + Send + Sync {
    fn scalar_addition(&self, matrix: ArrayView2<f64>, scalar: f64) -> Result<Array2<f64>>;

    fn scalar_multiplication(&self, matrix: ArrayView2<f64>, scalar: f64) -> Result<Array2<f64>>;

    /// Element-wise `matrix[i, j] ^ exponent`.
    fn scalar_exponentiation(&self, matrix: ArrayView2<f64>, exponent: f64)
        -> Result<Array2<f64>>;

    fn matrix_addition(&self, matrix: ArrayView2<f64>, other: ArrayView2<f64>)
        -> Result<Array2<f64>>;

    fn left_matrix_multiplication(
        &self,
        matrix: ArrayView2<f64>,
        other: ArrayView2<f64>,
    ) -> Result<Array2<f64>>;

    fn right_matrix_multiplication(
        &self,
        matrix: ArrayView2<f64>,
        other: ArrayView2<f64>,
    ) -> Result<Array2<f64>>;

    fn transpose(&self, matrix: ArrayView2<f64>) -> Result<Array2<f64>>;

    fn invert(&self, matrix: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Builds the factorized delegate for the join `[S, K₁R₁, …, KₖRₖ]`.
    ///
    /// `avatar` is the shared handle of `self`; the returned table keeps it
    /// and evaluates its dense sub-products through it.
    fn build(
        &self,
        blocks: Arc<JoinBlocks>,
        avatar: Arc<dyn Avatar>,
    ) -> Result<Arc<dyn NormalizedTable>> {
        Ok(Arc::new(MorpheusTable::new(blocks, avatar)))
    }
}
