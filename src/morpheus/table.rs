use std::sync::Arc;

use log::trace;
use ndarray::{concatenate, s, Array2, ArrayView2, Axis};

use crate::avatar::Avatar;
use crate::error::{MatrixError, Result};
use crate::sparse::KeyMatrixOps;
use crate::utils::shape_of;

use super::{JoinBlocks, NormalizedTable};

/// Factorized delegate evaluating the normalized-matrix rewrite rules
/// through an avatar.
#[derive(Debug, Clone)]
pub struct MorpheusTable {
    blocks: Arc<JoinBlocks>,
    is_transposed: bool,
    avatar: Arc<dyn Avatar>,
}

fn concat(axis: Axis, parts: &[Array2<f64>]) -> Result<Array2<f64>> {
    let views: Vec<ArrayView2<f64>> = parts.iter().map(|p| p.view()).collect();
    concatenate(axis, &views).map_err(|_| MatrixError::ShapeMismatch {
        op: "concatenate",
        left: parts.first().map(|p| p.dim()).unwrap_or((0, 0)),
        right: parts.last().map(|p| p.dim()).unwrap_or((0, 0)),
    })
}

impl MorpheusTable {
    pub fn new(blocks: Arc<JoinBlocks>, avatar: Arc<dyn Avatar>) -> Self {
        MorpheusTable {
            blocks,
            is_transposed: false,
            avatar,
        }
    }

    /// `T·X = S·X₀ + Σ Kᵢ·(Rᵢ·Xᵢ)` with `Xᵢ` the row blocks of `X`.
    fn join_left_multiply(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (n, d) = self.blocks.shape();
        if x.nrows() != d {
            return Err(MatrixError::ShapeMismatch {
                op: "leftMatrixMultiplication",
                left: (n, d),
                right: shape_of(&x),
            });
        }
        trace!("factorized lmm {:?} x {:?}", (n, d), shape_of(&x));

        let widths = self.blocks.widths();
        let offsets = self.blocks.offsets();

        let mut result = if self.blocks.s_empty() {
            Array2::zeros((n, x.ncols()))
        } else {
            self.avatar.left_matrix_multiplication(
                self.blocks.s().view(),
                x.slice(s![0..widths[0], ..]),
            )?
        };

        for (i, (k, r)) in self
            .blocks
            .keys()
            .iter()
            .zip(self.blocks.relations())
            .enumerate()
        {
            let start = offsets[i + 1];
            let end = start + widths[i + 1];
            let rx = self
                .avatar
                .left_matrix_multiplication(r.view(), x.slice(s![start..end, ..]))?;
            let krx = k.mul_dense(rx.view())?;
            result = self.avatar.matrix_addition(result.view(), krx.view())?;
        }

        Ok(result)
    }

    /// `X·T = [X·S, (X·K₁)·R₁, …]`
    fn join_right_multiply(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (n, d) = self.blocks.shape();
        if x.ncols() != n {
            return Err(MatrixError::ShapeMismatch {
                op: "rightMatrixMultiplication",
                left: shape_of(&x),
                right: (n, d),
            });
        }
        trace!("factorized rmm {:?} x {:?}", shape_of(&x), (n, d));

        let mut parts = Vec::with_capacity(self.blocks.keys().len() + 1);
        if !self.blocks.s_empty() {
            parts.push(
                self.avatar
                    .right_matrix_multiplication(self.blocks.s().view(), x)?,
            );
        }
        for (k, r) in self.blocks.keys().iter().zip(self.blocks.relations()) {
            let xk = k.dense_mul(x)?;
            parts.push(self.avatar.right_matrix_multiplication(r.view(), xk.view())?);
        }

        concat(Axis(1), &parts)
    }

    /// `Tᵗ·X = [Sᵗ·X; R₁ᵗ·(K₁ᵗ·X); …]`
    fn transposed_left_multiply(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (n, d) = self.blocks.shape();
        if x.nrows() != n {
            return Err(MatrixError::ShapeMismatch {
                op: "leftMatrixMultiplication",
                left: (d, n),
                right: shape_of(&x),
            });
        }
        trace!("factorized transposed lmm {:?} x {:?}", (d, n), shape_of(&x));

        let mut parts = Vec::with_capacity(self.blocks.keys().len() + 1);
        if !self.blocks.s_empty() {
            parts.push(
                self.avatar
                    .left_matrix_multiplication(self.blocks.s().t(), x)?,
            );
        }
        for (k, r) in self.blocks.keys().iter().zip(self.blocks.relations()) {
            let ktx = k.transpose_mul_dense(x)?;
            parts.push(self.avatar.left_matrix_multiplication(r.t(), ktx.view())?);
        }

        concat(Axis(0), &parts)
    }

    /// `X·Tᵗ = (T·Xᵗ)ᵗ`
    fn transposed_right_multiply(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (n, d) = self.blocks.shape();
        if x.ncols() != d {
            return Err(MatrixError::ShapeMismatch {
                op: "rightMatrixMultiplication",
                left: shape_of(&x),
                right: (d, n),
            });
        }
        let product = self.join_left_multiply(x.t())?;
        self.avatar.transpose(product.view())
    }

    /// `TᵗT`, assembled block by block without joining.
    fn gram(&self) -> Result<Array2<f64>> {
        let d = self.blocks.ncols();
        let widths = self.blocks.widths();
        let offsets = self.blocks.offsets();
        let base = self.blocks.s();
        let keys = self.blocks.keys();
        let relations = self.blocks.relations();

        let mut result = Array2::zeros((d, d));
        let mut place = |a: usize, b: usize, block: &Array2<f64>| {
            let (ra, rb) = (offsets[a], offsets[b]);
            result
                .slice_mut(s![ra..ra + widths[a], rb..rb + widths[b]])
                .assign(block);
            if a != b {
                result
                    .slice_mut(s![rb..rb + widths[b], ra..ra + widths[a]])
                    .assign(&block.t());
            }
        };

        if !self.blocks.s_empty() {
            let sts = self.avatar.left_matrix_multiplication(base.t(), base.view())?;
            place(0, 0, &sts);

            // Sᵗ·(Kⱼ·Rⱼ) = (Kⱼᵗ·S)ᵗ·Rⱼ
            for (j, (k, r)) in keys.iter().zip(relations).enumerate() {
                let kts = k.transpose_mul_dense(base.view())?;
                let block = self.avatar.left_matrix_multiplication(kts.t(), r.view())?;
                place(0, j + 1, &block);
            }
        }

        // (Kᵢ·Rᵢ)ᵗ·(Kⱼ·Rⱼ) = Rᵢᵗ·((Kᵢᵗ·Kⱼ)·Rⱼ)
        for i in 0..keys.len() {
            let ki_t = keys[i].transpose();
            for j in i..keys.len() {
                let kk = &ki_t * &keys[j];
                let kkr = kk.mul_dense(relations[j].view())?;
                let block = self
                    .avatar
                    .left_matrix_multiplication(relations[i].t(), kkr.view())?;
                place(i + 1, j + 1, &block);
            }
        }

        Ok(result)
    }

    /// `TTᵗ = S·Sᵗ + Σ Kᵢ·(Rᵢ·Rᵢᵗ)·Kᵢᵗ`
    fn outer_gram(&self) -> Result<Array2<f64>> {
        let n = self.blocks.nrows();
        let base = self.blocks.s();

        let mut result = if self.blocks.s_empty() {
            Array2::zeros((n, n))
        } else {
            self.avatar.left_matrix_multiplication(base.view(), base.t())?
        };

        for (k, r) in self.blocks.keys().iter().zip(self.blocks.relations()) {
            let rrt = self.avatar.left_matrix_multiplication(r.view(), r.t())?;
            let krrt = k.mul_dense(rrt.view())?;
            // Rᵢ·Rᵢᵗ is symmetric, so Kᵢ·(Kᵢ·RRᵗ)ᵗ = Kᵢ·RRᵗ·Kᵢᵗ
            let term = k.mul_dense(krrt.t())?;
            result = self.avatar.matrix_addition(result.view(), term.view())?;
        }

        Ok(result)
    }

    fn join(&self) -> Result<Array2<f64>> {
        let mut parts = Vec::with_capacity(self.blocks.keys().len() + 1);
        if !self.blocks.s_empty() {
            parts.push(self.blocks.s().clone());
        }
        for (k, r) in self.blocks.keys().iter().zip(self.blocks.relations()) {
            parts.push(k.mul_dense(r.view())?);
        }
        concat(Axis(1), &parts)
    }
}

impl NormalizedTable for MorpheusTable {
    fn shape(&self) -> (usize, usize) {
        let (n, d) = self.blocks.shape();
        if self.is_transposed {
            (d, n)
        } else {
            (n, d)
        }
    }

    fn is_transposed(&self) -> bool {
        self.is_transposed
    }

    fn scalar_addition(&self, scalar: f64) -> Result<Array2<f64>> {
        let joined = self.materialize()?;
        self.avatar.scalar_addition(joined.view(), scalar)
    }

    fn scalar_multiplication(&self, scalar: f64) -> Result<Array2<f64>> {
        let joined = self.materialize()?;
        self.avatar.scalar_multiplication(joined.view(), scalar)
    }

    fn scalar_exponentiation(&self, exponent: f64) -> Result<Array2<f64>> {
        let joined = self.materialize()?;
        self.avatar.scalar_exponentiation(joined.view(), exponent)
    }

    fn left_matrix_multiplication(&self, other: ArrayView2<f64>) -> Result<Array2<f64>> {
        if self.is_transposed {
            self.transposed_left_multiply(other)
        } else {
            self.join_left_multiply(other)
        }
    }

    fn right_matrix_multiplication(&self, other: ArrayView2<f64>) -> Result<Array2<f64>> {
        if self.is_transposed {
            self.transposed_right_multiply(other)
        } else {
            self.join_right_multiply(other)
        }
    }

    fn transpose(&self) -> Result<Arc<dyn NormalizedTable>> {
        Ok(Arc::new(MorpheusTable {
            blocks: Arc::clone(&self.blocks),
            is_transposed: !self.is_transposed,
            avatar: Arc::clone(&self.avatar),
        }))
    }

    fn cross_product(&self) -> Result<Array2<f64>> {
        if self.is_transposed {
            self.outer_gram()
        } else {
            self.gram()
        }
    }

    fn materialize(&self) -> Result<Array2<f64>> {
        let joined = self.join()?;
        if self.is_transposed {
            self.avatar.transpose(joined.view())
        } else {
            Ok(joined)
        }
    }
}
