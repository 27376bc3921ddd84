use nalgebra_sparse::CsrMatrix;
use ndarray::{Array2, ArrayView2};

use crate::error::{MatrixError, Result};
use crate::utils::shape_of;

use super::KeyMatrixOps;

impl KeyMatrixOps for CsrMatrix<f64> {
    fn mul_dense(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.nrows() != self.ncols() {
            return Err(MatrixError::ShapeMismatch {
                op: "keyMultiplication",
                left: (self.nrows(), self.ncols()),
                right: shape_of(&x),
            });
        }

        let mut result = Array2::zeros((self.nrows(), x.ncols()));
        for (i, row) in self.row_iter().enumerate() {
            let mut target = result.row_mut(i);
            for (&j, &value) in row.col_indices().iter().zip(row.values().iter()) {
                target.scaled_add(value, &x.row(j));
            }
        }
        Ok(result)
    }

    fn transpose_mul_dense(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.nrows() != self.nrows() {
            return Err(MatrixError::ShapeMismatch {
                op: "keyTransposeMultiplication",
                left: (self.ncols(), self.nrows()),
                right: shape_of(&x),
            });
        }

        // Scatter each base row into the relation row it references
        let mut result = Array2::zeros((self.ncols(), x.ncols()));
        for (i, row) in self.row_iter().enumerate() {
            let source = x.row(i);
            for (&j, &value) in row.col_indices().iter().zip(row.values().iter()) {
                result.row_mut(j).scaled_add(value, &source);
            }
        }
        Ok(result)
    }

    fn dense_mul(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.nrows() {
            return Err(MatrixError::ShapeMismatch {
                op: "denseKeyMultiplication",
                left: shape_of(&x),
                right: (self.nrows(), self.ncols()),
            });
        }

        let mut result = Array2::zeros((x.nrows(), self.ncols()));
        for (i, row) in self.row_iter().enumerate() {
            let source = x.column(i);
            for (&j, &value) in row.col_indices().iter().zip(row.values().iter()) {
                result.column_mut(j).scaled_add(value, &source);
            }
        }
        Ok(result)
    }

    fn to_dense(&self) -> Array2<f64> {
        let mut result = Array2::zeros((self.nrows(), self.ncols()));
        for (i, j, &value) in self.triplet_iter() {
            result[[i, j]] += value;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::indicator_from_indices;
    use approx::assert_abs_diff_eq;
    use nalgebra_sparse::CooMatrix;
    use ndarray::array;

    fn create_key_matrix() -> CsrMatrix<f64> {
        // [0 1]
        // [1 0]
        // [0 1]
        indicator_from_indices(2, &[1, 0, 1]).unwrap()
    }

    #[test]
    fn test_mul_dense_matches_materialized() {
        let k = create_key_matrix();
        let r = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let kr = k.mul_dense(r.view()).unwrap();
        assert_eq!(kr, k.to_dense().dot(&r));
        assert_eq!(kr.row(0).to_vec(), vec![4.0, 5.0, 6.0]);
        assert_eq!(kr.row(1).to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_transpose_mul_dense_accumulates() {
        let k = create_key_matrix();
        let x = array![[1.0], [2.0], [3.0]];
        let ktx = k.transpose_mul_dense(x.view()).unwrap();
        // Row 1 of R is referenced by base rows 0 and 2
        assert_eq!(ktx, array![[2.0], [4.0]]);
        assert_eq!(ktx, k.to_dense().t().dot(&x));
    }

    #[test]
    fn test_dense_mul_matches_materialized() {
        let k = create_key_matrix();
        let x = array![[1.0, 2.0, 3.0], [0.5, -1.0, 2.0]];
        let xk = k.dense_mul(x.view()).unwrap();
        let expected = x.dot(&k.to_dense());
        for (a, b) in xk.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_weighted_key_matrix() {
        let coo = CooMatrix::try_from_triplets(2, 2, vec![0, 1, 1], vec![0, 0, 1], vec![2.0, 1.0, 3.0])
            .unwrap();
        let k: CsrMatrix<f64> = (&coo).into();
        let x = array![[1.0, 1.0], [2.0, 0.0]];
        assert_eq!(k.mul_dense(x.view()).unwrap(), k.to_dense().dot(&x));
    }

    #[test]
    fn test_shape_mismatch() {
        let k = create_key_matrix();
        let x = array![[1.0, 2.0]];
        assert!(matches!(
            k.mul_dense(x.view()),
            Err(MatrixError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            k.transpose_mul_dense(x.view()),
            Err(MatrixError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            k.dense_mul(x.t()),
            Err(MatrixError::ShapeMismatch { .. })
        ));
    }
}
