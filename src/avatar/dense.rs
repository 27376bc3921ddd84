use log::trace;
use ndarray::{Array2, ArrayView2};
use nshare::{IntoNalgebra, IntoNdarray2};

use crate::error::{MatrixError, Result};
use crate::utils::shape_of;

use super::Avatar;

/// Avatar backed by ndarray, with inversion through nalgebra.
#[derive(Debug, Default, Clone, Copy)]
pub struct NdarrayAvatar;

impl NdarrayAvatar {
    pub fn new() -> Self {
        NdarrayAvatar
    }
}

fn check_product(
    op: &'static str,
    left: &ArrayView2<f64>,
    right: &ArrayView2<f64>,
) -> Result<()> {
    if left.ncols() != right.nrows() {
        return Err(MatrixError::ShapeMismatch {
            op,
            left: shape_of(left),
            right: shape_of(right),
        });
    }
    Ok(())
}

impl Avatar for NdarrayAvatar {
    fn scalar_addition(&self, matrix: ArrayView2<f64>, scalar: f64) -> Result<Array2<f64>> {
        Ok(matrix.mapv(|v| v + scalar))
    }

    fn scalar_multiplication(&self, matrix: ArrayView2<f64>, scalar: f64) -> Result<Array2<f64>> {
        Ok(matrix.mapv(|v| v * scalar))
    }

    fn scalar_exponentiation(
        &self,
        matrix: ArrayView2<f64>,
        exponent: f64,
    ) -> Result<Array2<f64>> {
        Ok(matrix.mapv(|v| v.powf(exponent)))
    }

    fn matrix_addition(
        &self,
        matrix: ArrayView2<f64>,
        other: ArrayView2<f64>,
    ) -> Result<Array2<f64>> {
        if matrix.dim() != other.dim() {
            return Err(MatrixError::ShapeMismatch {
                op: "matrixAddition",
                left: shape_of(&matrix),
                right: shape_of(&other),
            });
        }
        Ok(&matrix + &other)
    }

    fn left_matrix_multiplication(
        &self,
        matrix: ArrayView2<f64>,
        other: ArrayView2<f64>,
    ) -> Result<Array2<f64>> {
        check_product("leftMatrixMultiplication", &matrix, &other)?;
        trace!(
            "lmm {:?} x {:?}",
            shape_of(&matrix),
            shape_of(&other)
        );
        Ok(matrix.dot(&other))
    }

    fn right_matrix_multiplication(
        &self,
        matrix: ArrayView2<f64>,
        other: ArrayView2<f64>,
    ) -> Result<Array2<f64>> {
        check_product("rightMatrixMultiplication", &other, &matrix)?;
        trace!(
            "rmm {:?} x {:?}",
            shape_of(&other),
            shape_of(&matrix)
        );
        Ok(other.dot(&matrix))
    }

    fn transpose(&self, matrix: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(matrix.t().to_owned())
    }

    fn invert(&self, matrix: ArrayView2<f64>) -> Result<Array2<f64>> {
        if matrix.nrows() != matrix.ncols() {
            return Err(MatrixError::ShapeMismatch {
                op: "invert",
                left: shape_of(&matrix),
                right: (matrix.ncols(), matrix.nrows()),
            });
        }
        let inverse = matrix
            .into_nalgebra()
            .clone_owned()
            .try_inverse()
            .ok_or(MatrixError::Singular)?;
        Ok(inverse.into_ndarray2())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_scalar_operations() {
        let avatar = NdarrayAvatar::new();
        let a = array![[1.0, 2.0], [3.0, 4.0]];

        assert_eq!(
            avatar.scalar_addition(a.view(), 42.0).unwrap(),
            array![[43.0, 44.0], [45.0, 46.0]]
        );
        assert_eq!(
            avatar.scalar_multiplication(a.view(), -1.0).unwrap(),
            array![[-1.0, -2.0], [-3.0, -4.0]]
        );
        assert_eq!(
            avatar.scalar_exponentiation(a.view(), 2.0).unwrap(),
            array![[1.0, 4.0], [9.0, 16.0]]
        );
    }

    #[test]
    fn test_left_and_right_multiplication_order() {
        let avatar = NdarrayAvatar::new();
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![[0.0, 1.0], [1.0, 0.0]];

        // a·b swaps the columns of a, b·a swaps its rows
        let lmm = avatar.left_matrix_multiplication(a.view(), b.view()).unwrap();
        let rmm = avatar.right_matrix_multiplication(a.view(), b.view()).unwrap();
        assert_eq!(lmm, array![[2.0, 1.0], [4.0, 3.0]]);
        assert_eq!(rmm, array![[3.0, 4.0], [1.0, 2.0]]);
    }

    #[test]
    fn test_rectangular_multiplication_shapes() {
        let avatar = NdarrayAvatar::new();
        let a = Array2::<f64>::ones((3, 2));
        let b = Array2::<f64>::ones((2, 4));

        assert_eq!(
            avatar.left_matrix_multiplication(a.view(), b.view()).unwrap().dim(),
            (3, 4)
        );
        assert_eq!(
            avatar.right_matrix_multiplication(b.view(), a.view()).unwrap().dim(),
            (3, 4)
        );
        assert!(matches!(
            avatar.left_matrix_multiplication(b.view(), b.view()),
            Err(MatrixError::ShapeMismatch { op: "leftMatrixMultiplication", .. })
        ));
    }

    #[test]
    fn test_matrix_addition_shape_check() {
        let avatar = NdarrayAvatar::new();
        let a = Array2::<f64>::ones((2, 3));
        let b = Array2::<f64>::ones((3, 2));
        assert!(avatar.matrix_addition(a.view(), b.view()).is_err());
        assert_eq!(
            avatar.matrix_addition(a.view(), a.view()).unwrap(),
            Array2::from_elem((2, 3), 2.0)
        );
    }

    #[test]
    fn test_transpose() {
        let avatar = NdarrayAvatar::new();
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let t = avatar.transpose(a.view()).unwrap();
        assert_eq!(t, array![[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]]);
    }

    #[test]
    fn test_invert() {
        let avatar = NdarrayAvatar::new();
        let a = array![[4.0, 7.0], [2.0, 6.0]];
        let inv = avatar.invert(a.view()).unwrap();
        let identity = a.dot(&inv);
        assert_abs_diff_eq!(identity[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(identity[[0, 1]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(identity[[1, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(identity[[1, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invert_non_symmetric_keeps_orientation() {
        let avatar = NdarrayAvatar::new();
        let a = array![[1.0, 2.0, 0.0], [0.0, 1.0, 3.0], [0.0, 0.0, 1.0]];
        let inv = avatar.invert(a.view()).unwrap();
        let expected = array![[1.0, -2.0, 6.0], [0.0, 1.0, -3.0], [0.0, 0.0, 1.0]];
        for (x, e) in inv.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*x, *e, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_invert_errors() {
        let avatar = NdarrayAvatar::new();
        let singular = array![[1.0, 2.0], [2.0, 4.0]];
        assert_eq!(
            avatar.invert(singular.view()).unwrap_err(),
            MatrixError::Singular
        );

        let rectangular = Array2::<f64>::ones((2, 3));
        assert!(matches!(
            avatar.invert(rectangular.view()),
            Err(MatrixError::ShapeMismatch { op: "invert", .. })
        ));
    }
}
