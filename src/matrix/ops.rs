//! Operator overloads for references to [`NormalizedMatrix`].
//!
//! Every operator can fail, so each `Output` is a [`Result`].

use std::ops::{Add, Div, Mul, Neg, Sub};

use super::NormalizedMatrix;
use crate::error::Result;

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $reflected:ident) => {
        impl<'a> $trait<&'a NormalizedMatrix> for &NormalizedMatrix {
            type Output = Result<NormalizedMatrix>;

            fn $method(self, rhs: &'a NormalizedMatrix) -> Self::Output {
                NormalizedMatrix::$method(self, rhs)
            }
        }

        impl $trait<f64> for &NormalizedMatrix {
            type Output = Result<NormalizedMatrix>;

            fn $method(self, rhs: f64) -> Self::Output {
                NormalizedMatrix::$method(self, rhs)
            }
        }

        impl $trait<&NormalizedMatrix> for f64 {
            type Output = Result<NormalizedMatrix>;

            fn $method(self, rhs: &NormalizedMatrix) -> Self::Output {
                rhs.$reflected(self)
            }
        }
    };
}

impl_binary_op!(Add, add, radd);
impl_binary_op!(Sub, sub, rsub);
impl_binary_op!(Mul, mul, rmul);

impl<'a> Div<&'a NormalizedMatrix> for &NormalizedMatrix {
    type Output = Result<NormalizedMatrix>;

    fn div(self, rhs: &'a NormalizedMatrix) -> Self::Output {
        NormalizedMatrix::div(self, rhs)
    }
}

impl Neg for &NormalizedMatrix {
    type Output = Result<NormalizedMatrix>;

    fn neg(self) -> Self::Output {
        self.mul(-1.0)
    }
}
