//! # Normalized matrices
//!
//! [`NormalizedMatrix`] is a single value type over two representations:
//! a factorized join (base block plus un-joined key/relation pairs, backed
//! by a [`NormalizedTable`]) and a plain dense array. Every operator looks
//! at the representation of both operands and routes the call to the
//! factorized delegate, to the dense avatar, or to an
//! [`MatrixError::UnsupportedOperation`] error. There is no fallback path.
//!
//! ## Dispatch
//!
//! | operator | dense ∘ scalar | factorized ∘ scalar | dense ∘ dense | factorized ∘ dense | dense ∘ factorized | factorized ∘ factorized |
//! |---|---|---|---|---|---|---|
//! | `add` | avatar | delegate | avatar | unsupported | unsupported | unsupported |
//! | `mul` | avatar | delegate | avatar lmm | delegate lmm | delegate rmm | cross product or unsupported |
//! | `div` | - | - | avatar invert + `mul` | invert + `mul` | unsupported | unsupported |
//!
//! Subtraction is `a + (b * -1)` and so inherits the restrictions of `add`.
//! Results of scalar and matrix products are always dense; only `transpose`
//! keeps a factorized value factorized.

use std::sync::Arc;

use log::debug;
use nalgebra_sparse::CsrMatrix;
use ndarray::Array2;

use crate::avatar::Avatar;
use crate::error::{MatrixError, Representation, Result};
use crate::morpheus::{JoinBlocks, NormalizedTable};
use crate::utils::Direction;

mod ops;

/// Exponent used by [`NormalizedMatrix::pow_default`].
pub const DEFAULT_EXPONENT: f64 = 2.71;

#[derive(Debug, Clone)]
enum Inner {
    Factorized {
        blocks: Arc<JoinBlocks>,
        table: Arc<dyn NormalizedTable>,
    },
    Dense(Array2<f64>),
}

/// A factorized or dense matrix sharing one avatar for its whole lifetime.
#[derive(Debug, Clone)]
pub struct NormalizedMatrix {
    inner: Inner,
    avatar: Arc<dyn Avatar>,
}

/// Right-hand (or, for reflected operators, left-hand) operand.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Scalar(f64),
    Matrix(&'a NormalizedMatrix),
}

impl From<f64> for Operand<'_> {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}

impl<'a> From<&'a NormalizedMatrix> for Operand<'a> {
    fn from(value: &'a NormalizedMatrix) -> Self {
        Operand::Matrix(value)
    }
}

impl Operand<'_> {
    fn representation(&self) -> Representation {
        match self {
            Operand::Scalar(_) => Representation::Scalar,
            Operand::Matrix(m) => m.representation(),
        }
    }
}

/// Assembles a factorized [`NormalizedMatrix`] from join inputs.
#[derive(Debug, Default)]
pub struct FactorizedBuilder {
    s: Option<Array2<f64>>,
    ks: Vec<CsrMatrix<f64>>,
    rs: Vec<Array2<f64>>,
    avatar: Option<Arc<dyn Avatar>>,
}

impl FactorizedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared base block. Leaving it unset builds a join with an empty
    /// base.
    pub fn base(mut self, s: Array2<f64>) -> Self {
        self.s = Some(s);
        self
    }

    /// Adds one avoided foreign-key join.
    pub fn join(mut self, key: CsrMatrix<f64>, relation: Array2<f64>) -> Self {
        self.ks.push(key);
        self.rs.push(relation);
        self
    }

    pub fn avatar(mut self, avatar: Arc<dyn Avatar>) -> Self {
        self.avatar = Some(avatar);
        self
    }

    pub fn build(self) -> Result<NormalizedMatrix> {
        let avatar = self.avatar.ok_or_else(|| {
            MatrixError::InvalidConfiguration(
                "a factorized matrix requires an avatar".to_string(),
            )
        })?;
        let s = self.s.unwrap_or_else(|| Array2::zeros((0, 0)));
        NormalizedMatrix::factorized(s, self.ks, self.rs, avatar)
    }
}

impl NormalizedMatrix {
    /// Builds a factorized matrix for `[S, K₁R₁, …, KₖRₖ]` through the
    /// avatar's `build` operation.
    pub fn factorized(
        s: Array2<f64>,
        ks: Vec<CsrMatrix<f64>>,
        rs: Vec<Array2<f64>>,
        avatar: Arc<dyn Avatar>,
    ) -> Result<Self> {
        let blocks = Arc::new(JoinBlocks::new(s, ks, rs)?);
        let table = avatar.build(Arc::clone(&blocks), Arc::clone(&avatar))?;
        debug!(
            "built factorized matrix {:?} from {} join(s)",
            table.shape(),
            blocks.keys().len()
        );
        Ok(NormalizedMatrix {
            inner: Inner::Factorized { blocks, table },
            avatar,
        })
    }

    pub fn dense(mat: Array2<f64>, avatar: Arc<dyn Avatar>) -> Self {
        NormalizedMatrix {
            inner: Inner::Dense(mat),
            avatar,
        }
    }

    fn wrap_dense(&self, mat: Array2<f64>) -> Self {
        NormalizedMatrix {
            inner: Inner::Dense(mat),
            avatar: Arc::clone(&self.avatar),
        }
    }

    pub fn representation(&self) -> Representation {
        match self.inner {
            Inner::Factorized { .. } => Representation::Factorized,
            Inner::Dense(_) => Representation::Dense,
        }
    }

    pub fn is_factorized(&self) -> bool {
        matches!(self.inner, Inner::Factorized { .. })
    }

    /// Only factorized values carry a transposition flag; dense transposes
    /// are materialized by the avatar.
    pub fn is_transposed(&self) -> bool {
        match &self.inner {
            Inner::Factorized { table, .. } => table.is_transposed(),
            Inner::Dense(_) => false,
        }
    }

    /// Logical shape. For a factorized value this is
    /// `rows(S) × (cols(S) + Σ cols(Rᵢ))`, swapped when transposed.
    pub fn shape(&self) -> (usize, usize) {
        match &self.inner {
            Inner::Factorized { table, .. } => table.shape(),
            Inner::Dense(mat) => mat.dim(),
        }
    }

    pub fn avatar(&self) -> &Arc<dyn Avatar> {
        &self.avatar
    }

    /// Whether both values delegate to the same avatar instance.
    pub fn shares_avatar(&self, other: &NormalizedMatrix) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.avatar) as *const (),
            Arc::as_ptr(&other.avatar) as *const (),
        )
    }

    pub fn blocks(&self) -> Option<&Arc<JoinBlocks>> {
        match &self.inner {
            Inner::Factorized { blocks, .. } => Some(blocks),
            Inner::Dense(_) => None,
        }
    }

    pub fn as_dense(&self) -> Option<&Array2<f64>> {
        match &self.inner {
            Inner::Dense(mat) => Some(mat),
            Inner::Factorized { .. } => None,
        }
    }

    /// A materialized copy, used to cross-check representations.
    pub fn to_dense(&self) -> Result<Array2<f64>> {
        match &self.inner {
            Inner::Dense(mat) => Ok(mat.clone()),
            Inner::Factorized { table, .. } => table.materialize(),
        }
    }

    /// Scalar or matrix addition.
    pub fn add<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<Self> {
        let rhs = rhs.into();
        match (&self.inner, rhs) {
            (Inner::Dense(mat), Operand::Scalar(x)) => {
                debug!("add: dense x scalar -> scalarAddition");
                Ok(self.wrap_dense(self.avatar.scalar_addition(mat.view(), x)?))
            }
            (Inner::Factorized { table, .. }, Operand::Scalar(x)) => {
                debug!("add: factorized x scalar -> delegate scalarAddition");
                Ok(self.wrap_dense(table.scalar_addition(x)?))
            }
            (Inner::Dense(mat), Operand::Matrix(other)) => match &other.inner {
                Inner::Dense(other_mat) => {
                    debug!("add: dense x dense -> matrixAddition");
                    Ok(self.wrap_dense(
                        self.avatar.matrix_addition(mat.view(), other_mat.view())?,
                    ))
                }
                Inner::Factorized { .. } => Err(MatrixError::unsupported(
                    "matrixAddition",
                    &[Representation::Dense, Representation::Factorized],
                )),
            },
            (Inner::Factorized { .. }, rhs) => Err(MatrixError::unsupported(
                "matrixAddition",
                &[Representation::Factorized, rhs.representation()],
            )),
        }
    }

    /// `lhs + self`
    pub fn radd<'a>(&self, lhs: impl Into<Operand<'a>>) -> Result<Self> {
        self.add(lhs)
    }

    /// `self - rhs`, evaluated as `self + (rhs * -1)`.
    pub fn sub<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<Self> {
        match rhs.into() {
            Operand::Scalar(x) => self.add(x * -1.0),
            Operand::Matrix(other) => {
                let negated = other.mul(-1.0)?;
                self.add(&negated)
            }
        }
    }

    /// `lhs - self`, evaluated as `(self * -1) + lhs`.
    pub fn rsub<'a>(&self, lhs: impl Into<Operand<'a>>) -> Result<Self> {
        self.mul(-1.0)?.radd(lhs)
    }

    /// Scalar multiplication or matrix product `self · rhs`.
    pub fn mul<'a>(&self, rhs: impl Into<Operand<'a>>) -> Result<Self> {
        let rhs = rhs.into();
        match (&self.inner, rhs) {
            (Inner::Dense(mat), Operand::Scalar(x)) => {
                debug!("mul: dense x scalar -> scalarMultiplication");
                Ok(self.wrap_dense(self.avatar.scalar_multiplication(mat.view(), x)?))
            }
            (Inner::Factorized { table, .. }, Operand::Scalar(x)) => {
                debug!("mul: factorized x scalar -> delegate scalarMultiplication");
                Ok(self.wrap_dense(table.scalar_multiplication(x)?))
            }
            (Inner::Dense(mat), Operand::Matrix(other)) => match &other.inner {
                Inner::Dense(other_mat) => {
                    debug!("mul: dense x dense -> leftMatrixMultiplication");
                    Ok(self.wrap_dense(
                        self.avatar
                            .left_matrix_multiplication(mat.view(), other_mat.view())?,
                    ))
                }
                Inner::Factorized { table, .. } => {
                    debug!("mul: dense x factorized -> delegate rightMatrixMultiplication");
                    Ok(self.wrap_dense(table.right_matrix_multiplication(mat.view())?))
                }
            },
            (Inner::Factorized { blocks, table }, Operand::Matrix(other)) => match &other.inner {
                Inner::Dense(other_mat) => {
                    debug!("mul: factorized x dense -> delegate leftMatrixMultiplication");
                    Ok(self.wrap_dense(table.left_matrix_multiplication(other_mat.view())?))
                }
                Inner::Factorized {
                    blocks: other_blocks,
                    table: other_table,
                } => {
                    // Tᵗ·T or T·Tᵗ over the same join
                    if Arc::ptr_eq(blocks, other_blocks)
                        && table.is_transposed() != other_table.is_transposed()
                    {
                        debug!("mul: factorized x factorized -> delegate crossProduct");
                        Ok(self.wrap_dense(other_table.cross_product()?))
                    } else {
                        Err(MatrixError::unsupported(
                            "matrixMultiplication",
                            &[Representation::Factorized, Representation::Factorized],
                        ))
                    }
                }
            },
        }
    }

    /// `lhs · self`
    pub fn rmul<'a>(&self, lhs: impl Into<Operand<'a>>) -> Result<Self> {
        match lhs.into() {
            Operand::Scalar(x) => self.mul(x),
            Operand::Matrix(other) => other.mul(self),
        }
    }

    /// `self · rhs⁻¹`. Only a dense divisor can be inverted.
    pub fn div(&self, rhs: &NormalizedMatrix) -> Result<Self> {
        match &rhs.inner {
            Inner::Dense(mat) => {
                debug!("div: invert dense divisor");
                let inverse = rhs.avatar.invert(mat.view())?;
                self.mul(&self.wrap_dense(inverse))
            }
            Inner::Factorized { .. } => Err(MatrixError::unsupported(
                "invert",
                &[self.representation(), Representation::Factorized],
            )),
        }
    }

    /// `lhs · self⁻¹`
    pub fn rdiv(&self, lhs: &NormalizedMatrix) -> Result<Self> {
        lhs.div(self)
    }

    /// Element-wise exponentiation by a scalar.
    pub fn pow(&self, exponent: f64) -> Result<Self> {
        match &self.inner {
            Inner::Dense(mat) => {
                debug!("pow: dense -> scalarExponentiation");
                Ok(self.wrap_dense(self.avatar.scalar_exponentiation(mat.view(), exponent)?))
            }
            Inner::Factorized { table, .. } => {
                debug!("pow: factorized -> delegate scalarExponentiation");
                Ok(self.wrap_dense(table.scalar_exponentiation(exponent)?))
            }
        }
    }

    /// [`pow`](Self::pow) with [`DEFAULT_EXPONENT`].
    pub fn pow_default(&self) -> Result<Self> {
        self.pow(DEFAULT_EXPONENT)
    }

    /// Factorized values stay factorized and share their join blocks with
    /// `self`; dense values are transposed by the avatar.
    pub fn transpose(&self) -> Result<Self> {
        match &self.inner {
            Inner::Factorized { blocks, table } => {
                debug!("transpose: factorized -> delegate transpose");
                Ok(NormalizedMatrix {
                    inner: Inner::Factorized {
                        blocks: Arc::clone(blocks),
                        table: table.transpose()?,
                    },
                    avatar: Arc::clone(&self.avatar),
                })
            }
            Inner::Dense(mat) => {
                debug!("transpose: dense -> transpose");
                Ok(self.wrap_dense(self.avatar.transpose(mat.view())?))
            }
        }
    }

    /// Row sums, column sums, or (with `None`) the sum of all elements.
    ///
    /// Reductions need delegate support that this type does not expose, so
    /// every call fails.
    pub fn sum(&self, direction: Option<Direction>) -> Result<Self> {
        let op = match direction {
            Some(Direction::ROW) => "rowSum",
            Some(Direction::COLUMN) => "columnSum",
            None => "elementWiseSum",
        };
        Err(MatrixError::unsupported(op, &[self.representation()]))
    }

    /// Element access is not supported on either representation.
    pub fn get(&self, _row: usize, _col: usize) -> Result<f64> {
        Err(MatrixError::unsupported("index", &[self.representation()]))
    }

    pub fn add_assign<'a>(&mut self, rhs: impl Into<Operand<'a>>) -> Result<()> {
        *self = self.add(rhs)?;
        Ok(())
    }

    pub fn sub_assign<'a>(&mut self, rhs: impl Into<Operand<'a>>) -> Result<()> {
        *self = self.sub(rhs)?;
        Ok(())
    }

    pub fn mul_assign<'a>(&mut self, rhs: impl Into<Operand<'a>>) -> Result<()> {
        *self = self.mul(rhs)?;
        Ok(())
    }

    pub fn div_assign(&mut self, rhs: &NormalizedMatrix) -> Result<()> {
        *self = self.div(rhs)?;
        Ok(())
    }

    pub fn pow_assign(&mut self, exponent: f64) -> Result<()> {
        *self = self.pow(exponent)?;
        Ok(())
    }
}
