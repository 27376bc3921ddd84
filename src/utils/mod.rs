use ndarray::ArrayView2;

/// Reduction axis for row-wise and column-wise sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ROW,
    COLUMN,
}

pub(crate) fn shape_of(matrix: &ArrayView2<f64>) -> (usize, usize) {
    (matrix.nrows(), matrix.ncols())
}
