//! # Synthetic datasets
//!
//! Benchmark inputs are described by a small JSON metadata file and
//! synthesized on the fly: a base table `S`, one relation `R`, and a key
//! matrix `K` joining them. The join is returned both factorized and
//! materialized so that the same task can be timed on either.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use log::info;
use ndarray::{concatenate, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

use crate::avatar::Avatar;
use crate::error::{MatrixError, Result};
use crate::matrix::{FactorizedBuilder, NormalizedMatrix};
use crate::sparse::{indicator_from_indices, KeyMatrixOps};

/// Name of the only dataset kind the generator supports.
pub const SYNTHESIZED: &str = "synthesized";

/// Contents of a benchmark parameter file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetMeta {
    pub name: String,
    /// Rows of the relation table.
    #[serde(rename = "nR")]
    pub n_r: usize,
    /// Columns of the base table.
    #[serde(rename = "dS")]
    pub d_s: usize,
    #[serde(rename = "TRs", default = "default_ratios")]
    pub tuple_ratios: Vec<usize>,
    #[serde(rename = "FRs", default = "default_ratios")]
    pub feature_ratios: Vec<usize>,
    /// Tag embedded in output file names.
    #[serde(rename = "outputMeta")]
    pub output_meta: String,
}

fn default_ratios() -> Vec<usize> {
    vec![1]
}

impl FromStr for DatasetMeta {
    type Err = MatrixError;

    fn from_str(s: &str) -> Result<Self> {
        let meta: DatasetMeta = serde_json::from_str(s)
            .map_err(|e| MatrixError::InvalidConfiguration(e.to_string()))?;
        meta.validate()?;
        Ok(meta)
    }
}

impl DatasetMeta {
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading dataset metadata {}", path.display()))?;
        let meta = contents
            .parse::<DatasetMeta>()
            .with_context(|| format!("parsing dataset metadata {}", path.display()))?;
        Ok(meta)
    }

    fn validate(&self) -> Result<()> {
        if self.name != SYNTHESIZED {
            return Err(MatrixError::InvalidConfiguration(format!(
                "unsupported dataset `{}`, only `{}` can be generated",
                self.name, SYNTHESIZED
            )));
        }
        if self.n_r == 0 || self.d_s == 0 {
            return Err(MatrixError::InvalidConfiguration(
                "nR and dS must be positive".to_string(),
            ));
        }
        let mut ratios = self.tuple_ratios.iter().chain(self.feature_ratios.iter());
        if self.tuple_ratios.is_empty()
            || self.feature_ratios.is_empty()
            || ratios.any(|&r| r == 0)
        {
            return Err(MatrixError::InvalidConfiguration(
                "TRs and FRs must be non-empty lists of positive ratios".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which representation of the synthesized join a run operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The factorized join.
    Trinity,
    Materialized,
}

impl FromStr for Mode {
    type Err = MatrixError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "trinity" => Ok(Mode::Trinity),
            "materialized" => Ok(Mode::Materialized),
            other => Err(MatrixError::InvalidConfiguration(format!(
                "unknown mode `{}`",
                other
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Trinity => write!(f, "trinity"),
            Mode::Materialized => write!(f, "materialized"),
        }
    }
}

/// A synthesized join in both representations, with its target vector.
#[derive(Debug, Clone)]
pub struct SynthesizedMatrices {
    pub factorized: NormalizedMatrix,
    pub materialized: NormalizedMatrix,
    pub target: NormalizedMatrix,
}

impl SynthesizedMatrices {
    /// The representation selected by `mode`.
    pub fn data(&self, mode: Mode) -> &NormalizedMatrix {
        match mode {
            Mode::Trinity => &self.factorized,
            Mode::Materialized => &self.materialized,
        }
    }

    /// Rows of the join.
    pub fn n_mat(&self) -> usize {
        self.materialized.shape().0
    }

    /// Columns of the join.
    pub fn d_mat(&self) -> usize {
        self.materialized.shape().1
    }
}

/// Generates `S (n_s × d_s)`, `K (n_s × n_r)` and `R (n_r × d_r)` with
/// `n_s = n_r·tuple_ratio` and `d_r = d_s·feature_ratio`.
///
/// `S` and `R` are uniform on `[0, 1)`; every row of `K` selects one
/// uniformly drawn row of `R`. The target is a column of ones.
pub fn synthesize(
    n_r: usize,
    d_s: usize,
    tuple_ratio: usize,
    feature_ratio: usize,
    seed: u64,
    avatar: Arc<dyn Avatar>,
) -> Result<SynthesizedMatrices> {
    if n_r == 0 || d_s == 0 || tuple_ratio == 0 || feature_ratio == 0 {
        return Err(MatrixError::InvalidConfiguration(
            "dimensions and ratios must be positive".to_string(),
        ));
    }
    let n_s = n_r * tuple_ratio;
    let d_r = d_s * feature_ratio;
    info!(
        "synthesizing S {}x{}, K {}x{}, R {}x{}",
        n_s, d_s, n_s, n_r, n_r, d_r
    );

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let s = Array2::from_shape_fn((n_s, d_s), |_| rng.random::<f64>());
    let r = Array2::from_shape_fn((n_r, d_r), |_| rng.random::<f64>());
    let indices: Vec<usize> = (0..n_s).map(|_| rng.random_range(0..n_r)).collect();
    let k = indicator_from_indices(n_r, &indices)?;

    let kr = k.mul_dense(r.view())?;
    let joined = concatenate(Axis(1), &[s.view(), kr.view()]).map_err(|e| {
        MatrixError::InvalidConfiguration(format!("cannot materialize join: {}", e))
    })?;

    let factorized = FactorizedBuilder::new()
        .base(s)
        .join(k, r)
        .avatar(Arc::clone(&avatar))
        .build()?;
    let materialized = NormalizedMatrix::dense(joined, Arc::clone(&avatar));
    let target = NormalizedMatrix::dense(Array2::ones((n_s, 1)), avatar);

    Ok(SynthesizedMatrices {
        factorized,
        materialized,
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::NdarrayAvatar;
    use approx::assert_abs_diff_eq;
    use std::io::Write;

    const META: &str = r#"{
        "name": "synthesized",
        "nR": 1000,
        "dS": 20,
        "TRs": [1, 5, 10],
        "FRs": [1, 2],
        "outputMeta": "synth"
    }"#;

    #[test]
    fn test_parse_metadata() {
        let meta: DatasetMeta = META.parse().unwrap();
        assert_eq!(meta.n_r, 1000);
        assert_eq!(meta.d_s, 20);
        assert_eq!(meta.tuple_ratios, vec![1, 5, 10]);
        assert_eq!(meta.feature_ratios, vec![1, 2]);
        assert_eq!(meta.output_meta, "synth");
    }

    #[test]
    fn test_ratios_default_to_one() {
        let meta: DatasetMeta =
            r#"{"name": "synthesized", "nR": 10, "dS": 2, "outputMeta": "x"}"#
                .parse()
                .unwrap();
        assert_eq!(meta.tuple_ratios, vec![1]);
        assert_eq!(meta.feature_ratios, vec![1]);
    }

    #[test]
    fn test_invalid_metadata() {
        let cases = [
            r#"{"name": "expedia", "nR": 10, "dS": 2, "outputMeta": "x"}"#,
            r#"{"name": "synthesized", "nR": 0, "dS": 2, "outputMeta": "x"}"#,
            r#"{"name": "synthesized", "nR": 10, "dS": 2, "TRs": [], "outputMeta": "x"}"#,
            r#"{"name": "synthesized", "nR": 10, "dS": 2, "FRs": [0], "outputMeta": "x"}"#,
            r#"{"name": "synthesized", "dS": 2, "outputMeta": "x"}"#,
            "not json",
        ];
        for case in cases {
            assert!(
                matches!(
                    case.parse::<DatasetMeta>(),
                    Err(MatrixError::InvalidConfiguration(_))
                ),
                "accepted {}",
                case
            );
        }
    }

    #[test]
    fn test_metadata_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(META.as_bytes()).unwrap();
        let meta = DatasetMeta::from_path(file.path()).unwrap();
        assert_eq!(meta.output_meta, "synth");

        let dir = tempfile::tempdir().unwrap();
        assert!(DatasetMeta::from_path(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("trinity".parse::<Mode>().unwrap(), Mode::Trinity);
        assert_eq!("materialized".parse::<Mode>().unwrap(), Mode::Materialized);
        assert!("dense".parse::<Mode>().is_err());
        assert_eq!(Mode::Trinity.to_string(), "trinity");
    }

    #[test]
    fn test_synthesize_shapes() {
        let m = synthesize(10, 3, 4, 2, 1, Arc::new(NdarrayAvatar::new())).unwrap();
        assert_eq!(m.n_mat(), 40);
        assert_eq!(m.d_mat(), 3 + 6);
        assert_eq!(m.factorized.shape(), (40, 9));
        assert_eq!(m.target.shape(), (40, 1));
        assert!(m.data(Mode::Trinity).is_factorized());
        assert!(!m.data(Mode::Materialized).is_factorized());
        assert!(m.factorized.shares_avatar(&m.materialized));
    }

    #[test]
    fn test_synthesized_representations_agree() {
        let m = synthesize(6, 2, 3, 1, 9, Arc::new(NdarrayAvatar::new())).unwrap();
        let joined = m.factorized.to_dense().unwrap();
        let materialized = m.materialized.as_dense().unwrap();
        for (a, b) in joined.iter().zip(materialized.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
        assert!(materialized.iter().all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_synthesize_is_deterministic() {
        let avatar: Arc<dyn Avatar> = Arc::new(NdarrayAvatar::new());
        let a = synthesize(5, 2, 2, 2, 3, avatar.clone()).unwrap();
        let b = synthesize(5, 2, 2, 2, 3, avatar).unwrap();
        assert_eq!(a.materialized.as_dense(), b.materialized.as_dense());
    }

    #[test]
    fn test_synthesize_rejects_zero_dimensions() {
        assert!(synthesize(0, 2, 1, 1, 0, Arc::new(NdarrayAvatar::new())).is_err());
    }
}
