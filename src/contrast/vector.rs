//! Contrast vectors: focal composite vs. the unweighted mean of the rest

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{ContrastError, Result};

/// Element-wise `focal - mean(others)`.
///
/// The baseline is the plain average of the other rows, not weighted by how
/// many samples stand behind each of them: groups sequenced at different
/// depths contribute equally.
pub fn compute_contrast(focal: ArrayView1<'_, f64>, others: &[ArrayView1<'_, f64>]) -> Result<Array1<f64>> {
    let (first, rest) = others.split_first().ok_or_else(|| ContrastError::EmptyData {
        reason: "contrast requires at least one baseline row".to_string(),
    })?;

    let width = focal.len();
    for (i, row) in others.iter().enumerate() {
        let len = row.len();
        if len != width {
            return Err(ContrastError::DimensionMismatch {
                expected: format!("{} columns (focal row)", width),
                got: format!("{} columns in baseline row {}", len, i),
            });
        }
    }

    let mut baseline = first.to_owned();
    for row in rest {
        baseline += row;
    }
    baseline /= others.len() as f64;

    Ok(&focal - &baseline)
}

/// A named contrast over the design's coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastVector {
    /// Focal group the contrast tests
    pub focal: String,
    /// Top-level groups averaged into the baseline
    pub baseline: Vec<String>,
    /// Coefficient names, aligned with `weights`
    pub coef_names: Vec<String>,
    /// Contrast weights, one per design column
    pub weights: Vec<f64>,
}

impl ContrastVector {
    pub fn new(focal: &str, baseline: Vec<String>, coef_names: Vec<String>, weights: Array1<f64>) -> Result<Self> {
        if coef_names.len() != weights.len() {
            return Err(ContrastError::DimensionMismatch {
                expected: format!("{} weights", coef_names.len()),
                got: format!("{} weights", weights.len()),
            });
        }
        Ok(Self {
            focal: focal.to_string(),
            baseline,
            coef_names,
            weights: weights.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight for a named coefficient
    pub fn weight(&self, coef: &str) -> Option<f64> {
        self.coef_names
            .iter()
            .position(|c| c == coef)
            .map(|i| self.weights[i])
    }

    /// Label such as `AFR_vs_EAS+EUR`
    pub fn label(&self) -> String {
        format!("{}_vs_{}", self.focal, self.baseline.join("+"))
    }
}
