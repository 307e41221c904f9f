//! Threshold filtering of count rows before they go to the expression engine

use rayon::prelude::*;

use crate::data::CountMatrix;
use crate::error::{ContrastError, Result};

/// Row-filter thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// A sample "expresses" a feature when its count is at least this
    pub min_count: f64,
    /// Minimum number of expressing samples for a feature to be kept
    pub min_samples: usize,
    /// Optional minimum row mean across all samples
    pub min_mean: Option<f64>,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            min_count: 10.0,
            min_samples: 1,
            min_mean: None,
        }
    }
}

impl FilterParams {
    /// Whether a single row of counts passes
    pub fn keeps(&self, row: &[f64]) -> bool {
        let expressing = row.iter().filter(|&&x| x >= self.min_count).count();
        if expressing < self.min_samples {
            return false;
        }
        match self.min_mean {
            Some(min_mean) if !row.is_empty() => {
                row.iter().sum::<f64>() / row.len() as f64 >= min_mean
            }
            _ => true,
        }
    }
}

/// Outcome of a filtering pass
#[derive(Debug, Clone)]
pub struct FilterReport {
    pub kept: CountMatrix,
    pub n_input: usize,
    pub n_removed: usize,
}

/// Keep the rows of `counts` that pass `params`, preserving order.
///
/// Rows are evaluated in parallel on the current rayon pool.
pub fn filter_counts(counts: &CountMatrix, params: &FilterParams) -> Result<FilterReport> {
    if params.min_samples > counts.n_samples() {
        return Err(ContrastError::InvalidInput {
            reason: format!(
                "min_samples ({}) exceeds the number of samples ({})",
                params.min_samples,
                counts.n_samples()
            ),
        });
    }

    let keep: Vec<usize> = (0..counts.n_genes())
        .into_par_iter()
        .filter(|&i| {
            let row = counts.gene_counts(i).to_vec();
            params.keeps(&row)
        })
        .collect();

    if keep.is_empty() {
        return Err(ContrastError::EmptyData {
            reason: "No features passed the filtering thresholds".to_string(),
        });
    }

    let n_input = counts.n_genes();
    let n_removed = n_input - keep.len();
    log::info!(
        "Kept {} of {} features (min_count={}, min_samples={}, min_mean={:?})",
        keep.len(),
        n_input,
        params.min_count,
        params.min_samples,
        params.min_mean
    );

    Ok(FilterReport {
        kept: counts.subset_genes(&keep)?,
        n_input,
        n_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn counts() -> CountMatrix {
        CountMatrix::new(
            array![
                [0.0, 0.0, 1.0, 0.0],
                [12.0, 15.5, 9.0, 30.0],
                [10.0, 0.0, 0.0, 0.0],
                [200.0, 180.0, 220.0, 210.0],
            ],
            (1..=4).map(|i| format!("gene{}", i)).collect(),
            (1..=4).map(|i| format!("s{}", i)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_min_samples_threshold() {
        let params = FilterParams {
            min_count: 10.0,
            min_samples: 2,
            min_mean: None,
        };
        let report = filter_counts(&counts(), &params).unwrap();
        assert_eq!(report.kept.gene_ids(), &["gene2".to_string(), "gene4".to_string()]);
        assert_eq!(report.n_removed, 2);
        assert_eq!(report.n_input, 4);
    }

    #[test]
    fn test_default_keeps_any_expressing_row() {
        let report = filter_counts(&counts(), &FilterParams::default()).unwrap();
        assert_eq!(report.kept.n_genes(), 3);
    }

    #[test]
    fn test_min_mean() {
        let params = FilterParams {
            min_count: 0.0,
            min_samples: 0,
            min_mean: Some(50.0),
        };
        let report = filter_counts(&counts(), &params).unwrap();
        assert_eq!(report.kept.gene_ids(), &["gene4".to_string()]);
    }

    #[test]
    fn test_nothing_passes() {
        let params = FilterParams {
            min_count: 1000.0,
            min_samples: 1,
            min_mean: None,
        };
        assert!(matches!(
            filter_counts(&counts(), &params),
            Err(ContrastError::EmptyData { .. })
        ));
    }

    #[test]
    fn test_min_samples_above_sample_count() {
        let params = FilterParams {
            min_samples: 5,
            ..FilterParams::default()
        };
        assert!(filter_counts(&counts(), &params).is_err());
    }
}
