//! Per-group mean coefficient rows

use std::collections::BTreeMap;

use ndarray::{Array1, ArrayView1, Axis};

use crate::data::GroupLabels;
use crate::design::DesignMatrix;
use crate::error::{ContrastError, Result};

/// Mean design row for each group label.
///
/// Each row is the covariate pattern of a "typical" member of the group;
/// dotted with the fitted coefficients it gives the group's expected
/// log-expression.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCoefficients {
    width: usize,
    rows: BTreeMap<String, Array1<f64>>,
    sizes: BTreeMap<String, usize>,
}

impl GroupCoefficients {
    /// Build from precomputed rows; every row must have the same width
    pub fn from_rows<I, S>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut width = None;
        let mut map = BTreeMap::new();
        for (label, row) in rows {
            let label = label.into();
            match width {
                None => width = Some(row.len()),
                Some(w) if w != row.len() => {
                    return Err(ContrastError::DimensionMismatch {
                        expected: format!("{} columns", w),
                        got: format!("{} columns for group '{}'", row.len(), label),
                    })
                }
                Some(_) => {}
            }
            map.insert(label, Array1::from(row));
        }
        let width = width.ok_or_else(|| ContrastError::EmptyData {
            reason: "no group coefficient rows".to_string(),
        })?;

        Ok(Self {
            width,
            rows: map,
            sizes: BTreeMap::new(),
        })
    }

    /// Coefficient row for a label
    pub fn get(&self, label: &str) -> Option<ArrayView1<'_, f64>> {
        self.rows.get(label).map(|r| r.view())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.rows.contains_key(label)
    }

    /// Labels in sorted order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of every row (number of design columns)
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of samples the row was averaged over, when computed from a design
    pub fn size(&self, label: &str) -> Option<usize> {
        self.sizes.get(label).copied()
    }
}

/// Average the design rows of each group label column-wise.
///
/// Fails with `DimensionMismatch` if the label count differs from the number
/// of design rows, and with `EmptyGroup` if a declared level has no rows.
/// The intercept entry of each result is exactly 1, since it is a mean of ones.
pub fn compute_group_coefficients(design: &DesignMatrix, labels: &GroupLabels) -> Result<GroupCoefficients> {
    if labels.len() != design.nrows() {
        return Err(ContrastError::DimensionMismatch {
            expected: format!("{} group labels (one per design row)", design.nrows()),
            got: format!("{} group labels", labels.len()),
        });
    }

    let matrix = design.matrix();
    let by_level = labels.indices_by_level();
    let mut rows = BTreeMap::new();
    let mut sizes = BTreeMap::new();

    for level in labels.levels() {
        let idx = by_level.get(level.as_str()).map(|v| v.as_slice()).unwrap_or(&[]);
        let mean = matrix
            .select(Axis(0), idx)
            .mean_axis(Axis(0))
            .ok_or_else(|| ContrastError::EmptyGroup {
                group: level.clone(),
                column: labels.column().to_string(),
            })?;
        log::debug!("group '{}': {} samples", level, idx.len());
        rows.insert(level.clone(), mean);
        sizes.insert(level.clone(), idx.len());
    }

    Ok(GroupCoefficients {
        width: design.ncols(),
        rows,
        sizes,
    })
}
