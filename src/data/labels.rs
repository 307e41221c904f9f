//! Categorical group labels with a declared level set

use std::collections::HashMap;

use crate::error::{ContrastError, Result};

/// One label per sample, drawn from a fixed set of declared levels
#[derive(Debug, Clone, PartialEq)]
pub struct GroupLabels {
    /// Name of the metadata column the labels came from
    column: String,
    /// Label value for each sample
    values: Vec<String>,
    /// Declared levels, sorted and deduplicated
    levels: Vec<String>,
}

impl GroupLabels {
    /// Labels whose declared levels are exactly the observed values
    pub fn from_values(column: &str, values: Vec<String>) -> Result<Self> {
        let levels = values.clone();
        Self::with_levels(column, values, levels)
    }

    /// Labels with an explicit level set.
    ///
    /// Every value must be one of `levels`. A declared level that no sample
    /// carries is accepted here and reported later as `EmptyGroup` when
    /// coefficients are computed.
    pub fn with_levels(column: &str, values: Vec<String>, mut levels: Vec<String>) -> Result<Self> {
        if values.is_empty() {
            return Err(ContrastError::EmptyData {
                reason: format!("column '{}' has no values", column),
            });
        }

        levels.sort();
        levels.dedup();

        if let Some(stray) = values.iter().find(|v| levels.binary_search(*v).is_err()) {
            return Err(ContrastError::InvalidInput {
                reason: format!(
                    "value '{}' in column '{}' is not one of the declared levels {:?}",
                    stray, column, levels
                ),
            });
        }

        Ok(Self {
            column: column.to_string(),
            values,
            levels,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Row indices carrying each declared level (empty vec for unobserved levels)
    pub fn indices_by_level(&self) -> HashMap<&str, Vec<usize>> {
        let mut by_level: HashMap<&str, Vec<usize>> = self
            .levels
            .iter()
            .map(|l| (l.as_str(), Vec::new()))
            .collect();
        for (i, v) in self.values.iter().enumerate() {
            if let Some(rows) = by_level.get_mut(v.as_str()) {
                rows.push(i);
            }
        }
        by_level
    }

    /// Number of samples per declared level
    pub fn level_counts(&self) -> Vec<(String, usize)> {
        let by_level = self.indices_by_level();
        self.levels
            .iter()
            .map(|l| (l.clone(), by_level.get(l.as_str()).map_or(0, |r| r.len())))
            .collect()
    }
}
