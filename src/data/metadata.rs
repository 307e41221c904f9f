//! Per-sample metadata (the sample sheet)

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::GroupLabels;
use crate::error::{ContrastError, Result};

/// Sample metadata holding categorical attributes per sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleMetadata {
    /// Sample identifiers
    sample_ids: Vec<String>,
    /// Categorical attributes (column name -> value for each sample)
    conditions: HashMap<String, Vec<String>>,
}

impl SampleMetadata {
    /// Create new sample metadata
    pub fn new(sample_ids: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        for id in &sample_ids {
            if !seen.insert(id) {
                log::warn!("Duplicate sample ID detected: '{}'. Sample IDs should be unique.", id);
            }
        }
        Self {
            sample_ids,
            conditions: HashMap::new(),
        }
    }

    /// Add a categorical column
    pub fn add_condition(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.sample_ids.len() {
            return Err(ContrastError::DimensionMismatch {
                expected: format!("{} values", self.sample_ids.len()),
                got: format!("{} values", values.len()),
            });
        }
        self.conditions.insert(name.to_string(), values);
        Ok(())
    }

    /// Check if a column exists
    pub fn has_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    /// Get the value of a column for a specific sample
    pub fn get_value(&self, condition: &str, sample_idx: usize) -> Result<&str> {
        self.conditions
            .get(condition)
            .and_then(|v| v.get(sample_idx))
            .map(|s| s.as_str())
            .ok_or_else(|| ContrastError::InvalidInput {
                reason: format!(
                    "condition '{}' or sample index {} not found",
                    condition, sample_idx
                ),
            })
    }

    /// Get unique levels for a column (sorted)
    pub fn get_levels(&self, condition: &str) -> Result<Vec<String>> {
        let values = self.condition(condition)?;
        let mut unique = values.to_vec();
        unique.sort();
        unique.dedup();
        Ok(unique)
    }

    /// Get sample IDs
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get number of samples
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Get the values of a column
    pub fn condition(&self, name: &str) -> Result<&[String]> {
        self.conditions
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| ContrastError::InvalidMetadata {
                reason: format!("column '{}' not found in metadata", name),
            })
    }

    /// Get all column names (sorted)
    pub fn condition_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.conditions.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Group labels from a column, declaring the observed levels
    pub fn group_labels(&self, column: &str) -> Result<GroupLabels> {
        let values = self.condition(column)?.to_vec();
        GroupLabels::from_values(column, values)
    }

    /// Group labels from a column with an explicit set of declared levels
    pub fn group_labels_with_levels(&self, column: &str, levels: Vec<String>) -> Result<GroupLabels> {
        let values = self.condition(column)?.to_vec();
        GroupLabels::with_levels(column, values, levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sample_metadata() {
        let mut meta = SampleMetadata::new(ids(&["s1", "s2", "s3", "s4"]));
        meta.add_condition("population", ids(&["YRI", "CEU", "YRI", "TSI"]))
            .unwrap();

        assert_eq!(meta.get_levels("population").unwrap(), vec!["CEU", "TSI", "YRI"]);
        assert_eq!(meta.group_labels("population").unwrap().level_counts()[2], ("YRI".to_string(), 2));
        assert_eq!(meta.get_value("population", 3).unwrap(), "TSI");
    }

    #[test]
    fn test_wrong_length_column_rejected() {
        let mut meta = SampleMetadata::new(ids(&["s1", "s2"]));
        let err = meta.add_condition("sex", ids(&["F"])).unwrap_err();
        assert!(matches!(err, ContrastError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_missing_column() {
        let meta = SampleMetadata::new(ids(&["s1"]));
        assert!(meta.condition("population").is_err());
        assert!(meta.group_labels("population").is_err());
    }
}
