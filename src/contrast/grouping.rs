//! Hand-specified grouping of fine-grained labels into top-level groups

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use super::{compute_composite_coefficient, compute_contrast, ContrastVector, GroupCoefficients};
use crate::error::{ContrastError, Result};

/// Top-level group name -> member labels, e.g. `{"AFR": ["LWK", "YRI"]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopLevelGrouping {
    groups: BTreeMap<String, Vec<String>>,
}

impl TopLevelGrouping {
    /// Create and validate a grouping.
    ///
    /// Every top-level group needs at least one member and a label may belong
    /// to only one top-level group.
    pub fn new(groups: BTreeMap<String, Vec<String>>) -> Result<Self> {
        let grouping = Self { groups };
        grouping.validate()?;
        Ok(grouping)
    }

    /// Parse a grouping from a JSON object
    pub fn from_json(json: &str) -> Result<Self> {
        let groups: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
        Self::new(groups)
    }

    /// Read a grouping from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let groups: BTreeMap<String, Vec<String>> = serde_json::from_reader(reader)?;
        Self::new(groups)
    }

    fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(ContrastError::EmptyData {
                reason: "grouping has no top-level groups".to_string(),
            });
        }
        let mut owner: BTreeMap<&str, &str> = BTreeMap::new();
        for (group, members) in &self.groups {
            if members.is_empty() {
                return Err(ContrastError::EmptyData {
                    reason: format!("top-level group '{}' has no members", group),
                });
            }
            for member in members {
                if let Some(prev) = owner.insert(member.as_str(), group.as_str()) {
                    return Err(ContrastError::InvalidInput {
                        reason: format!(
                            "label '{}' is assigned to both '{}' and '{}'",
                            member, prev, group
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Top-level group names, sorted
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(|s| s.as_str()).collect()
    }

    pub fn members(&self, group: &str) -> Option<&[String]> {
        self.groups.get(group).map(|v| v.as_slice())
    }

    /// Every member label across all groups, sorted
    pub fn all_members(&self) -> Vec<String> {
        let mut all: Vec<String> = self.groups.values().flatten().cloned().collect();
        all.sort();
        all
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Composite coefficient row for every top-level group
    pub fn composites(&self, coefficients: &GroupCoefficients) -> Result<BTreeMap<String, Array1<f64>>> {
        self.groups
            .iter()
            .map(|(group, members)| {
                compute_composite_coefficient(coefficients, members.as_slice()).map(|row| (group.clone(), row))
            })
            .collect()
    }

    /// Contrast of `focal` against the unweighted mean of every other top-level group
    pub fn focal_contrast(
        &self,
        coefficients: &GroupCoefficients,
        coef_names: &[String],
        focal: &str,
    ) -> Result<ContrastVector> {
        let composites = self.composites(coefficients)?;
        contrast_from_composites(&composites, coef_names, focal)
    }

    /// One focal-vs-rest contrast per top-level group, in sorted group order
    pub fn all_contrasts(
        &self,
        coefficients: &GroupCoefficients,
        coef_names: &[String],
    ) -> Result<Vec<ContrastVector>> {
        let composites = self.composites(coefficients)?;
        composites
            .keys()
            .map(|focal| contrast_from_composites(&composites, coef_names, focal))
            .collect()
    }
}

fn contrast_from_composites(
    composites: &BTreeMap<String, Array1<f64>>,
    coef_names: &[String],
    focal: &str,
) -> Result<ContrastVector> {
    let focal_row = composites.get(focal).ok_or_else(|| ContrastError::UnknownGroup {
        group: focal.to_string(),
    })?;

    let (baseline, others): (Vec<String>, Vec<ArrayView1<'_, f64>>) = composites
        .iter()
        .filter(|(name, _)| name.as_str() != focal)
        .map(|(name, row)| (name.clone(), row.view()))
        .unzip();

    let weights = compute_contrast(focal_row.view(), &others)?;
    ContrastVector::new(focal, baseline, coef_names.to_vec(), weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coefficients() -> GroupCoefficients {
        GroupCoefficients::from_rows(vec![
            ("g1", vec![1.0, 0.0, 1.0]),
            ("g2", vec![1.0, 1.0, 0.0]),
            ("g3", vec![1.0, 0.5, 0.5]),
        ])
        .unwrap()
    }

    fn names() -> Vec<String> {
        vec!["Intercept".to_string(), "x".to_string(), "y".to_string()]
    }

    #[test]
    fn test_balanced_composites_cancel() {
        let grouping = TopLevelGrouping::from_json(r#"{"A": ["g1", "g2"], "B": ["g3"]}"#).unwrap();
        let composites = grouping.composites(&coefficients()).unwrap();
        assert_eq!(composites["A"].to_vec(), vec![1.0, 0.5, 0.5]);

        let cv = grouping.focal_contrast(&coefficients(), &names(), "A").unwrap();
        assert_eq!(cv.weights, vec![0.0, 0.0, 0.0]);
        assert_eq!(cv.baseline, vec!["B".to_string()]);
    }

    #[test]
    fn test_all_contrasts_sorted_by_group() {
        let grouping = TopLevelGrouping::from_json(r#"{"B": ["g2"], "A": ["g1"], "C": ["g3"]}"#).unwrap();
        let contrasts = grouping.all_contrasts(&coefficients(), &names()).unwrap();
        let focals: Vec<&str> = contrasts.iter().map(|c| c.focal.as_str()).collect();
        assert_eq!(focals, vec!["A", "B", "C"]);
        // A = [1,0,1]; mean(B, C) = [1, 0.75, 0.25]
        assert_eq!(contrasts[0].weights, vec![0.0, -0.75, 0.75]);
        for cv in &contrasts {
            assert_eq!(cv.weights[0], 0.0);
        }
    }

    #[test]
    fn test_single_top_level_group_has_no_baseline() {
        let grouping = TopLevelGrouping::from_json(r#"{"A": ["g1", "g2"]}"#).unwrap();
        let err = grouping.focal_contrast(&coefficients(), &names(), "A").unwrap_err();
        assert!(matches!(err, ContrastError::EmptyData { .. }));
    }

    #[test]
    fn test_unknown_focal_and_member() {
        let grouping = TopLevelGrouping::from_json(r#"{"A": ["g1"], "B": ["g4"]}"#).unwrap();
        let err = grouping.focal_contrast(&coefficients(), &names(), "A").unwrap_err();
        assert!(matches!(err, ContrastError::UnknownGroup { .. }));

        let grouping = TopLevelGrouping::from_json(r#"{"A": ["g1"], "B": ["g2"]}"#).unwrap();
        let err = grouping.focal_contrast(&coefficients(), &names(), "Z").unwrap_err();
        assert!(matches!(err, ContrastError::UnknownGroup { .. }));
    }

    #[test]
    fn test_invalid_groupings() {
        assert!(TopLevelGrouping::from_json("{}").is_err());
        assert!(TopLevelGrouping::from_json(r#"{"A": []}"#).is_err());
        assert!(matches!(
            TopLevelGrouping::from_json(r#"{"A": ["g1"], "B": ["g1"]}"#),
            Err(ContrastError::InvalidInput { .. })
        ));
        assert!(matches!(
            TopLevelGrouping::from_json("[1, 2]"),
            Err(ContrastError::JsonError(_))
        ));
    }

    #[test]
    fn test_all_members_sorted() {
        let grouping = TopLevelGrouping::from_json(r#"{"EUR": ["TSI", "CEU"], "AFR": ["YRI"]}"#).unwrap();
        assert_eq!(grouping.all_members(), vec!["CEU", "TSI", "YRI"]);
        assert_eq!(grouping.group_names(), vec!["AFR", "EUR"]);
    }
}
