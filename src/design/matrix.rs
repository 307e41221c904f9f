//! Treatment-coded design matrix construction

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayView2};

use super::check_full_rank;
use crate::data::SampleMetadata;
use crate::error::{ContrastError, Result};

pub const INTERCEPT: &str = "Intercept";

/// A full-rank design matrix with named columns.
///
/// Column 0 is always the intercept (constant 1).
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    matrix: Array2<f64>,
    coef_names: Vec<String>,
    sample_ids: Vec<String>,
    /// Factor name -> reference level
    reference_levels: HashMap<String, String>,
}

impl DesignMatrix {
    /// Wrap an already encoded matrix, e.g. one exported by the expression engine.
    ///
    /// The first column must be the constant intercept and the matrix must be
    /// of full column rank.
    pub fn from_parts(matrix: Array2<f64>, coef_names: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        if coef_names.len() != matrix.ncols() {
            return Err(ContrastError::DimensionMismatch {
                expected: format!("{} coefficient names", matrix.ncols()),
                got: format!("{} coefficient names", coef_names.len()),
            });
        }
        if sample_ids.len() != matrix.nrows() {
            return Err(ContrastError::DimensionMismatch {
                expected: format!("{} sample IDs", matrix.nrows()),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }
        if matrix.ncols() == 0 || matrix.column(0).iter().any(|&v| v != 1.0) {
            return Err(ContrastError::InvalidInput {
                reason: "first design column must be an intercept of constant 1".to_string(),
            });
        }
        check_full_rank(matrix.view())?;

        Ok(Self {
            matrix,
            coef_names,
            sample_ids,
            reference_levels: HashMap::new(),
        })
    }

    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.matrix.row(i)
    }

    /// Coefficient names in column order (the engine's `resultsNames`)
    pub fn coef_names(&self) -> &[String] {
        &self.coef_names
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Reference level of an encoded factor (empty for `from_parts` designs)
    pub fn reference_level(&self, factor: &str) -> Option<&str> {
        self.reference_levels.get(factor).map(|s| s.as_str())
    }
}

/// Builder for `~ factor1 + factor2 + ... + main_effect` designs
///
/// ```ignore
/// let design = DesignBuilder::new()
///     .factor("sex")
///     .main_effect("population")
///     .reference_level("population", "YRI")
///     .build(&metadata)?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct DesignBuilder {
    main_effect: Option<String>,
    factors: Vec<String>,
    reference_levels: HashMap<String, String>,
}

impl DesignBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the variable of interest; it is placed last in the formula
    pub fn main_effect(mut self, variable: &str) -> Self {
        self.main_effect = Some(variable.to_string());
        self
    }

    /// Add a categorical covariate
    pub fn factor(mut self, name: &str) -> Self {
        if !self.factors.iter().any(|f| f == name) {
            self.factors.push(name.to_string());
        }
        self
    }

    /// Override the reference level of a factor (default: alphabetically first)
    pub fn reference_level(mut self, factor: &str, level: &str) -> Self {
        self.reference_levels
            .insert(factor.to_string(), level.to_string());
        self
    }

    /// Parse a `factor=level` reference setting
    pub fn reference_spec(self, spec: &str) -> Result<Self> {
        match spec.split_once('=') {
            Some((factor, level)) if !factor.is_empty() && !level.is_empty() => {
                Ok(self.reference_level(factor.trim(), level.trim()))
            }
            _ => Err(ContrastError::InvalidInput {
                reason: format!("Invalid reference format '{}'. Use: factor=level", spec),
            }),
        }
    }

    /// Formula terms in column order
    pub fn terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = self
            .factors
            .iter()
            .map(|s| s.as_str())
            .filter(|f| Some(*f) != self.main_effect.as_deref())
            .collect();
        if let Some(main) = &self.main_effect {
            terms.push(main);
        }
        terms
    }

    /// Human-readable formula, e.g. `~ sex + population`
    pub fn formula(&self) -> String {
        let terms = self.terms();
        if terms.is_empty() {
            "~ 1".to_string()
        } else {
            format!("~ {}", terms.join(" + "))
        }
    }

    /// Encode the design from sample metadata and check it has full rank
    pub fn build(&self, metadata: &SampleMetadata) -> Result<DesignMatrix> {
        let main = self.main_effect.as_deref().ok_or_else(|| ContrastError::InvalidInput {
            reason: "main effect is required".to_string(),
        })?;
        let terms = self.terms();
        let n_samples = metadata.n_samples();

        for factor in self.reference_levels.keys() {
            if !terms.contains(&factor.as_str()) {
                return Err(ContrastError::InvalidInput {
                    reason: format!("reference level given for '{}', which is not in the design", factor),
                });
            }
        }

        let mut coef_names = vec![INTERCEPT.to_string()];
        let mut reference_levels: HashMap<String, String> = HashMap::new();
        let mut encoded: Vec<(String, Vec<String>)> = Vec::with_capacity(terms.len());

        for factor in &terms {
            if !metadata.has_condition(factor) {
                return Err(ContrastError::InvalidMetadata {
                    reason: format!("design variable '{}' not found in metadata", factor),
                });
            }
            let levels = metadata.get_levels(factor)?;
            if levels.is_empty() {
                return Err(ContrastError::EmptyData {
                    reason: format!("design variable '{}' has no values", factor),
                });
            }
            let ref_level = match self.reference_levels.get(*factor) {
                Some(level) if levels.contains(level) => level.clone(),
                Some(level) => {
                    return Err(ContrastError::InvalidInput {
                        reason: format!(
                            "reference level '{}' is not a level of '{}' (levels: {:?})",
                            level, factor, levels
                        ),
                    })
                }
                None => levels[0].clone(),
            };
            if levels.len() < 2 && *factor != main {
                log::warn!("covariate '{}' has a single level and contributes no columns", factor);
            }

            let non_ref: Vec<String> = levels.into_iter().filter(|l| *l != ref_level).collect();
            for level in &non_ref {
                coef_names.push(format!("{}_{}_vs_{}", factor, level, ref_level));
            }
            reference_levels.insert(factor.to_string(), ref_level);
            encoded.push((factor.to_string(), non_ref));
        }

        let mut matrix = Array2::zeros((n_samples, coef_names.len()));
        for i in 0..n_samples {
            matrix[[i, 0]] = 1.0;
            let mut col = 1;
            for (factor, non_ref) in &encoded {
                let value = metadata.get_value(factor, i)?;
                for level in non_ref {
                    if value == level.as_str() {
                        matrix[[i, col]] = 1.0;
                    }
                    col += 1;
                }
            }
        }

        log::debug!(
            "design {}: {} samples x {} coefficients",
            self.formula(),
            n_samples,
            coef_names.len()
        );
        check_full_rank(matrix.view())?;

        Ok(DesignMatrix {
            matrix,
            coef_names,
            sample_ids: metadata.sample_ids().to_vec(),
            reference_levels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn metadata() -> SampleMetadata {
        let mut meta = SampleMetadata::new(strings(&["s1", "s2", "s3", "s4", "s5", "s6"]));
        meta.add_condition("population", strings(&["CEU", "CEU", "TSI", "TSI", "YRI", "YRI"]))
            .unwrap();
        meta.add_condition("sex", strings(&["F", "M", "F", "M", "M", "F"]))
            .unwrap();
        meta.add_condition("continent", strings(&["EUR", "EUR", "EUR", "EUR", "AFR", "AFR"]))
            .unwrap();
        meta
    }

    #[test]
    fn test_single_factor_design() {
        let design = DesignBuilder::new()
            .main_effect("population")
            .build(&metadata())
            .unwrap();

        assert_eq!(design.nrows(), 6);
        assert_eq!(
            design.coef_names(),
            &strings(&["Intercept", "population_TSI_vs_CEU", "population_YRI_vs_CEU"])
        );
        assert_eq!(design.row(0).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(design.row(3).to_vec(), vec![1.0, 1.0, 0.0]);
        assert_eq!(design.row(4).to_vec(), vec![1.0, 0.0, 1.0]);
        assert_eq!(design.reference_level("population"), Some("CEU"));
    }

    #[test]
    fn test_covariate_precedes_main_effect() {
        let builder = DesignBuilder::new().main_effect("population").factor("sex");
        assert_eq!(builder.formula(), "~ sex + population");

        let design = builder.build(&metadata()).unwrap();
        assert_eq!(design.coef_names()[1], "sex_M_vs_F");
        assert_eq!(design.coef_names()[2..], strings(&["population_TSI_vs_CEU", "population_YRI_vs_CEU"])[..]);
        assert_eq!(design.reference_level("sex"), Some("F"));
        assert_eq!(design.row(1).to_vec(), vec![1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_custom_reference_level() {
        let design = DesignBuilder::new()
            .main_effect("population")
            .reference_spec("population=YRI")
            .unwrap()
            .build(&metadata())
            .unwrap();
        assert_eq!(design.coef_names()[1], "population_CEU_vs_YRI");
        assert_eq!(design.row(4).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(design.reference_level("population"), Some("YRI"));
    }

    #[test]
    fn test_bad_reference_spec() {
        assert!(DesignBuilder::new().reference_spec("population").is_err());
        let err = DesignBuilder::new()
            .main_effect("population")
            .reference_level("population", "GBR")
            .build(&metadata())
            .unwrap_err();
        assert!(matches!(err, ContrastError::InvalidInput { .. }));
    }

    #[test]
    fn test_nested_grouping_is_collinear() {
        // continent is a sum of population dummies
        let err = DesignBuilder::new()
            .factor("continent")
            .main_effect("population")
            .build(&metadata())
            .unwrap_err();
        assert!(matches!(err, ContrastError::CollinearDesign { .. }));
    }

    #[test]
    fn test_missing_variable() {
        let err = DesignBuilder::new()
            .main_effect("batch")
            .build(&metadata())
            .unwrap_err();
        assert!(matches!(err, ContrastError::InvalidMetadata { .. }));
    }

    #[test]
    fn test_from_parts_requires_intercept() {
        let m = array![[0.0, 1.0], [1.0, 0.0]];
        assert!(DesignMatrix::from_parts(m, strings(&["a", "b"]), strings(&["s1", "s2"])).is_err());

        let m = array![[1.0, 0.0], [1.0, 1.0]];
        let design = DesignMatrix::from_parts(m, strings(&["Intercept", "b"]), strings(&["s1", "s2"])).unwrap();
        assert_eq!(design.ncols(), 2);
    }
}
