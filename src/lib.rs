//! popcontrast: focal-vs-rest contrast vectors for multi-level designs
//!
//! Differential expression between top-level groups (e.g. continental
//! groups) that are unions of fine-grained design levels (e.g. populations)
//! cannot be requested by coefficient name: the top-level factor is nested in
//! the fine-grained one, so putting both in the design makes it rank
//! deficient. Instead the design rows are averaged per population, the
//! population rows are averaged per continental group, and each group is
//! contrasted against the unweighted mean of the others. The resulting
//! numeric contrast is handed to an external expression engine.
//!
//! # Example
//!
//! ```ignore
//! use popcontrast::prelude::*;
//!
//! let metadata = read_metadata("samples.tsv")?;
//! let grouping = TopLevelGrouping::from_json_file("continents.json")?;
//! let design = DesignBuilder::new().factor("sex").main_effect("population");
//!
//! let run = build_focal_contrasts(&metadata, &design, "population", &grouping, Some("AFR"))?;
//! write_contrasts("contrast.tsv", &run.contrasts)?;
//! ```

pub mod cli;
pub mod contrast;
pub mod data;
pub mod design;
pub mod engine;
pub mod error;
pub mod filter;
pub mod io;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::contrast::{
        compute_composite_coefficient, compute_contrast, compute_group_coefficients, ContrastVector,
        GroupCoefficients, TopLevelGrouping,
    };
    pub use crate::data::{CountMatrix, GroupLabels, SampleMetadata};
    pub use crate::design::{check_full_rank, DesignBuilder, DesignMatrix};
    pub use crate::engine::{CommandTester, ContrastTester, EngineConfig, EngineRequest};
    pub use crate::error::{ContrastError, Result};
    pub use crate::filter::{filter_counts, FilterParams, FilterReport};
    pub use crate::io::{
        read_count_matrix, read_metadata, write_contrasts, write_count_matrix, write_design_matrix,
        EngineResults, ResultsFilter, ResultsSummary,
    };
    pub use crate::build_focal_contrasts;
    pub use crate::ContrastRun;
}

use prelude::*;

/// Output of a contrast-building run
#[derive(Debug, Clone)]
pub struct ContrastRun {
    pub design: DesignMatrix,
    pub coefficients: GroupCoefficients,
    pub contrasts: Vec<ContrastVector>,
}

/// Build the design, per-label coefficient rows, and focal-vs-rest contrasts.
///
/// `group_by` names the metadata column holding the fine-grained labels the
/// grouping refers to. With `focal` set only that group's contrast is built,
/// otherwise one contrast per top-level group.
pub fn build_focal_contrasts(
    metadata: &SampleMetadata,
    design: &DesignBuilder,
    group_by: &str,
    grouping: &TopLevelGrouping,
    focal: Option<&str>,
) -> Result<ContrastRun> {
    log::info!("Building design {}", design.formula());
    let design_matrix = design.build(metadata)?;
    log::info!(
        "  {} samples, {} coefficients",
        design_matrix.nrows(),
        design_matrix.ncols()
    );

    let labels = metadata.group_labels(group_by)?;
    let coefficients = compute_group_coefficients(&design_matrix, &labels)?;

    let members = grouping.all_members();
    for (level, n) in labels.level_counts() {
        if members.binary_search(&level).is_err() {
            log::warn!(
                "'{}' ({} samples) is not in any top-level group and is left out of every composite",
                level,
                n
            );
        }
    }
    let mut group_sizes = Vec::with_capacity(grouping.len());
    for group in grouping.group_names() {
        let group_members = grouping.members(group).unwrap_or(&[]);
        let n: usize = group_members
            .iter()
            .filter_map(|m| coefficients.size(m))
            .sum();
        log::info!(
            "  {}: {} labels, {} samples (weighted equally in baselines)",
            group,
            group_members.len(),
            n
        );
        group_sizes.push(n);
    }
    if let (Some(min), Some(max)) = (group_sizes.iter().min(), group_sizes.iter().max()) {
        if min != max {
            log::warn!(
                "Top-level groups are unbalanced ({} to {} samples); baselines are unweighted means",
                min,
                max
            );
        }
    }

    let contrasts = match focal {
        Some(f) => vec![grouping.focal_contrast(&coefficients, design_matrix.coef_names(), f)?],
        None => grouping.all_contrasts(&coefficients, design_matrix.coef_names())?,
    };

    Ok(ContrastRun {
        design: design_matrix,
        coefficients,
        contrasts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    /// Five populations in two continental groups with uneven sample counts
    fn metadata() -> SampleMetadata {
        let mut meta = SampleMetadata::new((1..=12).map(|i| format!("s{}", i)).collect());
        meta.add_condition(
            "population",
            strings(&[
                "YRI", "YRI", "YRI", "YRI", "LWK", "LWK", "CEU", "CEU", "TSI", "TSI", "GBR", "GBR",
            ]),
        )
        .unwrap();
        meta.add_condition(
            "sex",
            strings(&["F", "M", "F", "M", "F", "M", "M", "F", "M", "F", "F", "M"]),
        )
        .unwrap();
        meta.add_condition(
            "continent",
            strings(&[
                "AFR", "AFR", "AFR", "AFR", "AFR", "AFR", "EUR", "EUR", "EUR", "EUR", "EUR", "EUR",
            ]),
        )
        .unwrap();
        meta
    }

    fn grouping() -> TopLevelGrouping {
        TopLevelGrouping::from_json(r#"{"AFR": ["YRI", "LWK"], "EUR": ["CEU", "TSI", "GBR"]}"#)
            .unwrap()
    }

    #[test]
    fn test_continental_contrasts() {
        let design = DesignBuilder::new().factor("sex").main_effect("population");
        let run = build_focal_contrasts(&metadata(), &design, "population", &grouping(), None).unwrap();

        // Intercept, sex_M_vs_F, population_{GBR,LWK,TSI,YRI}_vs_CEU
        assert_eq!(run.design.ncols(), 6);
        assert_eq!(run.contrasts.len(), 2);

        let afr = &run.contrasts[0];
        assert_eq!(afr.focal, "AFR");
        assert_eq!(afr.baseline, vec!["EUR".to_string()]);
        assert_eq!(afr.weight("Intercept"), Some(0.0));
        // every population is sex balanced
        assert_eq!(afr.weight("sex_M_vs_F"), Some(0.0));
        assert_eq!(afr.weight("population_YRI_vs_CEU"), Some(0.5));
        assert_eq!(afr.weight("population_LWK_vs_CEU"), Some(0.5));
        let third = afr.weight("population_TSI_vs_CEU").unwrap();
        assert!((third + 1.0 / 3.0).abs() < 1e-12);

        // two groups: the contrasts are exact negatives
        let eur = &run.contrasts[1];
        for (a, e) in afr.weights.iter().zip(&eur.weights) {
            assert_eq!(*a, -*e);
        }
    }

    #[test]
    fn test_baseline_ignores_sample_counts() {
        // YRI has twice the samples of LWK but both count once
        let design = DesignBuilder::new().main_effect("population");
        let run = build_focal_contrasts(&metadata(), &design, "population", &grouping(), Some("EUR")).unwrap();
        let eur = &run.contrasts[0];
        assert_eq!(eur.weight("population_YRI_vs_CEU"), Some(-0.5));
        assert_eq!(eur.weight("population_LWK_vs_CEU"), Some(-0.5));
        assert_eq!(run.coefficients.size("YRI"), Some(4));
    }

    #[test]
    fn test_nested_factor_in_design_is_collinear() {
        let design = DesignBuilder::new().factor("continent").main_effect("population");
        let err = build_focal_contrasts(&metadata(), &design, "population", &grouping(), None).unwrap_err();
        assert!(matches!(err, ContrastError::CollinearDesign { .. }));
    }

    #[test]
    fn test_grouping_member_missing_from_data() {
        let grouping =
            TopLevelGrouping::from_json(r#"{"AFR": ["YRI", "ESN"], "EUR": ["CEU"]}"#).unwrap();
        let design = DesignBuilder::new().main_effect("population");
        let err = build_focal_contrasts(&metadata(), &design, "population", &grouping, None).unwrap_err();
        match err {
            ContrastError::UnknownGroup { group } => assert_eq!(group, "ESN"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_focal() {
        let design = DesignBuilder::new().main_effect("population");
        let err = build_focal_contrasts(&metadata(), &design, "population", &grouping(), Some("EAS"))
            .unwrap_err();
        assert!(matches!(err, ContrastError::UnknownGroup { .. }));
    }
}
