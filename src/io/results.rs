//! Results table returned by the expression engine for a contrast

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::csv::reader_for;
use crate::error::{ContrastError, Result};

/// Per-feature test results for one contrast.
///
/// The schema belongs to the expression engine; this crate only reads,
/// summarises, filters, and rewrites it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineResults {
    /// Feature identifiers
    pub gene_ids: Vec<String>,
    /// Mean of normalized counts across all samples
    pub base_means: Vec<f64>,
    /// Effect size (log2 fold change)
    pub log2_fold_changes: Vec<f64>,
    /// Standard error of the effect size
    pub lfc_se: Vec<f64>,
    /// Test statistic
    pub stat: Vec<f64>,
    /// Raw p-values
    pub pvalues: Vec<f64>,
    /// Multiplicity-adjusted p-values
    pub padj: Vec<f64>,
}

/// Significance thresholds for post-filtering a results table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultsFilter {
    pub alpha: f64,
    pub min_abs_lfc: f64,
}

impl Default for ResultsFilter {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            min_abs_lfc: 0.0,
        }
    }
}

const GENE_ID: &str = "gene_id";
const BASE_MEAN: &str = "baseMean";
const LFC: &str = "log2FoldChange";
const LFC_SE: &str = "lfcSE";
const STAT: &str = "stat";
const PVALUE: &str = "pvalue";
const PADJ: &str = "padj";

/// Parse a numeric field, reading `NA`, `NaN`, and empty as missing
fn parse_value(field: &str, column: &str, gene: &str) -> Result<f64> {
    match field {
        "" | "NA" | "NaN" | "nan" => Ok(f64::NAN),
        _ => field.parse::<f64>().map_err(|_| ContrastError::InvalidInput {
            reason: format!("invalid value '{}' in column '{}' for '{}'", field, column, gene),
        }),
    }
}

impl EngineResults {
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    /// Read a results table (tab or comma separated).
    ///
    /// The first column holds feature IDs whatever its header says, so tables
    /// written with unnamed row names are accepted. `baseMean`,
    /// `log2FoldChange`, `pvalue`, and `padj` are required; `lfcSE` and `stat`
    /// default to missing.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = reader_for(&path)?;
        let headers = reader.headers()?.clone();
        let find = |name: &str| headers.iter().skip(1).position(|h| h == name).map(|i| i + 1);
        let require = |name: &str| {
            find(name).ok_or_else(|| ContrastError::InvalidInput {
                reason: format!("results table has no '{}' column", name),
            })
        };

        let base_mean = require(BASE_MEAN)?;
        let lfc = require(LFC)?;
        let pvalue = require(PVALUE)?;
        let padj = require(PADJ)?;
        let lfc_se = find(LFC_SE);
        let stat = find(STAT);

        let mut results = EngineResults::default();
        for record in reader.records() {
            let record = record?;
            let gene = &record[0];
            let value = |col: usize, name: &str| parse_value(&record[col], name, gene);
            let optional = |col: Option<usize>, name: &str| match col {
                Some(c) => value(c, name),
                None => Ok(f64::NAN),
            };

            results.base_means.push(value(base_mean, BASE_MEAN)?);
            results.log2_fold_changes.push(value(lfc, LFC)?);
            results.lfc_se.push(optional(lfc_se, LFC_SE)?);
            results.stat.push(optional(stat, STAT)?);
            results.pvalues.push(value(pvalue, PVALUE)?);
            results.padj.push(value(padj, PADJ)?);
            results.gene_ids.push(gene.to_string());
        }

        let untested = results.pvalues.iter().filter(|p| p.is_nan()).count();
        if untested > 0 {
            log::warn!("{} of {} features have no p-value", untested, results.n_genes());
        }
        Ok(results)
    }

    /// Write the table as TSV, `NA` for missing values
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        writer.write_record([GENE_ID, BASE_MEAN, LFC, LFC_SE, STAT, PVALUE, PADJ])?;

        let fmt = |v: f64| if v.is_nan() { "NA".to_string() } else { v.to_string() };
        for i in 0..self.n_genes() {
            writer.write_record([
                self.gene_ids[i].clone(),
                fmt(self.base_means[i]),
                fmt(self.log2_fold_changes[i]),
                fmt(self.lfc_se[i]),
                fmt(self.stat[i]),
                fmt(self.pvalues[i]),
                fmt(self.padj[i]),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    fn select(&self, indices: &[usize]) -> Self {
        let pick = |v: &[f64]| indices.iter().map(|&i| v[i]).collect();
        Self {
            gene_ids: indices.iter().map(|&i| self.gene_ids[i].clone()).collect(),
            base_means: pick(&self.base_means),
            log2_fold_changes: pick(&self.log2_fold_changes),
            lfc_se: pick(&self.lfc_se),
            stat: pick(&self.stat),
            pvalues: pick(&self.pvalues),
            padj: pick(&self.padj),
        }
    }

    fn is_significant(&self, i: usize, filter: &ResultsFilter) -> bool {
        let p = self.padj[i];
        let lfc = self.log2_fold_changes[i];
        p.is_finite() && p < filter.alpha && lfc.is_finite() && lfc.abs() >= filter.min_abs_lfc
    }

    /// Significant rows, most significant first
    pub fn significant(&self, filter: &ResultsFilter) -> Self {
        let mut idx: Vec<usize> = (0..self.n_genes())
            .filter(|&i| self.is_significant(i, filter))
            .collect();
        idx.sort_by(|&a, &b| {
            self.padj[a]
                .partial_cmp(&self.padj[b])
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.gene_ids[a].cmp(&self.gene_ids[b]))
        });
        self.select(&idx)
    }

    /// Significant feature IDs at `alpha`
    pub fn significant_genes(&self, alpha: f64) -> Vec<&str> {
        let filter = ResultsFilter {
            alpha,
            min_abs_lfc: 0.0,
        };
        (0..self.n_genes())
            .filter(|&i| self.is_significant(i, &filter))
            .map(|i| self.gene_ids[i].as_str())
            .collect()
    }

    /// Significant features with positive effect of at least `min_lfc`
    pub fn upregulated_genes(&self, alpha: f64, min_lfc: f64) -> Vec<&str> {
        self.gene_ids
            .iter()
            .zip(self.padj.iter().zip(self.log2_fold_changes.iter()))
            .filter(|(_, (&p, &lfc))| p.is_finite() && p < alpha && lfc > 0.0 && lfc >= min_lfc)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Significant features with negative effect of at least `min_lfc` in magnitude
    pub fn downregulated_genes(&self, alpha: f64, min_lfc: f64) -> Vec<&str> {
        self.gene_ids
            .iter()
            .zip(self.padj.iter().zip(self.log2_fold_changes.iter()))
            .filter(|(_, (&p, &lfc))| p.is_finite() && p < alpha && lfc < 0.0 && lfc <= -min_lfc)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn summary(&self, alpha: f64) -> ResultsSummary {
        ResultsSummary {
            total_genes: self.n_genes(),
            genes_tested: self.pvalues.iter().filter(|p| p.is_finite()).count(),
            significant: self.significant_genes(alpha).len(),
            upregulated: self.upregulated_genes(alpha, 0.0).len(),
            downregulated: self.downregulated_genes(alpha, 0.0).len(),
            alpha,
        }
    }
}

/// Counts of tested and significant features
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsSummary {
    pub total_genes: usize,
    pub genes_tested: usize,
    pub significant: usize,
    pub upregulated: usize,
    pub downregulated: usize,
    pub alpha: f64,
}

impl std::fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Contrast Results Summary")?;
        writeln!(f, "========================")?;
        writeln!(f, "Total features: {}", self.total_genes)?;
        writeln!(f, "Features tested: {}", self.genes_tested)?;
        writeln!(f, "Significant (padj < {}): {}", self.alpha, self.significant)?;
        writeln!(f, "  Up: {}", self.upregulated)?;
        writeln!(f, "  Down: {}", self.downregulated)?;
        Ok(())
    }
}
