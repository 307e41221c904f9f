//! Hand-off to the external expression engine
//!
//! The engine (a DESeq2-style NB GLM with Wald testing) is not part of this
//! crate. It is reached through a small file contract: a JSON request holding
//! the coefficient names and contrast weights goes in, a results table comes
//! back.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::contrast::ContrastVector;
use crate::design::DesignMatrix;
use crate::error::{ContrastError, Result};
use crate::io::EngineResults;

/// Options forwarded to the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Worker threads for the engine's model fitting (0 = size of the rayon pool)
    pub threads: usize,
    /// Significance level for the engine's independent filtering
    pub alpha: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            alpha: 0.1,
        }
    }
}

impl EngineConfig {
    pub fn resolved_threads(&self) -> usize {
        if self.threads == 0 {
            rayon::current_num_threads()
        } else {
            self.threads
        }
    }
}

/// Everything the engine needs to test one contrast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRequest {
    pub focal: String,
    pub baseline: Vec<String>,
    pub coef_names: Vec<String>,
    pub contrast: Vec<f64>,
    pub sample_ids: Vec<String>,
    pub threads: usize,
    pub alpha: f64,
}

impl EngineRequest {
    pub fn new(contrast: &ContrastVector, design: &DesignMatrix, config: &EngineConfig) -> Result<Self> {
        if contrast.coef_names != design.coef_names() {
            return Err(ContrastError::DimensionMismatch {
                expected: format!("coefficients {:?}", design.coef_names()),
                got: format!("coefficients {:?}", contrast.coef_names),
            });
        }
        Ok(Self {
            focal: contrast.focal.clone(),
            baseline: contrast.baseline.clone(),
            coef_names: contrast.coef_names.clone(),
            contrast: contrast.weights.clone(),
            sample_ids: design.sample_ids().to_vec(),
            threads: config.resolved_threads(),
            alpha: config.alpha,
        })
    }

    /// File-name friendly label, e.g. `AFR_vs_EAS+EUR`
    pub fn label(&self) -> String {
        format!("{}_vs_{}", self.focal, self.baseline.join("+"))
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || "_-+.".contains(c) { c } else { '_' })
            .collect()
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Something that can compute effect sizes and tests for a contrast
pub trait ContrastTester {
    fn test_contrast(&self, request: &EngineRequest) -> Result<EngineResults>;
}

/// Runs an external program as `program [args...] <request.json> <results.tsv>`
#[derive(Debug, Clone)]
pub struct CommandTester {
    program: String,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl CommandTester {
    pub fn new(program: &str, args: Vec<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.to_string(),
            args,
            work_dir: work_dir.into(),
        }
    }

    pub fn request_path(&self, request: &EngineRequest) -> PathBuf {
        self.work_dir.join(format!("{}.request.json", request.label()))
    }

    pub fn results_path(&self, request: &EngineRequest) -> PathBuf {
        self.work_dir.join(format!("{}.results.tsv", request.label()))
    }
}

/// Engine messages that mean the design could not be fit
fn is_rank_failure(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("not full rank") || lower.contains("linear combination")
}

impl ContrastTester for CommandTester {
    fn test_contrast(&self, request: &EngineRequest) -> Result<EngineResults> {
        std::fs::create_dir_all(&self.work_dir)?;
        let request_path = self.request_path(request);
        let results_path = self.results_path(request);
        request.write_json(&request_path)?;

        log::info!("Running engine for {}: {} {:?}", request.label(), self.program, self.args);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&request_path)
            .arg(&results_path)
            .output()
            .map_err(|e| ContrastError::ExternalEngine {
                reason: format!("failed to start '{}': {}", self.program, e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let message = stderr.trim().to_string();
            if is_rank_failure(&message) {
                return Err(ContrastError::CollinearDesign { reason: message });
            }
            return Err(ContrastError::ExternalEngine {
                reason: format!("'{}' exited with {}: {}", self.program, output.status, message),
            });
        }
        if !stderr.trim().is_empty() {
            log::debug!("engine stderr: {}", stderr.trim());
        }
        if !results_path.exists() {
            return Err(ContrastError::ExternalEngine {
                reason: format!("engine did not write {}", results_path.display()),
            });
        }

        EngineResults::read(&results_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn design() -> DesignMatrix {
        DesignMatrix::from_parts(
            array![[1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0]],
            vec!["Intercept".to_string(), "population_YRI_vs_CEU".to_string()],
            (1..=4).map(|i| format!("s{}", i)).collect(),
        )
        .unwrap()
    }

    fn request() -> EngineRequest {
        let design = design();
        let cv = ContrastVector::new(
            "AFR",
            vec!["EUR".to_string()],
            design.coef_names().to_vec(),
            array![0.0, 1.0],
        )
        .unwrap();
        EngineRequest::new(&cv, &design, &EngineConfig { threads: 4, alpha: 0.05 }).unwrap()
    }

    fn sh(script: &str, dir: &Path) -> CommandTester {
        CommandTester::new("sh", vec!["-c".to_string(), script.to_string(), "engine".to_string()], dir)
    }

    #[test]
    fn test_request_from_contrast() {
        let req = request();
        assert_eq!(req.threads, 4);
        assert_eq!(req.contrast, vec![0.0, 1.0]);
        assert_eq!(req.sample_ids.len(), 4);
        assert_eq!(req.label(), "AFR_vs_EUR");
    }

    #[test]
    fn test_request_rejects_foreign_contrast() {
        let cv = ContrastVector::new("AFR", Vec::new(), vec!["Intercept".to_string()], array![0.0]).unwrap();
        assert!(EngineRequest::new(&cv, &design(), &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_request_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req.json");
        let req = request();
        req.write_json(&path).unwrap();
        assert_eq!(EngineRequest::read_json(&path).unwrap(), req);
    }

    #[test]
    fn test_command_tester_reads_results() {
        let dir = tempfile::tempdir().unwrap();
        let script = "test -f \"$1\" && printf 'gene_id\\tbaseMean\\tlog2FoldChange\\tpvalue\\tpadj\\ng1\\t10\\t1.5\\t0.001\\t0.01\\n' > \"$2\"";
        let tester = sh(script, dir.path());
        let res = tester.test_contrast(&request()).unwrap();
        assert_eq!(res.gene_ids, vec!["g1"]);
        assert_eq!(res.log2_fold_changes, vec![1.5]);
        assert!(tester.request_path(&request()).exists());
    }

    #[test]
    fn test_command_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = sh("echo boom >&2; exit 3", dir.path())
            .test_contrast(&request())
            .unwrap_err();
        match err {
            ContrastError::ExternalEngine { reason } => assert!(reason.contains("boom")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_rank_failure_is_collinear() {
        let dir = tempfile::tempdir().unwrap();
        let err = sh("echo 'the model matrix is not full rank' >&2; exit 1", dir.path())
            .test_contrast(&request())
            .unwrap_err();
        assert!(matches!(err, ContrastError::CollinearDesign { .. }));
    }

    #[test]
    fn test_missing_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = sh("true", dir.path()).test_contrast(&request()).unwrap_err();
        assert!(matches!(err, ContrastError::ExternalEngine { .. }));
    }
}
