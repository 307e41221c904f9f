//! Column-rank check for design matrices
//!
//! A rank-deficient design cannot be fit by the expression engine, and a
//! contrast built on it would have no unique meaning, so the check runs
//! before any coefficients are derived.

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{ContrastError, Result};

/// Fail with `CollinearDesign` unless `matrix` has full column rank.
///
/// The message distinguishes an all-zero column (a level or level
/// combination without samples) from a genuine linear dependence between
/// columns, e.g. a population factor together with the continental grouping
/// that nests it.
pub fn check_full_rank(matrix: ArrayView2<'_, f64>) -> Result<()> {
    let (nrow, ncol) = matrix.dim();

    if nrow == 0 || ncol == 0 {
        return Err(ContrastError::CollinearDesign {
            reason: "design matrix has zero rows or columns".to_string(),
        });
    }

    let rank = qr_rank(matrix);
    if rank == ncol {
        return Ok(());
    }

    log::debug!("design rank {} < {} columns", rank, ncol);

    let zero_columns: Vec<usize> = matrix
        .axis_iter(Axis(1))
        .enumerate()
        .filter(|(_, col)| col.iter().all(|&v| v == 0.0))
        .map(|(j, _)| j)
        .collect();

    let reason = if !zero_columns.is_empty() {
        format!(
            "the model matrix is not full rank: column(s) {:?} are all zero, \
             levels or combinations of levels without any samples",
            zero_columns
        )
    } else {
        format!(
            "the model matrix is not full rank (rank {} of {} columns): one or more \
             variables in the design are linear combinations of the others",
            rank, ncol
        )
    };

    Err(ContrastError::CollinearDesign { reason })
}

/// Numerical rank via Householder QR with column pivoting.
///
/// Counts diagonal entries of R above `max(nrow, ncol) * eps * max|diag(R)|`,
/// the same tolerance R's `qr()` uses.
pub fn qr_rank(matrix: ArrayView2<'_, f64>) -> usize {
    let (nrow, ncol) = matrix.dim();
    let k = nrow.min(ncol);
    let mut r: Array2<f64> = matrix.to_owned();

    let mut col_norms_sq: Vec<f64> = r
        .axis_iter(Axis(1))
        .map(|col| col.iter().map(|v| v * v).sum())
        .collect();

    for step in 0..k {
        // pivot: largest remaining column norm
        let best_col = (step..ncol)
            .max_by(|&a, &b| col_norms_sq[a].total_cmp(&col_norms_sq[b]))
            .unwrap_or(step);
        if best_col != step {
            for i in 0..nrow {
                r.swap([i, step], [i, best_col]);
            }
            col_norms_sq.swap(step, best_col);
        }

        let mut alpha = (step..nrow).map(|i| r[[i, step]] * r[[i, step]]).sum::<f64>().sqrt();
        if alpha < f64::EPSILON * 1e3 {
            break;
        }
        if r[[step, step]] > 0.0 {
            alpha = -alpha;
        }

        let v0 = r[[step, step]] - alpha;
        r[[step, step]] = alpha;

        let v_norm_sq = v0 * v0 + ((step + 1)..nrow).map(|i| r[[i, step]] * r[[i, step]]).sum::<f64>();
        if v_norm_sq.abs() < f64::MIN_POSITIVE {
            continue;
        }
        let tau = 2.0 / v_norm_sq;

        for j in (step + 1)..ncol {
            let dot = v0 * r[[step, j]]
                + ((step + 1)..nrow).map(|i| r[[i, step]] * r[[i, j]]).sum::<f64>();
            let scale = tau * dot;
            r[[step, j]] -= scale * v0;
            for i in (step + 1)..nrow {
                r[[i, j]] -= scale * r[[i, step]];
            }
        }

        for j in (step + 1)..ncol {
            col_norms_sq[j] = (col_norms_sq[j] - r[[step, j]] * r[[step, j]]).max(0.0);
        }
    }

    let max_abs_diag = (0..k).map(|i| r[[i, i]].abs()).fold(0.0f64, f64::max);
    let tol = nrow.max(ncol) as f64 * f64::EPSILON * max_abs_diag;

    (0..k).filter(|&i| r[[i, i]].abs() > tol).count()
}
