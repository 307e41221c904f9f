//! Composite (group-of-groups) coefficient rows

use ndarray::Array1;

use super::GroupCoefficients;
use crate::error::{ContrastError, Result};

/// Unweighted column mean of the coefficient rows of `members`.
///
/// Members are summed in sorted order, so the result does not depend on the
/// order they were listed in. Each member counts once regardless of how many
/// samples it has.
pub fn compute_composite_coefficient<S: AsRef<str>>(
    groups: &GroupCoefficients,
    members: &[S],
) -> Result<Array1<f64>> {
    if members.is_empty() {
        return Err(ContrastError::EmptyData {
            reason: "composite requires at least one member group".to_string(),
        });
    }

    let mut sorted: Vec<&str> = members.iter().map(|m| m.as_ref()).collect();
    sorted.sort_unstable();
    if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
        return Err(ContrastError::InvalidInput {
            reason: format!("group '{}' listed more than once in composite", pair[0]),
        });
    }

    let mut sum = Array1::<f64>::zeros(groups.width());
    for label in &sorted {
        let row = groups.get(label).ok_or_else(|| ContrastError::UnknownGroup {
            group: label.to_string(),
        })?;
        sum += &row;
    }

    Ok(sum / sorted.len() as f64)
}
