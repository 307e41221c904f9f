//! Contrast-vector construction for focal-vs-rest comparisons
//!
//! The pipeline is: design rows are averaged per fine-grained group label
//! (`compute_group_coefficients`), group rows are averaged into top-level
//! composites (`compute_composite_coefficient`), and a focal composite is
//! compared against the unweighted mean of the other composites
//! (`compute_contrast`). The resulting weights are handed to the expression
//! engine as a numeric contrast.

mod coefficients;
mod composite;
mod grouping;
mod vector;

pub use coefficients::{compute_group_coefficients, GroupCoefficients};
pub use composite::compute_composite_coefficient;
pub use grouping::TopLevelGrouping;
pub use vector::{compute_contrast, ContrastVector};
