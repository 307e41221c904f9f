//! Data structures for samples, group labels, and counts

mod count_matrix;
mod labels;
mod metadata;

pub use count_matrix::CountMatrix;
pub use labels::GroupLabels;
pub use metadata::SampleMetadata;
