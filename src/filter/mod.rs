//! Pre-model filtering of count rows

mod counts;

pub use counts::{filter_counts, FilterParams, FilterReport};
