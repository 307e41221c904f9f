//! Design matrix encoding and rank checks

mod matrix;
mod rank;

pub use matrix::{DesignBuilder, DesignMatrix, INTERCEPT};
pub use rank::{check_full_rank, qr_rank};
