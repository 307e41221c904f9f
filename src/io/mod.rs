//! Input/output for sample sheets, counts, designs, contrasts, and results

mod csv;
mod results;

pub use self::csv::{read_count_matrix, read_metadata, write_contrasts, write_count_matrix, write_design_matrix};
pub use results::{EngineResults, ResultsFilter, ResultsSummary};
