//! Command-line interface for popcontrast

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "popcontrast")]
#[command(version)]
#[command(about = "Focal-vs-rest contrast vectors for multi-level expression designs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode and check the design matrix
    #[command(
        long_about = "Encode the treatment-coded design matrix from a sample sheet and\n\
            check that it has full column rank.",
        after_long_help = "\
Examples:
  popcontrast design -m samples.tsv -d population --covariate sex -o design.tsv"
    )]
    Design {
        /// Path to sample metadata (CSV or TSV)
        #[arg(short, long)]
        metadata: String,

        /// Main design variable
        #[arg(short, long)]
        design: String,

        /// Additional categorical covariate (repeatable)
        #[arg(long, value_name = "VAR")]
        covariate: Vec<String>,

        /// Reference level (format: factor=level)
        #[arg(long, value_name = "FACTOR=LEVEL")]
        reference: Vec<String>,

        /// Output file path
        #[arg(short, long, default_value = "design_matrix.tsv")]
        output: String,
    },

    /// Build focal-vs-rest contrast vectors
    #[command(
        long_about = "Build contrast vectors comparing each top-level group against the\n\
            unweighted average of the other top-level groups.\n\n\
            Design rows are averaged per label of --group-by, labels are averaged\n\
            per top-level group of --grouping, and the focal composite minus the\n\
            mean of the remaining composites is written as a numeric contrast.",
        after_long_help = "\
Examples:
  # All continental groups, written as one table
  popcontrast contrast -m samples.tsv -d population --covariate sex \\
    --group-by population --grouping continents.json -o contrasts.tsv

  # One focal group, tested by an external engine
  popcontrast contrast -m samples.tsv -d population --group-by population \\
    --grouping continents.json --focal AFR --engine Rscript \\
    --engine-arg run_wald.R --request-dir engine_runs -t 8"
    )]
    Contrast {
        /// Path to sample metadata (CSV or TSV)
        #[arg(short, long)]
        metadata: String,

        /// Main design variable
        #[arg(short, long)]
        design: String,

        /// Additional categorical covariate (repeatable)
        #[arg(long, value_name = "VAR")]
        covariate: Vec<String>,

        /// Reference level (format: factor=level)
        #[arg(long, value_name = "FACTOR=LEVEL")]
        reference: Vec<String>,

        /// Metadata column holding the labels named in the grouping
        #[arg(long, value_name = "COLUMN")]
        group_by: String,

        /// JSON file mapping top-level groups to their member labels
        #[arg(long, value_name = "JSON")]
        grouping: String,

        /// Only build the contrast for this top-level group
        #[arg(long)]
        focal: Option<String>,

        /// Output file path
        #[arg(short, long, default_value = "contrasts.tsv")]
        output: String,

        /// Also write the design matrix here
        #[arg(long, value_name = "PATH")]
        design_out: Option<String>,

        /// Directory for engine request/results files
        #[arg(long, value_name = "DIR", default_value = "engine_runs")]
        request_dir: String,

        /// External engine program; called as PROGRAM [ARGS...] REQUEST.json RESULTS.tsv
        #[arg(long, value_name = "PROGRAM")]
        engine: Option<String>,

        /// Argument passed to the engine before the request/results paths (repeatable)
        #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
        engine_arg: Vec<String>,

        /// Significance threshold forwarded to the engine and used for summaries
        #[arg(short, long, default_value = "0.1")]
        alpha: f64,

        /// Worker threads for the engine (0 = auto)
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,
    },

    /// Filter count rows by simple thresholds
    #[command(after_long_help = "\
Examples:
  popcontrast filter -c counts.tsv --min-count 10 --min-samples 3 -o filtered.tsv")]
    Filter {
        /// Path to count matrix (CSV or TSV)
        #[arg(short, long)]
        counts: String,

        /// Minimum count for a sample to express a feature
        #[arg(long, default_value = "10")]
        min_count: f64,

        /// Minimum number of expressing samples
        #[arg(long, default_value = "1")]
        min_samples: usize,

        /// Minimum mean count across samples
        #[arg(long)]
        min_mean: Option<f64>,

        /// Output file path
        #[arg(short, long, default_value = "filtered_counts.tsv")]
        output: String,

        /// Number of threads (0 = auto)
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,
    },

    /// Summarise and filter an engine results table
    #[command(after_long_help = "\
Examples:
  popcontrast results -r AFR_vs_EUR.results.tsv -a 0.05 --min-lfc 1 -o significant.tsv")]
    Results {
        /// Path to the results table
        #[arg(short, long)]
        results: String,

        /// Adjusted p-value threshold
        #[arg(short, long, default_value = "0.05")]
        alpha: f64,

        /// Minimum absolute log2 fold change
        #[arg(long, default_value = "0")]
        min_lfc: f64,

        /// Output file path for significant rows
        #[arg(short, long, default_value = "significant.tsv")]
        output: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_contrast_command() {
        let cli = Cli::try_parse_from([
            "popcontrast",
            "contrast",
            "-m",
            "samples.tsv",
            "-d",
            "population",
            "--covariate",
            "sex",
            "--group-by",
            "population",
            "--grouping",
            "groups.json",
            "--engine-arg",
            "--vanilla",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Contrast {
                covariate,
                engine_arg,
                threads,
                focal,
                ..
            } => {
                assert_eq!(covariate, vec!["sex"]);
                assert_eq!(engine_arg, vec!["--vanilla"]);
                assert_eq!(threads, 0);
                assert!(focal.is_none());
            }
            _ => panic!("expected contrast command"),
        }
    }

    #[test]
    fn test_filter_defaults() {
        let cli = Cli::try_parse_from(["popcontrast", "filter", "-c", "counts.tsv"]).unwrap();
        match cli.command {
            Commands::Filter {
                min_count,
                min_samples,
                min_mean,
                ..
            } => {
                assert_eq!(min_count, 10.0);
                assert_eq!(min_samples, 1);
                assert_eq!(min_mean, None);
            }
            _ => panic!("expected filter command"),
        }
    }

    #[test]
    fn test_missing_required_argument() {
        assert!(Cli::try_parse_from(["popcontrast", "contrast", "-m", "samples.tsv"]).is_err());
    }
}
