//! popcontrast command-line interface

use std::path::Path;

use clap::Parser;
use log::{info, warn, LevelFilter};

use popcontrast::cli::{Cli, Commands};
use popcontrast::prelude::*;

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Design {
            metadata,
            design,
            covariate,
            reference,
            output,
        } => run_design(&metadata, &design, &covariate, &reference, &output),
        Commands::Contrast {
            metadata,
            design,
            covariate,
            reference,
            group_by,
            grouping,
            focal,
            output,
            design_out,
            request_dir,
            engine,
            engine_arg,
            alpha,
            threads,
        } => run_contrast(ContrastArgs {
            metadata_path: &metadata,
            design: &design,
            covariates: &covariate,
            references: &reference,
            group_by: &group_by,
            grouping_path: &grouping,
            focal: focal.as_deref(),
            output_path: &output,
            design_out: design_out.as_deref(),
            request_dir: &request_dir,
            engine: engine.as_deref(),
            engine_args: &engine_arg,
            config: EngineConfig { threads, alpha },
        }),
        Commands::Filter {
            counts,
            min_count,
            min_samples,
            min_mean,
            output,
            threads,
        } => run_filter(
            &counts,
            &FilterParams {
                min_count,
                min_samples,
                min_mean,
            },
            &output,
            threads,
        ),
        Commands::Results {
            results,
            alpha,
            min_lfc,
            output,
        } => run_results(
            &results,
            &ResultsFilter {
                alpha,
                min_abs_lfc: min_lfc,
            },
            &output,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn configure_threads(threads: usize) {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }
}

fn design_builder(design: &str, covariates: &[String], references: &[String]) -> Result<DesignBuilder> {
    let mut builder = DesignBuilder::new().main_effect(design);
    for cov in covariates {
        builder = builder.factor(cov);
    }
    for spec in references {
        builder = builder.reference_spec(spec)?;
    }
    Ok(builder)
}

fn run_design(
    metadata_path: &str,
    design: &str,
    covariates: &[String],
    references: &[String],
    output_path: &str,
) -> Result<()> {
    info!("Loading metadata from: {}", metadata_path);
    let metadata = read_metadata(metadata_path)?;

    let builder = design_builder(design, covariates, references)?;
    info!("Encoding design: {}", builder.formula());
    let design_matrix = builder.build(&metadata)?;
    info!(
        "  {} samples x {} coefficients, full rank",
        design_matrix.nrows(),
        design_matrix.ncols()
    );
    for term in builder.terms() {
        if let Some(level) = design_matrix.reference_level(term) {
            info!("  {}: reference level {}", term, level);
        }
    }
    for name in design_matrix.coef_names() {
        info!("  {}", name);
    }

    write_design_matrix(output_path, &design_matrix)?;
    info!("Design matrix written to: {}", output_path);
    Ok(())
}

struct ContrastArgs<'a> {
    metadata_path: &'a str,
    design: &'a str,
    covariates: &'a [String],
    references: &'a [String],
    group_by: &'a str,
    grouping_path: &'a str,
    focal: Option<&'a str>,
    output_path: &'a str,
    design_out: Option<&'a str>,
    request_dir: &'a str,
    engine: Option<&'a str>,
    engine_args: &'a [String],
    config: EngineConfig,
}

fn run_contrast(args: ContrastArgs<'_>) -> Result<()> {
    configure_threads(args.config.threads);

    info!("Loading metadata from: {}", args.metadata_path);
    let metadata = read_metadata(args.metadata_path)?;

    info!("Loading grouping from: {}", args.grouping_path);
    let grouping = TopLevelGrouping::from_json_file(args.grouping_path)?;
    info!("  {} top-level groups: {}", grouping.len(), grouping.group_names().join(", "));

    let builder = design_builder(args.design, args.covariates, args.references)?;
    let run = build_focal_contrasts(&metadata, &builder, args.group_by, &grouping, args.focal)?;

    let request_dir = Path::new(args.request_dir);
    let requests = run
        .contrasts
        .iter()
        .map(|cv| EngineRequest::new(cv, &run.design, &args.config))
        .collect::<Result<Vec<_>>>()?;

    // Outputs are only written once every contrast has been tested
    let mut tested = Vec::new();
    match args.engine {
        Some(program) => {
            let tester = CommandTester::new(program, args.engine_args.to_vec(), request_dir);
            for request in &requests {
                tested.push((request.label(), tester.test_contrast(request)?));
            }
        }
        None => {
            std::fs::create_dir_all(request_dir)?;
            for request in &requests {
                let path = request_dir.join(format!("{}.request.json", request.label()));
                request.write_json(&path)?;
                info!("Engine request written to: {}", path.display());
            }
            warn!("No --engine given; {} request(s) written but not tested", requests.len());
        }
    }

    if let Some(path) = args.design_out {
        write_design_matrix(path, &run.design)?;
        info!("Design matrix written to: {}", path);
    }

    write_contrasts(args.output_path, &run.contrasts)?;
    info!("{} contrast(s) written to: {}", run.contrasts.len(), args.output_path);

    for (label, results) in &tested {
        println!("{}", label);
        println!("{}", results.summary(args.config.alpha));
    }

    Ok(())
}

fn run_filter(counts_path: &str, params: &FilterParams, output_path: &str, threads: usize) -> Result<()> {
    configure_threads(threads);

    info!("Loading count matrix from: {}", counts_path);
    let counts = read_count_matrix(counts_path)?;
    info!("  {} features, {} samples", counts.n_genes(), counts.n_samples());

    let report = filter_counts(&counts, params)?;
    info!("  removed {} features", report.n_removed);

    write_count_matrix(output_path, &report.kept)?;
    info!("Filtered counts written to: {}", output_path);
    Ok(())
}

fn run_results(results_path: &str, filter: &ResultsFilter, output_path: &str) -> Result<()> {
    info!("Loading results from: {}", results_path);
    let results = EngineResults::read(results_path)?;

    println!("{}", results.summary(filter.alpha));

    let significant = results.significant(filter);
    significant.write(output_path)?;
    info!(
        "{} significant features (padj < {}, |LFC| >= {}) written to: {}",
        significant.n_genes(),
        filter.alpha,
        filter.min_abs_lfc,
        output_path
    );
    Ok(())
}
