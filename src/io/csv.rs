//! Delimited-file reading and writing for sample sheets, counts, designs, and contrasts

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;

use crate::contrast::ContrastVector;
use crate::data::{CountMatrix, SampleMetadata};
use crate::design::DesignMatrix;
use crate::error::{ContrastError, Result};

/// Tab if the header line contains one, otherwise comma
pub(crate) fn detect_delimiter<P: AsRef<Path>>(path: P) -> Result<u8> {
    let mut header = String::new();
    BufReader::new(File::open(path)?).read_line(&mut header)?;
    if header.trim().is_empty() {
        return Err(ContrastError::EmptyData {
            reason: "Empty input file".to_string(),
        });
    }
    Ok(if header.contains('\t') { b'\t' } else { b',' })
}

pub(crate) fn reader_for<P: AsRef<Path>>(path: P) -> Result<csv::Reader<File>> {
    let delimiter = detect_delimiter(&path)?;
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_path(path)?;
    Ok(reader)
}

fn tsv_writer<P: AsRef<Path>>(path: P) -> Result<csv::Writer<File>> {
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

/// Read sample metadata.
///
/// First column is the sample ID, every other column is a categorical
/// attribute. Tab- and comma-separated files are both accepted.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<SampleMetadata> {
    let mut reader = reader_for(&path)?;
    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(ContrastError::InvalidMetadata {
            reason: "metadata needs a sample ID column and at least one attribute column".to_string(),
        });
    }
    let names: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();

    let mut sample_ids = Vec::new();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        sample_ids.push(record[0].to_string());
        for (j, column) in columns.iter_mut().enumerate() {
            column.push(record[j + 1].to_string());
        }
    }

    if sample_ids.is_empty() {
        return Err(ContrastError::EmptyData {
            reason: "No samples found in metadata".to_string(),
        });
    }

    let mut metadata = SampleMetadata::new(sample_ids);
    for (name, values) in names.iter().zip(columns) {
        metadata.add_condition(name, values)?;
    }
    log::debug!(
        "read {} samples with columns {:?}",
        metadata.n_samples(),
        metadata.condition_names()
    );
    Ok(metadata)
}

/// Read a count matrix: first column feature IDs, header row sample IDs
pub fn read_count_matrix<P: AsRef<Path>>(path: P) -> Result<CountMatrix> {
    let mut reader = reader_for(&path)?;
    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(ContrastError::InvalidCountMatrix {
            reason: "Not enough columns in header".to_string(),
        });
    }
    let sample_ids: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();
    let n_samples = sample_ids.len();

    let mut gene_ids = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        gene_ids.push(record[0].to_string());
        for field in record.iter().skip(1) {
            let value = field.parse::<f64>().map_err(|_| ContrastError::InvalidCountMatrix {
                reason: format!("Invalid count value '{}' for feature '{}'", field, &record[0]),
            })?;
            values.push(value);
        }
    }

    if gene_ids.is_empty() {
        return Err(ContrastError::EmptyData {
            reason: "No features found in count matrix".to_string(),
        });
    }

    let counts = Array2::from_shape_vec((gene_ids.len(), n_samples), values).map_err(|e| {
        ContrastError::InvalidCountMatrix {
            reason: e.to_string(),
        }
    })?;
    CountMatrix::new(counts, gene_ids, sample_ids)
}

/// Write a count matrix as TSV
pub fn write_count_matrix<P: AsRef<Path>>(path: P, counts: &CountMatrix) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    let mut header = vec!["gene_id".to_string()];
    header.extend(counts.sample_ids().iter().cloned());
    writer.write_record(&header)?;

    for (i, gene_id) in counts.gene_ids().iter().enumerate() {
        let mut row = vec![gene_id.clone()];
        row.extend(counts.gene_counts(i).iter().map(|v| v.to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the design matrix: one row per sample, one column per coefficient
pub fn write_design_matrix<P: AsRef<Path>>(path: P, design: &DesignMatrix) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    let mut header = vec!["sample_id".to_string()];
    header.extend(design.coef_names().iter().cloned());
    writer.write_record(&header)?;

    for (i, sample) in design.sample_ids().iter().enumerate() {
        let mut row = vec![sample.clone()];
        row.extend(design.row(i).iter().map(|v| v.to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write contrasts as a coefficient x contrast table.
///
/// All contrasts must share the same coefficient names. Weights are written
/// with full precision.
pub fn write_contrasts<P: AsRef<Path>>(path: P, contrasts: &[ContrastVector]) -> Result<()> {
    let first = contrasts.first().ok_or_else(|| ContrastError::EmptyData {
        reason: "no contrasts to write".to_string(),
    })?;
    if let Some(other) = contrasts.iter().find(|c| c.coef_names != first.coef_names) {
        return Err(ContrastError::DimensionMismatch {
            expected: format!("coefficients {:?}", first.coef_names),
            got: format!("coefficients {:?} for '{}'", other.coef_names, other.focal),
        });
    }

    let mut writer = tsv_writer(path)?;
    let mut header = vec!["coefficient".to_string()];
    header.extend(contrasts.iter().map(|c| c.label()));
    writer.write_record(&header)?;

    for (j, coef) in first.coef_names.iter().enumerate() {
        let mut row = vec![coef.clone()];
        row.extend(contrasts.iter().map(|c| c.weights[j].to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
