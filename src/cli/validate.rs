use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    storage::{
        codec::{read_column_names, COLUMNS},
        record_reader::RecordReader,
    },
};

/// Result of scanning a store. Paths are kept so the operator can go and look at them.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub checked: usize,
    /// Files whose columns differ from what the writer produces.
    pub mismatched: Vec<(PathBuf, Vec<String>)>,
    pub unreadable: Vec<(PathBuf, String)>,
    /// Temporary files of writes that never finished.
    pub orphaned: Vec<PathBuf>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.unreadable.is_empty() && self.orphaned.is_empty()
    }
}

/// Reads the schema of every record file under `root`.
pub async fn validate_store(root: &Path) -> Result<ValidationReport> {
    let reader = RecordReader::new(root.to_owned());
    let mut report = ValidationReport::default();

    for partition in reader.all_partitions().await? {
        let listing = RecordReader::list_partition(&partition).await?;
        report.orphaned.extend(listing.temporary);

        for file in listing.records {
            report.checked += 1;
            let columns = match tokio::fs::read(&file).await {
                Ok(bytes) => read_column_names(bytes).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match columns {
                Ok(columns) if columns == COLUMNS => (),
                Ok(columns) => {
                    warn!("Schema mismatch in {file:?}: {columns:?}");
                    report.mismatched.push((file, columns));
                }
                Err(e) => {
                    warn!("Couldn't read {file:?}: {e}");
                    report.unreadable.push((file, e));
                }
            }
        }
    }
    info!(
        "Validated {} files, {} mismatched, {} unreadable, {} orphaned",
        report.checked,
        report.mismatched.len(),
        report.unreadable.len(),
        report.orphaned.len()
    );
    Ok(report)
}

pub async fn process_validate_command(config: &AppConfig) -> Result<()> {
    let report = validate_store(&config.store_dir).await?;

    println!(
        "Checked {} record file(s) in {}",
        report.checked,
        config.store_dir.display()
    );
    for (path, columns) in &report.mismatched {
        println!("schema mismatch\t{}\t{}", path.display(), columns.join(","));
    }
    for (path, error) in &report.unreadable {
        println!("unreadable\t{}\t{error}", path.display());
    }
    for path in &report.orphaned {
        println!("interrupted write\t{}", path.display());
    }

    if !report.is_clean() {
        bail!(
            "{} mismatched, {} unreadable and {} orphaned file(s) found",
            report.mismatched.len(),
            report.unreadable.len(),
            report.orphaned.len()
        );
    }
    println!("Everything is in order");
    Ok(())
}
