use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use super::assignment::AssignmentTable;
use super::atomic_file::write_atomically;
use super::catalog::{sampling_directory, waveform_directory, Catalog};
use super::constants::CATALOG_FILE_EXTENSION;
use super::error::ExportError;
use super::report::BatchReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    Written,
    Unchanged,
}

/// A definition written (or confirmed current) on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub name: String,
    pub path: PathBuf,
    pub status: ExportStatus,
}

/// Map a definition name onto a file name, replacing characters no filesystem accepts
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{cleaned}.{CATALOG_FILE_EXTENSION}")
}

/// Write every waveform and sampling scheme referenced by an assignment into the
/// `Provus_Options` tree under `root`. Unreferenced definitions are never written.
pub fn export_referenced(
    root: &Path,
    catalog: &Catalog,
    table: &AssignmentTable,
) -> BatchReport<ExportedFile, ExportError> {
    let waveforms: BTreeSet<&str> = table
        .entries()
        .filter_map(|entry| entry.effective_waveform())
        .collect();
    let schemes: BTreeSet<&str> = table
        .entries()
        .filter_map(|entry| entry.effective_sampling())
        .collect();

    let mut report = BatchReport::new();
    let wf_dir = waveform_directory(root);
    let mut claimed: HashMap<String, String> = HashMap::new();
    for name in waveforms {
        let target = wf_dir.join(sanitize_file_name(name));
        let result = claim(&mut claimed, &target, name).and_then(|_| {
            let def = catalog
                .lookup_waveform(name)
                .ok_or_else(|| ExportError::NotFound {
                    kind: "waveform",
                    name: name.to_string(),
                })?;
            write_if_changed(name, &target, &def.to_csv_bytes()?)
        });
        log_result(&target, &result);
        report.push(target, result);
    }

    let sc_dir = sampling_directory(root);
    let mut claimed: HashMap<String, String> = HashMap::new();
    for name in schemes {
        let target = sc_dir.join(sanitize_file_name(name));
        let result = claim(&mut claimed, &target, name).and_then(|_| {
            let scheme = catalog
                .lookup_scheme(name)
                .ok_or_else(|| ExportError::NotFound {
                    kind: "sampling scheme",
                    name: name.to_string(),
                })?;
            write_if_changed(name, &target, &scheme.to_csv_bytes()?)
        });
        log_result(&target, &result);
        report.push(target, result);
    }

    report
}

/// Reserve a target file for a definition. File names are compared case-insensitively
/// because Provus commonly runs on filesystems that do.
fn claim(
    claimed: &mut HashMap<String, String>,
    target: &Path,
    name: &str,
) -> Result<(), ExportError> {
    let key = target.to_string_lossy().to_lowercase();
    match claimed.get(&key) {
        Some(first) if first != name => Err(ExportError::NamingConflict {
            first: first.clone(),
            second: name.to_string(),
            file: target.to_path_buf(),
        }),
        Some(_) => Ok(()),
        None => {
            claimed.insert(key, name.to_string());
            Ok(())
        }
    }
}

fn write_if_changed(
    name: &str,
    target: &Path,
    bytes: &[u8],
) -> Result<ExportedFile, ExportError> {
    let status = match std::fs::read(target) {
        Ok(existing) if existing == bytes => ExportStatus::Unchanged,
        _ => {
            write_atomically(target, bytes).map_err(|e| ExportError::FileWriteError {
                path: target.to_path_buf(),
                reason: e.to_string(),
            })?;
            ExportStatus::Written
        }
    };
    Ok(ExportedFile {
        name: name.to_string(),
        path: target.to_path_buf(),
        status,
    })
}

fn log_result(target: &Path, result: &Result<ExportedFile, ExportError>) {
    match result {
        Ok(file) if file.status == ExportStatus::Written => {
            log::info!("Exported {} to {}", file.name, target.display())
        }
        Ok(_) => (),
        Err(e) => log::error!("{e}"),
    }
}
