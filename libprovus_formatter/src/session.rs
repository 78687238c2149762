use std::path::{Path, PathBuf};

use super::assignment::{AssignmentEntry, AssignmentTable, DataStyle, DetectedAssignment};
use super::catalog::Catalog;
use super::error::{
    AssignmentError, ExportError, HeaderWriterError, ManifestError, SessionError,
};
use super::exporter::{export_referenced, ExportedFile};
use super::extractor::{extract_all, Extraction};
use super::header_writer::{update_header, HeaderUpdate};
use super::manifest::{update_manifest, ManifestUpdate};
use super::mcg::parse_mcg;
use super::presets::suggest;
use super::report::BatchReport;
use super::waveform::WaveformPoint;

/// One working session over a root directory.
///
/// The session owns the catalog and the assignment table. Every operation is synchronous
/// and its effects are visible to the next call.
#[derive(Debug)]
pub struct Session {
    root: PathBuf,
    catalog: Catalog,
    table: AssignmentTable,
}

impl Session {
    /// Open a session on an existing directory, loading any definitions already under
    /// its `Provus_Options` folder.
    pub fn new(root: &Path) -> Result<Self, SessionError> {
        if !root.is_dir() {
            return Err(SessionError::BadRootPath(root.to_path_buf()));
        }
        let mut catalog = Catalog::new();
        catalog.scan_directory(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            catalog,
            table: AssignmentTable::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Relative paths are taken relative to the root
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Extract and add data files. Files already in the session are re-detected but keep
    /// their overrides. Returns the number of files whose parameters were resolved.
    pub fn add_files(&mut self, paths: &[PathBuf]) -> usize {
        let resolved_paths: Vec<PathBuf> = paths.iter().map(|p| self.resolve(p)).collect();
        let mut resolved = 0;
        for (_, extraction) in extract_all(&resolved_paths) {
            let detected = match &extraction {
                Extraction::Resolved(record) => {
                    resolved += 1;
                    let suggestion = suggest(record);
                    let waveform = suggestion.waveform.and_then(|def| {
                        self.catalog
                            .register_detected_waveform(def)
                            .inspect_err(|e| {
                                log::error!("No waveform registered for {}: {e}", record.path.display())
                            })
                            .ok()
                    });
                    let sampling = suggestion.scheme.and_then(|scheme| {
                        self.catalog
                            .register_detected_scheme(scheme)
                            .inspect_err(|e| {
                                log::error!("No sampling scheme registered for {}: {e}", record.path.display())
                            })
                            .ok()
                    });
                    DetectedAssignment {
                        waveform,
                        sampling,
                        data_style: Some(suggestion.data_style),
                    }
                }
                Extraction::Unresolved { .. } => DetectedAssignment::default(),
            };
            self.table.insert(extraction, detected);
        }
        log::info!(
            "Added {} file(s), {} with detected parameters",
            paths.len(),
            resolved
        );
        resolved
    }

    /// Drop a file from the session. The file itself is not touched.
    pub fn remove_file(&mut self, path: &Path) -> Option<AssignmentEntry> {
        let path = self.resolve(path);
        self.table.remove(&path)
    }

    pub fn get_assignment(&self, path: &Path) -> Option<&AssignmentEntry> {
        self.table.get_assignment(&self.resolve(path))
    }

    pub fn entries(&self) -> impl Iterator<Item = &AssignmentEntry> {
        self.table.entries()
    }

    pub fn set_assignment(
        &mut self,
        path: &Path,
        waveform: Option<&str>,
        sampling: Option<&str>,
    ) -> Result<(), SessionError> {
        let path = self.resolve(path);
        self.table
            .set_assignment(&path, waveform, sampling, &self.catalog)?;
        Ok(())
    }

    pub fn set_data_style(
        &mut self,
        path: &Path,
        data_style: Option<DataStyle>,
    ) -> Result<(), SessionError> {
        let path = self.resolve(path);
        self.table.set_data_style(&path, data_style)?;
        Ok(())
    }

    pub fn reset_assignment(&mut self, path: &Path) -> Result<(), SessionError> {
        let path = self.resolve(path);
        self.table.reset(&path)?;
        Ok(())
    }

    /// Replace the zero time and points of a waveform. The edit shadows any preset or
    /// on-disk definition of the same name for the rest of the session.
    pub fn edit_waveform(
        &mut self,
        name: &str,
        zero_time: f64,
        points: Vec<WaveformPoint>,
    ) -> Result<(), SessionError> {
        let edited = self
            .catalog
            .lookup_waveform(name)
            .ok_or_else(|| SessionError::UnknownWaveform(name.to_string()))?
            .edited(zero_time, points)?;
        self.catalog.register_waveform(edited);
        log::info!("Edited waveform {name}");
        Ok(())
    }

    /// Import an MCG file into the catalog. Returns the waveform and scheme names.
    pub fn import_mcg(&mut self, path: &Path) -> Result<(String, String), SessionError> {
        let (waveform, scheme) = parse_mcg(&self.resolve(path))?;
        let names = (waveform.name().to_string(), scheme.name().to_string());
        self.catalog.register_waveform(waveform);
        self.catalog.register_scheme(scheme);
        Ok(names)
    }

    pub fn update_header(&self, path: &Path) -> Result<HeaderUpdate, SessionError> {
        let path = self.resolve(path);
        let entry = self
            .table
            .get_assignment(&path)
            .ok_or(AssignmentError::UnknownFile(path))?;
        Ok(update_header(entry)?)
    }

    /// Update the header of every file in the session
    pub fn update_headers(&self) -> BatchReport<HeaderUpdate, HeaderWriterError> {
        let mut report = BatchReport::new();
        for entry in self.table.entries() {
            let result = update_header(entry);
            if let Err(e) = &result {
                log::error!("{e}");
            }
            report.push(entry.path.clone(), result);
        }
        report
    }

    pub fn export_referenced(&self) -> BatchReport<ExportedFile, ExportError> {
        export_referenced(&self.root, &self.catalog, &self.table)
    }

    pub fn update_manifest(&self, project_name: &str) -> Result<ManifestUpdate, ManifestError> {
        update_manifest(&self.root, &self.table, project_name)
    }
}
