use std::fmt::Display;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

use super::assignment::Selection;
use super::catalog::CatalogLayer;
use super::config::Config;
use super::error::ProcessorError;
use super::exporter::ExportStatus;
use super::header_writer::HeaderUpdate;
use super::manifest::ManifestUpdate;
use super::session::Session;
use super::worker_status::{Stage, WorkerStatus};

/// What the processor should do with the configured files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Detect parameters and report assignments only
    Analyze,
    /// List the catalog
    Catalog,
    Headers,
    Export,
    Project,
    /// Headers, export and project file in one go
    All,
}

/// Counts reported back to the caller once an action completes
#[derive(Debug, Clone, Default)]
pub struct ProcessSummary {
    pub files: usize,
    pub resolved: usize,
    pub headers_written: usize,
    pub header_failures: usize,
    pub exported: usize,
    pub export_failures: usize,
    pub manifest: Option<ManifestUpdate>,
}

/// Build a session from the config: scan the catalog, import MCG files, extract the
/// data files on a pool of `n_threads` workers and apply the configured overrides.
pub fn build_session(
    config: &Config,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(Session, ProcessSummary), ProcessorError> {
    let mut session = Session::new(&config.root_path)?;

    for mcg in config.mcg_files.iter() {
        match session.import_mcg(mcg) {
            Ok((waveform, scheme)) => log::info!("Imported {waveform} and {scheme}"),
            Err(e) => log::error!("Could not import {}: {e}", mcg.display()),
        }
    }

    let files = config.get_data_files()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.n_threads.max(1) as usize)
        .build()?;
    let chunk_size = (files.len() / 20).max(1);
    let mut summary = ProcessSummary {
        files: files.len(),
        ..Default::default()
    };

    tx.send(WorkerStatus::new(0.0, Stage::Analyze, *worker_id))?;
    for (idx, chunk) in files.chunks(chunk_size).enumerate() {
        summary.resolved += pool.install(|| session.add_files(chunk));
        let done = (idx * chunk_size + chunk.len()) as f32;
        tx.send(WorkerStatus::new(
            done / files.len() as f32,
            Stage::Analyze,
            *worker_id,
        ))?;
    }
    tx.send(WorkerStatus::new(1.0, Stage::Analyze, *worker_id))?;

    for ov in config.assignments.iter() {
        let Some(entry) = session.get_assignment(&ov.file) else {
            log::warn!("Assignment given for {} which is not a data file", ov.file.display());
            continue;
        };
        if ov.waveform.is_some() || ov.sampling.is_some() {
            let waveform = ov
                .waveform
                .clone()
                .or(entry.effective_waveform().map(str::to_string));
            let sampling = ov
                .sampling
                .clone()
                .or(entry.effective_sampling().map(str::to_string));
            if let Err(e) =
                session.set_assignment(&ov.file, waveform.as_deref(), sampling.as_deref())
            {
                log::error!("Ignoring assignment for {}: {e}", ov.file.display());
            }
        }
        if ov.data_style.is_some() {
            session.set_data_style(&ov.file, ov.data_style)?;
        }
    }

    Ok((session, summary))
}

fn report_assignments(session: &Session) {
    for entry in session.entries() {
        let parameters = match entry.parameters.record() {
            Some(record) => format!(
                "{} Hz, {} channel(s), {:?}",
                record.base_frequency, record.channel_count, record.field_type
            ),
            None => String::from("parameters not detected"),
        };
        log::info!(
            "{}: {} | waveform {} | sampling {} | style {}",
            entry.path.display(),
            parameters,
            describe(&entry.waveform),
            describe(&entry.sampling),
            describe(&entry.data_style)
        );
    }
}

/// The effective value, followed by the detected one when the user replaced it
fn describe<T: Display>(selection: &Selection<T>) -> String {
    let show = |value: Option<&T>| {
        value
            .map(|v| v.to_string())
            .unwrap_or_else(|| String::from("-"))
    };
    if selection.is_overridden() {
        format!(
            "{} (detected {})",
            show(selection.effective()),
            show(selection.detected_value())
        )
    } else {
        show(selection.effective())
    }
}

fn report_catalog(session: &Session) {
    let catalog = session.catalog();
    for name in catalog.waveform_names() {
        let origin = catalog.waveform_origin(&name).unwrap_or(CatalogLayer::Preset);
        log::info!("Waveform {name} ({origin:?})");
    }
    for name in catalog.scheme_names() {
        let origin = catalog.scheme_origin(&name).unwrap_or(CatalogLayer::Preset);
        log::info!("Sampling scheme {name} ({origin:?})");
    }
}

fn write_headers(
    session: &Session,
    summary: &mut ProcessSummary,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    let paths: Vec<PathBuf> = session.entries().map(|e| e.path.clone()).collect();
    tx.send(WorkerStatus::new(0.0, Stage::Headers, *worker_id))?;
    for (idx, path) in paths.iter().enumerate() {
        match session.update_header(path) {
            Ok(HeaderUpdate::Written) => summary.headers_written += 1,
            Ok(_) => (),
            Err(e) => {
                log::error!("{e}");
                summary.header_failures += 1;
            }
        }
        tx.send(WorkerStatus::new(
            (idx + 1) as f32 / paths.len() as f32,
            Stage::Headers,
            *worker_id,
        ))?;
    }
    tx.send(WorkerStatus::new(1.0, Stage::Headers, *worker_id))?;
    Ok(())
}

fn export(
    session: &Session,
    summary: &mut ProcessSummary,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    tx.send(WorkerStatus::new(0.0, Stage::Export, *worker_id))?;
    let report = session.export_referenced();
    summary.exported += report
        .successes()
        .filter(|(_, file)| file.status == ExportStatus::Written)
        .count();
    summary.export_failures += report.failure_count();
    tx.send(WorkerStatus::new(1.0, Stage::Export, *worker_id))?;
    Ok(())
}

fn write_project(
    session: &Session,
    config: &Config,
    summary: &mut ProcessSummary,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    tx.send(WorkerStatus::new(0.0, Stage::Project, *worker_id))?;
    summary.manifest = Some(session.update_manifest(&config.project_name)?);
    tx.send(WorkerStatus::new(1.0, Stage::Project, *worker_id))?;
    Ok(())
}

/// The function to be called by a separate thread (typically the CLI).
///
/// Builds a session from the config and runs the requested action over it, streaming
/// progress through `tx`.
pub fn process(
    config: Config,
    action: Action,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<ProcessSummary, ProcessorError> {
    log::info!("Running {action:?} on {}", config.root_path.display());
    let (session, mut summary) = build_session(&config, &tx, &worker_id)?;

    match action {
        Action::Analyze => report_assignments(&session),
        Action::Catalog => report_catalog(&session),
        Action::Headers => write_headers(&session, &mut summary, &tx, &worker_id)?,
        Action::Export => export(&session, &mut summary, &tx, &worker_id)?,
        Action::Project => write_project(&session, &config, &mut summary, &tx, &worker_id)?,
        Action::All => {
            write_headers(&session, &mut summary, &tx, &worker_id)?;
            export(&session, &mut summary, &tx, &worker_id)?;
            write_project(&session, &config, &mut summary, &tx, &worker_id)?;
        }
    }
    log::info!("Finished {action:?}.");
    Ok(summary)
}
