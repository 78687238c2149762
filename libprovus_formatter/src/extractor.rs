use rayon::prelude::*;
use std::path::{Path, PathBuf};

use super::constants::{PEM_EXTENSION, TEM_EXTENSION};
use super::error::ExtractionError;
use super::header::{PemSurvey, TemHeader};
use super::presets::preset_zero_time;
use super::sampling::{FieldType, TimeGate};

/// The survey file formats the extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFileKind {
    Tem,
    Pem,
}

impl DataFileKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            TEM_EXTENSION => Some(Self::Tem),
            PEM_EXTENSION => Some(Self::Pem),
            _ => None,
        }
    }
}

/// Transmitter waveform named in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxWaveform {
    Undefined,
    Utem,
    Crone,
    Other(String),
}

impl TxWaveform {
    fn from_header(value: Option<&str>) -> Self {
        match value {
            None => Self::Undefined,
            Some(v) if v.eq_ignore_ascii_case("undefined") => Self::Undefined,
            Some(v) if v.eq_ignore_ascii_case("utem") => Self::Utem,
            Some(v) if v.eq_ignore_ascii_case("crone") => Self::Crone,
            Some(v) => Self::Other(v.to_string()),
        }
    }
}

/// Acquisition parameters detected in a data file header
#[derive(Debug, Clone, PartialEq)]
pub struct FileParameterRecord {
    pub path: PathBuf,
    pub kind: DataFileKind,
    pub base_frequency: f64,
    /// None when the transmitter waveform is not one we have a preset for
    pub zero_time: Option<f64>,
    pub channel_count: usize,
    pub field_type: FieldType,
    pub units: Option<String>,
    pub tx_waveform: TxWaveform,
    pub duty_cycle: Option<f64>,
    /// Channel gates in milliseconds
    pub gates: Vec<TimeGate>,
    pub primary_gate: Option<TimeGate>,
    /// Transmitter ramp time in seconds (PEM only)
    pub ramp_time: Option<f64>,
    pub file_size: u64,
}

/// Outcome of reading a file's parameters. Detection failures are a state, not an error:
/// an unresolved file stays in the session and can still be assigned by hand.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Resolved(FileParameterRecord),
    Unresolved { path: PathBuf, reason: String },
}

impl Extraction {
    pub fn path(&self) -> &Path {
        match self {
            Self::Resolved(record) => &record.path,
            Self::Unresolved { path, .. } => path,
        }
    }

    pub fn record(&self) -> Option<&FileParameterRecord> {
        match self {
            Self::Resolved(record) => Some(record),
            Self::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Detect the acquisition parameters of a data file. Never modifies the file and never
/// fails; problems produce [`Extraction::Unresolved`].
pub fn extract(path: &Path) -> Extraction {
    log::info!("Processing: {}", path.display());
    match try_extract(path) {
        Ok(record) => {
            log::info!(
                "Detected {} Hz, {} channel(s) in {} ({})",
                record.base_frequency,
                record.channel_count,
                path.display(),
                human_bytes::human_bytes(record.file_size as f64)
            );
            Extraction::Resolved(record)
        }
        Err(e) => {
            log::warn!("Parameters not detected for {}: {e}", path.display());
            Extraction::Unresolved {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    }
}

/// Extract many files on the current rayon pool. Results come back in input order, each
/// paired with its path.
pub fn extract_all(paths: &[PathBuf]) -> Vec<(PathBuf, Extraction)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), extract(path)))
        .collect()
}

fn try_extract(path: &Path) -> Result<FileParameterRecord, ExtractionError> {
    let kind = DataFileKind::from_path(path).ok_or_else(|| {
        ExtractionError::UnsupportedExtension(
            path.extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default(),
        )
    })?;
    let bytes = std::fs::read(path)?;
    let file_size = bytes.len() as u64;
    match kind {
        DataFileKind::Tem => extract_tem(path, &bytes, file_size),
        DataFileKind::Pem => extract_pem(path, &bytes, file_size),
    }
}

fn extract_tem(
    path: &Path,
    bytes: &[u8],
    file_size: u64,
) -> Result<FileParameterRecord, ExtractionError> {
    let header = TemHeader::parse(bytes)?;
    log::info!(
        "Found {} header lines in {}",
        header.line_count,
        path.display()
    );
    let raw_frequency = header
        .base_frequency
        .as_deref()
        .ok_or(ExtractionError::MissingBaseFrequency)?;
    let base_frequency: f64 = raw_frequency
        .parse()
        .map_err(|_| ExtractionError::BadFrequency(raw_frequency.to_string()))?;
    if !base_frequency.is_finite() || base_frequency <= 0.0 {
        return Err(ExtractionError::BadFrequency(raw_frequency.to_string()));
    }
    if header.gates.is_empty() {
        return Err(ExtractionError::NoGates);
    }

    let tx_waveform = TxWaveform::from_header(header.tx_waveform.as_deref());
    let duty_cycle = match header.duty_cycle.as_deref().map(str::parse::<f64>) {
        Some(Ok(duty)) => Some(duty),
        _ if tx_waveform == TxWaveform::Utem => Some(100.0),
        _ => None,
    };
    let field_type = FieldType::from_units(header.units.as_deref().unwrap_or(""));

    Ok(FileParameterRecord {
        path: path.to_path_buf(),
        kind: DataFileKind::Tem,
        base_frequency,
        zero_time: preset_zero_time(DataFileKind::Tem, &tx_waveform, duty_cycle),
        channel_count: header.gates.len(),
        field_type,
        units: header.units,
        tx_waveform,
        duty_cycle,
        primary_gate: header.gates.first().copied(),
        gates: header.gates,
        ramp_time: None,
        file_size,
    })
}

fn extract_pem(
    path: &Path,
    bytes: &[u8],
    file_size: u64,
) -> Result<FileParameterRecord, ExtractionError> {
    let survey = PemSurvey::parse(&String::from_utf8_lossy(bytes))?;
    if survey.windows.len() < 4 {
        return Err(ExtractionError::TooFewWindows(survey.windows.len()));
    }
    let base_frequency = survey.base_frequency();
    if !base_frequency.is_finite() || base_frequency <= 0.0 {
        return Err(ExtractionError::BadFrequency(survey.time_base.to_string()));
    }
    let ms: Vec<f64> = survey.windows.iter().map(|w| w * 1000.0).collect();
    let gates: Vec<TimeGate> = ms[2..]
        .windows(2)
        .map(|pair| TimeGate::new(pair[0], pair[1]))
        .collect();

    Ok(FileParameterRecord {
        path: path.to_path_buf(),
        kind: DataFileKind::Pem,
        base_frequency,
        zero_time: preset_zero_time(DataFileKind::Pem, &TxWaveform::Crone, None),
        channel_count: gates.len(),
        field_type: FieldType::DbDt,
        units: Some(survey.units.clone()),
        tx_waveform: TxWaveform::Crone,
        duty_cycle: None,
        gates,
        primary_gate: Some(TimeGate::new(ms[0], ms[1])),
        ramp_time: Some(survey.ramp_seconds()),
        file_size,
    })
}
