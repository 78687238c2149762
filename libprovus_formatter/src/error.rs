use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum WaveformError {
    #[error("Waveform {0} has no points")]
    NoPoints(String),
    #[error("Waveform {name} has a non-finite value at point {index}")]
    NonFinite { name: String, index: usize },
    #[error("Waveform {0} starts at a negative time")]
    NegativeStart(String),
    #[error("Waveform {name} is not strictly increasing in time at point {index}")]
    NotIncreasing { name: String, index: usize },
    #[error("Waveform {name} has an invalid base frequency {frequency}")]
    BadFrequency { name: String, frequency: f64 },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SamplingError {
    #[error("Sampling scheme {0} has no channels")]
    NoChannels(String),
    #[error("Sampling scheme {name} channel {channel} ends before it starts")]
    EmptyGate { name: String, channel: String },
    #[error("Sampling scheme {name} channel {channel} overlaps or precedes the previous channel")]
    Overlap { name: String, channel: String },
    #[error("Sampling scheme {name} has a non-finite time in channel {channel}")]
    NonFinite { name: String, channel: String },
    #[error("Found invalid field type keyword: {0}")]
    BadFieldType(String),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extractor failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Extractor does not support files with extension {0:?}")]
    UnsupportedExtension(String),
    #[error("No base frequency found in header")]
    MissingBaseFrequency,
    #[error("Base frequency {0} is not a valid number")]
    BadFrequency(String),
    #[error("No channel times found in header")]
    NoGates,
    #[error("Header lists {0} channel start times but {1} end times")]
    MismatchedGates(usize, usize),
    #[error("Could not find the PEM survey parameters line")]
    NoSurveyLine,
    #[error("PEM survey parameters line is malformed: {0}")]
    BadSurveyLine(String),
    #[error("PEM file lists {0} time windows; at least 4 are required")]
    TooFewWindows(usize),
}

#[derive(Debug, Error)]
pub enum CsvFormatError {
    #[error("Catalog CSV failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Catalog CSV failed due to CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Catalog CSV is missing the {0} row")]
    MissingRow(&'static str),
    #[error("Catalog CSV row {row} could not be parsed: {line}")]
    BadRow { row: usize, line: String },
    #[error("Catalog CSV failed to parse a number: {0}")]
    ParsingError(#[from] std::num::ParseFloatError),
    #[error("Catalog CSV held an invalid waveform: {0}")]
    Waveform(#[from] WaveformError),
    #[error("Catalog CSV held an invalid sampling scheme: {0}")]
    Sampling(#[from] SamplingError),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssignmentError {
    #[error("Invalid assignment: {kind} {name} does not exist in the catalog")]
    InvalidAssignment { kind: &'static str, name: String },
    #[error("File {0:?} is not part of the session")]
    UnknownFile(PathBuf),
}

#[derive(Debug, Error)]
pub enum HeaderWriterError {
    #[error("Assignment for {0:?} is incomplete; both a waveform and a sampling scheme are required")]
    IncompleteAssignment(PathBuf),
    #[error("Name {name:?} cannot be written into the header of {path:?}")]
    UnwritableName { path: PathBuf, name: String },
    #[error("Could not write header of {path:?}: {reason}")]
    FileWriteError { path: PathBuf, reason: String },
    #[error("File {0:?} is shorter than the minimum header; no base frequency header line was found")]
    HeaderTooShort(PathBuf),
    #[error("Header line {line} of {path:?} is not valid UTF-8")]
    HeaderEncoding { path: PathBuf, line: usize },
    #[error("Could not read {path:?}: {source}")]
    UnreadableFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Exporter could not find {kind} {name} in the catalog")]
    NotFound { kind: &'static str, name: String },
    #[error("Exporter found a naming conflict: {first} and {second} both map to {file:?}")]
    NamingConflict {
        first: String,
        second: String,
        file: PathBuf,
    },
    #[error("Exporter could not write {path:?}: {reason}")]
    FileWriteError { path: PathBuf, reason: String },
    #[error("Exporter failed due to CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Project file {path:?} is not in the expected format: {reason}")]
    IncompatibleFormat { path: PathBuf, reason: String },
    #[error("Could not write project file {path:?}: {reason}")]
    ManifestWriteError { path: PathBuf, reason: String },
    #[error("Project file record could not be formatted: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Project file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum McgError {
    #[error("MCG import failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("MCG file is missing the {0} section")]
    MissingSection(&'static str),
    #[error("MCG file has a malformed row: {0}")]
    BadRow(String),
    #[error("MCG import failed to parse a number: {0}")]
    ParsingError(#[from] std::num::ParseFloatError),
    #[error("MCG import failed to parse an integer: {0}")]
    IntParsingError(#[from] std::num::ParseIntError),
    #[error("MCG unit {0} is not listed in the unit types")]
    UnknownUnit(u32),
    #[error("MCG import produced an invalid waveform: {0}")]
    Waveform(#[from] WaveformError),
    #[error("MCG import produced an invalid sampling scheme: {0}")]
    Sampling(#[from] SamplingError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config failed to scan the root directory: {0}")]
    WalkError(#[from] walkdir::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session root directory {0:?} does not exist")]
    BadRootPath(PathBuf),
    #[error("Session failed due to Catalog error: {0}")]
    CatalogError(#[from] CatalogError),
    #[error("Session failed due to Assignment error: {0}")]
    AssignmentError(#[from] AssignmentError),
    #[error("Session failed due to MCG error: {0}")]
    McgError(#[from] McgError),
    #[error("Session failed due to Waveform error: {0}")]
    WaveformError(#[from] WaveformError),
    #[error("Session failed due to Header Writer error: {0}")]
    HeaderWriterError(#[from] HeaderWriterError),
    #[error("Session has no waveform named {0}")]
    UnknownWaveform(String),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Session error: {0}")]
    SessionError(#[from] SessionError),
    #[error("Processor failed due to Manifest error: {0}")]
    ManifestError(#[from] ManifestError),
    #[error("Processor failed due to Exporter error: {0}")]
    ExportError(#[from] ExportError),
    #[error("Processor failed to build the worker pool: {0}")]
    PoolError(#[from] rayon::ThreadPoolBuildError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
