// Directory layout expected by Provus under the project root
pub const OPTIONS_DIR: &str = "Provus_Options";
pub const WAVEFORM_DIR: &str = "Waveforms";
pub const SAMPLING_DIR: &str = "Channel_Sampling_Schemes";
pub const PROJECT_FILE_NAME: &str = "project.ppf";
pub const PROJECT_FILE_EXTENSION: &str = "ppf";
pub const CATALOG_FILE_EXTENSION: &str = "csv";

// Data file extensions (compared lowercase)
pub const TEM_EXTENSION: &str = "tem";
pub const PEM_EXTENSION: &str = "pem";

// Header constant keys
pub const BASE_FREQUENCY_KEYS: [&str; 3] = ["BFREQ", "BASEFREQ", "BASEFREQUENCY"];
pub const UNITS_KEY: &str = "UNITS";
pub const TX_WAVEFORM_KEY: &str = "TXWAVEFORM";
pub const DUTY_CYCLE_KEYS: [&str; 2] = ["DUTYCYCLE", "DUTY"];
pub const SYSTEM_KEYS: [&str; 3] = ["INSTRUMENT", "SYSTEM", "PRIMARYREMOVED"];
pub const CONFIG_KEYS: [&str; 2] = ["CONFIG", "CONFIGURATION"];
pub const DATA_TYPE_KEY: &str = "DATATYPE";
pub const OFF_TIME_KEY: &str = "OFFTIME";

// Tags the header writer owns on the base frequency line
pub const WAVEFORM_TAG: &str = "WAVEFORM:";
pub const SAMPLING_TAG: &str = "SAMPLING:";
pub const DATA_STYLE_TAG: &str = "DATASTYLE:";
pub const MANAGED_TAGS: [&str; 3] = [WAVEFORM_TAG, SAMPLING_TAG, DATA_STYLE_TAG];

/// Units which indicate dB/dt measurements. Anything else is treated as B-field.
pub const DBDT_UNITS: [&str; 17] = [
    "uV", "uV/A", "uV/Am2", "uV/m2", "nV", "nV/A", "nV/Am2", "nV/m2", "pV", "pV/A", "pV/Am2",
    "pV/m2", "nT/As", "nT/Asm2", "pT/s", "pT/As", "pT/Asm2",
];

/// Units which select dB/dt in an MCG unit table
pub const MCG_DBDT_UNITS: [&str; 5] = ["uV", "nV", "pV", "nT/s", "pT/s"];

// Waveform CSV rows
pub const WAVEFORM_NAME_ROW: &str = "Waveform Name";
pub const BASE_FREQUENCY_ROW: &str = "BaseFrequency";
pub const BASE_FREQUENCY_ROW_ALT: &str = "Base Frequency";
pub const ZERO_TIME_ROW: &str = "Waveform Zero Time";
pub const POINTS_HEADER: [&str; 2] = ["Scaled Time", "Current"];

// Sampling CSV rows
pub const SAMPLING_NAME_ROW: &str = "Sampling Name";
pub const PRIMARY_GATE_ROW: &str = "Primary Time Gate";
pub const FIELD_TYPE_ROW: &str = "Field Type";
pub const CHANNELS_HEADER: [&str; 7] = [
    "Channel Name",
    "ChStart",
    "ChEnd",
    "Red",
    "Green",
    "Blue",
    "LineWt",
];
pub const PRIMARY_PULSE_CHANNEL: &str = "PP";

// Project file sections
pub const SETTINGS_SECTION: &str = "Project Settings";
pub const DATA_FILES_SECTION: &str = "Project Data Files";
pub const ASSIGNMENTS_SECTION: &str = "Data File Assignments";
pub const DEFAULT_PROJECT_NAME: &str = "Default";

/// Time separating the rise of a preset square waveform from zero, in scaled time
pub const PRESET_RISE_TIME: f64 = 0.0001;
/// Half period in scaled time; presets cover one polarity only
pub const HALF_PERIOD: f64 = 0.5;
/// Float slack used when comparing gate edges
pub const TIME_TOLERANCE: f64 = 1e-9;
