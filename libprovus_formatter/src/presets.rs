//! Suggested waveform and sampling scheme definitions derived from the parameters
//! detected in a data file.
use super::assignment::DataStyle;
use super::constants::{HALF_PERIOD, PRESET_RISE_TIME};
use super::extractor::{DataFileKind, FileParameterRecord, TxWaveform};
use super::sampling::{crone_colors, numbered_channels, ramp_colors, SamplingScheme};
use super::waveform::{WaveformDefinition, WaveformPoint};

const HALF_DUTY_ZERO_TIME: f64 = 0.2501;
const CRONE_TURN_OFF: f64 = 0.25;

// Crone ramp-on curve as (scaled time, current)
const CRONE_RAMP_ON: [(f64, f64); 9] = [
    (0.0, 0.0),
    (0.02, 0.550671036),
    (0.04, 0.798103482),
    (0.06, 0.909282047),
    (0.08, 0.959237796),
    (0.1, 0.981684361),
    (0.14, 0.996302136),
    (0.16, 0.998338443),
    (0.2, 1.0),
];

/// Everything the presets can suggest for one file
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub waveform: Option<WaveformDefinition>,
    pub scheme: Option<SamplingScheme>,
    pub data_style: DataStyle,
}

/// Zero time of the preset waveform for this kind of file, if there is a preset at all
pub fn preset_zero_time(
    kind: DataFileKind,
    tx_waveform: &TxWaveform,
    duty_cycle: Option<f64>,
) -> Option<f64> {
    match (kind, tx_waveform) {
        (DataFileKind::Pem, _) => Some(CRONE_TURN_OFF),
        (DataFileKind::Tem, TxWaveform::Utem) => Some(0.0),
        (DataFileKind::Tem, TxWaveform::Undefined) if is_half_duty(duty_cycle) => {
            Some(HALF_DUTY_ZERO_TIME)
        }
        (DataFileKind::Tem, TxWaveform::Undefined) => Some(0.0),
        (DataFileKind::Tem, _) => None,
    }
}

pub fn detect_data_style(record: &FileParameterRecord) -> DataStyle {
    match (record.kind, &record.tx_waveform) {
        (DataFileKind::Pem, _) | (_, TxWaveform::Crone) => DataStyle::Crone,
        (_, TxWaveform::Utem) => DataStyle::BoreholeUtem,
        _ => DataStyle::BoreholeSjv,
    }
}

/// Derive suggestions for a resolved file. A definition that fails validation is
/// logged and dropped; a scheme is only suggested alongside a waveform.
pub fn suggest(record: &FileParameterRecord) -> Suggestion {
    let waveform = match suggest_waveform(record) {
        Ok(Some(def)) => Some(def),
        Ok(None) => {
            log::warn!(
                "No preset waveform for transmitter {:?} in {}",
                record.tx_waveform,
                record.path.display()
            );
            None
        }
        Err(e) => {
            log::warn!("Dropping preset waveform for {}: {e}", record.path.display());
            None
        }
    };

    let scheme = waveform.as_ref().and_then(|def| {
        suggest_scheme(record, def.name())
            .inspect_err(|e| {
                log::warn!("Dropping preset scheme for {}: {e}", record.path.display())
            })
            .ok()
    });

    Suggestion {
        waveform,
        scheme,
        data_style: detect_data_style(record),
    }
}

fn suggest_waveform(
    record: &FileParameterRecord,
) -> Result<Option<WaveformDefinition>, crate::error::WaveformError> {
    let frequency = record.base_frequency;
    let Some(zero_time) = record.zero_time else {
        return Ok(None);
    };
    let (name, points) = match (record.kind, &record.tx_waveform) {
        (DataFileKind::Pem, _) => (
            format!("Crone_{frequency:.0}Hz"),
            crone_points(record.ramp_time.unwrap_or(0.0)),
        ),
        (DataFileKind::Tem, TxWaveform::Utem) => (format!("UTEM_{frequency:.3}"), step_points()),
        (DataFileKind::Tem, TxWaveform::Undefined) if is_half_duty(record.duty_cycle) => (
            format!("50_Square_{frequency:.3}"),
            vec![
                WaveformPoint::new(0.0, 0.0),
                WaveformPoint::new(PRESET_RISE_TIME, 1.0),
                WaveformPoint::new(CRONE_TURN_OFF, 1.0),
                WaveformPoint::new(HALF_DUTY_ZERO_TIME, 0.0),
                WaveformPoint::new(HALF_PERIOD, 0.0),
            ],
        ),
        (DataFileKind::Tem, TxWaveform::Undefined) => {
            (format!("Square_{frequency:.3}"), step_points())
        }
        (DataFileKind::Tem, _) => return Ok(None),
    };
    WaveformDefinition::new(&name, frequency, zero_time, points).map(Some)
}

fn suggest_scheme(
    record: &FileParameterRecord,
    waveform_name: &str,
) -> Result<SamplingScheme, crate::error::SamplingError> {
    let n_channels = record.gates.len();
    let name = format!("{waveform_name}_{n_channels}ch");
    let (colors, primary_pulse_row) = match record.kind {
        DataFileKind::Pem => (crone_colors(n_channels), true),
        DataFileKind::Tem => (ramp_colors(n_channels), false),
    };
    let primary_gate = record
        .primary_gate
        .or_else(|| record.gates.first().copied())
        .unwrap_or_default();
    SamplingScheme::new(
        &name,
        primary_gate,
        record.field_type,
        numbered_channels(&record.gates, &colors),
        primary_pulse_row,
    )
}

fn step_points() -> Vec<WaveformPoint> {
    vec![
        WaveformPoint::new(0.0, -1.0),
        WaveformPoint::new(PRESET_RISE_TIME, 1.0),
        WaveformPoint::new(HALF_PERIOD, 1.0),
    ]
}

fn crone_points(ramp_time: f64) -> Vec<WaveformPoint> {
    let mut points: Vec<WaveformPoint> = CRONE_RAMP_ON
        .iter()
        .map(|(time, current)| WaveformPoint::new(*time, *current))
        .collect();
    points.push(WaveformPoint::new(CRONE_TURN_OFF - ramp_time, 1.0));
    points.push(WaveformPoint::new(CRONE_TURN_OFF, 0.0));
    points.push(WaveformPoint::new(HALF_PERIOD, 0.0));
    points
}

fn is_half_duty(duty_cycle: Option<f64>) -> bool {
    duty_cycle.is_some_and(|duty| (duty - 50.0).abs() < 1e-6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::{FieldType, TimeGate};
    use std::path::PathBuf;

    fn record(kind: DataFileKind, tx: TxWaveform, duty: Option<f64>) -> FileParameterRecord {
        let gates: Vec<TimeGate> = (0..14)
            .map(|i| TimeGate::new(0.1 * (i + 1) as f64, 0.1 * (i + 2) as f64))
            .collect();
        FileParameterRecord {
            path: PathBuf::from("Line1.tem"),
            kind,
            base_frequency: 5.2,
            zero_time: preset_zero_time(kind, &tx, duty),
            channel_count: gates.len(),
            field_type: FieldType::BField,
            units: None,
            tx_waveform: tx,
            duty_cycle: duty,
            primary_gate: gates.first().copied(),
            gates,
            ramp_time: Some(0.0015),
            file_size: 0,
        }
    }

    #[test]
    fn test_square_preset_names() {
        let suggestion = suggest(&record(DataFileKind::Tem, TxWaveform::Undefined, None));
        let waveform = suggestion.waveform.unwrap();
        assert_eq!(waveform.name(), "Square_5.200");
        assert_eq!(waveform.points()[0].current, -1.0);
        assert_eq!(suggestion.scheme.unwrap().name(), "Square_5.200_14ch");
        assert_eq!(suggestion.data_style, DataStyle::BoreholeSjv);
    }

    #[test]
    fn test_half_duty_and_utem_presets() {
        let half = suggest(&record(DataFileKind::Tem, TxWaveform::Undefined, Some(50.0)));
        let waveform = half.waveform.unwrap();
        assert_eq!(waveform.name(), "50_Square_5.200");
        assert_eq!(waveform.zero_time(), 0.2501);
        assert_eq!(waveform.points().len(), 5);

        let utem = suggest(&record(DataFileKind::Tem, TxWaveform::Utem, Some(100.0)));
        assert_eq!(utem.waveform.unwrap().name(), "UTEM_5.200");
        assert_eq!(utem.data_style, DataStyle::BoreholeUtem);
    }

    #[test]
    fn test_unknown_transmitter_has_no_suggestion() {
        let other = suggest(&record(
            DataFileKind::Tem,
            TxWaveform::Other(String::from("Triangle")),
            None,
        ));
        assert!(other.waveform.is_none());
        assert!(other.scheme.is_none());
    }

    #[test]
    fn test_crone_preset() {
        let suggestion = suggest(&record(DataFileKind::Pem, TxWaveform::Crone, None));
        let waveform = suggestion.waveform.unwrap();
        assert_eq!(waveform.name(), "Crone_5Hz");
        assert_eq!(waveform.zero_time(), 0.25);
        let scheme = suggestion.scheme.unwrap();
        assert_eq!(scheme.name(), "Crone_5Hz_14ch");
        assert_eq!(suggestion.data_style, DataStyle::Crone);
    }

    #[test]
    fn test_invalid_ramp_drops_waveform() {
        let mut rec = record(DataFileKind::Pem, TxWaveform::Crone, None);
        rec.ramp_time = Some(0.1);
        let suggestion = suggest(&rec);
        assert!(suggestion.waveform.is_none());
        assert!(suggestion.scheme.is_none());
    }
}
