//! Import of Maxwell `.mcg` configuration files.
//!
//! An MCG file carries the transmitter's standard waveform and the receiver channel
//! times, which map directly onto a waveform definition and a sampling scheme.
use fxhash::FxHashMap;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use super::constants::{HALF_PERIOD, MCG_DBDT_UNITS};
use super::error::McgError;
use super::sampling::{numbered_channels, ramp_colors, FieldType, SamplingScheme, TimeGate};
use super::waveform::{WaveformDefinition, WaveformPoint};

struct McgPatterns {
    waveform: Regex,
    base_frequency: Regex,
    timing_mark: Regex,
    channel_times: Regex,
    units: Regex,
    unit_types: Regex,
}

fn patterns() -> &'static McgPatterns {
    static PATTERNS: OnceLock<McgPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| McgPatterns {
        waveform: Regex::new(
            r"(?s)START OF STANDARD WAVEFORM\r?\n[^\n]*\n(.*?)END OF STANDARD WAVEFORM",
        )
        .expect("waveform pattern is valid"),
        base_frequency: Regex::new(r"Base Frequency \(Hz\)\s*:\s*([0-9.eE+-]+)")
            .expect("frequency pattern is valid"),
        timing_mark: Regex::new(r"Waveform Timing Mark \(s\)\s*:\s*([0-9.eE+-]+)")
            .expect("timing mark pattern is valid"),
        channel_times: Regex::new(
            r"(?s)START OF CHANNEL TIMES\r?\n[^\n]*\n(.*?)END OF CHANNEL TIMES",
        )
        .expect("channel times pattern is valid"),
        units: Regex::new(r"(?m)^\s*Units\s*:\s*(\d+)").expect("units pattern is valid"),
        unit_types: Regex::new(r"Unit Types\s*:[^\n]*?(\d+\s*=[^\r\n]*)")
            .expect("unit types pattern is valid"),
    })
}

fn capture<'a>(re: &Regex, text: &'a str, section: &'static str) -> Result<&'a str, McgError> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or(McgError::MissingSection(section))
}

/// Parse the `idx a b` rows of a section into `(a, b)` pairs
fn parse_rows(body: &str) -> Result<Vec<(f64, f64)>, McgError> {
    let mut rows = Vec::new();
    for line in body.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() < 3 {
            return Err(McgError::BadRow(line.to_string()));
        }
        rows.push((tokens[1].parse::<f64>()?, tokens[2].parse::<f64>()?));
    }
    Ok(rows)
}

/// Read an MCG file. Definitions are named after the lowercased file stem.
pub fn parse_mcg(path: &Path) -> Result<(WaveformDefinition, SamplingScheme), McgError> {
    let text = std::fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let parsed = parse_mcg_text(&text, &stem)?;
    log::info!(
        "Imported waveform {} and sampling scheme {} from {}",
        parsed.0.name(),
        parsed.1.name(),
        path.display()
    );
    Ok(parsed)
}

pub fn parse_mcg_text(
    text: &str,
    name: &str,
) -> Result<(WaveformDefinition, SamplingScheme), McgError> {
    let pats = patterns();

    let raw_points = parse_rows(capture(&pats.waveform, text, "STANDARD WAVEFORM")?)?;
    let max_time = raw_points
        .iter()
        .map(|(time, _)| *time)
        .fold(f64::NEG_INFINITY, f64::max);
    if !max_time.is_finite() || max_time <= 0.0 {
        return Err(McgError::BadRow(String::from(
            "standard waveform has no positive times",
        )));
    }
    let points: Vec<WaveformPoint> = raw_points
        .iter()
        .map(|(time, current)| {
            let scaled = if *time == 0.0 {
                0.0
            } else {
                HALF_PERIOD * time / max_time
            };
            WaveformPoint::new(scaled, *current)
        })
        .collect();
    let base_frequency: f64 = capture(&pats.base_frequency, text, "Base Frequency")?.parse()?;
    let zero_time: f64 = capture(&pats.timing_mark, text, "Waveform Timing Mark")?.parse()?;
    let waveform = WaveformDefinition::new(name, base_frequency, zero_time, points)?;

    let gates: Vec<TimeGate> = parse_rows(capture(&pats.channel_times, text, "CHANNEL TIMES")?)?
        .into_iter()
        .map(|(start, end)| TimeGate::new(start * 1000.0, end * 1000.0))
        .collect();
    let unit: u32 = capture(&pats.units, text, "Units")?.parse()?;
    let unit_map = parse_unit_types(capture(&pats.unit_types, text, "Unit Types")?)?;
    let unit_name = unit_map.get(&unit).ok_or(McgError::UnknownUnit(unit))?;
    let field_type = if MCG_DBDT_UNITS.contains(&unit_name.as_str()) {
        FieldType::DbDt
    } else {
        FieldType::BField
    };

    let scheme_name = format!("{name}_{}ch", gates.len());
    let colors = ramp_colors(gates.len());
    let scheme = SamplingScheme::new(
        &scheme_name,
        gates.first().copied().unwrap_or_default(),
        field_type,
        numbered_channels(&gates, &colors),
        false,
    )?;
    Ok((waveform, scheme))
}

/// `0=nT, 1=uV, ...` into a lookup table
fn parse_unit_types(list: &str) -> Result<FxHashMap<u32, String>, McgError> {
    let mut map = FxHashMap::default();
    for item in list.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let (number, unit) = item
            .split_once('=')
            .ok_or_else(|| McgError::BadRow(item.to_string()))?;
        map.insert(number.trim().parse::<u32>()?, unit.trim().to_string());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Maxwell configuration\n\
Base Frequency (Hz) : 30.0\n\
Waveform Timing Mark (s) : 0.0083\n\
Units : 1\n\
Unit Types : 0=nT, 1=nT/s, 2=pT\n\
START OF STANDARD WAVEFORM\n\
Index Time Current\n\
0 0.0 0.0\n\
1 0.001 1.0\n\
2 0.008 1.0\n\
3 0.0083 0.0\n\
END OF STANDARD WAVEFORM\n\
START OF CHANNEL TIMES\n\
Channel Start End\n\
1 0.0001 0.0002\n\
2 0.0002 0.0004\n\
3 0.0004 0.0008\n\
END OF CHANNEL TIMES\n";

    #[test]
    fn test_parse_sample() {
        let (waveform, scheme) = parse_mcg_text(SAMPLE, "loop_a").unwrap();
        assert_eq!(waveform.name(), "loop_a");
        assert_eq!(waveform.base_frequency(), 30.0);
        assert_eq!(waveform.zero_time(), 0.0083);
        assert_eq!(waveform.points().len(), 4);
        assert!((waveform.points()[3].time - 0.5).abs() < 1e-12);

        assert_eq!(scheme.name(), "loop_a_3ch");
        assert_eq!(scheme.field_type(), FieldType::DbDt);
        assert!((scheme.channels()[2].gate.end - 0.8).abs() < 1e-9);
        assert!((scheme.primary_gate().start - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_unit() {
        let text = SAMPLE.replace("Units : 1", "Units : 7");
        assert!(matches!(
            parse_mcg_text(&text, "x"),
            Err(McgError::UnknownUnit(7))
        ));
    }

    #[test]
    fn test_missing_section() {
        let text = SAMPLE.replace("START OF CHANNEL TIMES", "CHANNELS");
        assert!(matches!(
            parse_mcg_text(&text, "x"),
            Err(McgError::MissingSection("CHANNEL TIMES"))
        ));
    }
}
