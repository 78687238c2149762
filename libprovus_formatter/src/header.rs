//! Readers for the fixed-format headers of TEM and PEM survey files.
//!
//! TEM headers are the leading block of `/`-prefixed lines. Each line carries whitespace
//! separated `KEY=value` (or `KEY:value`) constants, plus the channel time lists
//! (`/TIMESSTART(ms)=...` and friends). PEM files have a single survey parameters line and
//! a block of time windows in seconds.
use regex::Regex;
use std::sync::OnceLock;

use super::constants::{
    BASE_FREQUENCY_KEYS, CONFIG_KEYS, DATA_TYPE_KEY, DUTY_CYCLE_KEYS, OFF_TIME_KEY, SYSTEM_KEYS,
    TX_WAVEFORM_KEY, UNITS_KEY,
};
use super::error::ExtractionError;
use super::sampling::TimeGate;

/// Byte offsets of one line. `content_end` excludes the line terminator, `end` includes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    pub content_end: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn content<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        &bytes[self.start..self.content_end]
    }

    pub fn terminator<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        &bytes[self.content_end..self.end]
    }
}

/// Locate the header region of a TEM file: the leading lines which are blank or begin
/// with `/`. Works on raw bytes so the data payload is never decoded.
pub fn header_region(bytes: &[u8]) -> Vec<LineSpan> {
    let mut spans = Vec::new();
    let mut start = 0;
    while start < bytes.len() {
        let end = match bytes[start..].iter().position(|b| *b == b'\n') {
            Some(pos) => start + pos + 1,
            None => bytes.len(),
        };
        let mut content_end = end;
        if content_end > start && bytes[content_end - 1] == b'\n' {
            content_end -= 1;
        }
        if content_end > start && bytes[content_end - 1] == b'\r' {
            content_end -= 1;
        }
        let first = bytes[start..content_end]
            .iter()
            .copied()
            .find(|b| !b.is_ascii_whitespace());
        match first {
            None | Some(b'/') => spans.push(LineSpan {
                start,
                content_end,
                end,
            }),
            Some(_) => break,
        }
        start = end;
    }
    spans
}

/// Split a header token into an uppercased key and cleaned value, or None if the token
/// is not a constant.
pub fn split_constant(token: &str) -> Option<(String, String)> {
    let token = token.trim_start_matches('/');
    let separator = if token.contains('=') { '=' } else { ':' };
    let (key, value) = token.split_once(separator)?;
    if key.is_empty() {
        return None;
    }
    let value = value.trim_matches(|c: char| matches!(c, ',' | '"' | ' ' | '&'));
    Some((key.to_uppercase(), value.to_string()))
}

/// True if a header line carries one of the base frequency keys
pub fn is_frequency_line(line: &str) -> bool {
    line.split_whitespace()
        .filter_map(split_constant)
        .any(|(key, _)| BASE_FREQUENCY_KEYS.contains(&key.as_str()))
}

fn gate_list_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*/\s*TIMES(START|END|WIDTH)?\s*\((ms|us)\)\s*[=:]?\s*(.*)$")
            .expect("gate list pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateList {
    Start,
    End,
    Centre,
    Width,
}

/// Parse a `/TIMES...(unit)=a,b,c` line into its kind and values in milliseconds
fn parse_gate_list(line: &str) -> Option<(GateList, Vec<f64>)> {
    let captures = gate_list_regex().captures(line)?;
    let kind = match captures.get(1).map(|m| m.as_str().to_uppercase()) {
        Some(k) if k == "START" => GateList::Start,
        Some(k) if k == "END" => GateList::End,
        Some(_) => GateList::Width,
        None => GateList::Centre,
    };
    let scale = if captures[2].eq_ignore_ascii_case("us") {
        1.0e-3
    } else {
        1.0
    };
    let mut values = Vec::new();
    for raw in captures[3].split(',') {
        let raw = raw.trim().trim_end_matches('&').trim();
        if raw.is_empty() {
            continue;
        }
        match raw.parse::<f64>() {
            Ok(v) => values.push(v * scale),
            Err(_) => log::warn!("Could not parse channel time {raw:?} in line {line:?}"),
        }
    }
    Some((kind, values))
}

/// Constants and channel times read from a TEM header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemHeader {
    pub line_count: usize,
    pub base_frequency: Option<String>,
    pub units: Option<String>,
    pub tx_waveform: Option<String>,
    pub duty_cycle: Option<String>,
    pub system_info: Option<String>,
    pub survey_config: Option<String>,
    pub data_type: Option<String>,
    pub off_time: Option<String>,
    pub gates: Vec<TimeGate>,
}

impl TemHeader {
    /// Read the header region of a TEM file. Missing constants stay `None`; the only
    /// error is a channel list mismatch.
    pub fn parse(bytes: &[u8]) -> Result<Self, ExtractionError> {
        let mut header = TemHeader::default();
        let mut starts: Vec<f64> = Vec::new();
        let mut ends: Vec<f64> = Vec::new();
        let mut centres: Vec<f64> = Vec::new();
        let mut widths: Vec<f64> = Vec::new();

        for span in header_region(bytes) {
            let line = String::from_utf8_lossy(span.content(bytes));
            if line.trim().is_empty() {
                continue;
            }
            header.line_count += 1;

            if let Some((kind, values)) = parse_gate_list(&line) {
                match kind {
                    GateList::Start => starts = values,
                    GateList::End => ends = values,
                    GateList::Centre => centres = values,
                    GateList::Width => widths = values,
                }
                continue;
            }

            for token in line.split_whitespace() {
                if token == "&" {
                    continue;
                }
                let Some((key, value)) = split_constant(token) else {
                    continue;
                };
                let key = key.as_str();
                if BASE_FREQUENCY_KEYS.contains(&key) {
                    header.base_frequency = Some(value);
                } else if key == UNITS_KEY {
                    header.units = Some(
                        value
                            .trim_matches(|c: char| c == '(' || c == ')')
                            .to_string(),
                    );
                } else if key == TX_WAVEFORM_KEY {
                    header.tx_waveform = Some(value);
                } else if DUTY_CYCLE_KEYS.contains(&key) {
                    header.duty_cycle = Some(value);
                } else if SYSTEM_KEYS.contains(&key) {
                    header.system_info = Some(value);
                } else if CONFIG_KEYS.contains(&key) {
                    header.survey_config = Some(value);
                } else if key == DATA_TYPE_KEY {
                    header.data_type = Some(value);
                } else if key == OFF_TIME_KEY {
                    header.off_time = Some(value);
                }
            }
        }

        if starts.is_empty() && ends.is_empty() && !centres.is_empty() {
            if centres.len() != widths.len() {
                return Err(ExtractionError::MismatchedGates(centres.len(), widths.len()));
            }
            starts = centres.iter().zip(widths.iter()).map(|(t, w)| t - w).collect();
            ends = centres.iter().zip(widths.iter()).map(|(t, w)| t + w).collect();
        }
        if starts.len() != ends.len() {
            return Err(ExtractionError::MismatchedGates(starts.len(), ends.len()));
        }
        header.gates = starts
            .into_iter()
            .zip(ends)
            .map(|(start, end)| TimeGate::new(start, end))
            .collect();
        Ok(header)
    }
}

/// Survey parameters and time windows from a PEM file
#[derive(Debug, Clone, PartialEq)]
pub struct PemSurvey {
    pub survey_mode: String,
    pub units: String,
    pub sync_type: String,
    /// Time base in milliseconds
    pub time_base: f64,
    /// Ramp time in microseconds
    pub ramp_time: f64,
    pub n_gates: usize,
    pub n_readings: usize,
    /// Window edges in seconds; the first two bound the primary pulse
    pub windows: Vec<f64>,
}

impl PemSurvey {
    pub fn parse(text: &str) -> Result<Self, ExtractionError> {
        let mut survey_line: Option<&str> = None;
        let mut windows: Vec<f64> = Vec::new();
        let mut in_windows = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if survey_line.is_none() && line.contains("Metric") && line.contains("Cable") {
                survey_line = Some(line);
                continue;
            }
            if !in_windows && line.starts_with('-') && line.to_lowercase().contains('e') {
                in_windows = true;
            }
            if in_windows {
                if line.contains('$') {
                    break;
                }
                let parsed: Result<Vec<f64>, _> = line
                    .split_whitespace()
                    .filter(|token| token.to_lowercase().contains('e'))
                    .map(str::parse::<f64>)
                    .collect();
                match parsed {
                    Ok(values) => windows.extend(values),
                    Err(_) => log::warn!("Skipping unreadable PEM window line {line:?}"),
                }
            }
        }

        let line = survey_line.ok_or(ExtractionError::NoSurveyLine)?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 7 {
            return Err(ExtractionError::BadSurveyLine(line.to_string()));
        }
        let bad_line = || ExtractionError::BadSurveyLine(line.to_string());
        Ok(Self {
            survey_mode: parts[0].to_string(),
            units: parts[1].to_string(),
            sync_type: parts[2].to_string(),
            time_base: parts[3].parse::<f64>().map_err(|_| bad_line())?,
            ramp_time: parts[4].parse::<f64>().map_err(|_| bad_line())?,
            n_gates: parts[5].parse::<usize>().map_err(|_| bad_line())?,
            n_readings: parts[6].parse::<usize>().map_err(|_| bad_line())?,
            windows,
        })
    }

    /// Base frequency in Hz: a quarter period equals the time base
    pub fn base_frequency(&self) -> f64 {
        1.0 / (4.0 * self.time_base / 1000.0)
    }

    /// Ramp time in seconds
    pub fn ramp_seconds(&self) -> f64 {
        self.ramp_time / 1.0e6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEM: &str = "/ BFREQ=5.2 UNITS=(nT) DUTYCYCLE:50 &\r\n\
                       /TIMESSTART(ms)=0.1,0.2,0.4\r\n\
                       /TIMESEND(ms)=0.2,0.4,0.8\r\n\
                       LINE 100 1.0 2.0 3.0\r\n\
                       / BFREQ=99 in the payload\r\n";

    #[test]
    fn test_header_region_stops_at_payload() {
        let spans = header_region(TEM.as_bytes());
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].terminator(TEM.as_bytes()), b"\r\n");
        assert!(spans[0].content(TEM.as_bytes()).ends_with(b"&"));
    }

    #[test]
    fn test_tem_header_constants_and_gates() {
        let header = TemHeader::parse(TEM.as_bytes()).unwrap();
        assert_eq!(header.base_frequency.as_deref(), Some("5.2"));
        assert_eq!(header.units.as_deref(), Some("nT"));
        assert_eq!(header.duty_cycle.as_deref(), Some("50"));
        assert_eq!(header.gates.len(), 3);
        assert_eq!(header.gates[2], TimeGate::new(0.4, 0.8));
        assert_eq!(header.line_count, 3);
    }

    #[test]
    fn test_centre_and_width_in_microseconds() {
        let text = "/ BASEFREQ=25\n/TIMES(us)=100,300\n/TIMESWIDTH(us)=50,100\n";
        let header = TemHeader::parse(text.as_bytes()).unwrap();
        assert_eq!(header.gates.len(), 2);
        assert!((header.gates[0].start - 0.05).abs() < 1e-12);
        assert!((header.gates[1].end - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_gate_lists() {
        let text = "/ BFREQ=25\n/TIMESSTART(ms)=1,2\n/TIMESEND(ms)=2\n";
        assert!(matches!(
            TemHeader::parse(text.as_bytes()),
            Err(ExtractionError::MismatchedGates(2, 1))
        ));
    }

    #[test]
    fn test_pem_survey() {
        let text = "Some preamble\n\
                    B Metric Cable 16.66667 1500 21 10\n\
                    -2.0e-4 -1.0e-4 1.0e-4\n\
                    2.0e-4 4.0e-4\n\
                    $\n\
                    5.0e-4\n";
        let survey = PemSurvey::parse(text).unwrap();
        assert_eq!(survey.units, "Metric");
        assert_eq!(survey.windows.len(), 5);
        assert!((survey.base_frequency() - 15.0).abs() < 1e-3);
        assert!((survey.ramp_seconds() - 0.0015).abs() < 1e-12);
    }

    #[test]
    fn test_pem_without_survey_line() {
        assert!(matches!(
            PemSurvey::parse("-1.0e-4 2.0e-4\n"),
            Err(ExtractionError::NoSurveyLine)
        ));
    }
}
