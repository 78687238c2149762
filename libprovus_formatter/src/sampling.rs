use csv::{ReaderBuilder, Terminator, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::Read;
use std::str::FromStr;

use super::constants::{
    CHANNELS_HEADER, DBDT_UNITS, FIELD_TYPE_ROW, PRIMARY_GATE_ROW, PRIMARY_PULSE_CHANNEL,
    SAMPLING_NAME_ROW, TIME_TOLERANCE,
};
use super::error::{CsvFormatError, SamplingError};

/// The quantity a receiver measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    BField,
    DbDt,
}

impl FieldType {
    /// Classify a header `UNITS` value. Unknown units fall back to B-field.
    pub fn from_units(units: &str) -> Self {
        if DBDT_UNITS.contains(&units) {
            Self::DbDt
        } else {
            Self::BField
        }
    }
}

impl FromStr for FieldType {
    type Err = SamplingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "b" => Ok(Self::BField),
            "dbdt" => Ok(Self::DbDt),
            _ => Err(SamplingError::BadFieldType(s.to_string())),
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BField => write!(f, "b"),
            Self::DbDt => write!(f, "dbdt"),
        }
    }
}

/// A receiver time window in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeGate {
    pub start: f64,
    pub end: f64,
}

impl TimeGate {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Display colour and line weight Provus uses to draw a channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTag {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub line_weight: u32,
}

impl ColorTag {
    pub fn new(red: f64, green: f64, blue: f64, line_weight: u32) -> Self {
        Self {
            red: red.clamp(0.0, 1.0),
            green: green.clamp(0.0, 1.0),
            blue: blue.clamp(0.0, 1.0),
            line_weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    pub gate: TimeGate,
    pub color: ColorTag,
}

/// A named channel sampling scheme as Provus reads it from
/// `Provus_Options/Channel_Sampling_Schemes`.
///
/// Channels are ordered, never overlap, and each one has a positive width.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingScheme {
    name: String,
    primary_gate: TimeGate,
    field_type: FieldType,
    channels: Vec<Channel>,
    primary_pulse_row: bool,
}

impl SamplingScheme {
    pub fn new(
        name: &str,
        primary_gate: TimeGate,
        field_type: FieldType,
        channels: Vec<Channel>,
        primary_pulse_row: bool,
    ) -> Result<Self, SamplingError> {
        let scheme = Self {
            name: name.to_string(),
            primary_gate,
            field_type,
            channels,
            primary_pulse_row,
        };
        scheme.validate()?;
        Ok(scheme)
    }

    fn validate(&self) -> Result<(), SamplingError> {
        if self.channels.is_empty() {
            return Err(SamplingError::NoChannels(self.name.clone()));
        }
        let mut previous: Option<&TimeGate> = None;
        for channel in self.channels.iter() {
            let gate = &channel.gate;
            if !gate.start.is_finite() || !gate.end.is_finite() {
                return Err(SamplingError::NonFinite {
                    name: self.name.clone(),
                    channel: channel.name.clone(),
                });
            }
            if gate.end <= gate.start {
                return Err(SamplingError::EmptyGate {
                    name: self.name.clone(),
                    channel: channel.name.clone(),
                });
            }
            if let Some(prev) = previous {
                if gate.start <= prev.start || gate.start < prev.end - TIME_TOLERANCE {
                    return Err(SamplingError::Overlap {
                        name: self.name.clone(),
                        channel: channel.name.clone(),
                    });
                }
            }
            previous = Some(gate);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_gate(&self) -> TimeGate {
        self.primary_gate
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    /// Render the Provus sampling CSV. Output is fully determined by the scheme.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = WriterBuilder::new()
            .flexible(true)
            .terminator(Terminator::CRLF)
            .from_writer(vec![]);
        writer.write_record([SAMPLING_NAME_ROW, self.name.as_str()])?;
        writer.write_record([
            PRIMARY_GATE_ROW.to_string(),
            format!("{:.3}", self.primary_gate.start),
            format!("{:.3}", self.primary_gate.end),
        ])?;
        writer.write_record([FIELD_TYPE_ROW.to_string(), self.field_type.to_string()])?;
        writer.write_record(CHANNELS_HEADER)?;
        for channel in self.channels.iter() {
            writer.write_record(channel_row(&channel.name, &channel.gate, &channel.color))?;
        }
        if self.primary_pulse_row {
            writer.write_record(channel_row(
                PRIMARY_PULSE_CHANNEL,
                &self.primary_gate,
                &primary_pulse_color(),
            ))?;
        }
        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }

    /// Parse a sampling CSV. `fallback_name` is used when the file has no name row.
    pub fn from_csv_reader<R: Read>(reader: R, fallback_name: &str) -> Result<Self, CsvFormatError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut name: Option<String> = None;
        let mut primary_gate: Option<TimeGate> = None;
        let mut field_type: Option<FieldType> = None;
        let mut channels: Vec<Channel> = Vec::new();
        let mut primary_pulse_row = false;
        let mut in_channels = false;

        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            let key = record.get(0).unwrap_or("");
            if in_channels {
                if record.iter().all(|field| field.is_empty()) {
                    continue;
                }
                if record.len() < CHANNELS_HEADER.len() {
                    return Err(CsvFormatError::BadRow {
                        row,
                        line: record.iter().collect::<Vec<_>>().join(","),
                    });
                }
                if key == PRIMARY_PULSE_CHANNEL {
                    primary_pulse_row = true;
                    continue;
                }
                let line_weight = record[6]
                    .parse::<f64>()
                    .map(|w| w.round().max(0.0) as u32)?;
                channels.push(Channel {
                    name: key.to_string(),
                    gate: TimeGate::new(record[1].parse()?, record[2].parse()?),
                    color: ColorTag::new(
                        record[3].parse()?,
                        record[4].parse()?,
                        record[5].parse()?,
                        line_weight,
                    ),
                });
                continue;
            }
            match key {
                SAMPLING_NAME_ROW => name = record.get(1).map(str::to_string),
                PRIMARY_GATE_ROW => {
                    if record.len() < 3 {
                        return Err(CsvFormatError::BadRow {
                            row,
                            line: record.iter().collect::<Vec<_>>().join(","),
                        });
                    }
                    primary_gate = Some(TimeGate::new(record[1].parse()?, record[2].parse()?));
                }
                FIELD_TYPE_ROW => {
                    field_type = Some(FieldType::from_str(record.get(1).unwrap_or(""))?)
                }
                k if k == CHANNELS_HEADER[0] => in_channels = true,
                _ => (),
            }
        }

        let primary_gate = primary_gate.ok_or(CsvFormatError::MissingRow(PRIMARY_GATE_ROW))?;
        let field_type = field_type.ok_or(CsvFormatError::MissingRow(FIELD_TYPE_ROW))?;
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| fallback_name.to_string());
        Ok(Self::new(
            &name,
            primary_gate,
            field_type,
            channels,
            primary_pulse_row,
        )?)
    }
}

fn channel_row(name: &str, gate: &TimeGate, color: &ColorTag) -> [String; 7] {
    [
        name.to_string(),
        format!("{:.3}", gate.start),
        format!("{:.3}", gate.end),
        format!("{:.6}", color.red),
        format!("{:.6}", color.green),
        format!("{:.6}", color.blue),
        color.line_weight.to_string(),
    ]
}

/// Colour of the primary pulse row Provus draws for Crone data
pub fn primary_pulse_color() -> ColorTag {
    ColorTag::new(0.0, 0.299774, 0.996094, 2)
}

/// Linear red-up/green-down ramp used for TEM and MCG schemes
pub fn ramp_colors(n_channels: usize) -> Vec<ColorTag> {
    (0..n_channels)
        .map(|i| ColorTag::new(0.25 + i as f64 * 0.05, 0.75 - i as f64 * 0.05, 0.5, 2))
        .collect()
}

/// Three band palette (magenta to green to blue) used for Crone PEM schemes
pub fn crone_colors(n_channels: usize) -> Vec<ColorTag> {
    (1..=n_channels)
        .map(|ch| {
            let ch = ch as f64;
            if ch <= 12.0 {
                ColorTag::new(
                    0.996094,
                    0.144533 + (ch - 1.0) * 0.0708,
                    0.652326 - (ch - 1.0) * 0.0545,
                    2,
                )
            } else if ch <= 15.0 {
                ColorTag::new(0.697813 - (ch - 13.0) * 0.2988, 0.996094, 0.0, 2)
            } else {
                ColorTag::new(
                    0.0,
                    0.996094 - (ch - 16.0) * 0.0988,
                    0.198521 + (ch - 16.0) * 0.2988,
                    2,
                )
            }
        })
        .collect()
}

/// Build channels named `Ch1..ChN` from gates and a colour palette
pub fn numbered_channels(gates: &[TimeGate], colors: &[ColorTag]) -> Vec<Channel> {
    gates
        .iter()
        .zip(colors.iter())
        .enumerate()
        .map(|(idx, (gate, color))| Channel {
            name: format!("Ch{}", idx + 1),
            gate: *gate,
            color: *color,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gates() -> Vec<TimeGate> {
        vec![
            TimeGate::new(0.1, 0.2),
            TimeGate::new(0.2, 0.4),
            TimeGate::new(0.4, 0.8),
        ]
    }

    #[test]
    fn test_field_type_from_units() {
        assert_eq!(FieldType::from_units("nT/As"), FieldType::DbDt);
        assert_eq!(FieldType::from_units("nT"), FieldType::BField);
        assert_eq!(FieldType::from_units("furlongs"), FieldType::BField);
        assert_eq!(FieldType::from_str("dBdT").unwrap(), FieldType::DbDt);
    }

    #[test]
    fn test_touching_gates_allowed_overlap_rejected() {
        let gates = gates();
        let channels = numbered_channels(&gates, &ramp_colors(gates.len()));
        assert!(SamplingScheme::new("ok", gates[0], FieldType::BField, channels, false).is_ok());

        let overlapping = vec![TimeGate::new(0.1, 0.3), TimeGate::new(0.2, 0.4)];
        let channels = numbered_channels(&overlapping, &ramp_colors(2));
        let result = SamplingScheme::new("bad", overlapping[0], FieldType::BField, channels, false);
        assert!(matches!(result, Err(SamplingError::Overlap { .. })));
    }

    #[test]
    fn test_ramp_colors_are_clamped() {
        let colors = ramp_colors(20);
        assert_eq!(colors[0].red, 0.25);
        assert_eq!(colors[19].green, 0.0);
        assert!(colors.iter().all(|c| c.red <= 1.0 && c.green >= 0.0));
    }

    #[test]
    fn test_csv_with_primary_pulse_row_reads_back() {
        let gates = gates();
        let scheme = SamplingScheme::new(
            "Crone_15Hz_3ch",
            TimeGate::new(-0.2, -0.1),
            FieldType::DbDt,
            numbered_channels(&gates, &crone_colors(gates.len())),
            true,
        )
        .unwrap();
        let bytes = scheme.to_csv_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("Sampling Name,Crone_15Hz_3ch\r\nPrimary Time Gate,-0.200,-0.100\r\n"));
        assert!(text.ends_with("PP,-0.200,-0.100,0.000000,0.299774,0.996094,2\r\n"));

        let read = SamplingScheme::from_csv_reader(bytes.as_slice(), "unused").unwrap();
        assert_eq!(read.channel_count(), 3);
        assert!(read.primary_pulse_row);
        assert_eq!(read.field_type(), FieldType::DbDt);
    }
}
