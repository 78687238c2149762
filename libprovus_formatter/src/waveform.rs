use csv::{ReaderBuilder, Terminator, Trim, WriterBuilder};
use std::io::Read;

use super::constants::{
    BASE_FREQUENCY_ROW, BASE_FREQUENCY_ROW_ALT, POINTS_HEADER, WAVEFORM_NAME_ROW, ZERO_TIME_ROW,
};
use super::error::{CsvFormatError, WaveformError};

/// A single (time, current) vertex of a transmitter waveform. Time is in scaled units
/// (fraction of a full period), current is normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformPoint {
    pub time: f64,
    pub current: f64,
}

impl WaveformPoint {
    pub fn new(time: f64, current: f64) -> Self {
        Self { time, current }
    }
}

/// A named transmitter waveform as Provus reads it from `Provus_Options/Waveforms`.
///
/// The point sequence is always strictly increasing in time and starts at or after zero.
/// Construction goes through [`WaveformDefinition::new`], which enforces this.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformDefinition {
    name: String,
    base_frequency: f64,
    zero_time: f64,
    points: Vec<WaveformPoint>,
}

impl WaveformDefinition {
    pub fn new(
        name: &str,
        base_frequency: f64,
        zero_time: f64,
        points: Vec<WaveformPoint>,
    ) -> Result<Self, WaveformError> {
        let def = Self {
            name: name.to_string(),
            base_frequency,
            zero_time,
            points,
        };
        def.validate()?;
        Ok(def)
    }

    fn validate(&self) -> Result<(), WaveformError> {
        if !self.base_frequency.is_finite() || self.base_frequency <= 0.0 {
            return Err(WaveformError::BadFrequency {
                name: self.name.clone(),
                frequency: self.base_frequency,
            });
        }
        if self.points.is_empty() {
            return Err(WaveformError::NoPoints(self.name.clone()));
        }
        for (index, point) in self.points.iter().enumerate() {
            if !point.time.is_finite() || !point.current.is_finite() {
                return Err(WaveformError::NonFinite {
                    name: self.name.clone(),
                    index,
                });
            }
        }
        if self.points[0].time < 0.0 {
            return Err(WaveformError::NegativeStart(self.name.clone()));
        }
        for (index, pair) in self.points.windows(2).enumerate() {
            if pair[1].time <= pair[0].time {
                return Err(WaveformError::NotIncreasing {
                    name: self.name.clone(),
                    index: index + 1,
                });
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_frequency(&self) -> f64 {
        self.base_frequency
    }

    pub fn zero_time(&self) -> f64 {
        self.zero_time
    }

    pub fn points(&self) -> &[WaveformPoint] {
        &self.points
    }

    /// Produce an edited copy with a new zero time and point set. Name and frequency are fixed.
    pub fn edited(
        &self,
        zero_time: f64,
        points: Vec<WaveformPoint>,
    ) -> Result<Self, WaveformError> {
        Self::new(&self.name, self.base_frequency, zero_time, points)
    }

    /// Copy of the definition under another name
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    /// Render the Provus waveform CSV. Output is fully determined by the definition.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = WriterBuilder::new()
            .flexible(true)
            .terminator(Terminator::CRLF)
            .from_writer(vec![]);
        writer.write_record([WAVEFORM_NAME_ROW, self.name.as_str()])?;
        writer.write_record([
            BASE_FREQUENCY_ROW.to_string(),
            format!("{:.3}", self.base_frequency),
        ])?;
        writer.write_record([ZERO_TIME_ROW.to_string(), format!("{:.4}", self.zero_time)])?;
        writer.write_record(POINTS_HEADER)?;
        for point in self.points.iter() {
            writer.write_record([
                format!("{:.6}", point.time),
                format!("{:.6}", point.current),
            ])?;
        }
        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }

    /// Parse a waveform CSV. `fallback_name` is used when the file has no name row.
    ///
    /// Unknown key rows before the point header (for example `Time Units`) are ignored.
    pub fn from_csv_reader<R: Read>(reader: R, fallback_name: &str) -> Result<Self, CsvFormatError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut name: Option<String> = None;
        let mut base_frequency: Option<f64> = None;
        let mut zero_time: Option<f64> = None;
        let mut points: Vec<WaveformPoint> = Vec::new();
        let mut in_points = false;

        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            let key = record.get(0).unwrap_or("");
            if in_points {
                if record.iter().all(|field| field.is_empty()) {
                    continue;
                }
                if record.len() < 2 {
                    return Err(CsvFormatError::BadRow {
                        row,
                        line: record.iter().collect::<Vec<_>>().join(","),
                    });
                }
                points.push(WaveformPoint::new(record[0].parse()?, record[1].parse()?));
                continue;
            }
            match key {
                WAVEFORM_NAME_ROW => name = record.get(1).map(str::to_string),
                BASE_FREQUENCY_ROW | BASE_FREQUENCY_ROW_ALT => {
                    base_frequency = Some(record.get(1).unwrap_or("").parse()?)
                }
                ZERO_TIME_ROW => zero_time = Some(record.get(1).unwrap_or("").parse()?),
                k if k == POINTS_HEADER[0] => in_points = true,
                _ => (),
            }
        }

        let base_frequency = base_frequency.ok_or(CsvFormatError::MissingRow(BASE_FREQUENCY_ROW))?;
        let zero_time = zero_time.ok_or(CsvFormatError::MissingRow(ZERO_TIME_ROW))?;
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| fallback_name.to_string());
        Ok(Self::new(&name, base_frequency, zero_time, points)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> WaveformDefinition {
        WaveformDefinition::new(
            "Square_5.200",
            5.2,
            0.0,
            vec![
                WaveformPoint::new(0.0, -1.0),
                WaveformPoint::new(0.0001, 1.0),
                WaveformPoint::new(0.5, 1.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_unordered_points() {
        let result = WaveformDefinition::new(
            "bad",
            5.0,
            0.0,
            vec![WaveformPoint::new(0.2, 1.0), WaveformPoint::new(0.2, 0.0)],
        );
        assert_eq!(
            result,
            Err(WaveformError::NotIncreasing {
                name: String::from("bad"),
                index: 1
            })
        );
    }

    #[test]
    fn test_rejects_negative_start() {
        let result = WaveformDefinition::new("bad", 5.0, 0.0, vec![WaveformPoint::new(-0.1, 1.0)]);
        assert!(matches!(result, Err(WaveformError::NegativeStart(_))));
    }

    #[test]
    fn test_csv_layout() {
        let text = String::from_utf8(square().to_csv_bytes().unwrap()).unwrap();
        let expected = "Waveform Name,Square_5.200\r\n\
                        BaseFrequency,5.200\r\n\
                        Waveform Zero Time,0.0000\r\n\
                        Scaled Time,Current\r\n\
                        0.000000,-1.000000\r\n\
                        0.000100,1.000000\r\n\
                        0.500000,1.000000\r\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_reads_editor_style_csv() {
        let text = "Waveform Name,crone_15hz\nTime Units,scaled\nBase Frequency,15.000\n\
                    Waveform Zero Time,0.250000\nScaled Time,Current\n0.0,0.0\n0.25,1.0\n\n0.5,0.0\n";
        let def = WaveformDefinition::from_csv_reader(text.as_bytes(), "unused").unwrap();
        assert_eq!(def.name(), "crone_15hz");
        assert_eq!(def.base_frequency(), 15.0);
        assert_eq!(def.zero_time(), 0.25);
        assert_eq!(def.points().len(), 3);
    }

    #[test]
    fn test_missing_frequency_is_an_error() {
        let text = "Waveform Name,x\nWaveform Zero Time,0\nScaled Time,Current\n0,1\n";
        let result = WaveformDefinition::from_csv_reader(text.as_bytes(), "x");
        assert!(matches!(result, Err(CsvFormatError::MissingRow(_))));
    }
}
