use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::catalog::Catalog;
use super::error::AssignmentError;
use super::extractor::Extraction;

/// The Provus reader profile for a data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataStyle {
    #[serde(rename = "DataFileStyleBoreholeUTEM")]
    BoreholeUtem,
    #[serde(rename = "DataFileStyleBoreholeSJV")]
    BoreholeSjv,
    #[serde(rename = "DataFileStyleCrone")]
    Crone,
    #[serde(rename = "DataFileStyleSEM")]
    Sem,
    #[serde(rename = "DataFileStyleDigiAtlantis")]
    DigiAtlantis,
}

impl DataStyle {
    pub const ALL: [DataStyle; 5] = [
        Self::BoreholeUtem,
        Self::BoreholeSjv,
        Self::Crone,
        Self::Sem,
        Self::DigiAtlantis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BoreholeUtem => "DataFileStyleBoreholeUTEM",
            Self::BoreholeSjv => "DataFileStyleBoreholeSJV",
            Self::Crone => "DataFileStyleCrone",
            Self::Sem => "DataFileStyleSEM",
            Self::DigiAtlantis => "DataFileStyleDigiAtlantis",
        }
    }
}

impl Display for DataStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DataStyle {
    type Err = String;
    /// Accepts the full Provus name or the short suffix, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|style| {
                let full = style.as_str();
                full.eq_ignore_ascii_case(wanted)
                    || full["DataFileStyle".len()..].eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("Unknown data style {s}"))
    }
}

/// A detected value plus an optional user override.
///
/// The override, once set, wins even if it is an explicit `None`. The detected value
/// is kept so a reset can restore it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<T> {
    detected: Option<T>,
    user_override: Option<Option<T>>,
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Self {
            detected: None,
            user_override: None,
        }
    }
}

impl<T> Selection<T> {
    pub fn detected(value: Option<T>) -> Self {
        Self {
            detected: value,
            user_override: None,
        }
    }

    pub fn effective(&self) -> Option<&T> {
        match &self.user_override {
            Some(value) => value.as_ref(),
            None => self.detected.as_ref(),
        }
    }

    pub fn detected_value(&self) -> Option<&T> {
        self.detected.as_ref()
    }

    pub fn is_overridden(&self) -> bool {
        self.user_override.is_some()
    }

    pub fn set(&mut self, value: Option<T>) {
        self.user_override = Some(value);
    }

    pub fn reset(&mut self) {
        self.user_override = None;
    }

    /// Replace the detected value, keeping any override
    pub fn redetect(&mut self, value: Option<T>) {
        self.detected = value;
    }
}

/// Names and style suggested for a file when it is added
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedAssignment {
    pub waveform: Option<String>,
    pub sampling: Option<String>,
    pub data_style: Option<DataStyle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentEntry {
    pub path: PathBuf,
    pub parameters: Extraction,
    pub waveform: Selection<String>,
    pub sampling: Selection<String>,
    pub data_style: Selection<DataStyle>,
}

impl AssignmentEntry {
    pub fn effective_waveform(&self) -> Option<&str> {
        self.waveform.effective().map(String::as_str)
    }

    pub fn effective_sampling(&self) -> Option<&str> {
        self.sampling.effective().map(String::as_str)
    }

    pub fn effective_data_style(&self) -> Option<DataStyle> {
        self.data_style.effective().copied()
    }

    /// Both a waveform and a sampling scheme are selected
    pub fn is_complete(&self) -> bool {
        self.effective_waveform().is_some() && self.effective_sampling().is_some()
    }
}

/// Per-file assignments, kept in path order
#[derive(Debug, Clone, Default)]
pub struct AssignmentTable {
    entries: BTreeMap<PathBuf, AssignmentEntry>,
}

impl AssignmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, or refresh the detected values of one already present. User overrides
    /// on an existing entry survive.
    pub fn insert(&mut self, parameters: Extraction, detected: DetectedAssignment) {
        let path = parameters.path().to_path_buf();
        match self.entries.get_mut(&path) {
            Some(entry) => {
                entry.parameters = parameters;
                entry.waveform.redetect(detected.waveform);
                entry.sampling.redetect(detected.sampling);
                entry.data_style.redetect(detected.data_style);
            }
            None => {
                self.entries.insert(
                    path.clone(),
                    AssignmentEntry {
                        path,
                        parameters,
                        waveform: Selection::detected(detected.waveform),
                        sampling: Selection::detected(detected.sampling),
                        data_style: Selection::detected(detected.data_style),
                    },
                );
            }
        }
    }

    /// Forget a file. Nothing on disk is touched.
    pub fn remove(&mut self, path: &Path) -> Option<AssignmentEntry> {
        self.entries.remove(path)
    }

    pub fn get_assignment(&self, path: &Path) -> Option<&AssignmentEntry> {
        self.entries.get(path)
    }

    pub fn entries(&self) -> impl Iterator<Item = &AssignmentEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Override the waveform and sampling scheme of a file. `None` explicitly unsets.
    ///
    /// Both names are checked against the catalog before anything changes; on error the
    /// entry is left as it was.
    pub fn set_assignment(
        &mut self,
        path: &Path,
        waveform: Option<&str>,
        sampling: Option<&str>,
        catalog: &Catalog,
    ) -> Result<(), AssignmentError> {
        let entry = self
            .entries
            .get_mut(path)
            .ok_or_else(|| AssignmentError::UnknownFile(path.to_path_buf()))?;

        if let Some(name) = waveform {
            if catalog.lookup_waveform(name).is_none() {
                return Err(AssignmentError::InvalidAssignment {
                    kind: "waveform",
                    name: name.to_string(),
                });
            }
        }
        if let Some(name) = sampling {
            if catalog.lookup_scheme(name).is_none() {
                return Err(AssignmentError::InvalidAssignment {
                    kind: "sampling scheme",
                    name: name.to_string(),
                });
            }
        }

        entry.waveform.set(waveform.map(str::to_string));
        entry.sampling.set(sampling.map(str::to_string));
        Ok(())
    }

    pub fn set_data_style(
        &mut self,
        path: &Path,
        data_style: Option<DataStyle>,
    ) -> Result<(), AssignmentError> {
        let entry = self
            .entries
            .get_mut(path)
            .ok_or_else(|| AssignmentError::UnknownFile(path.to_path_buf()))?;
        entry.data_style.set(data_style);
        Ok(())
    }

    /// Drop every override on a file, going back to the detected values
    pub fn reset(&mut self, path: &Path) -> Result<(), AssignmentError> {
        let entry = self
            .entries
            .get_mut(path)
            .ok_or_else(|| AssignmentError::UnknownFile(path.to_path_buf()))?;
        entry.waveform.reset();
        entry.sampling.reset();
        entry.data_style.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::{WaveformDefinition, WaveformPoint};

    fn unresolved(path: &str) -> Extraction {
        Extraction::Unresolved {
            path: PathBuf::from(path),
            reason: String::from("test"),
        }
    }

    fn catalog_with(name: &str) -> Catalog {
        let mut catalog = Catalog::new();
        catalog.register_waveform(
            WaveformDefinition::new(name, 5.0, 0.0, vec![WaveformPoint::new(0.0, 1.0)]).unwrap(),
        );
        catalog
    }

    #[test]
    fn test_selection_override_and_reset() {
        let mut sel = Selection::detected(Some(1));
        assert_eq!(sel.effective(), Some(&1));
        sel.set(None);
        assert_eq!(sel.effective(), None);
        assert!(sel.is_overridden());
        sel.redetect(Some(2));
        assert_eq!(sel.effective(), None);
        sel.reset();
        assert_eq!(sel.effective(), Some(&2));
    }

    #[test]
    fn test_invalid_assignment_leaves_entry() {
        let mut table = AssignmentTable::new();
        table.insert(unresolved("a.tem"), DetectedAssignment::default());
        let catalog = catalog_with("Square_5.000");
        let before = table.get_assignment(Path::new("a.tem")).cloned();

        let result = table.set_assignment(Path::new("a.tem"), Some("Nope"), None, &catalog);
        assert_eq!(
            result,
            Err(AssignmentError::InvalidAssignment {
                kind: "waveform",
                name: String::from("Nope")
            })
        );
        assert_eq!(table.get_assignment(Path::new("a.tem")).cloned(), before);

        table
            .set_assignment(Path::new("a.tem"), Some("Square_5.000"), None, &catalog)
            .unwrap();
        let entry = table.get_assignment(Path::new("a.tem")).unwrap();
        assert_eq!(entry.effective_waveform(), Some("Square_5.000"));
        assert!(!entry.is_complete());
    }

    #[test]
    fn test_unknown_file() {
        let mut table = AssignmentTable::new();
        assert_eq!(
            table.set_data_style(Path::new("x.tem"), Some(DataStyle::Sem)),
            Err(AssignmentError::UnknownFile(PathBuf::from("x.tem")))
        );
    }

    #[test]
    fn test_reinsert_keeps_overrides() {
        let mut table = AssignmentTable::new();
        table.insert(unresolved("a.tem"), DetectedAssignment::default());
        table
            .set_data_style(Path::new("a.tem"), Some(DataStyle::Sem))
            .unwrap();
        table.insert(
            unresolved("a.tem"),
            DetectedAssignment {
                data_style: Some(DataStyle::Crone),
                ..Default::default()
            },
        );
        let entry = table.get_assignment(Path::new("a.tem")).unwrap();
        assert_eq!(entry.effective_data_style(), Some(DataStyle::Sem));
        table.reset(Path::new("a.tem")).unwrap();
        let entry = table.get_assignment(Path::new("a.tem")).unwrap();
        assert_eq!(entry.effective_data_style(), Some(DataStyle::Crone));
    }

    #[test]
    fn test_data_style_names() {
        assert_eq!(
            "BoreholeUTEM".parse::<DataStyle>().unwrap(),
            DataStyle::BoreholeUtem
        );
        assert_eq!(
            "DataFileStyleCrone".parse::<DataStyle>().unwrap(),
            DataStyle::Crone
        );
        assert!("Nope".parse::<DataStyle>().is_err());
        assert_eq!(DataStyle::Sem.to_string(), "DataFileStyleSEM");
    }
}
