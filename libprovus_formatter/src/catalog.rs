//! The catalog of waveform and sampling-scheme definitions known to a session.
//!
//! Definitions come from three places: presets derived from detected file parameters,
//! CSVs already present under `Provus_Options` in the root directory, and edits made
//! during the session. Each source lives in its own layer and lookups resolve through
//! them in order, so a session edit shadows a CSV on disk which shadows a preset.
use fxhash::FxHashMap;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::constants::{CATALOG_FILE_EXTENSION, OPTIONS_DIR, SAMPLING_DIR, WAVEFORM_DIR};
use super::error::{CatalogError, CsvFormatError};
use super::sampling::SamplingScheme;
use super::waveform::WaveformDefinition;

/// The source a catalog definition was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogLayer {
    Preset,
    Disk,
    Session,
}

// Lookup order: highest precedence first
const LOOKUP_ORDER: [CatalogLayer; 3] =
    [CatalogLayer::Session, CatalogLayer::Disk, CatalogLayer::Preset];

#[derive(Debug, Clone, Default)]
struct Layer {
    waveforms: FxHashMap<String, WaveformDefinition>,
    schemes: FxHashMap<String, SamplingScheme>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    presets: Layer,
    disk: Layer,
    session: Layer,
}

pub fn waveform_directory(root: &Path) -> PathBuf {
    root.join(OPTIONS_DIR).join(WAVEFORM_DIR)
}

pub fn sampling_directory(root: &Path) -> PathBuf {
    root.join(OPTIONS_DIR).join(SAMPLING_DIR)
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn layer(&self, layer: CatalogLayer) -> &Layer {
        match layer {
            CatalogLayer::Preset => &self.presets,
            CatalogLayer::Disk => &self.disk,
            CatalogLayer::Session => &self.session,
        }
    }

    /// Register (or replace) a waveform edited in this session. Returns the shadowed
    /// session definition, if any.
    pub fn register_waveform(&mut self, def: WaveformDefinition) -> Option<WaveformDefinition> {
        self.session.waveforms.insert(def.name().to_string(), def)
    }

    /// Register (or replace) a sampling scheme edited in this session.
    pub fn register_scheme(&mut self, scheme: SamplingScheme) -> Option<SamplingScheme> {
        self.session.schemes.insert(scheme.name().to_string(), scheme)
    }

    pub fn register_preset_waveform(&mut self, def: WaveformDefinition) {
        self.presets.waveforms.insert(def.name().to_string(), def);
    }

    pub fn register_preset_scheme(&mut self, scheme: SamplingScheme) {
        self.presets
            .schemes
            .insert(scheme.name().to_string(), scheme);
    }

    /// Register a waveform suggested for a data file and return the name it resolves
    /// under.
    ///
    /// A name that already resolves to a different preset or on-disk definition is not
    /// overwritten: the suggestion is registered as `<name>_<hash>` instead, the hash
    /// covering its CSV rendering. A session edit of the name is always reused.
    pub fn register_detected_waveform(
        &mut self,
        def: WaveformDefinition,
    ) -> Result<String, CsvFormatError> {
        let name = def.name().to_string();
        let bytes = def.to_csv_bytes()?;
        let existing = match self.waveform_origin(&name) {
            None => {
                self.register_preset_waveform(def);
                return Ok(name);
            }
            Some(CatalogLayer::Session) => return Ok(name),
            Some(_) => self
                .lookup_waveform(&name)
                .map(|d| d.to_csv_bytes())
                .transpose()?,
        };
        if existing.as_deref() == Some(bytes.as_slice()) {
            return Ok(name);
        }
        let unique = unique_name(&name, &bytes);
        log::warn!("Waveform {name} already exists with other parameters, detected one is named {unique}");
        if self.lookup_waveform(&unique).is_none() {
            self.register_preset_waveform(def.renamed(&unique));
        }
        Ok(unique)
    }

    /// Scheme counterpart of [`Catalog::register_detected_waveform`]
    pub fn register_detected_scheme(
        &mut self,
        scheme: SamplingScheme,
    ) -> Result<String, CsvFormatError> {
        let name = scheme.name().to_string();
        let bytes = scheme.to_csv_bytes()?;
        let existing = match self.scheme_origin(&name) {
            None => {
                self.register_preset_scheme(scheme);
                return Ok(name);
            }
            Some(CatalogLayer::Session) => return Ok(name),
            Some(_) => self
                .lookup_scheme(&name)
                .map(|s| s.to_csv_bytes())
                .transpose()?,
        };
        if existing.as_deref() == Some(bytes.as_slice()) {
            return Ok(name);
        }
        let unique = unique_name(&name, &bytes);
        log::warn!("Sampling scheme {name} already exists with other parameters, detected one is named {unique}");
        if self.lookup_scheme(&unique).is_none() {
            self.register_preset_scheme(scheme.renamed(&unique));
        }
        Ok(unique)
    }

    pub fn lookup_waveform(&self, name: &str) -> Option<&WaveformDefinition> {
        LOOKUP_ORDER
            .iter()
            .find_map(|layer| self.layer(*layer).waveforms.get(name))
    }

    pub fn lookup_scheme(&self, name: &str) -> Option<&SamplingScheme> {
        LOOKUP_ORDER
            .iter()
            .find_map(|layer| self.layer(*layer).schemes.get(name))
    }

    /// Which layer a waveform lookup would resolve from
    pub fn waveform_origin(&self, name: &str) -> Option<CatalogLayer> {
        LOOKUP_ORDER
            .iter()
            .copied()
            .find(|layer| self.layer(*layer).waveforms.contains_key(name))
    }

    /// Which layer a scheme lookup would resolve from
    pub fn scheme_origin(&self, name: &str) -> Option<CatalogLayer> {
        LOOKUP_ORDER
            .iter()
            .copied()
            .find(|layer| self.layer(*layer).schemes.contains_key(name))
    }

    /// All resolvable waveform names, sorted
    pub fn waveform_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = LOOKUP_ORDER
            .iter()
            .flat_map(|layer| self.layer(*layer).waveforms.keys())
            .collect();
        names.into_iter().cloned().collect()
    }

    /// All resolvable scheme names, sorted
    pub fn scheme_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = LOOKUP_ORDER
            .iter()
            .flat_map(|layer| self.layer(*layer).schemes.keys())
            .collect();
        names.into_iter().cloned().collect()
    }

    /// Replace the disk layer with the CSVs found under `root/Provus_Options`.
    ///
    /// A CSV that cannot be parsed is logged and skipped; it never fails the scan.
    /// Returns the number of definitions loaded.
    pub fn scan_directory(&mut self, root: &Path) -> Result<usize, CatalogError> {
        self.disk = Layer::default();

        for path in Self::get_csv_files(&waveform_directory(root))? {
            let stem = file_stem(&path);
            match File::open(&path)
                .map_err(CsvFormatError::from)
                .and_then(|f| WaveformDefinition::from_csv_reader(f, &stem))
            {
                Ok(def) => {
                    self.disk.waveforms.insert(def.name().to_string(), def);
                }
                Err(e) => log::warn!("Skipping waveform file {}: {e}", path.display()),
            }
        }

        for path in Self::get_csv_files(&sampling_directory(root))? {
            let stem = file_stem(&path);
            match File::open(&path)
                .map_err(CsvFormatError::from)
                .and_then(|f| SamplingScheme::from_csv_reader(f, &stem))
            {
                Ok(scheme) => {
                    self.disk
                        .schemes
                        .insert(scheme.name().to_string(), scheme);
                }
                Err(e) => log::warn!("Skipping sampling file {}: {e}", path.display()),
            }
        }

        let loaded = self.disk.waveforms.len() + self.disk.schemes.len();
        log::info!(
            "Loaded {} waveform(s) and {} sampling scheme(s) from {}",
            self.disk.waveforms.len(),
            self.disk.schemes.len(),
            root.display()
        );
        Ok(loaded)
    }

    /// Sorted list of the CSV files in a directory. A missing directory is empty.
    fn get_csv_files(parent_path: &Path) -> Result<Vec<PathBuf>, CatalogError> {
        let mut file_list: Vec<PathBuf> = Vec::new();
        if !parent_path.exists() {
            return Ok(file_list);
        }
        for item in parent_path.read_dir()? {
            let item_path = item?.path();
            let is_csv = item_path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(CATALOG_FILE_EXTENSION))
                .unwrap_or(false);
            if item_path.is_file() && is_csv {
                file_list.push(item_path);
            }
        }
        file_list.sort();
        Ok(file_list)
    }
}

fn unique_name(name: &str, csv_bytes: &[u8]) -> String {
    format!("{name}_{:08x}", fxhash::hash32(csv_bytes))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::WaveformPoint;

    fn waveform(name: &str, zero_time: f64) -> WaveformDefinition {
        WaveformDefinition::new(
            name,
            5.0,
            zero_time,
            vec![WaveformPoint::new(0.0, 0.0), WaveformPoint::new(0.5, 1.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_session_shadows_disk_shadows_preset() {
        let dir = tempfile::tempdir().unwrap();
        let wf_dir = waveform_directory(dir.path());
        std::fs::create_dir_all(&wf_dir).unwrap();
        std::fs::write(
            wf_dir.join("Square_5.000.csv"),
            waveform("Square_5.000", 0.1).to_csv_bytes().unwrap(),
        )
        .unwrap();

        let mut catalog = Catalog::new();
        catalog.register_preset_waveform(waveform("Square_5.000", 0.0));
        assert_eq!(catalog.waveform_origin("Square_5.000"), Some(CatalogLayer::Preset));

        assert_eq!(catalog.scan_directory(dir.path()).unwrap(), 1);
        assert_eq!(catalog.waveform_origin("Square_5.000"), Some(CatalogLayer::Disk));
        assert_eq!(catalog.lookup_waveform("Square_5.000").unwrap().zero_time(), 0.1);

        catalog.register_waveform(waveform("Square_5.000", 0.3));
        assert_eq!(catalog.waveform_origin("Square_5.000"), Some(CatalogLayer::Session));
        assert_eq!(catalog.lookup_waveform("Square_5.000").unwrap().zero_time(), 0.3);
        assert_eq!(catalog.waveform_names(), vec![String::from("Square_5.000")]);
    }

    #[test]
    fn test_register_is_last_write_wins() {
        let mut catalog = Catalog::new();
        assert!(catalog.register_waveform(waveform("a", 0.0)).is_none());
        let previous = catalog.register_waveform(waveform("a", 0.2));
        assert_eq!(previous.unwrap().zero_time(), 0.0);
        assert_eq!(catalog.lookup_waveform("a").unwrap().zero_time(), 0.2);
        assert!(catalog.lookup_waveform("b").is_none());
    }

    #[test]
    fn test_detected_name_clash_gets_a_hashed_name() {
        let mut catalog = Catalog::new();
        assert_eq!(
            catalog.register_detected_waveform(waveform("Square_5.200", 0.0)).unwrap(),
            "Square_5.200"
        );
        // Same parameters share the name
        assert_eq!(
            catalog.register_detected_waveform(waveform("Square_5.200", 0.0)).unwrap(),
            "Square_5.200"
        );

        let other = catalog
            .register_detected_waveform(waveform("Square_5.200", 0.2))
            .unwrap();
        assert_ne!(other, "Square_5.200");
        assert!(other.starts_with("Square_5.200_"));
        assert_eq!(catalog.lookup_waveform("Square_5.200").unwrap().zero_time(), 0.0);
        assert_eq!(catalog.lookup_waveform(&other).unwrap().zero_time(), 0.2);
        assert_eq!(catalog.lookup_waveform(&other).unwrap().name(), other);
        assert_eq!(
            catalog.register_detected_waveform(waveform("Square_5.200", 0.2)).unwrap(),
            other
        );

        // A session edit is reused as is
        catalog.register_waveform(waveform("Edited", 0.1));
        assert_eq!(
            catalog.register_detected_waveform(waveform("Edited", 0.3)).unwrap(),
            "Edited"
        );
        assert_eq!(catalog.lookup_waveform("Edited").unwrap().zero_time(), 0.1);
    }

    #[test]
    fn test_disk_definition_is_not_shadowed_silently() {
        let dir = tempfile::tempdir().unwrap();
        let wf_dir = waveform_directory(dir.path());
        std::fs::create_dir_all(&wf_dir).unwrap();
        std::fs::write(
            wf_dir.join("Square_5.000.csv"),
            waveform("Square_5.000", 0.1).to_csv_bytes().unwrap(),
        )
        .unwrap();
        let mut catalog = Catalog::new();
        catalog.scan_directory(dir.path()).unwrap();

        assert_eq!(
            catalog.register_detected_waveform(waveform("Square_5.000", 0.1)).unwrap(),
            "Square_5.000"
        );
        let other = catalog
            .register_detected_waveform(waveform("Square_5.000", 0.0))
            .unwrap();
        assert_ne!(other, "Square_5.000");
        assert_eq!(catalog.waveform_origin(&other), Some(CatalogLayer::Preset));
    }

    #[test]
    fn test_scan_skips_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let sc_dir = sampling_directory(dir.path());
        std::fs::create_dir_all(&sc_dir).unwrap();
        std::fs::write(sc_dir.join("broken.csv"), "Sampling Name,broken\nnonsense\n").unwrap();
        let mut catalog = Catalog::new();
        assert_eq!(catalog.scan_directory(dir.path()).unwrap(), 0);
        assert!(catalog.lookup_scheme("broken").is_none());
    }
}
