use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::assignment::DataStyle;
use super::constants::{DEFAULT_PROJECT_NAME, OPTIONS_DIR};
use super::error::ConfigError;
use super::extractor::DataFileKind;

/// A per-file assignment given in the configuration. Unset fields keep the detected value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileOverride {
    pub file: PathBuf,
    #[serde(default)]
    pub waveform: Option<String>,
    #[serde(default)]
    pub sampling: Option<String>,
    #[serde(default)]
    pub data_style: Option<DataStyle>,
}

/// Structure representing the application configuration. Contains pathing and assignment information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub root_path: PathBuf,
    /// Data files relative to the root. Empty means scan the root for TEM/PEM files.
    #[serde(default)]
    pub data_files: Vec<PathBuf>,
    #[serde(default)]
    pub recursive: bool,
    pub n_threads: i32,
    pub project_name: String,
    #[serde(default)]
    pub mcg_files: Vec<PathBuf>,
    #[serde(default)]
    pub assignments: Vec<FileOverride>,
}

impl Default for Config {
    /// Generate a new Config object. All fields will be empty/invalid
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("None"),
            data_files: Vec::new(),
            recursive: false,
            n_threads: 1,
            project_name: String::from(DEFAULT_PROJECT_NAME),
            mcg_files: Vec::new(),
            assignments: vec![FileOverride {
                file: PathBuf::from("None"),
                ..Default::default()
            }],
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn does_root_exist(&self) -> bool {
        self.root_path.is_dir()
    }

    /// The data files to work on, relative to the root.
    ///
    /// Listed files are returned as given. Otherwise the root is scanned for TEM and PEM
    /// files (recursively if requested), skipping the `Provus_Options` tree.
    pub fn get_data_files(&self) -> Result<Vec<PathBuf>, ConfigError> {
        if !self.does_root_exist() {
            return Err(ConfigError::BadFilePath(self.root_path.clone()));
        }
        if !self.data_files.is_empty() {
            return Ok(self.data_files.clone());
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root_path)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != OPTIONS_DIR);
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && DataFileKind::from_path(entry.path()).is_some() {
                let relative = entry
                    .path()
                    .strip_prefix(&self.root_path)
                    .unwrap_or(entry.path());
                files.push(relative.to_path_buf());
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let config: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.project_name, DEFAULT_PROJECT_NAME);
        assert!(config.is_n_threads_valid());
    }

    #[test]
    fn test_minimal_yaml_with_override() {
        let yaml = "root_path: /data\nn_threads: 2\nproject_name: Survey\nassignments:\n  - file: Line1.tem\n    waveform: Square_5.200\n    data_style: DataFileStyleCrone\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.data_files.is_empty());
        assert_eq!(config.assignments[0].data_style, Some(DataStyle::Crone));
        assert_eq!(config.assignments[0].sampling, None);
    }

    #[test]
    fn test_scan_finds_data_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::create_dir_all(dir.path().join(OPTIONS_DIR)).unwrap();
        for name in ["b.TEM", "a.pem", "notes.txt", "sub/c.tem", "Provus_Options/d.tem"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let mut config = Config {
            root_path: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert_eq!(
            config.get_data_files().unwrap(),
            vec![PathBuf::from("a.pem"), PathBuf::from("b.TEM")]
        );
        config.recursive = true;
        assert_eq!(config.get_data_files().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_root() {
        let config = Config::default();
        assert!(matches!(
            config.get_data_files(),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}
