//! The Provus project file (`*.ppf`).
//!
//! It is an INI-like file that Provus also edits, so updates are merges: only the
//! records of files in the session are replaced or appended, and every other line is
//! written back exactly as it was read.
use csv::{ReaderBuilder, Terminator, WriterBuilder};
use std::path::{Path, PathBuf};

use super::assignment::{AssignmentEntry, AssignmentTable};
use super::atomic_file::write_atomically;
use super::constants::{
    ASSIGNMENTS_SECTION, DATA_FILES_SECTION, PROJECT_FILE_EXTENSION, PROJECT_FILE_NAME,
    SETTINGS_SECTION,
};
use super::error::ManifestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestStatus {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestUpdate {
    pub path: PathBuf,
    pub status: ManifestStatus,
    /// Number of session files recorded in the manifest
    pub records: usize,
}

/// The project file in `root`: the first existing `*.ppf`, otherwise `project.ppf`
pub fn manifest_path(root: &Path) -> Result<PathBuf, ManifestError> {
    let mut existing: Vec<PathBuf> = Vec::new();
    for item in root.read_dir()? {
        let path = item?.path();
        let is_ppf = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(PROJECT_FILE_EXTENSION))
            .unwrap_or(false);
        if is_ppf && path.is_file() {
            existing.push(path);
        }
    }
    existing.sort();
    Ok(existing
        .into_iter()
        .next()
        .unwrap_or_else(|| root.join(PROJECT_FILE_NAME)))
}

/// Create or merge the project manifest for every fully assigned file in the table.
///
/// Nothing is written if the merge would not change the file.
pub fn update_manifest(
    root: &Path,
    table: &AssignmentTable,
    project_name: &str,
) -> Result<ManifestUpdate, ManifestError> {
    let path = manifest_path(root)?;
    let (original, mut document) = if path.exists() {
        let bytes = std::fs::read(&path)?;
        let text = String::from_utf8(bytes).map_err(|_| ManifestError::IncompatibleFormat {
            path: path.clone(),
            reason: String::from("file is not valid UTF-8"),
        })?;
        let document = if text.trim().is_empty() {
            ManifestDocument::new_project(project_name)
        } else {
            ManifestDocument::parse(&text).map_err(|reason| ManifestError::IncompatibleFormat {
                path: path.clone(),
                reason,
            })?
        };
        (Some(text), document)
    } else {
        (None, ManifestDocument::new_project(project_name))
    };

    let mut data_files: Vec<(String, String)> = Vec::new();
    let mut assignments: Vec<(String, String)> = Vec::new();
    let mut unstyled: Vec<String> = Vec::new();
    for entry in table.entries() {
        let (Some(waveform), Some(sampling)) =
            (entry.effective_waveform(), entry.effective_sampling())
        else {
            continue;
        };
        let relative = relative_path(root, entry);
        match entry.effective_data_style() {
            Some(style) => data_files.push((
                relative.clone(),
                format_record(&[relative.as_str(), style.as_str()])?,
            )),
            None => unstyled.push(relative.clone()),
        }
        assignments.push((
            relative.clone(),
            format_record(&[relative.as_str(), waveform, sampling])?,
        ));
    }

    document.ensure_section(DATA_FILES_SECTION);
    document.ensure_section(ASSIGNMENTS_SECTION);
    document.merge_records(DATA_FILES_SECTION, &data_files);
    document.merge_records(ASSIGNMENTS_SECTION, &assignments);
    for relative in unstyled.iter() {
        if document.remove_record(DATA_FILES_SECTION, relative) {
            log::warn!("{relative} no longer has a data style; removed it from the data file list");
        } else {
            log::warn!("{relative} has no data style and is left out of the data file list");
        }
    }
    let rendered = document.render();

    let status = match original {
        Some(text) if text == rendered => ManifestStatus::Unchanged,
        Some(_) => ManifestStatus::Updated,
        None => ManifestStatus::Created,
    };
    if status != ManifestStatus::Unchanged {
        write_atomically(&path, rendered.as_bytes()).map_err(|e| {
            ManifestError::ManifestWriteError {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;
    }
    log::info!(
        "Project file {} {:?} with {} assignment(s)",
        path.display(),
        status,
        assignments.len()
    );
    Ok(ManifestUpdate {
        path,
        status,
        records: assignments.len(),
    })
}

fn relative_path(root: &Path, entry: &AssignmentEntry) -> String {
    entry
        .path
        .strip_prefix(root)
        .unwrap_or(&entry.path)
        .to_string_lossy()
        .to_string()
}

/// Number of comma separated fields a record in a managed section carries
fn record_fields(section: &str) -> Option<usize> {
    match section {
        DATA_FILES_SECTION => Some(2),
        ASSIGNMENTS_SECTION => Some(3),
        _ => None,
    }
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(';') || trimmed.starts_with('#')
}

/// One record line. Fields holding a comma or a quote are quoted.
fn format_record(fields: &[&str]) -> Result<String, csv::Error> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(vec![]);
    writer.write_record(fields)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).trim_end_matches('\n').to_string())
}

/// The file path a record refers to.
///
/// An unquoted path may itself contain commas, so any fields beyond the expected count
/// are taken as part of the path.
fn record_key(line: &str, fields: usize) -> Option<String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let record = reader.records().next()?.ok()?;
    if record.len() < fields || record.iter().any(|field| field.trim().is_empty()) {
        return None;
    }
    let path_fields = record.len() - fields + 1;
    Some(record.iter().take(path_fields).collect::<Vec<&str>>().join(","))
}

#[derive(Debug, Clone)]
struct Section {
    header: String,
    name: String,
    lines: Vec<String>,
}

#[derive(Debug, Clone)]
struct ManifestDocument {
    sections: Vec<Section>,
    line_ending: &'static str,
    trailing_newline: bool,
    leading_blank_lines: usize,
}

impl ManifestDocument {
    fn new_project(project_name: &str) -> Self {
        Self {
            sections: vec![Section {
                header: format!("[{SETTINGS_SECTION}]"),
                name: SETTINGS_SECTION.to_string(),
                lines: vec![format!("Project Name=\"{project_name}\"")],
            }],
            line_ending: if cfg!(windows) { "\r\n" } else { "\n" },
            trailing_newline: true,
            leading_blank_lines: 0,
        }
    }

    fn parse(text: &str) -> Result<Self, String> {
        let line_ending = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);

        let mut sections: Vec<Section> = Vec::new();
        let mut leading_blank_lines = 0;
        for (idx, raw) in body.split('\n').enumerate() {
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            let trimmed = line.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                sections.push(Section {
                    header: line.to_string(),
                    name: trimmed[1..trimmed.len() - 1].trim().to_string(),
                    lines: Vec::new(),
                });
                continue;
            }
            let Some(section) = sections.last_mut() else {
                if trimmed.is_empty() {
                    leading_blank_lines += 1;
                    continue;
                }
                return Err(format!("line {} comes before the first section", idx + 1));
            };
            if let Some(fields) = record_fields(&section.name) {
                if !trimmed.is_empty() && !is_comment(line) && record_key(line, fields).is_none() {
                    return Err(format!(
                        "line {} of [{}] is not a valid record",
                        idx + 1,
                        section.name
                    ));
                }
            }
            section.lines.push(line.to_string());
        }

        Ok(Self {
            sections,
            line_ending,
            trailing_newline,
            leading_blank_lines,
        })
    }

    /// Append an empty section if it is missing, separated by a blank line
    fn ensure_section(&mut self, name: &str) {
        if self.sections.iter().any(|s| s.name == name) {
            return;
        }
        if let Some(last) = self.sections.last_mut() {
            if last.lines.last().map(|l| !l.trim().is_empty()).unwrap_or(true) {
                last.lines.push(String::new());
            }
        }
        self.sections.push(Section {
            header: format!("[{name}]"),
            name: name.to_string(),
            lines: Vec::new(),
        });
    }

    /// Replace records in place by key, appending the new ones after the last record
    fn merge_records(&mut self, name: &str, records: &[(String, String)]) {
        let Some(fields) = record_fields(name) else {
            return;
        };
        let Some(section) = self.sections.iter_mut().find(|s| s.name == name) else {
            return;
        };
        for (key, record) in records {
            let existing = section.lines.iter().position(|line| {
                !is_comment(line) && record_key(line, fields).as_deref() == Some(key.as_str())
            });
            match existing {
                Some(idx) => section.lines[idx] = record.clone(),
                None => {
                    let insert_at = section
                        .lines
                        .iter()
                        .rposition(|line| !line.trim().is_empty())
                        .map(|idx| idx + 1)
                        .unwrap_or(0);
                    section.lines.insert(insert_at, record.clone());
                }
            }
        }
    }

    /// Drop the record for `key` from a managed section. Returns whether one was found.
    fn remove_record(&mut self, name: &str, key: &str) -> bool {
        let Some(fields) = record_fields(name) else {
            return false;
        };
        let Some(section) = self.sections.iter_mut().find(|s| s.name == name) else {
            return false;
        };
        let before = section.lines.len();
        section
            .lines
            .retain(|line| is_comment(line) || record_key(line, fields).as_deref() != Some(key));
        section.lines.len() != before
    }

    fn render(&self) -> String {
        let mut lines: Vec<&str> = vec![""; self.leading_blank_lines];
        for section in self.sections.iter() {
            lines.push(&section.header);
            lines.extend(section.lines.iter().map(String::as_str));
        }
        let mut rendered = lines.join(self.line_ending);
        if self.trailing_newline {
            rendered.push_str(self.line_ending);
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render_is_verbatim() {
        let text = "\r\n[Project Settings]\r\nProject Name=\"Mine\"\r\n\r\n[Provus Layout]\r\nzoom = 3\r\n\r\n[Project Data Files]\r\na.tem,DataFileStyleCrone\r\n";
        let document = ManifestDocument::parse(text).unwrap();
        assert_eq!(document.render(), text);
    }

    #[test]
    fn test_merge_replaces_in_place_and_appends() {
        let text = "[Project Settings]\nProject Name=\"x\"\n\n[Data File Assignments]\na.tem,w1,s1\nother.tem,w9,s9\n\n[Tail]\nkeep\n";
        let mut document = ManifestDocument::parse(text).unwrap();
        document.merge_records(
            ASSIGNMENTS_SECTION,
            &[
                (String::from("a.tem"), String::from("a.tem,w2,s2")),
                (
                    String::from("b, c.tem"),
                    format_record(&["b, c.tem", "w3", "s3"]).unwrap(),
                ),
            ],
        );
        assert_eq!(
            document.render(),
            "[Project Settings]\nProject Name=\"x\"\n\n[Data File Assignments]\na.tem,w2,s2\nother.tem,w9,s9\n\"b, c.tem\",w3,s3\n\n[Tail]\nkeep\n"
        );
    }

    #[test]
    fn test_record_keys() {
        assert_eq!(record_key("a.tem,w,s", 3).as_deref(), Some("a.tem"));
        assert_eq!(record_key("a.tem,\"loop,a\",s", 3).as_deref(), Some("a.tem"));
        assert_eq!(record_key("\"b, c.tem\",w,s", 3).as_deref(), Some("b, c.tem"));
        // Written by hand without quotes
        assert_eq!(record_key("b, c.tem,w,s", 3).as_deref(), Some("b, c.tem"));
        assert_eq!(record_key("a.tem,,s", 3), None);
        assert_eq!(record_key("a.tem,w", 3), None);
        assert_eq!(
            format_record(&["a.tem", "loop,a", "s"]).unwrap(),
            "a.tem,\"loop,a\",s"
        );
    }

    #[test]
    fn test_remove_record() {
        let text = "[Project Data Files]\n; keep\na.tem,DataFileStyleCrone\nb.tem,DataFileStyleCrone\n";
        let mut document = ManifestDocument::parse(text).unwrap();
        assert!(document.remove_record(DATA_FILES_SECTION, "a.tem"));
        assert!(!document.remove_record(DATA_FILES_SECTION, "a.tem"));
        assert_eq!(
            document.render(),
            "[Project Data Files]\n; keep\nb.tem,DataFileStyleCrone\n"
        );
    }

    #[test]
    fn test_incompatible_files_are_rejected() {
        assert!(ManifestDocument::parse("junk\n[Project Settings]\n").is_err());
        assert!(ManifestDocument::parse("[Data File Assignments]\nonly_one_field\n").is_err());
        assert!(ManifestDocument::parse("[Data File Assignments]\n; comment\n\n").is_ok());
    }

    #[test]
    fn test_new_project_layout() {
        let mut document = ManifestDocument::new_project("Default");
        document.line_ending = "\n";
        document.ensure_section(DATA_FILES_SECTION);
        document.ensure_section(ASSIGNMENTS_SECTION);
        document.merge_records(
            DATA_FILES_SECTION,
            &[(String::from("a.tem"), String::from("a.tem,DataFileStyleBoreholeSJV"))],
        );
        document.merge_records(
            ASSIGNMENTS_SECTION,
            &[(String::from("a.tem"), String::from("a.tem,w,s"))],
        );
        assert_eq!(
            document.render(),
            "[Project Settings]\nProject Name=\"Default\"\n\n[Project Data Files]\na.tem,DataFileStyleBoreholeSJV\n\n[Data File Assignments]\na.tem,w,s\n"
        );
    }

    #[test]
    fn test_existing_ppf_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            manifest_path(dir.path()).unwrap(),
            dir.path().join(PROJECT_FILE_NAME)
        );
        std::fs::write(dir.path().join("survey.PPF"), "").unwrap();
        assert_eq!(
            manifest_path(dir.path()).unwrap(),
            dir.path().join("survey.PPF")
        );
    }
}
