use std::path::Path;

use super::assignment::{AssignmentEntry, DataStyle};
use super::atomic_file::write_atomically;
use super::constants::{DATA_STYLE_TAG, MANAGED_TAGS, SAMPLING_TAG, WAVEFORM_TAG};
use super::error::HeaderWriterError;
use super::extractor::DataFileKind;
use super::header::{header_region, is_frequency_line};

/// What `update_header` did to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderUpdate {
    Written,
    /// The header already carried these values; nothing was written
    Unchanged,
    /// The file format has no assignment header fields
    Skipped,
}

/// Write an entry's waveform, sampling scheme and data style into the header of its
/// data file.
///
/// Only the base frequency line of the header region is touched. Every other byte of the
/// file, including that line's terminator, is preserved.
pub fn update_header(entry: &AssignmentEntry) -> Result<HeaderUpdate, HeaderWriterError> {
    let path = entry.path.as_path();
    let (waveform, sampling) = match (entry.effective_waveform(), entry.effective_sampling()) {
        (Some(w), Some(s)) => (w, s),
        _ => return Err(HeaderWriterError::IncompleteAssignment(path.to_path_buf())),
    };
    for name in [waveform, sampling] {
        if !is_header_safe(name) {
            return Err(HeaderWriterError::UnwritableName {
                path: path.to_path_buf(),
                name: name.to_string(),
            });
        }
    }
    if DataFileKind::from_path(path) == Some(DataFileKind::Pem) {
        log::info!("Skipping header update for PEM file {}", path.display());
        return Ok(HeaderUpdate::Skipped);
    }

    let bytes = std::fs::read(path).map_err(|source| HeaderWriterError::UnreadableFile {
        path: path.to_path_buf(),
        source,
    })?;
    let updated = rewrite_header(
        path,
        &bytes,
        waveform,
        sampling,
        entry.effective_data_style(),
    )?;
    if updated == bytes {
        log::info!("Header of {} is already up to date", path.display());
        return Ok(HeaderUpdate::Unchanged);
    }

    write_atomically(path, &updated).map_err(|e| HeaderWriterError::FileWriteError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    log::info!(
        "Wrote header of {} (waveform {waveform}, sampling {sampling})",
        path.display()
    );
    Ok(HeaderUpdate::Written)
}

fn rewrite_header(
    path: &Path,
    bytes: &[u8],
    waveform: &str,
    sampling: &str,
    data_style: Option<DataStyle>,
) -> Result<Vec<u8>, HeaderWriterError> {
    let (line_number, span) = header_region(bytes)
        .into_iter()
        .enumerate()
        .find(|(_, span)| is_frequency_line(&String::from_utf8_lossy(span.content(bytes))))
        .ok_or_else(|| HeaderWriterError::HeaderTooShort(path.to_path_buf()))?;

    let line = std::str::from_utf8(span.content(bytes)).map_err(|_| {
        HeaderWriterError::HeaderEncoding {
            path: path.to_path_buf(),
            line: line_number + 1,
        }
    })?;
    let new_line = rewrite_frequency_line(line, waveform, sampling, data_style);

    let mut updated = Vec::with_capacity(bytes.len() + new_line.len());
    updated.extend_from_slice(&bytes[..span.start]);
    updated.extend_from_slice(new_line.as_bytes());
    updated.extend_from_slice(&bytes[span.content_end..]);
    Ok(updated)
}

/// A name written into the frequency line must read back as the same single part: no
/// tabs or line breaks, and no trailing `&` that would look like a continuation marker.
fn is_header_safe(name: &str) -> bool {
    !name.contains(['\t', '\r', '\n']) && !name.trim_end().ends_with('&')
}

/// Replace the managed tab-separated parts of a frequency line
fn rewrite_frequency_line(
    line: &str,
    waveform: &str,
    sampling: &str,
    data_style: Option<DataStyle>,
) -> String {
    let trimmed = line.trim_end();
    let (body, continued) = match trimmed.strip_suffix('&') {
        Some(rest) => (rest.trim_end(), true),
        None => (trimmed, false),
    };

    let mut parts: Vec<String> = body
        .split('\t')
        .filter(|part| {
            let upper = part.trim_start().to_uppercase();
            !MANAGED_TAGS.iter().any(|tag| upper.starts_with(tag))
        })
        .map(str::to_string)
        .collect();
    while parts.last().is_some_and(|p| p.trim().is_empty()) {
        parts.pop();
    }

    parts.push(format!("{WAVEFORM_TAG} {waveform}"));
    parts.push(format!("{SAMPLING_TAG} {sampling}"));
    if let Some(style) = data_style {
        parts.push(format!("{DATA_STYLE_TAG} {style}"));
    }

    let mut rebuilt = parts.join("\t");
    if continued {
        rebuilt.push_str(" &");
    }
    rebuilt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::Selection;
    use crate::extractor::Extraction;
    use std::path::PathBuf;

    fn entry(path: PathBuf, waveform: Option<&str>, sampling: Option<&str>) -> AssignmentEntry {
        AssignmentEntry {
            parameters: Extraction::Unresolved {
                path: path.clone(),
                reason: String::new(),
            },
            path,
            waveform: Selection::detected(waveform.map(str::to_string)),
            sampling: Selection::detected(sampling.map(str::to_string)),
            data_style: Selection::detected(Some(DataStyle::BoreholeSjv)),
        }
    }

    #[test]
    fn test_rewrite_line_is_idempotent() {
        let once = rewrite_frequency_line("/ BFREQ=5.2 UNITS=nT &", "a", "b", None);
        assert_eq!(once, "/ BFREQ=5.2 UNITS=nT\tWAVEFORM: a\tSAMPLING: b &");
        let twice = rewrite_frequency_line(&once, "a", "b", None);
        assert_eq!(once, twice);
        let changed = rewrite_frequency_line(&once, "c", "d", Some(DataStyle::Crone));
        assert_eq!(
            changed,
            "/ BFREQ=5.2 UNITS=nT\tWAVEFORM: c\tSAMPLING: d\tDATASTYLE: DataFileStyleCrone &"
        );
    }

    #[test]
    fn test_update_preserves_other_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Line1.tem");
        let original = b"/ Survey line 1\r\n/ BFREQ=5.2\r\n/TIMESSTART(ms)=0.1\r\n1 2 \xff 3\r\n";
        std::fs::write(&path, original).unwrap();

        let e = entry(path.clone(), Some("Square_5.200"), Some("Square_5.200_14ch"));
        assert_eq!(update_header(&e).unwrap(), HeaderUpdate::Written);
        let written = std::fs::read(&path).unwrap();
        assert_eq!(
            written,
            b"/ Survey line 1\r\n/ BFREQ=5.2\tWAVEFORM: Square_5.200\tSAMPLING: Square_5.200_14ch\tDATASTYLE: DataFileStyleBoreholeSJV\r\n/TIMESSTART(ms)=0.1\r\n1 2 \xff 3\r\n".to_vec()
        );
        assert_eq!(update_header(&e).unwrap(), HeaderUpdate::Unchanged);
        assert_eq!(std::fs::read(&path).unwrap(), written);
    }

    #[test]
    fn test_incomplete_and_short_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tem");
        std::fs::write(&path, "/ nothing here\n1 2 3\n").unwrap();

        let incomplete = entry(path.clone(), Some("a"), None);
        assert!(matches!(
            update_header(&incomplete),
            Err(HeaderWriterError::IncompleteAssignment(_))
        ));
        let complete = entry(path, Some("a"), Some("b"));
        assert!(matches!(
            update_header(&complete),
            Err(HeaderWriterError::HeaderTooShort(_))
        ));
    }

    #[test]
    fn test_bad_encoding_in_frequency_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tem");
        std::fs::write(&path, b"/ title\n/ BFREQ=5 \xfe\n").unwrap();
        let e = entry(path, Some("a"), Some("b"));
        assert!(matches!(
            update_header(&e),
            Err(HeaderWriterError::HeaderEncoding { line: 2, .. })
        ));
    }

    #[test]
    fn test_names_that_would_not_read_back_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tem");
        let original = "/ BFREQ=5.2 &\n1 2\n";
        std::fs::write(&path, original).unwrap();

        for (waveform, sampling) in [("loop &", "b"), ("a", "tab\tbed"), ("a", "two\nlines")] {
            let e = entry(path.clone(), Some(waveform), Some(sampling));
            assert!(matches!(
                update_header(&e),
                Err(HeaderWriterError::UnwritableName { .. })
            ));
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);

        let e = entry(path.clone(), Some("loop & co"), Some("b"));
        assert_eq!(update_header(&e).unwrap(), HeaderUpdate::Written);
        assert_eq!(update_header(&e).unwrap(), HeaderUpdate::Unchanged);
    }

    #[test]
    fn test_pem_files_are_skipped() {
        let e = entry(PathBuf::from("hole.PEM"), Some("a"), Some("b"));
        assert_eq!(update_header(&e).unwrap(), HeaderUpdate::Skipped);
    }
}
