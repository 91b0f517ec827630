use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

/// Stems of the files this tool writes; never picked up as input
static OUTPUT_STEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(_corrected_|_correction_report_|^batch_summary_)\d{8}_\d{6}$")
        .expect("valid output stem pattern")
});

/// Read a UTF-8 transcript file
pub fn read_transcript(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    String::from_utf8(bytes).with_context(|| format!("File is not valid UTF-8: {:?}", path))
}

/// Whether a file looks like a transcript input rather than one of our outputs
pub fn is_transcript_file(path: &Path) -> bool {
    let is_txt = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
    if !is_txt {
        return false;
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    !OUTPUT_STEM.is_match(stem)
}

/// Expand inputs into a sorted, de-duplicated list of transcript files.
///
/// Files are taken as given; directories contribute their `.txt` files
/// (descending into subdirectories only when `recursive`).
pub fn find_transcript_files(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
            continue;
        }
        if !input.is_dir() {
            bail!("Input path does not exist: {:?}", input);
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let found: Vec<PathBuf> = WalkDir::new(input)
            .max_depth(max_depth)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_transcript_file(p))
            .collect();

        debug!("Found {} transcript files in {:?}", found.len(), input);
        files.extend(found);
    }

    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transcript_file() {
        assert!(is_transcript_file(Path::new("meeting.txt")));
        assert!(is_transcript_file(Path::new("dir/Meeting.TXT")));
        assert!(!is_transcript_file(Path::new("meeting.json")));
        assert!(!is_transcript_file(Path::new(
            "meeting_corrected_20240101_120000.txt"
        )));
        assert!(!is_transcript_file(Path::new(
            "meeting_correction_report_20240101_120000.txt"
        )));
        assert!(!is_transcript_file(Path::new("batch_summary_20240101_120000.txt")));
    }

    #[test]
    fn test_user_names_resembling_outputs_are_kept() {
        assert!(is_transcript_file(Path::new("team_report_2024.txt")));
        assert!(is_transcript_file(Path::new("draft_corrected.txt")));
        assert!(is_transcript_file(Path::new("batch_summary_notes.txt")));
    }

    #[test]
    fn test_find_transcript_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();

        std::fs::write(dir.path().join("b.txt"), "张三：你好").unwrap();
        std::fs::write(dir.path().join("a.txt"), "张三：你好").unwrap();
        std::fs::write(dir.path().join("a_corrected_20240101_000000.txt"), "").unwrap();
        std::fs::write(dir.path().join("notes.md"), "").unwrap();
        std::fs::write(nested.join("c.txt"), "张三：你好").unwrap();

        let flat = find_transcript_files(&[dir.path().to_path_buf()], false).unwrap();
        let names: Vec<String> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        let deep = find_transcript_files(&[dir.path().to_path_buf()], true).unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn test_explicit_file_and_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.txt");
        std::fs::write(&file, "hello").unwrap();

        let files = find_transcript_files(&[file.clone(), file.clone()], false).unwrap();
        assert_eq!(files, vec![file]);

        assert!(find_transcript_files(&[dir.path().join("missing")], false).is_err());
    }

    #[test]
    fn test_read_transcript_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.txt");
        std::fs::write(&file, [0xff, 0xfe, 0x00]).unwrap();
        assert!(read_transcript(&file).is_err());

        std::fs::write(&file, "发言人1 00:01\n你好").unwrap();
        assert_eq!(read_transcript(&file).unwrap(), "发言人1 00:01\n你好");
    }
}
