//! Candidate-file discovery for content-hash identification
//!
//! Obfuscated downloads routinely arrive with names that no longer match the
//! filenames recorded in the recovery metadata. The engine can still identify
//! such files by content hash, but only if it is told about them: this module
//! assembles that candidate set from one listing of the recovery set's
//! directory. Discovery is a best-effort enhancement, never a precondition —
//! an unreadable directory degrades to an empty set.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

/// File names that are OS metadata sidecars, never repair candidates
const OS_METADATA_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// Compute the directory holding the recovery set
///
/// Strips the final path segment of the recovery-set file; a bare file name
/// with no separator yields the current directory.
pub fn base_directory(par2_file: &Path) -> PathBuf {
    match par2_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Assemble the extra-file candidate set from one directory listing
///
/// Includes every plain file in `base` except recovery-set files (any name
/// containing `.par2`, case-insensitive) and OS metadata sidecars.
/// Subdirectories are excluded on every platform. Returned paths keep the
/// `base` prefix, so an absolute base yields absolute candidates.
///
/// Enumeration order is whatever the filesystem reports; callers must not
/// depend on it. An unreadable directory or entry degrades to an empty or
/// partial set with a warning, never an error.
pub fn collect_candidate_files(base: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                base = %base.display(),
                error = %e,
                "cannot list directory, continuing without extra files"
            );
            return Vec::new();
        }
    };

    let mut candidates = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.to_lowercase().contains(".par2") {
            continue;
        }
        if OS_METADATA_FILES.iter().any(|meta| name == *meta) {
            continue;
        }
        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }
        candidates.push(entry.path());
    }

    debug!(
        base = %base.display(),
        count = candidates.len(),
        "collected candidate files"
    );
    candidates
}

/// True when the path has a `.par2` extension (case-insensitive)
pub fn is_recovery_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("par2"))
        .unwrap_or(false)
}

/// True when the path is a main (index) recovery file, not a `.vol` volume
pub fn is_index_file(path: &Path) -> bool {
    is_recovery_file(path)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| !name.to_lowercase().contains(".vol"))
            .unwrap_or(false)
}

/// List the recovery-set files in a directory, index files first
///
/// Volume files sort after index files so the first entry is the natural
/// choice to drive a run.
///
/// # Errors
///
/// Returns an I/O error when the directory cannot be listed.
pub fn find_recovery_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_recovery_file(path))
        .collect();

    files.sort_by(|a, b| match (is_index_file(a), is_index_file(b)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.cmp(b),
    });

    Ok(files)
}

/// Pick the recovery file that should drive a repair run
///
/// Prefers the first index file; falls back to the smallest file on disk,
/// which in practice is the bare index even when its name hides the `.vol`
/// marker.
pub fn select_recovery_index(files: &[PathBuf]) -> Option<&PathBuf> {
    files.iter().find(|p| is_index_file(p)).or_else(|| {
        files
            .iter()
            .min_by_key(|p| p.metadata().map(|m| m.len()).unwrap_or(u64::MAX))
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn base_directory_strips_the_final_segment() {
        assert_eq!(
            base_directory(Path::new("/data/archive.par2")),
            PathBuf::from("/data")
        );
        assert_eq!(
            base_directory(Path::new("downloads/job/set.par2")),
            PathBuf::from("downloads/job")
        );
    }

    #[test]
    fn bare_file_name_resolves_to_current_directory() {
        assert_eq!(base_directory(Path::new("archive.par2")), PathBuf::from("."));
        assert_eq!(base_directory(Path::new("")), PathBuf::from("."));
    }

    #[test]
    fn empty_directory_yields_empty_candidate_set() {
        let dir = TempDir::new().unwrap();
        assert!(collect_candidate_files(dir.path()).is_empty());
    }

    #[test]
    fn missing_directory_degrades_to_empty_set() {
        let candidates =
            collect_candidate_files(Path::new("/nonexistent/path/that/should/not/exist"));
        assert!(candidates.is_empty());
    }

    #[test]
    fn recovery_files_are_excluded_case_insensitively() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("archive.par2"), b"").unwrap();
        fs::write(dir.path().join("ARCHIVE.PAR2"), b"").unwrap();
        fs::write(dir.path().join("archive.vol000+01.Par2"), b"").unwrap();
        fs::write(dir.path().join("payload.bin"), b"data").unwrap();

        let candidates = collect_candidate_files(dir.path());
        assert_eq!(candidates, vec![dir.path().join("payload.bin")]);
    }

    #[test]
    fn par2_substring_anywhere_in_the_name_excludes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("backup.par2.old"), b"").unwrap();
        fs::write(dir.path().join("movie.mkv"), b"data").unwrap();

        let candidates = collect_candidate_files(dir.path());
        assert_eq!(candidates, vec![dir.path().join("movie.mkv")]);
    }

    #[test]
    fn os_metadata_sidecars_are_excluded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".DS_Store"), b"").unwrap();
        fs::write(dir.path().join("Thumbs.db"), b"").unwrap();
        fs::write(dir.path().join("payload.bin"), b"data").unwrap();

        let candidates = collect_candidate_files(dir.path());
        assert_eq!(candidates, vec![dir.path().join("payload.bin")]);
    }

    #[test]
    fn subdirectories_are_excluded() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("extracted")).unwrap();
        fs::write(dir.path().join("payload.bin"), b"data").unwrap();

        let candidates = collect_candidate_files(dir.path());
        assert_eq!(candidates, vec![dir.path().join("payload.bin")]);
    }

    #[test]
    fn candidates_keep_the_base_prefix() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.bin"), b"").unwrap();
        fs::write(dir.path().join("b.bin"), b"").unwrap();

        let mut candidates = collect_candidate_files(dir.path());
        candidates.sort();
        assert_eq!(
            candidates,
            vec![dir.path().join("a.bin"), dir.path().join("b.bin")]
        );
        assert!(candidates.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn recovery_file_predicates() {
        assert!(is_recovery_file(Path::new("archive.par2")));
        assert!(is_recovery_file(Path::new("archive.PAR2")));
        assert!(!is_recovery_file(Path::new("archive.rar")));
        assert!(!is_recovery_file(Path::new("par2"))); // no extension

        assert!(is_index_file(Path::new("archive.par2")));
        assert!(!is_index_file(Path::new("archive.vol000+20.par2")));
        assert!(!is_index_file(Path::new("archive.rar")));
    }

    #[test]
    fn find_recovery_files_orders_index_before_volumes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("archive.vol000+01.par2"), b"vol").unwrap();
        fs::write(dir.path().join("archive.par2"), b"idx").unwrap();
        fs::write(dir.path().join("archive.vol001+02.par2"), b"vol").unwrap();
        fs::write(dir.path().join("payload.bin"), b"data").unwrap();

        let files = find_recovery_files(dir.path()).unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0], dir.path().join("archive.par2"));
        assert!(files[1..].iter().all(|p| !is_index_file(p)));
    }

    #[test]
    fn find_recovery_files_propagates_listing_errors() {
        let result = find_recovery_files(Path::new("/nonexistent/path/that/should/not/exist"));
        assert!(result.is_err());
    }

    #[test]
    fn select_recovery_index_prefers_index_files() {
        let files = vec![
            PathBuf::from("/d/archive.vol000+01.par2"),
            PathBuf::from("/d/archive.par2"),
        ];
        assert_eq!(
            select_recovery_index(&files),
            Some(&PathBuf::from("/d/archive.par2"))
        );
    }

    #[test]
    fn select_recovery_index_falls_back_to_smallest_volume() {
        let dir = TempDir::new().unwrap();
        let big = dir.path().join("set.vol000+10.par2");
        let small = dir.path().join("set.vol000+01.par2");
        fs::write(&big, vec![0u8; 4096]).unwrap();
        fs::write(&small, vec![0u8; 64]).unwrap();

        let files = vec![big, small.clone()];
        assert_eq!(select_recovery_index(&files), Some(&small));
    }

    #[test]
    fn select_recovery_index_on_empty_set_is_none() {
        assert_eq!(select_recovery_index(&[]), None);
    }
}
