//! Input discovery, output naming and archival.

use chrono::NaiveDateTime;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{BatchError, BatchResult};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Numbered alternatives tried before giving up on a taken name.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// `*.csv` files directly inside `dir` (extension case-insensitive), sorted by path.
pub fn discover_inputs(dir: &Path) -> BatchResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| BatchError::InputDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut inputs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_csv(path))
        .collect();
    inputs.sort();
    Ok(inputs)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// File name of a unit's output document.
///
/// Expands `{uuid}`, `{timestamp}`, `{date}`, `{time}`, `{dept}` and
/// `{stem}`, then appends `.xml` when the result lacks it.
pub fn output_file_name(format: &str, department_code: &str, input: &Path, now: NaiveDateTime) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let mut name = format
        .replace("{timestamp}", &now.format(TIMESTAMP_FORMAT).to_string())
        .replace("{date}", &now.format("%Y%m%d").to_string())
        .replace("{time}", &now.format("%H%M%S").to_string())
        .replace("{dept}", department_code)
        .replace("{stem}", stem);
    if name.contains("{uuid}") {
        name = name.replace("{uuid}", &uuid::Uuid::new_v4().to_string());
    }

    if !name.to_lowercase().ends_with(".xml") {
        name.push_str(".xml");
    }
    name
}

/// Write `contents` to a new file in `dir`, never replacing an existing one.
///
/// When `file_name` is taken the first free `stem_1.ext`, `stem_2.ext`, ...
/// is used instead. Returns the path written.
pub fn write_output(dir: &Path, file_name: &str, contents: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let (path, mut file) = create_unique(dir, numbered_names(file_name))?;
    if let Err(e) = file.write_all(contents).and_then(|_| file.sync_all()) {
        let _ = fs::remove_file(&path);
        return Err(e);
    }
    Ok(path)
}

/// Move (or copy) `src` into `dir`, returning the archived path.
///
/// An existing file of the same name is kept; the new one gets a timestamp
/// suffix, then a counter. A move that cannot rename across devices falls
/// back to copy and remove.
pub fn archive_file(src: &Path, dir: &Path, now: NaiveDateTime, move_file: bool) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let file_name = src
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let suffixed = suffixed_name(src, now);
    let candidates = std::iter::once(file_name.to_string()).chain(numbered_names(&suffixed));

    // The reserved empty file is replaced below.
    let (target, reserved) = create_unique(dir, candidates)?;
    drop(reserved);

    let moved = move_file && fs::rename(src, &target).is_ok();
    if !moved {
        if let Err(e) = fs::copy(src, &target) {
            let _ = fs::remove_file(&target);
            return Err(e);
        }
        if move_file {
            fs::remove_file(src)?;
        }
    }
    Ok(target)
}

/// Create the first candidate name in `dir` that does not exist yet.
fn create_unique(dir: &Path, candidates: impl IntoIterator<Item = String>) -> io::Result<(PathBuf, File)> {
    for name in candidates {
        let path = dir.join(&name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name in {}", dir.display()),
    ))
}

/// `name`, then `stem_1.ext`, `stem_2.ext`, ...
fn numbered_names(name: &str) -> impl Iterator<Item = String> + '_ {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|e| e.to_str());
    std::iter::once(name.to_string()).chain((1..MAX_NAME_ATTEMPTS).map(move |n| match ext {
        Some(ext) => format!("{}_{}.{}", stem, n, ext),
        None => format!("{}_{}", stem, n),
    }))
}

fn suffixed_name(src: &Path, now: NaiveDateTime) -> String {
    let stem = src.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let timestamp = now.format(TIMESTAMP_FORMAT);
    match src.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, timestamp, ext),
        None => format!("{}_{}", stem, timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
    }

    #[test]
    fn test_discover_inputs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.csv", "A.CSV", "notes.txt"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.csv")).unwrap();

        let inputs = discover_inputs(dir.path()).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["A.CSV", "b.csv"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_inputs(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, BatchError::InputDir { .. }));
    }

    #[test]
    fn test_output_file_name_placeholders() {
        let input = Path::new("/in/FIN_checks.csv");
        assert_eq!(
            output_file_name("{dept}_{stem}_{timestamp}", "FIN", input, now()),
            "FIN_FIN_checks_20240309_140507.xml"
        );
        assert_eq!(output_file_name("{date}-{time}.XML", "FIN", input, now()), "20240309-140507.XML");

        let name = output_file_name("{uuid}.xml", "FIN", input, now());
        assert_eq!(name.len(), 36 + 4);
        assert!(uuid::Uuid::parse_str(&name[..36]).is_ok());
    }

    #[test]
    fn test_archive_move_and_collision() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive");
        let src = dir.path().join("in.csv");

        fs::write(&src, "first").unwrap();
        let first = archive_file(&src, &archive, now(), true).unwrap();
        assert_eq!(first, archive.join("in.csv"));
        assert!(!src.exists());

        fs::write(&src, "second").unwrap();
        let second = archive_file(&src, &archive, now(), true).unwrap();
        assert_eq!(second, archive.join("in_20240309_140507.csv"));
        assert_eq!(fs::read_to_string(&first).unwrap(), "first");
        assert_eq!(fs::read_to_string(&second).unwrap(), "second");

        fs::write(&src, "third").unwrap();
        let third = archive_file(&src, &archive, now(), true).unwrap();
        assert_eq!(third, archive.join("in_20240309_140507_1.csv"));
        assert_eq!(fs::read_to_string(&second).unwrap(), "second");
        assert_eq!(fs::read_to_string(&third).unwrap(), "third");
    }

    #[test]
    fn test_write_output_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let first = write_output(&out, "FIN.xml", b"<a/>").unwrap();
        let second = write_output(&out, "FIN.xml", b"<b/>").unwrap();
        assert_eq!(first, out.join("FIN.xml"));
        assert_eq!(second, out.join("FIN_1.xml"));
        assert_eq!(fs::read_to_string(&first).unwrap(), "<a/>");
        assert_eq!(fs::read_to_string(&second).unwrap(), "<b/>");
    }

    #[test]
    fn test_concurrent_writes_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let mut written: Vec<PathBuf> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let out = &out;
                    scope.spawn(move || write_output(out, "FIN_20240309_140507.xml", format!("{}", i).as_bytes()).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        written.sort();
        written.dedup();
        assert_eq!(written.len(), 8);

        let mut contents: Vec<String> = written.iter().map(|p| fs::read_to_string(p).unwrap()).collect();
        contents.sort();
        assert_eq!(contents, (0..8).map(|i| i.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn test_archive_copy_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("out.xml");
        fs::write(&src, "<cashbook/>").unwrap();

        let copied = archive_file(&src, &dir.path().join("arch"), now(), false).unwrap();
        assert!(src.exists());
        assert!(copied.exists());
    }
}
