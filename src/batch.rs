use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info_span, warn};

use crate::dataset::PairCollection;
use crate::error::{DocumentError, RunError};
use crate::parser::{self, assemble::LabelStyle, sections::Vocabulary};

/// Regular files in `dir` with the given extension, sorted by file name.
pub fn list_documents(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, RunError> {
    let input_err = |source| RunError::InputDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(input_err)? {
        let entry = entry.map_err(input_err)?;
        let path = entry.path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches_ext && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Undecodable bytes are dropped with a warning unless `strict_utf8` is set,
/// in which case the document is rejected.
pub fn read_document(path: &Path, strict_utf8: bool) -> Result<String, DocumentError> {
    let bytes = fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) if strict_utf8 => Err(e.into()),
        Err(e) => {
            warn!(
                path = ?path,
                valid_up_to = e.utf8_error().valid_up_to(),
                "invalid UTF-8, dropping undecodable bytes"
            );
            Ok(String::from_utf8_lossy(e.as_bytes()).replace(char::REPLACEMENT_CHARACTER, ""))
        }
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Process every document once, in order. Failures become rejections.
pub fn run(
    paths: &[PathBuf],
    vocab: &Vocabulary,
    style: LabelStyle,
    strict_utf8: bool,
) -> PairCollection {
    let pb = ProgressBar::new(paths.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut collection = PairCollection::default();

    for path in paths {
        let name = display_name(path);
        let _span = info_span!("document", file = %name).entered();

        let result = read_document(path, strict_utf8)
            .and_then(|markup| parser::process_document(&markup, vocab, style));

        match result {
            Ok(pair) => {
                debug!(input_chars = pair.input.len(), target_chars = pair.target.len(), "accepted");
                collection.accept(pair);
                pb.suspend(|| println!("✓ {}", name));
            }
            Err(e) => {
                debug!(reason = %e, "rejected");
                let reason = e.to_string();
                pb.suspend(|| println!("✗ {} ({})", name, reason));
                collection.reject(&name, reason);
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    collection
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{self, TrainingPair};

    fn write(dir: &Path, name: &str, body: &[u8]) {
        fs::write(dir.join(name), body).unwrap();
    }

    fn scenario_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.html",
            b"<h2>Problem</h2><p>Build fails.</p><h2>Solution</h2><p>Add dependency X.</p>",
        );
        write(dir.path(), "b.html", b"<p>Nothing to see.</p>");
        write(
            dir.path(),
            "c.HTML",
            b"<h2>Problem</h2><p>Only a problem.</p>",
        );
        write(dir.path(), "notes.txt", b"<h2>Problem</h2><p>ignored</p>");
        fs::create_dir(dir.path().join("nested.html")).unwrap();
        dir
    }

    fn run_dir(dir: &Path) -> PairCollection {
        let paths = list_documents(dir, "html").unwrap();
        run(&paths, &Vocabulary::default(), LabelStyle::Heading, false)
    }

    #[test]
    fn lists_matching_files_in_name_order() {
        let dir = scenario_dir();
        let names: Vec<String> = list_documents(dir.path(), "html")
            .unwrap()
            .iter()
            .map(|p| display_name(p))
            .collect();
        assert_eq!(names, vec!["a.html", "b.html", "c.HTML"]);
    }

    #[test]
    fn missing_input_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_documents(&dir.path().join("absent"), "html").unwrap_err();
        assert!(matches!(err, RunError::InputDir { .. }));
    }

    #[test]
    fn scenario_accepts_a_rejects_b() {
        let dir = scenario_dir();
        let c = run_dir(dir.path());

        assert_eq!(
            c.pairs,
            vec![
                TrainingPair {
                    input: "Build fails.".into(),
                    target: "## Solution\n\nAdd dependency X.".into(),
                },
                TrainingPair {
                    input: "Only a problem.".into(),
                    target: String::new(),
                },
            ]
        );
        assert_eq!(c.rejected.len(), 1);
        assert_eq!(c.rejected[0].file, "b.html");
        assert_eq!(c.rejected[0].reason, "No Problem section");
    }

    #[test]
    fn bad_documents_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.html", b"<h2>Problem</h2><p>Caf\xe9 menu \xff\xfeis blank</p>");
        write(dir.path(), "2.html", b"<h2>Problem</h2><p class=\"x");
        write(dir.path(), "3.html", b"<h2>Issue</h2><p>ok</p>");
        let c = run_dir(dir.path());

        let inputs: Vec<&str> = c.pairs.iter().map(|p| p.input.as_str()).collect();
        assert_eq!(inputs, vec!["Caf menu is blank", "ok"]);
        assert_eq!(c.rejected.len(), 1);
        assert_eq!(c.rejected[0].file, "2.html");
        assert!(c.rejected[0].reason.starts_with("parse failure"));
    }

    #[test]
    fn strict_utf8_rejects_undecodable_pages() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.html", b"<h2>Problem</h2><p>Caf\xe9</p>");
        let paths = list_documents(dir.path(), "html").unwrap();

        let c = run(&paths, &Vocabulary::default(), LabelStyle::Heading, true);
        assert!(c.pairs.is_empty());
        assert!(c.rejected[0].reason.starts_with("not valid UTF-8"));

        assert_eq!(read_document(&paths[0], false).unwrap(), "<h2>Problem</h2><p>Caf</p>");
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let dir = scenario_dir();
        let out = tempfile::tempdir().unwrap();
        let first = out.path().join("first.json");
        let second = out.path().join("second.json");

        dataset::write_collection(&first, &run_dir(dir.path())).unwrap();
        dataset::write_collection(&second, &run_dir(dir.path())).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn empty_directory_gives_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let c = run_dir(dir.path());
        assert!(c.pairs.is_empty());
        assert!(c.rejected.is_empty());
    }
}
