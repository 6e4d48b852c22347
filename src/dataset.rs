use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, RunError};

/// `{input, target}` record read by the fine-tuning scripts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub input: String,
    pub target: String,
}

/// On-disk shape: `{"data": [{"input": ..., "target": ...}]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub data: Vec<TrainingPair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub file: String,
    pub reason: String,
}

/// Accepted pairs and rejected documents of one batch, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairCollection {
    pub pairs: Vec<TrainingPair>,
    pub rejected: Vec<Rejection>,
}

impl PairCollection {
    pub fn accept(&mut self, pair: TrainingPair) {
        self.pairs.push(pair);
    }

    pub fn reject(&mut self, file: &str, reason: impl Into<String>) {
        self.rejected.push(Rejection {
            file: file.to_string(),
            reason: reason.into(),
        });
    }
}

#[derive(Serialize)]
struct DataRef<'a> {
    data: &'a [TrainingPair],
}

#[derive(Serialize)]
struct RejectedRef<'a> {
    rejected: &'a [Rejection],
}

/// Pretty JSON with a trailing newline, written in one go.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RunError> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| RunError::OutputWriteFailure {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, body).map_err(|source| RunError::OutputWriteFailure {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_collection(path: &Path, collection: &PairCollection) -> Result<(), RunError> {
    write_json(
        path,
        &DataRef {
            data: &collection.pairs,
        },
    )
}

pub fn write_rejects(path: &Path, rejected: &[Rejection]) -> Result<(), RunError> {
    write_json(path, &RejectedRef { rejected })
}

pub fn load(path: &Path) -> Result<Dataset, DatasetError> {
    let raw = fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| DatasetError::Format {
        path: path.to_path_buf(),
        source,
    })
}

/// The checks the training endpoint applied before accepting a dataset.
pub fn validate(dataset: &Dataset) -> Result<(), DatasetError> {
    if dataset.data.is_empty() {
        return Err(DatasetError::Empty);
    }
    if let Some(index) = dataset.data.iter().position(|p| p.input.trim().is_empty()) {
        return Err(DatasetError::EmptyInput { index });
    }
    Ok(())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(input: &str, target: &str) -> TrainingPair {
        TrainingPair {
            input: input.to_string(),
            target: target.to_string(),
        }
    }

    #[test]
    fn output_shape_is_data_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("training_pairs.json");
        let mut c = PairCollection::default();
        c.accept(pair("Build fails.", "## Solution\n\nAdd dependency X."));
        c.reject("b.html", "No Problem section");

        write_collection(&path, &c).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "data": [{"input": "Build fails.", "target": "## Solution\n\nAdd dependency X."}]
            })
        );
        assert!(written.ends_with("}\n"));
        assert!(!written.contains("b.html"));
    }

    #[test]
    fn rejects_file_lists_reasons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rejected.json");
        let mut c = PairCollection::default();
        c.reject("b.html", "No Problem section");

        write_rejects(&path, &c.rejected).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["rejected"][0]["file"], "b.html");
        assert_eq!(value["rejected"][0]["reason"], "No Problem section");
    }

    #[test]
    fn write_into_file_as_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let err = write_collection(&blocker.join("out.json"), &PairCollection::default()).unwrap_err();
        assert!(matches!(err, RunError::OutputWriteFailure { .. }));
    }

    #[test]
    fn load_reads_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.json");
        let mut c = PairCollection::default();
        c.accept(pair("a", "b"));
        write_collection(&path, &c).unwrap();

        let ds = load(&path).unwrap();
        assert_eq!(ds.data, c.pairs);
    }

    #[test]
    fn load_rejects_wrong_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.json");
        fs::write(&path, r#"{"pairs": []}"#).unwrap();
        assert!(matches!(load(&path), Err(DatasetError::Format { .. })));
    }

    #[test]
    fn validate_empty_and_blank_input() {
        assert_eq!(
            validate(&Dataset::default()).unwrap_err().to_string(),
            "No training data received"
        );
        let ds = Dataset {
            data: vec![pair("ok", ""), pair("  ", "t")],
        };
        assert!(matches!(validate(&ds), Err(DatasetError::EmptyInput { index: 1 })));
        assert!(validate(&Dataset { data: vec![pair("ok", "")] }).is_ok());
    }
}
