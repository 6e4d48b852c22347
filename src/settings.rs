use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat, FileSourceFile};
use serde::Deserialize;

use crate::parser::assemble::LabelStyle;
use crate::parser::sections::{Label, Vocabulary};

/// Looked up in the working directory when `--config` is not given.
const DEFAULT_CONFIG: &str = "html_pairs";
const ENV_PREFIX: &str = "PAIRS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub extension: String,
    pub output: PathBuf,
    pub rejects: Option<PathBuf>,
    pub label_style: LabelStyle,
    /// Reject pages with invalid UTF-8 instead of dropping the bad bytes.
    pub strict_utf8: bool,
    pub labels: LabelWords,
    pub runs_dir: PathBuf,
    pub keep_runs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            input_dir: PathBuf::from("pages_raw"),
            extension: "html".to_string(),
            output: PathBuf::from("training_pairs.json"),
            rejects: None,
            label_style: LabelStyle::Heading,
            strict_utf8: false,
            labels: LabelWords::default(),
            runs_dir: PathBuf::from("fine-tuned-runs"),
            keep_runs: 5,
        }
    }
}

/// Synonym words per canonical label.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LabelWords {
    pub problem: Vec<String>,
    pub root_cause: Vec<String>,
    pub solution: Vec<String>,
}

impl Default for LabelWords {
    fn default() -> Self {
        let words = |ws: &[&str]| ws.iter().map(|w| w.to_string()).collect();
        LabelWords {
            problem: words(&["problem", "issue"]),
            root_cause: words(&["root cause", "cause"]),
            solution: words(&["solution", "resolution", "fix"]),
        }
    }
}

impl LabelWords {
    pub fn vocabulary(&self) -> Vocabulary {
        Vocabulary::new(vec![
            (Label::Problem, self.problem.clone()),
            (Label::RootCause, self.root_cause.clone()),
            (Label::Solution, self.solution.clone()),
        ])
    }
}

/// Defaults, then the TOML file, then `PAIRS_*` environment variables.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let file = match path {
        Some(p) => File::from(p).required(true),
        None => File::with_name(DEFAULT_CONFIG).required(false),
    };
    load_from(Some(file), environment()).with_context(|| match path {
        Some(p) => format!("Failed to load config {:?}", p),
        None => "Failed to load configuration".to_string(),
    })
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("labels.problem")
        .with_list_parse_key("labels.root_cause")
        .with_list_parse_key("labels.solution")
}

fn load_from(file: Option<File<FileSourceFile, FileFormat>>, env: Environment) -> Result<Settings> {
    let mut builder = Config::builder();
    if let Some(file) = file {
        builder = builder.add_source(file);
    }
    let settings: Settings = builder
        .add_source(env)
        .build()?
        .try_deserialize()
        .context("Invalid configuration")?;

    // stage prunes right after creating a run; keeping none would delete it
    if settings.keep_runs == 0 {
        bail!("keep_runs must be at least 1");
    }
    Ok(settings)
}

// ── Tests ──
