pub mod assemble;
pub mod blocks;
pub mod dom;
pub mod sections;

use crate::dataset::TrainingPair;
use crate::error::DocumentError;
use assemble::LabelStyle;
use dom::Dom;
use sections::{SectionMap, Vocabulary};

/// Markup → tree → labeled sections.
pub fn extract(markup: &str, vocab: &Vocabulary) -> Result<SectionMap, DocumentError> {
    let dom = Dom::parse(markup)?;
    Ok(sections::extract_sections(&dom, vocab))
}

/// Three-pass pipeline: markup → sections → training pair.
pub fn process_document(
    markup: &str,
    vocab: &Vocabulary,
    style: LabelStyle,
) -> Result<TrainingPair, DocumentError> {
    let sections = extract(markup, vocab)?;
    assemble::assemble(&sections, style)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
    }

    fn process(name: &str) -> Result<TrainingPair, DocumentError> {
        process_document(&fixture(name), &Vocabulary::default(), LabelStyle::Heading)
    }

    #[test]
    fn confluence_export_full_page() {
        let pair = process("npm_eresolve.html").unwrap();
        assert_eq!(
            pair.input,
            "`npm install` fails with `npm ERR! code ERESOLVE` on the CI agents.\n\n\
             - Started after the React 18 upgrade\n\
             - Local installs succeed"
        );
        assert!(pair.target.starts_with("## Root Cause\n\nThe lockfile pins"));
        assert!(pair.target.contains("## Solution\n\n1. Delete `node_modules` and `package-lock.json`."));
        assert!(pair.target.contains("```bash\nnpm cache clean --force\nnpm install\n```"));
        // page chrome after the last section heading is not part of any section
        assert!(!pair.target.contains("Page history"));
    }

    #[test]
    fn storage_format_with_macros() {
        let pair = process("storage_format.xml").unwrap();
        assert_eq!(pair.input, "Jenkins cannot clone the repository: **Authentication failed**.");
        assert_eq!(
            pair.target,
            "## Root Cause\n\nThe GitHub token stored in Jenkins credentials expired.\n\n\
             ## Solution\n\n- Rotate the token\n- Update the credential `github-ci`\n\n\
             ```shell\ngit ls-remote https://github.com/acme/app.git\n```"
        );
    }

    #[test]
    fn storage_format_tables_and_step_lists() {
        let pair = process("storage_table.xml").unwrap();
        assert_eq!(
            pair.input,
            "Deploys time out against the staging cluster.\n\n\
             | Setting | Value |\n| --- | --- |\n| timeout | 30s |"
        );
        assert_eq!(
            pair.target,
            "## Solution\n\n\
             1. Raise the timeout.\n\n   Edit `deploy.yaml`:\n\n\
             \x20  ```yaml\n   timeout: 120s\n\n   retries: 3\n   ```\n\
             2. Redeploy."
        );
    }

    #[test]
    fn page_without_headings_rejected() {
        let err = process("no_headings.html").unwrap_err();
        assert_eq!(err.to_string(), "No Problem section");
    }

    #[test]
    fn problem_only_page() {
        let pair = process("problem_only.html").unwrap();
        assert_eq!(pair.input, "The nightly report job is skipped on holidays.");
        assert_eq!(pair.target, "");
    }

    #[test]
    fn loose_markup_still_extracts() {
        let pair = process("loose_markup.html").unwrap();
        assert_eq!(pair.input, "Disk usage alerts fire every night\nat 02:00.");
        assert_eq!(pair.target, "## Solution\n\nRotate logs with `logrotate`.");
    }
}
