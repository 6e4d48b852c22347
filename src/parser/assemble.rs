use serde::{Deserialize, Serialize};

use super::sections::{Label, SectionMap};
use crate::dataset::TrainingPair;
use crate::error::DocumentError;

/// How each target section announces its label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LabelStyle {
    /// `## Solution` followed by a blank line
    #[default]
    Heading,
    /// `**Solution:**` on its own line
    Bold,
}

impl LabelStyle {
    fn header(self, label: Label, text: &str) -> String {
        match self {
            LabelStyle::Heading => format!("## {}\n\n{}", label, text),
            LabelStyle::Bold => format!("**{}:**\n{}", label, text),
        }
    }
}

/// Build the training pair for one document.
///
/// `input` is the Problem text; a document without one is rejected.
/// `target` joins the remaining non-empty sections in vocabulary order.
pub fn assemble(sections: &SectionMap, style: LabelStyle) -> Result<TrainingPair, DocumentError> {
    let input = sections.get(Label::Problem);
    if input.is_empty() {
        return Err(DocumentError::MissingRequiredSection(Label::Problem));
    }

    let target = sections
        .iter()
        .filter(|s| s.label != Label::Problem && !s.text.is_empty())
        .map(|s| style.header(s.label, &s.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(TrainingPair {
        input: input.to_string(),
        target,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::dom::Dom;
    use crate::parser::sections::{extract_sections, Vocabulary};

    fn sections(html: &str) -> SectionMap {
        extract_sections(&Dom::parse(html).unwrap(), &Vocabulary::default())
    }

    #[test]
    fn solution_only_target() {
        let s = sections("<h2>Problem</h2><p>Build fails.</p><h2>Solution</h2><p>Add dependency X.</p>");
        let pair = assemble(&s, LabelStyle::Heading).unwrap();
        assert_eq!(pair.input, "Build fails.");
        assert_eq!(pair.target, "## Solution\n\nAdd dependency X.");
    }

    #[test]
    fn root_cause_precedes_solution() {
        let s = sections(
            "<h2>Solution</h2><p>Pin the version.</p>\
             <h2>Problem</h2><p>Install hangs.</p>\
             <h2>Cause</h2><p>Registry timeout.</p>",
        );
        let pair = assemble(&s, LabelStyle::Heading).unwrap();
        assert_eq!(
            pair.target,
            "## Root Cause\n\nRegistry timeout.\n\n## Solution\n\nPin the version."
        );
    }

    #[test]
    fn bold_style() {
        let s = sections("<h2>Problem</h2><p>p</p><h2>Root Cause</h2><p>c</p><h2>Solution</h2><p>s</p>");
        let pair = assemble(&s, LabelStyle::Bold).unwrap();
        assert_eq!(pair.target, "**Root Cause:**\nc\n\n**Solution:**\ns");
    }

    #[test]
    fn problem_only_gives_empty_target() {
        let s = sections("<h2>Problem</h2><p>Only a problem.</p>");
        let pair = assemble(&s, LabelStyle::Heading).unwrap();
        assert_eq!(pair.input, "Only a problem.");
        assert_eq!(pair.target, "");
    }

    #[test]
    fn missing_problem_rejected() {
        let s = sections("<h2>Solution</h2><p>Restart.</p>");
        let err = assemble(&s, LabelStyle::Heading).unwrap_err();
        assert_eq!(err.to_string(), "No Problem section");
    }

    #[test]
    fn empty_problem_body_rejected() {
        let s = sections("<h2>Problem</h2><h2>Solution</h2><p>Restart.</p>");
        assert!(matches!(
            assemble(&s, LabelStyle::Heading),
            Err(DocumentError::MissingRequiredSection(Label::Problem))
        ));
    }
}
