use std::collections::HashSet;
use std::fmt;

use tracing::warn;

use super::blocks;
use super::dom::{Dom, NodeId};

/// Heading ranks that open a section and end the previous one.
const SECTION_HEADINGS: &[&str] = &["h1", "h2", "h3"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Problem,
    RootCause,
    Solution,
}

impl Label {
    pub fn name(self) -> &'static str {
        match self {
            Label::Problem => "Problem",
            Label::RootCause => "Root Cause",
            Label::Solution => "Solution",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered mapping from canonical label to the words that identify its heading.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    entries: Vec<(Label, Vec<String>)>,
}

impl Vocabulary {
    /// Words are matched case-insensitively; blank words are dropped.
    pub fn new(entries: Vec<(Label, Vec<String>)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(label, words)| {
                let words = words
                    .into_iter()
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect();
                (label, words)
            })
            .collect();
        Vocabulary { entries }
    }

    pub fn entries(&self) -> &[(Label, Vec<String>)] {
        &self.entries
    }

    fn matches(words: &[String], heading: &str) -> bool {
        words.iter().any(|w| heading.contains(w.as_str()))
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        let words = |ws: &[&str]| ws.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        Vocabulary::new(vec![
            (Label::Problem, words(&["problem", "issue"])),
            (Label::RootCause, words(&["root cause", "cause"])),
            (Label::Solution, words(&["solution", "resolution", "fix"])),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub label: Label,
    pub text: String,
}

/// One entry per vocabulary label, in vocabulary order. Labels whose
/// heading was not found carry an empty text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionMap {
    sections: Vec<Section>,
}

impl SectionMap {
    pub fn get(&self, label: Label) -> &str {
        self.sections
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.text.as_str())
            .unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }
}

pub fn is_section_heading(dom: &Dom, id: NodeId) -> bool {
    dom.tag(id).is_some_and(|t| SECTION_HEADINGS.contains(&t))
}

/// Find each label's heading and render the siblings up to the next h1-h3.
///
/// A heading claimed by one label is not offered to later labels, so the
/// same content is never counted twice.
pub fn extract_sections(dom: &Dom, vocab: &Vocabulary) -> SectionMap {
    let headings: Vec<(NodeId, String)> = dom
        .descendants(Dom::ROOT)
        .into_iter()
        .filter(|&id| is_section_heading(dom, id))
        .map(|id| (id, dom.text_content(id).to_lowercase()))
        .collect();

    let mut consumed: HashSet<NodeId> = HashSet::new();
    let mut sections = Vec::with_capacity(vocab.entries().len());

    for (label, words) in vocab.entries() {
        let found = headings
            .iter()
            .find(|(id, text)| !consumed.contains(id) && Vocabulary::matches(words, text));

        let text = match found {
            Some(&(id, _)) => {
                consumed.insert(id);
                let body: Vec<NodeId> = dom
                    .following_siblings(id)
                    .iter()
                    .copied()
                    .take_while(|&s| !is_section_heading(dom, s))
                    .collect();
                blocks::render(dom, &body)
            }
            None => {
                warn!(section = label.name(), "heading not found");
                String::new()
            }
        };

        sections.push(Section {
            label: *label,
            text,
        });
    }

    SectionMap { sections }
}

// ── Tests ──
