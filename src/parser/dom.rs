use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::{Captures, Regex};

use crate::error::DocumentError;

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[A-Za-z][A-Za-z0-9]{1,31});").unwrap());

/// Elements that never take children, whether or not the markup self-closes them.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Block elements whose start implicitly closes an open `<p>`.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre", "section",
    "table", "ul",
];

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena-backed element tree built from loosely formed HTML or
/// Confluence storage-format XML.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
}

impl Dom {
    pub const ROOT: NodeId = 0;

    pub fn parse(markup: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(markup);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.trim_text(false);

        let mut builder = Builder::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let (name, attrs) = element_parts(&e);
                    builder.start(name, attrs, false);
                }
                Ok(Event::Empty(e)) => {
                    let (name, attrs) = element_parts(&e);
                    builder.start(name, attrs, true);
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                    builder.end(&name);
                }
                Ok(Event::Text(e)) => {
                    builder.text(&unescape_lenient(&String::from_utf8_lossy(&e)));
                }
                Ok(Event::CData(e)) => {
                    builder.text(&String::from_utf8_lossy(&e.into_inner()));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(DocumentError::ParseFailure(format!(
                        "{} at byte {}",
                        e,
                        reader.buffer_position()
                    )))
                }
                // comments, doctype, declarations, processing instructions
                Ok(_) => {}
            }
            buf.clear();
        }

        Ok(Dom {
            nodes: builder.nodes,
        })
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Lower-cased tag name, `None` for text and the document root.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// All nodes below `id` in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next].children.iter().rev().copied());
        }
        out
    }

    /// Siblings after `id` under the same parent, in document order.
    pub fn following_siblings(&self, id: NodeId) -> &[NodeId] {
        let Some(parent) = self.nodes[id].parent else {
            return &[];
        };
        let siblings = &self.nodes[parent].children;
        match siblings.iter().position(|&s| s == id) {
            Some(pos) => &siblings[pos + 1..],
            None => &[],
        }
    }

    /// Raw concatenated text below `id`, no whitespace handling.
    pub fn raw_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeKind::Text(t) = &self.nodes[id].kind {
            out.push_str(t);
        }
        for d in self.descendants(id) {
            match &self.nodes[d].kind {
                NodeKind::Text(t) => out.push_str(t),
                NodeKind::Element { name, .. } if name == "br" => out.push('\n'),
                _ => {}
            }
        }
        out
    }

    /// Visible text below `id` with whitespace runs collapsed to one space.
    pub fn text_content(&self, id: NodeId) -> String {
        self.raw_text(id).split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

struct Builder {
    nodes: Vec<Node>,
    open: Vec<NodeId>,
}

impl Builder {
    fn new() -> Self {
        Builder {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            open: vec![Dom::ROOT],
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or(Dom::ROOT)
    }

    fn open_tag(&self, idx: usize) -> Option<&str> {
        match &self.nodes[self.open[idx]].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    fn append(&mut self, kind: NodeKind) -> NodeId {
        let parent = self.current();
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn start(&mut self, name: String, attrs: Vec<(String, String)>, self_closing: bool) {
        if CLOSES_P.contains(&name.as_str()) {
            self.close_innermost("p", &["div", "li", "td", "th", "blockquote", "section"]);
        }
        if name == "li" {
            self.close_innermost("li", &["ul", "ol"]);
        }

        let void = VOID_TAGS.contains(&name.as_str());
        let id = self.append(NodeKind::Element { name, attrs });
        if !self_closing && !void {
            self.open.push(id);
        }
    }

    /// Close the innermost open `tag` unless one of `scope` is opened after it.
    fn close_innermost(&mut self, tag: &str, scope: &[&str]) {
        for idx in (1..self.open.len()).rev() {
            let Some(t) = self.open_tag(idx) else { continue };
            if t == tag {
                self.open.truncate(idx);
                return;
            }
            if scope.contains(&t) {
                return;
            }
        }
    }

    fn end(&mut self, name: &str) {
        if let Some(idx) = (1..self.open.len()).rev().find(|&i| self.open_tag(i) == Some(name)) {
            self.open.truncate(idx);
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        if let Some(&last) = self.nodes[parent].children.last() {
            if let NodeKind::Text(existing) = &mut self.nodes[last].kind {
                existing.push_str(text);
                return;
            }
        }
        self.append(NodeKind::Text(text.to_string()));
    }
}

fn element_parts(e: &BytesStart) -> (String, Vec<(String, String)>) {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    let attrs = e
        .html_attributes()
        .filter_map(Result::ok)
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_ascii_lowercase();
            let value = unescape_lenient(&String::from_utf8_lossy(&a.value));
            (key, value)
        })
        .collect();
    (name, attrs)
}

/// Resolve numeric references and the named entities exports commonly carry.
/// Unknown entities and bare ampersands are kept as written.
pub fn unescape_lenient(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    ENTITY_RE
        .replace_all(raw, |caps: &Captures| {
            let body = &caps[1];
            let resolved = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32).map(String::from)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32).map(String::from)
            } else {
                named_entity(body).map(String::from)
            };
            resolved.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<&'static str> {
    let s = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "bull" => "\u{2022}",
        "middot" => "\u{b7}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "rarr" => "\u{2192}",
        "larr" => "\u{2190}",
        "times" => "\u{d7}",
        "deg" => "\u{b0}",
        _ => return None,
    };
    Some(s)
}

// ── Tests ──
