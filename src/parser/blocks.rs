use std::sync::LazyLock;

use regex::Regex;

use super::dom::{Dom, NodeId, NodeKind};

static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Content that renders to nothing.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "head", "title", "noscript", "template", "ac:parameter",
];

/// Elements rendered as their own paragraph-level container.
const CONTAINER_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "body", "html", "header", "footer", "nav", "aside",
    "figure", "figcaption", "dl", "dt", "dd", "details", "summary", "form", "fieldset", "address",
    "ac:rich-text-body", "ac:layout", "ac:layout-section", "ac:layout-cell",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    /// `body` is the item's own rendered markdown, nested lists included.
    ListItem { marker: String, body: String },
    Code { lang: Option<String>, body: String },
    Quote(String),
    Table(Vec<Vec<String>>),
    Rule,
}

struct ListFrame {
    ordered: bool,
    next: usize,
}

/// Walks a node range, turning block elements into `Block`s and
/// buffering inline content until the next block boundary.
struct Renderer<'a> {
    dom: &'a Dom,
    blocks: Vec<Block>,
    inline: String,
    lists: Vec<ListFrame>,
}

impl<'a> Renderer<'a> {
    fn new(dom: &'a Dom) -> Self {
        Renderer {
            dom,
            blocks: Vec::new(),
            inline: String::new(),
            lists: Vec::new(),
        }
    }

    fn walk(&mut self, id: NodeId) {
        let dom = self.dom;
        let name = match &dom.node(id).kind {
            NodeKind::Text(t) => {
                let collapsed = WS_RE.replace_all(t, " ");
                self.push_inline(&collapsed);
                return;
            }
            NodeKind::Document => {
                self.walk_children(id);
                return;
            }
            NodeKind::Element { name, .. } => name.as_str(),
        };

        match name {
            n if SKIPPED_TAGS.contains(&n) => {}
            "br" => self.inline.push('\n'),
            "hr" => {
                self.flush();
                self.blocks.push(Block::Rule);
            }
            "img" => {
                if let Some(src) = dom.attr(id, "src") {
                    let alt = dom.attr(id, "alt").unwrap_or("");
                    self.push_inline(&format!("![{}]({})", alt, src));
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                let level = name.as_bytes()[1] - b'0';
                let text = single_line(&self.inline_of(id));
                if !text.is_empty() {
                    self.blocks.push(Block::Heading { level, text });
                }
            }
            "ul" | "ol" => {
                self.flush();
                self.lists.push(ListFrame {
                    ordered: name == "ol",
                    next: 1,
                });
                self.walk_children(id);
                self.flush();
                self.lists.pop();
            }
            "li" => {
                self.flush();
                let marker = self.next_marker();
                let mut item = self.nested(id);
                item.flush();
                let body = join_blocks(&item.blocks, true);
                if !body.is_empty() {
                    self.blocks.push(Block::ListItem { marker, body });
                }
            }
            "pre" | "ac:plain-text-body" => {
                self.flush();
                let body = dom.raw_text(id).trim_matches('\n').to_string();
                if !body.trim().is_empty() {
                    let lang = self.code_lang(id);
                    self.blocks.push(Block::Code { lang, body });
                }
            }
            "blockquote" => {
                self.flush();
                let quoted = render(dom, dom.children(id));
                if !quoted.is_empty() {
                    self.blocks.push(Block::Quote(quoted));
                }
            }
            "table" => {
                self.flush();
                let rows = self.table_rows(id);
                if !rows.is_empty() {
                    self.blocks.push(Block::Table(rows));
                }
            }
            "strong" | "b" => self.wrap_inline(id, "**"),
            "em" | "i" => self.wrap_inline(id, "*"),
            "s" | "del" | "strike" => self.wrap_inline(id, "~~"),
            "code" | "tt" | "kbd" | "samp" => {
                let text = dom.text_content(id);
                if !text.is_empty() {
                    self.push_inline(&format!("`{}`", text));
                }
            }
            "a" => {
                let text = single_line(&self.inline_of(id));
                match dom.attr(id, "href") {
                    Some(href) if !text.is_empty() && !href.starts_with('#') => {
                        self.push_inline(&format!("[{}]({})", text, href));
                    }
                    _ => self.push_inline(&text),
                }
            }
            n if CONTAINER_TAGS.contains(&n) => {
                self.flush();
                self.walk_children(id);
                self.flush();
            }
            // span, font, ac:* wrappers and anything unknown: transparent
            _ => self.walk_children(id),
        }
    }

    fn walk_children(&mut self, id: NodeId) {
        for &child in self.dom.children(id) {
            self.walk(child);
        }
    }

    fn push_inline(&mut self, text: &str) {
        let at_boundary = self.inline.is_empty() || self.inline.ends_with([' ', '\n']);
        let text = if at_boundary { text.trim_start() } else { text };
        self.inline.push_str(text);
    }

    /// Fresh renderer over the children of `id`, left unflushed.
    fn nested(&self, id: NodeId) -> Renderer<'a> {
        let mut r = Renderer::new(self.dom);
        r.walk_children(id);
        r
    }

    /// Children of `id` as inline text. Block children (a `<p>` in a table
    /// cell, a `<div>` in a link) are rendered in place, never into `self`.
    fn inline_of(&self, id: NodeId) -> String {
        let mut r = self.nested(id);
        if r.blocks.is_empty() {
            return r.inline;
        }
        r.flush();
        join_blocks(&r.blocks, false)
    }

    fn wrap_inline(&mut self, id: NodeId, marker: &str) {
        let inner = self.inline_of(id);
        let trimmed = inner.trim();
        if trimmed.is_empty() {
            self.push_inline(&inner);
            return;
        }
        if inner.starts_with(char::is_whitespace) {
            self.push_inline(" ");
        }
        self.push_inline(&format!("{marker}{trimmed}{marker}"));
        if inner.ends_with(char::is_whitespace) {
            self.push_inline(" ");
        }
    }

    fn flush(&mut self) {
        let text = clean_lines(&self.inline);
        self.inline.clear();
        if !text.is_empty() {
            self.blocks.push(Block::Paragraph(text));
        }
    }

    fn next_marker(&mut self) -> String {
        match self.lists.last_mut() {
            Some(frame) if frame.ordered => {
                let marker = format!("{}.", frame.next);
                frame.next += 1;
                marker
            }
            _ => "-".to_string(),
        }
    }

    fn code_lang(&self, id: NodeId) -> Option<String> {
        let from_class = |node: NodeId| {
            self.dom.attr(node, "class").and_then(|class| {
                class
                    .split_whitespace()
                    .find_map(|c| c.strip_prefix("language-").or_else(|| c.strip_prefix("lang-")))
                    .map(str::to_string)
            })
        };
        if let Some(lang) = from_class(id) {
            return Some(lang);
        }
        if let Some(&code) = self
            .dom
            .children(id)
            .iter()
            .find(|&&c| self.dom.tag(c) == Some("code"))
        {
            return from_class(code);
        }
        // Confluence code macro: <ac:parameter ac:name="language">rust</ac:parameter>
        let parent = self.dom.node(id).parent?;
        self.dom
            .children(parent)
            .iter()
            .find(|&&c| {
                self.dom.tag(c) == Some("ac:parameter") && self.dom.attr(c, "ac:name") == Some("language")
            })
            .map(|&c| self.dom.text_content(c))
            .filter(|l| !l.is_empty())
    }

    fn table_rows(&self, table: NodeId) -> Vec<Vec<String>> {
        let rows: Vec<NodeId> = self
            .dom
            .descendants(table)
            .into_iter()
            .filter(|&d| self.dom.tag(d) == Some("tr"))
            .collect();
        let mut out = Vec::new();
        for row in rows {
            let cells: Vec<NodeId> = self
                .dom
                .children(row)
                .iter()
                .copied()
                .filter(|&c| matches!(self.dom.tag(c), Some("td") | Some("th")))
                .collect();
            let texts: Vec<String> = cells
                .into_iter()
                .map(|c| single_line(&self.inline_of(c)).replace('|', "\\|"))
                .collect();
            if !texts.is_empty() {
                out.push(texts);
            }
        }
        out
    }
}

/// Collect blocks for a run of sibling nodes.
pub fn collect_blocks(dom: &Dom, nodes: &[NodeId]) -> Vec<Block> {
    let mut r = Renderer::new(dom);
    for &id in nodes {
        r.walk(id);
    }
    r.flush();
    r.blocks
}

/// Render a run of sibling nodes to normalized markdown.
pub fn render(dom: &Dom, nodes: &[NodeId]) -> String {
    to_markdown(&collect_blocks(dom, nodes))
}

pub fn to_markdown(blocks: &[Block]) -> String {
    join_blocks(blocks, false)
}

/// Blocks separated by a blank line; consecutive list items stay tight.
/// Inside a list item a nested list follows its lead paragraph directly.
fn join_blocks(blocks: &[Block], in_item: bool) -> String {
    let mut out = String::new();
    let mut prev: Option<&Block> = None;

    for block in blocks {
        if let Some(p) = prev {
            let tight = matches!(block, Block::ListItem { .. })
                && (matches!(p, Block::ListItem { .. })
                    || (in_item && matches!(p, Block::Paragraph(_))));
            out.push_str(if tight { "\n" } else { "\n\n" });
        }
        out.push_str(&block_markdown(block));
        prev = Some(block);
    }
    out
}

fn block_markdown(block: &Block) -> String {
    match block {
        Block::Heading { level, text } => format!("{} {}", "#".repeat(*level as usize), text),
        Block::Paragraph(text) => normalize(text),
        Block::ListItem { marker, body } => {
            let hang = " ".repeat(marker.chars().count() + 1);
            let mut lines = body.lines();
            let mut out = format!("{} {}", marker, lines.next().unwrap_or(""));
            for line in lines {
                out.push('\n');
                if !line.is_empty() {
                    out.push_str(&hang);
                    out.push_str(line);
                }
            }
            out
        }
        // verbatim, no whitespace cleanup
        Block::Code { lang, body } => {
            format!("```{}\n{}\n```", lang.as_deref().unwrap_or(""), body)
        }
        Block::Quote(text) => text
            .lines()
            .map(|l| if l.is_empty() { ">".to_string() } else { format!("> {}", l) })
            .collect::<Vec<_>>()
            .join("\n"),
        Block::Table(rows) => {
            let mut out = Vec::with_capacity(rows.len() + 1);
            for (i, row) in rows.iter().enumerate() {
                out.push(format!("| {} |", row.join(" | ")));
                if i == 0 {
                    out.push(format!("| {} |", vec!["---"; row.len()].join(" | ")));
                }
            }
            out.join("\n")
        }
        Block::Rule => "---".to_string(),
    }
}

/// Strip trailing whitespace per line, collapse blank-line runs, trim.
pub fn normalize(text: &str) -> String {
    let stripped: Vec<&str> = text.lines().map(str::trim_end).collect();
    let joined = stripped.join("\n");
    BLANK_RUN_RE.replace_all(&joined, "\n\n").trim().to_string()
}

fn clean_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ──
