// PodFetch - Podcast Episode Download Client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Structured fragments
//!
//! Pages build [`Node`] trees instead of HTML strings. Text and attribute
//! values are escaped when the tree is serialized, so server-provided titles
//! and descriptions can never inject markup.
//!
//! Two outputs:
//! - [`Node::to_html`] - escaped HTML
//! - [`Node::to_text`] - plain text for terminals
//!
//! ```
//! use podfetch_core::render::{el, Node};
//!
//! let node: Node = el("h4").text("<b>Title</b>").into();
//! assert_eq!(node.to_html(), "<h4>&lt;b&gt;Title&lt;/b&gt;</h4>");
//! ```

/// Tags without a closing tag
const VOID_TAGS: &[&str] = &["img", "input", "br", "hr"];

/// Tags that start a new line in text output
const BLOCK_TAGS: &[&str] = &[
    "div", "p", "h1", "h2", "h3", "h4", "h5", "ul", "section", "header", "details", "label",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Sequence without a wrapping element
    Fragment(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: &'static str,
    attrs: Vec<(&'static str, String)>,
    children: Vec<Node>,
}

/// Start an element
pub fn el(tag: &'static str) -> Element {
    Element::new(tag)
}

/// Text node
pub fn text<S: Into<String>>(value: S) -> Node {
    Node::Text(value.into())
}

/// Nodes rendered side by side
pub fn fragment<I>(nodes: I) -> Node
where
    I: IntoIterator,
    I::Item: Into<Node>,
{
    Node::Fragment(nodes.into_iter().map(Into::into).collect())
}

impl Element {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        self.tag
    }

    pub fn attr<S: Into<String>>(mut self, name: &'static str, value: S) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    /// Boolean attribute, only set when `on`
    pub fn flag(self, name: &'static str, on: bool) -> Self {
        if on {
            self.attr(name, "")
        } else {
            self
        }
    }

    pub fn class<S: Into<String>>(self, value: S) -> Self {
        self.attr("class", value)
    }

    pub fn id<S: Into<String>>(self, value: S) -> Self {
        self.attr("id", value)
    }

    pub fn child<N: Into<Node>>(mut self, node: N) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children<I>(mut self, nodes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(nodes.into_iter().map(Into::into));
        self
    }

    pub fn text<S: Into<String>>(self, value: S) -> Self {
        self.child(Node::Text(value.into()))
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(n, _)| *n == name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .map(|c| c.split_whitespace().any(|part| part == class))
            .unwrap_or(false)
    }

    /// Concatenated text of all descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Text(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Text(value.to_string())
    }
}

impl Node {
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(value) => escape_into(value, out),
            Node::Fragment(nodes) => nodes.iter().for_each(|n| n.write_html(out)),
            Node::Element(element) => {
                out.push('<');
                out.push_str(element.tag);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        escape_into(value, out);
                        out.push('"');
                    }
                }
                out.push('>');
                if VOID_TAGS.contains(&element.tag) {
                    return;
                }
                for child in &element.children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(element.tag);
                out.push('>');
            }
        }
    }

    /// Plain text rendering; controls appear as `[label]`
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out);

        // collapse blank runs left by nested blocks
        let mut lines: Vec<&str> = Vec::new();
        for line in out.lines().map(str::trim_end) {
            if line.trim().is_empty() && lines.last().map_or(true, |l| l.trim().is_empty()) {
                continue;
            }
            lines.push(line);
        }
        while lines.last().map_or(false, |l| l.trim().is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }

    fn write_text(&self, out: &mut String) {
        match self {
            Node::Text(value) => out.push_str(value),
            Node::Fragment(nodes) => nodes.iter().for_each(|n| n.write_text(out)),
            Node::Element(element) => element.write_text(out),
        }
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(value) => out.push_str(value),
            Node::Fragment(nodes) => nodes.iter().for_each(|n| n.collect_text(out)),
            Node::Element(element) => element.children.iter().for_each(|n| n.collect_text(out)),
        }
    }

    /// Every element in the tree matching `pred`, document order
    pub fn find_all<P>(&self, pred: P) -> Vec<&Element>
    where
        P: Fn(&Element) -> bool,
    {
        let mut found = Vec::new();
        self.walk(&pred, &mut found);
        found
    }

    fn walk<'a, P>(&'a self, pred: &P, found: &mut Vec<&'a Element>)
    where
        P: Fn(&Element) -> bool,
    {
        match self {
            Node::Text(_) => {}
            Node::Fragment(nodes) => nodes.iter().for_each(|n| n.walk(pred, found)),
            Node::Element(element) => {
                if pred(element) {
                    found.push(element);
                }
                element.children.iter().for_each(|n| n.walk(pred, found));
            }
        }
    }

    pub fn find_by_class(&self, class: &str) -> Vec<&Element> {
        self.find_all(|e| e.has_class(class))
    }
}

impl Element {
    fn write_text(&self, out: &mut String) {
        let is_block = BLOCK_TAGS.contains(&self.tag);
        if is_block && !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }

        match self.tag {
            "br" => out.push('\n'),
            "img" => {
                let src = self.get_attr("src").unwrap_or("");
                let alt = self.get_attr("alt").unwrap_or("image");
                out.push_str(&format!("[{}: {}]", alt, src));
            }
            "input" if self.get_attr("type") == Some("checkbox") => {
                out.push_str(if self.has_attr("checked") { "[x] " } else { "[ ] " });
            }
            "button" | "a" => {
                let label = self.text_content();
                if self.has_attr("disabled") {
                    out.push_str(&format!("[{} (disabled)]", label.trim()));
                } else {
                    out.push_str(&format!("[{}]", label.trim()));
                }
                out.push(' ');
            }
            "progress" => {
                let value: f64 = self.get_attr("value").and_then(|v| v.parse().ok()).unwrap_or(0.0);
                let max: f64 = self.get_attr("max").and_then(|v| v.parse().ok()).unwrap_or(100.0);
                out.push_str(&progress_bar(value, max));
            }
            "option" => {
                let label = self.text_content();
                if self.has_attr("selected") {
                    out.push_str(&format!(" *{}*", label));
                } else {
                    out.push_str(&format!(" {}", label));
                }
            }
            "li" => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("- ");
                self.children.iter().for_each(|n| n.write_text(out));
                out.push('\n');
            }
            _ => {
                // collapsed details are not shown
                if self.tag == "details" && !self.has_attr("open") {
                    self.children
                        .iter()
                        .filter(|n| matches!(n, Node::Element(e) if e.tag == "summary"))
                        .for_each(|n| n.write_text(out));
                } else {
                    self.children.iter().for_each(|n| n.write_text(out));
                }
            }
        }

        if is_block && !out.ends_with('\n') {
            out.push('\n');
        }
    }
}

/// Twenty-cell ASCII bar with a percentage
pub fn progress_bar(value: f64, max: f64) -> String {
    let ratio = if max > 0.0 { (value / max).clamp(0.0, 1.0) } else { 0.0 };
    let filled = (ratio * 20.0).round() as usize;
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        "-".repeat(20 - filled),
        (ratio * 100.0).round() as u32
    )
}

/// Escape text for HTML content and attribute values
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    escape_into(value, &mut out);
    out
}

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_attributes_are_escaped() {
        let node: Node = el("div")
            .class("episode-item")
            .attr("title", "a\"b")
            .child(el("h5").text("<script>alert(1)</script>"))
            .child(el("p").text("Tom & Jerry's"))
            .into();
        assert_eq!(
            node.to_html(),
            "<div class=\"episode-item\" title=\"a&quot;b\"><h5>&lt;script&gt;alert(1)&lt;/script&gt;</h5>\
             <p>Tom &amp; Jerry&#39;s</p></div>"
        );
    }

    #[test]
    fn test_void_and_boolean_attributes() {
        let node: Node = el("input").attr("type", "checkbox").flag("checked", true).into();
        assert_eq!(node.to_html(), "<input type=\"checkbox\" checked>");

        let node: Node = el("button").flag("disabled", false).text("Go").into();
        assert_eq!(node.to_html(), "<button>Go</button>");
    }

    #[test]
    fn test_text_output() {
        let node: Node = el("div")
            .child(el("h4").text("Feeds"))
            .child(
                el("div")
                    .class("subscription-item")
                    .child(el("h4").text("Daily News"))
                    .child(el("button").text("View episodes")),
            )
            .child(el("span").flag("disabled", true).text("x"))
            .into();
        assert_eq!(node.to_text(), "Feeds\nDaily News\n[View episodes]\nx");
    }

    #[test]
    fn test_disabled_button_text() {
        let node: Node = el("button").flag("disabled", true).text("No download link").into();
        assert_eq!(node.to_text(), "[No download link (disabled)]");
    }

    #[test]
    fn test_collapsed_details_hide_content() {
        let details = |open: bool| -> Node {
            el("details")
                .flag("open", open)
                .child(el("summary").text("Details"))
                .child(el("p").text("secret"))
                .into()
        };
        assert!(!details(false).to_text().contains("secret"));
        assert!(details(true).to_text().contains("secret"));
        // HTML always carries the content
        assert!(details(false).to_html().contains("secret"));
    }

    #[test]
    fn test_find_by_class() {
        let node = fragment(vec![
            el("div").class("episode-item selected"),
            el("div").class("episode-item"),
            el("div").class("other"),
        ]);
        assert_eq!(node.find_by_class("episode-item").len(), 2);
        assert_eq!(node.find_by_class("selected").len(), 1);
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(1.0, 2.0), "[##########----------] 50%");
        assert_eq!(progress_bar(3.0, 0.0), "[--------------------] 0%");
    }
}
