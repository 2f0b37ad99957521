use std::fmt::Write as _;
use std::sync::LazyLock;

use pulldown_cmark::{Alignment, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::dom::{self, Node};
use crate::outline;

/// Opening tag substituted for a `{% hint %}` marker. The style value of the
/// marker is discarded and the visual label is always "Note".
pub const HINT_OPEN_TAG: &str = r#"<div class="note"><h3 class="title">Note</h3>"#;
pub const HINT_CLOSE_TAG: &str = "</div>";

static LINE_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\n\\$").expect("line continuation regex"));
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("blank run regex"));
static HINT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{%\s*hint\s+style="(\w+)"\s*%\}"#).expect("hint open regex"));
static HINT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%\s*endhint\s*%\}").expect("hint close regex"));

/// Full per-document pipeline: text normalization, table repair, structural
/// rendering and the HTML fixups that undo the renderer's auto-wrapping.
pub fn render_document(markdown: &str) -> String {
    let normalized = normalize_markdown(markdown);
    let repaired = repair_tables(&normalized);
    let html = render_html(&repaired);
    apply_structural_fixups(&html)
}

/// Pure-text pre-pass. Order matters: markers must be rewritten before
/// entities are unescaped, otherwise entity-encoded markers would slip
/// through.
pub fn normalize_markdown(markdown: &str) -> String {
    let text = LINE_CONTINUATION.replace_all(markdown, "");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    // The blank lines inserted around the rewritten markers keep the marker
    // tags in their own raw blocks, so hint body text still renders as
    // paragraphs.
    let text = HINT_OPEN.replace_all(&text, format!("{HINT_OPEN_TAG}\n"));
    let text = HINT_CLOSE.replace_all(&text, format!("\n{HINT_CLOSE_TAG}"));
    dom::unescape_entities(&text)
}

/// Pads short table rows with trailing pipes and truncates long ones, using
/// the `---` separator row as the source of truth for the column count. The
/// row directly above the separator (the header) is padded too. Idempotent
/// on well-formed tables.
pub fn repair_tables(markdown: &str) -> String {
    let mut corrected: Vec<String> = Vec::new();
    let mut in_table = false;
    let mut header_columns = 0usize;

    for line in markdown.split('\n') {
        if line.contains('|') {
            let pipes = line.matches('|').count();

            if line.contains("---") && !in_table {
                header_columns = pipes;
                in_table = true;
                if let Some(header) = corrected.last_mut() {
                    let header_pipes = header.matches('|').count();
                    if header_pipes < header_columns {
                        header.push_str(&"|".repeat(header_columns - header_pipes));
                    }
                }
                corrected.push(line.to_owned());
            } else if in_table {
                let mut row = line.to_owned();
                if pipes < header_columns {
                    row.push_str(&"|".repeat(header_columns - pipes));
                } else if pipes > header_columns {
                    let parts: Vec<&str> = row.split('|').collect();
                    row = parts[..=header_columns].join("|");
                }
                corrected.push(row);
            } else {
                corrected.push(line.to_owned());
            }
        } else {
            in_table = false;
            corrected.push(line.to_owned());
        }
    }

    corrected.join("\n")
}

/// Local document references must stay valid after the batch conversion:
/// renamed index files and the `.md` -> `.html` extension swap are applied
/// to every in-document link target.
pub fn rewrite_local_href(href: &str) -> String {
    if href.starts_with("http://")
        || href.starts_with("https://")
        || href.starts_with("mailto:")
        || href.starts_with('#')
    {
        return href.to_owned();
    }

    let (path, fragment) = match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    };

    let mut path = path.to_owned();
    let basename_start = path.rfind('/').map_or(0, |idx| idx + 1);
    if path[basename_start..].eq_ignore_ascii_case(outline::INDEX_BASENAME) {
        path.replace_range(basename_start.., outline::RENAMED_INDEX_BASENAME);
    }
    if let Some(stem) = path.strip_suffix(".md") {
        path = format!("{stem}.html");
    }

    match fragment {
        Some(fragment) => format!("{path}#{fragment}"),
        None => path,
    }
}

/// Structural rendering with the schema-specific overrides: paragraph-wrapped
/// list items and table cells, alignment styles on cells, and hint-marker
/// passthrough tracked on a callout stack.
pub fn render_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut writer = HtmlWriter::default();
    for event in Parser::new_ext(markdown, options) {
        writer.event(event);
    }

    if !writer.hint_stack.is_empty() {
        tracing::warn!(
            open = writer.hint_stack.len(),
            "document ended with unclosed hint blocks"
        );
    }

    writer.out
}

#[derive(Default)]
struct HtmlWriter {
    out: String,
    hint_stack: Vec<String>,
    alignments: Vec<Alignment>,
    cell_index: usize,
    in_table_head: bool,
    cell_tag: &'static str,
    item_wrappers: Vec<bool>,
    image_depth: usize,
    paragraph_bare: Vec<bool>,
}

impl HtmlWriter {
    fn event(&mut self, event: Event<'_>) {
        if self.image_depth > 0 {
            // Inside an image: everything collapses into the alt attribute.
            match event {
                Event::Start(Tag::Image { .. }) => self.image_depth += 1,
                Event::End(TagEnd::Image) => {
                    self.image_depth -= 1;
                    if self.image_depth == 0 {
                        self.out.push_str("\" />");
                    }
                }
                Event::Text(text) | Event::Code(text) => {
                    self.out.push_str(&escape_attr(&text));
                }
                _ => {}
            }
            return;
        }

        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.out.push_str(&dom::escape_text(&text)),
            Event::Code(code) => {
                self.out.push_str("<code>");
                self.out.push_str(&dom::escape_text(&code));
                self.out.push_str("</code>");
            }
            Event::Html(html) | Event::InlineHtml(html) => self.raw_html(&html),
            Event::SoftBreak => self.out.push('\n'),
            Event::HardBreak => self.out.push_str("<br />\n"),
            Event::Rule => self.out.push_str("<hr />\n"),
            Event::TaskListMarker(checked) => {
                if checked {
                    self.out
                        .push_str("<input type=\"checkbox\" disabled checked /> ");
                } else {
                    self.out.push_str("<input type=\"checkbox\" disabled /> ");
                }
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                let bare = self.item_wrappers.last().copied() == Some(true);
                self.paragraph_bare.push(bare);
                if !bare {
                    self.out.push_str("<p>");
                }
            }
            Tag::Heading { level, .. } => {
                let _ = write!(self.out, "<{level}>");
            }
            Tag::BlockQuote(_) => self.out.push_str("<blockquote>\n"),
            Tag::CodeBlock(kind) => {
                match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                        let _ = write!(
                            self.out,
                            "<pre><code class=\"language-{}\">",
                            escape_attr(&lang)
                        );
                    }
                    _ => self.out.push_str("<pre><code>"),
                }
            }
            Tag::List(start) => {
                // A nested list ends the item's paragraph wrapper.
                if let Some(open) = self.item_wrappers.last_mut()
                    && *open
                {
                    self.out.push_str("</p>");
                    *open = false;
                }
                match start {
                    Some(1) => self.out.push_str("<ol>\n"),
                    Some(first) => {
                        let _ = write!(self.out, "<ol start=\"{first}\">\n");
                    }
                    None => self.out.push_str("<ul>\n"),
                }
            }
            Tag::Item => {
                self.out.push_str("<li><p>");
                self.item_wrappers.push(true);
            }
            Tag::Table(alignments) => {
                self.alignments = alignments;
                self.out.push_str("<table>");
            }
            Tag::TableHead => {
                self.in_table_head = true;
                self.out.push_str("<thead><tr>");
            }
            Tag::TableRow => {
                self.cell_index = 0;
                self.out.push_str("<tr>");
            }
            Tag::TableCell => {
                self.cell_tag = if self.in_table_head { "th" } else { "td" };
                self.out.push('<');
                self.out.push_str(self.cell_tag);
                let align = match self.alignments.get(self.cell_index) {
                    Some(Alignment::Left) => Some("left"),
                    Some(Alignment::Center) => Some("center"),
                    Some(Alignment::Right) => Some("right"),
                    _ => None,
                };
                if let Some(align) = align {
                    let _ = write!(self.out, " style=\"text-align: {align}\"");
                }
                self.out.push_str("><p>");
            }
            Tag::Emphasis => self.out.push_str("<em>"),
            Tag::Strong => self.out.push_str("<strong>"),
            Tag::Strikethrough => self.out.push_str("<del>"),
            Tag::Link { dest_url, title, .. } => {
                let href = rewrite_local_href(&dest_url);
                let _ = write!(self.out, "<a href=\"{}\"", escape_attr(&href));
                if !title.is_empty() {
                    let _ = write!(self.out, " title=\"{}\"", escape_attr(&title));
                }
                self.out.push('>');
            }
            Tag::Image { dest_url, .. } => {
                let _ = write!(
                    self.out,
                    "<img src=\"{}\" alt=\"",
                    escape_attr(&dest_url)
                );
                self.image_depth = 1;
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                let bare = self.paragraph_bare.pop().unwrap_or(false);
                if bare {
                    self.out.push('\n');
                } else if self.hint_stack.is_empty() {
                    self.out.push_str("</p>\n");
                } else {
                    // Inside a callout the default trailing newline is
                    // omitted, matching the lean nesting of hint bodies.
                    self.out.push_str("</p>");
                }
            }
            TagEnd::Heading(level) => {
                let _ = write!(self.out, "</{level}>\n");
            }
            TagEnd::BlockQuote(_) => self.out.push_str("</blockquote>\n"),
            TagEnd::CodeBlock => self.out.push_str("</code></pre>\n"),
            TagEnd::List(ordered) => {
                if ordered {
                    self.out.push_str("</ol>\n");
                } else {
                    self.out.push_str("</ul>\n");
                }
            }
            TagEnd::Item => {
                if self.item_wrappers.pop() == Some(true) {
                    self.out.push_str("</p></li>\n");
                } else {
                    self.out.push_str("</li>\n");
                }
            }
            TagEnd::Table => self.out.push_str("</tbody></table>\n"),
            TagEnd::TableHead => {
                self.in_table_head = false;
                self.out.push_str("</tr></thead><tbody>\n");
            }
            TagEnd::TableRow => self.out.push_str("</tr>\n"),
            TagEnd::TableCell => {
                self.out.push_str("</p></");
                self.out.push_str(self.cell_tag);
                self.out.push('>');
                self.cell_index += 1;
            }
            TagEnd::Emphasis => self.out.push_str("</em>"),
            TagEnd::Strong => self.out.push_str("</strong>"),
            TagEnd::Strikethrough => self.out.push_str("</del>"),
            TagEnd::Link => self.out.push_str("</a>"),
            _ => {}
        }
    }

    /// Raw blocks carrying the rewritten hint markers maintain the callout
    /// stack; an unmatched close marker is dropped, never an error. Any
    /// other raw markup passes through untouched.
    fn raw_html(&mut self, html: &str) {
        let trimmed = html.trim();
        if trimmed.starts_with(HINT_OPEN_TAG) {
            self.hint_stack.push("note".to_owned());
            self.out.push_str(html);
            return;
        }
        if trimmed == HINT_CLOSE_TAG {
            if self.hint_stack.pop().is_some() {
                self.out.push_str(html);
            }
            return;
        }
        self.out.push_str(html);
    }
}

fn escape_attr(input: &str) -> String {
    dom::escape_text(input).replace('"', "&quot;")
}

/// Tree fixups applied to the freshly rendered HTML: hint wrappers pulled
/// out of paragraphs, `pre`/`code` class markers, empty paragraphs dropped.
pub fn apply_structural_fixups(html: &str) -> String {
    let mut nodes = dom::parse_fragment(html);
    unwrap_hint_wrappers(&mut nodes);
    dom::for_each_element_mut(&mut nodes, &mut fix_pre);
    dom::for_each_element_mut(&mut nodes, &mut fix_code);
    drop_empty_paragraphs(&mut nodes);
    dom::serialize(&nodes)
}

/// A classed `div` that ended up as the child of a paragraph replaces that
/// paragraph (undoes the renderer's auto-wrapping around raw hint tags).
fn unwrap_hint_wrappers(nodes: &mut Vec<Node>) {
    for node in nodes.iter_mut() {
        if let Node::Element(el) = node {
            unwrap_hint_wrappers(&mut el.children);
        }

        let replacement = match node {
            Node::Element(el) if el.name == "p" => {
                let position = el.children.iter().position(|child| {
                    matches!(child, Node::Element(div) if div.name == "div" && div.attr("class").is_some())
                });
                position.map(|idx| el.children.remove(idx))
            }
            _ => None,
        };
        if let Some(div) = replacement {
            *node = div;
        }
    }
}

fn fix_pre(el: &mut crate::dom::Element) {
    if el.name != "pre" {
        return;
    }
    el.ensure_class("programlisting");

    let code_index = el
        .children
        .iter()
        .position(|child| matches!(child, Node::Element(inner) if inner.name == "code"));
    if let Some(idx) = code_index {
        if let Node::Element(code) = el.children.remove(idx) {
            el.children = code.children;
        }
    }
}

fn fix_code(el: &mut crate::dom::Element) {
    if el.name == "code" {
        el.ensure_class("code");
    }
}

fn drop_empty_paragraphs(nodes: &mut Vec<Node>) {
    for node in nodes.iter_mut() {
        if let Node::Element(el) = node {
            drop_empty_paragraphs(&mut el.children);
        }
    }
    nodes.retain(|node| match node {
        Node::Element(el) if el.name == "p" => {
            el.children
                .iter()
                .any(|child| matches!(child, Node::Element(_)))
                || el.has_visible_text()
        }
        _ => true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_backslash_continuations_are_stripped() {
        let out = normalize_markdown("first line\n\\\nsecond line\n");
        assert_eq!(out, "first line\nsecond line\n");
    }

    #[test]
    fn blank_runs_collapse_to_one_blank_line() {
        let out = normalize_markdown("a\n\n\n\nb\n");
        assert_eq!(out, "a\n\nb\n");
    }

    #[test]
    fn hint_markers_become_note_blocks_regardless_of_style() {
        let out = normalize_markdown("{% hint style=\"warning\" %}\ntext\n{% endhint %}\n");
        assert!(out.contains(HINT_OPEN_TAG));
        assert!(out.contains(HINT_CLOSE_TAG));
        assert!(!out.contains("warning"));
    }

    #[test]
    fn entities_are_unescaped_before_structural_parsing() {
        assert_eq!(normalize_markdown("a &amp;lt; b"), "a &lt; b");
    }

    #[test]
    fn short_table_rows_are_padded() {
        let repaired = repair_tables("| A | B |\n|---|---|\n| 1 |");
        assert_eq!(repaired, "| A | B |\n|---|---|\n| 1 ||");
    }

    #[test]
    fn long_table_rows_are_truncated() {
        let repaired = repair_tables("| A | B |\n|---|---|\n| 1 | 2 | 3 | 4 |");
        assert_eq!(repaired, "| A | B |\n|---|---|\n| 1 | 2 |");
    }

    #[test]
    fn short_header_row_is_padded_too() {
        let repaired = repair_tables("| A |\n|---|---|\n| 1 | 2 |");
        assert_eq!(repaired, "| A ||\n|---|---|\n| 1 | 2 |");
    }

    #[test]
    fn table_repair_is_idempotent() {
        let well_formed = "| A | B |\n|---|---|\n| 1 | 2 |\n| 3 | 4 |";
        let once = repair_tables(well_formed);
        assert_eq!(once, well_formed);
        assert_eq!(repair_tables(&once), once);
    }

    #[test]
    fn list_items_wrap_their_content_in_a_paragraph() {
        let html = render_html("* item one\n* item two\n");
        assert!(html.contains("<li><p>item one</p></li>"));
        assert!(html.contains("<li><p>item two</p></li>"));
    }

    #[test]
    fn nested_lists_close_the_item_wrapper_first() {
        let html = render_html("* outer\n  * inner\n");
        assert!(html.contains("<li><p>outer</p><ul>"));
        assert!(html.contains("<li><p>inner</p></li>"));
    }

    #[test]
    fn table_cells_carry_alignment_styles() {
        let html = render_html("| A | B |\n|:--|--:|\n| 1 | 2 |\n");
        assert!(html.contains("<th style=\"text-align: left\"><p>A</p></th>"));
        assert!(html.contains("<td style=\"text-align: right\"><p>2</p></td>"));
    }

    #[test]
    fn local_links_are_rewritten_to_html() {
        assert_eq!(rewrite_local_href("guide/page.md"), "guide/page.html");
        assert_eq!(rewrite_local_href("guide/page.md#part"), "guide/page.html#part");
        assert_eq!(rewrite_local_href("guide/README.md"), "guide/_README.html");
        assert_eq!(rewrite_local_href("https://example.com/page.md"), "https://example.com/page.md");
        assert_eq!(rewrite_local_href("#anchor"), "#anchor");
    }

    #[test]
    fn hint_block_wraps_a_paragraph_without_stray_empties() {
        let html = render_document("{% hint style=\"warning\" %}\ntext\n{% endhint %}\n");
        assert!(html.contains("<div class=\"note\">"));
        assert!(html.contains("<h3 class=\"title\">Note</h3>"));
        assert!(html.contains("<p>text</p>"));
        assert!(!html.contains("<p></p>"));
        assert!(!html.contains("<p> </p>"));
    }

    #[test]
    fn unmatched_close_marker_is_dropped() {
        let html = render_document("plain paragraph\n\n{% endhint %}\n");
        assert!(html.contains("<p>plain paragraph</p>"));
        assert!(!html.contains("</div>"));
    }

    #[test]
    fn fenced_code_blocks_become_classed_pre_without_inner_code() {
        let html = render_document("```rust\nfn main() {}\n```\n");
        assert!(html.contains("<pre class=\"programlisting\">"));
        assert!(html.contains("fn main() {}"));
        assert!(!html.contains("<code"));
    }

    #[test]
    fn inline_code_gains_the_code_class() {
        let html = render_document("use `cargo` here\n");
        assert!(html.contains("<code class=\"code\">cargo</code>"));
    }
}
