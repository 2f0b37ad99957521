use crate::dom::{self, Element, Node};

/// Final normalization over a rendered document: heading/table cleanup and
/// the symmetric entity unescape. Pure tree transformation, nothing fatal.
pub fn normalize_document(html: &str) -> String {
    let mut nodes = dom::parse_fragment(html);

    strip_leading_title(&mut nodes);
    drop_textless_table_heads(&mut nodes);
    dom::for_each_element_mut(&mut nodes, &mut |el| {
        if el.name == "table" {
            remove_empty_columns(el);
        }
    });
    dom::for_each_element_mut(&mut nodes, &mut normalize_cell);
    dom::for_each_element_mut(&mut nodes, &mut promote_head_cells);
    dom::for_each_element_mut(&mut nodes, &mut |el| {
        if el.name == "table" {
            add_table_border(el);
        }
    });
    dom::for_each_text_mut(&mut nodes, &mut |text| {
        *text = dom::unescape_entities(text);
    });

    dom::serialize(&nodes)
}

/// The navigation map supplies the document title, so an in-body top-level
/// heading at the very start is redundant and removed.
fn strip_leading_title(nodes: &mut Vec<Node>) {
    let first_element = nodes
        .iter()
        .position(|node| matches!(node, Node::Element(_)));
    if let Some(idx) = first_element
        && matches!(&nodes[idx], Node::Element(el) if el.name == "h1")
    {
        nodes.remove(idx);
    }
}

fn drop_textless_table_heads(nodes: &mut Vec<Node>) {
    for node in nodes.iter_mut() {
        if let Node::Element(el) = node {
            drop_textless_table_heads(&mut el.children);
        }
    }
    nodes.retain(|node| {
        !matches!(node, Node::Element(el) if el.name == "thead" && !el.has_visible_text())
    });
}

fn is_cell(node: &Node) -> bool {
    matches!(node, Node::Element(el) if el.name == "td" || el.name == "th")
}

/// Removes columns whose every cell is blank. The empty-column indices are
/// computed once, before any deletion, and removed from the highest index
/// down so earlier removals cannot shift later ones.
fn remove_empty_columns(table: &mut Element) {
    let mut row_texts: Vec<Vec<bool>> = Vec::new();
    collect_row_cell_flags(&table.children, &mut row_texts);

    let Some(first_row) = row_texts.first() else {
        return;
    };
    let num_cols = first_row.len();
    let mut empty = vec![true; num_cols];
    for row in &row_texts {
        for (idx, has_text) in row.iter().enumerate() {
            if *has_text && idx < num_cols {
                empty[idx] = false;
            }
        }
    }

    if !empty.iter().any(|flag| *flag) {
        return;
    }

    for_each_row_mut(&mut table.children, &mut |row| {
        let cell_positions: Vec<usize> = row
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| is_cell(child))
            .map(|(idx, _)| idx)
            .collect();
        for (col, is_empty) in empty.iter().enumerate().rev() {
            if *is_empty && col < cell_positions.len() {
                row.children.remove(cell_positions[col]);
            }
        }
    });
}

fn collect_row_cell_flags(nodes: &[Node], rows: &mut Vec<Vec<bool>>) {
    for node in nodes {
        if let Node::Element(el) = node {
            if el.name == "tr" {
                let flags = el
                    .children
                    .iter()
                    .filter_map(|child| match child {
                        Node::Element(cell) if is_cell(child) => Some(cell.has_visible_text()),
                        _ => None,
                    })
                    .collect();
                rows.push(flags);
            } else {
                collect_row_cell_flags(&el.children, rows);
            }
        }
    }
}

fn for_each_row_mut(nodes: &mut [Node], apply: &mut impl FnMut(&mut Element)) {
    for node in nodes {
        if let Node::Element(el) = node {
            if el.name == "tr" {
                apply(el);
            } else {
                for_each_row_mut(&mut el.children, apply);
            }
        }
    }
}

/// Plain-text cells get their text wrapped in a paragraph, whitespace-only
/// cells are emptied, and code or preformatted blocks inside a cell are
/// demoted to paragraphs.
fn normalize_cell(el: &mut Element) {
    if el.name != "td" && el.name != "th" {
        return;
    }

    let has_element_child = el
        .children
        .iter()
        .any(|child| matches!(child, Node::Element(_)));
    if !el.children.is_empty() && !has_element_child {
        let text = el.text().trim().to_owned();
        if text.is_empty() {
            el.children.clear();
        } else {
            let mut paragraph = Element::new("p");
            paragraph.children.push(Node::Text(text));
            el.children = vec![Node::Element(paragraph)];
        }
    }

    dom::for_each_element_mut(&mut el.children, &mut |inner| {
        if inner.name == "code" || inner.name == "pre" {
            inner.name = "p".to_owned();
            inner.attrs.clear();
        }
    });
}

/// Data cells inside a table header section become header cells, keeping
/// attributes and content.
fn promote_head_cells(el: &mut Element) {
    if el.name != "thead" {
        return;
    }
    dom::for_each_element_mut(&mut el.children, &mut |cell| {
        if cell.name == "td" {
            cell.name = "th".to_owned();
        }
    });
}

fn add_table_border(table: &mut Element) {
    let has_head = table
        .children
        .iter()
        .any(|child| matches!(child, Node::Element(el) if el.name == "thead"));
    if !has_head {
        return;
    }
    let existing = table.attr("style").unwrap_or_default().to_owned();
    table.set_attr(
        "style",
        format!("{existing} border-top: 0.5px solid #000000 !important;"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_top_level_heading_is_removed() {
        let out = normalize_document("<h1>Title</h1><p>body</p>");
        assert!(!out.contains("<h1>"));
        assert!(out.contains("<p>body</p>"));
    }

    #[test]
    fn non_leading_heading_survives() {
        let out = normalize_document("<p>intro</p><h1>Title</h1>");
        assert!(out.contains("<h1>Title</h1>"));
    }

    #[test]
    fn textless_table_head_is_dropped() {
        let out = normalize_document(
            "<table><thead><tr><th></th><th> </th></tr></thead>\
             <tbody><tr><td>x</td><td>y</td></tr></tbody></table>",
        );
        assert!(!out.contains("<thead>"));
        assert!(out.contains("<td><p>x</p></td>"));
    }

    #[test]
    fn columns_blank_in_every_row_are_removed() {
        // Columns [A, "", C, ""] must reduce to [A, C].
        let out = normalize_document(
            "<table><thead><tr><th>A</th><th></th><th>C</th><th></th></tr></thead>\
             <tbody>\
             <tr><td>1</td><td></td><td>3</td><td></td></tr>\
             <tr><td>4</td><td></td><td>6</td><td></td></tr>\
             </tbody></table>",
        );
        assert_eq!(out.matches("<th>").count(), 2);
        assert!(out.contains("A"));
        assert!(out.contains("C"));
        assert_eq!(out.matches("<td").count(), 4);
        assert!(!out.contains("<td></td>"));
    }

    #[test]
    fn column_with_any_text_is_kept() {
        let out = normalize_document(
            "<table><tbody>\
             <tr><td>a</td><td></td></tr>\
             <tr><td>b</td><td>present</td></tr>\
             </tbody></table>",
        );
        assert_eq!(out.matches("<td").count(), 4);
        assert!(out.contains("present"));
    }

    #[test]
    fn plain_text_cells_are_wrapped_in_paragraphs() {
        let out = normalize_document("<table><tbody><tr><td> raw text </td></tr></tbody></table>");
        assert!(out.contains("<td><p>raw text</p></td>"));
    }

    #[test]
    fn whitespace_only_cells_are_emptied() {
        let out = normalize_document(
            "<table><tbody>\
             <tr><td>keep</td><td>x</td></tr>\
             <tr><td>  </td><td>y</td></tr>\
             </tbody></table>",
        );
        assert!(out.contains("<td></td>"));
        assert!(out.contains("<td><p>keep</p></td>"));
    }

    #[test]
    fn code_inside_cells_is_demoted_to_paragraphs() {
        let out = normalize_document(
            "<table><tbody><tr><td><code class=\"code\">let x</code></td></tr></tbody></table>",
        );
        assert!(out.contains("<td><p>let x</p></td>"));
        assert!(!out.contains("<code"));
    }

    #[test]
    fn head_data_cells_become_header_cells() {
        let out = normalize_document(
            "<table><thead><tr><td style=\"text-align: left\">H</td></tr></thead>\
             <tbody><tr><td>b</td></tr></tbody></table>",
        );
        assert!(out.contains("<th style=\"text-align: left\""));
    }

    #[test]
    fn tables_with_a_head_get_a_top_border() {
        let out = normalize_document(
            "<table><thead><tr><th>H</th></tr></thead>\
             <tbody><tr><td>b</td></tr></tbody></table>",
        );
        assert!(out.contains("border-top: 0.5px solid #000000 !important;"));
    }

    #[test]
    fn headless_tables_get_no_border() {
        let out = normalize_document("<table><tbody><tr><td>b</td></tr></tbody></table>");
        assert!(!out.contains("border-top"));
    }

    #[test]
    fn double_escaped_entities_collapse() {
        let out = normalize_document("<p>a &amp;amp; b</p>");
        assert!(out.contains("a &amp; b"));
    }
}
