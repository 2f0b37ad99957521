use scraper::Html;

/// Owned, mutable HTML tree. Fragments are parsed through `scraper`
/// (html5ever) and copied into this closed node set so the fixup passes can
/// rewrite structure without fighting the parser's arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: String) {
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((name.to_owned(), value)),
        }
    }

    /// Appends `class` to the class list unless already present.
    pub fn ensure_class(&mut self, class: &str) {
        let classes = self.attr("class").unwrap_or_default();
        if classes.split_whitespace().any(|existing| existing == class) {
            return;
        }
        let merged = if classes.is_empty() {
            class.to_owned()
        } else {
            format!("{classes} {class}")
        };
        self.set_attr("class", merged);
    }

    /// Concatenated descendant text.
    pub fn text(&self) -> String {
        fn collect(nodes: &[Node], out: &mut String) {
            for node in nodes {
                match node {
                    Node::Text(text) => out.push_str(text),
                    Node::Element(el) => collect(&el.children, out),
                }
            }
        }
        let mut out = String::new();
        collect(&self.children, &mut out);
        out
    }

    pub fn has_visible_text(&self) -> bool {
        !self.text().trim().is_empty()
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Parses an HTML fragment into owned nodes. Comments and doctypes are
/// dropped; they never survive the rendering pipeline anyway.
pub fn parse_fragment(html: &str) -> Vec<Node> {
    let fragment = Html::parse_fragment(html);
    let root = fragment.root_element();
    root.children().filter_map(convert_node).collect()
}

fn convert_node(node_ref: ego_tree::NodeRef<'_, scraper::Node>) -> Option<Node> {
    match node_ref.value() {
        scraper::Node::Text(text) => Some(Node::Text(text.to_string())),
        scraper::Node::Element(el) => {
            let mut element = Element::new(&el.name.local);
            for (name, value) in el.attrs() {
                element.attrs.push((name.to_owned(), value.to_owned()));
            }
            element.children = node_ref.children().filter_map(convert_node).collect();
            Some(Node::Element(element))
        }
        _ => None,
    }
}

pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        serialize_node(node, &mut out);
    }
    out
}

fn serialize_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(&escape_text(text)),
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (name, value) in &el.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            if VOID_ELEMENTS.contains(&el.name.as_str()) && el.children.is_empty() {
                out.push_str(" />");
                return;
            }
            out.push('>');
            for child in &el.children {
                serialize_node(child, out);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}

pub fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(input: &str) -> String {
    escape_text(input).replace('"', "&quot;")
}

/// Lenient HTML entity unescape: named entities resolve through the HTML5
/// table, numeric references decode, everything else (including a stray `&`)
/// passes through untouched.
pub fn unescape_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match resolve_entity(tail) {
            Some((replacement, consumed)) => {
                out.push_str(&replacement);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_entity(tail: &str) -> Option<(String, usize)> {
    let semi = tail[1..].find(';')? + 1;
    let name = &tail[1..semi];
    if name.is_empty() || name.len() > 32 || name.contains(['&', ' ', '\n']) {
        return None;
    }

    if let Some(reference) = name.strip_prefix('#') {
        let code = match reference.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => reference.parse::<u32>().ok()?,
        };
        let ch = char::from_u32(code)?;
        return Some((ch.to_string(), semi + 1));
    }

    let resolved = quick_xml::escape::resolve_html5_entity(name)?;
    Some((resolved.to_string(), semi + 1))
}

/// Recursively applies `apply` to every element, depth first.
pub fn for_each_element_mut(nodes: &mut [Node], apply: &mut impl FnMut(&mut Element)) {
    for node in nodes {
        if let Node::Element(el) = node {
            for_each_element_mut(&mut el.children, apply);
            apply(el);
        }
    }
}

/// Recursively applies `apply` to every text node.
pub fn for_each_text_mut(nodes: &mut [Node], apply: &mut impl FnMut(&mut String)) {
    for node in nodes {
        match node {
            Node::Text(text) => apply(text),
            Node::Element(el) => for_each_text_mut(&mut el.children, apply),
        }
    }
}
