use std::path::{Path, PathBuf};

use thiserror::Error;

pub const OUTLINE_FILE: &str = "SUMMARY.md";
pub const INDEX_BASENAME: &str = "README.md";
pub const RENAMED_INDEX_BASENAME: &str = "_README.md";

#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("outline file not found: {0}")]
    NotFound(PathBuf),
    #[error("read outline {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("rename {from} -> {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

/// One entry of the navigation outline. The root node is synthetic and owns
/// every top-level entry; entries without a link are grouping labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub title: String,
    pub content_ref: Option<String>,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn root() -> Self {
        Self {
            title: String::new(),
            content_ref: None,
            children: Vec::new(),
        }
    }

    fn entry(title: String, content_ref: Option<String>) -> Self {
        Self {
            title,
            content_ref,
            children: Vec::new(),
        }
    }

    /// Number of nodes below the root (labels included).
    pub fn entry_count(&self) -> usize {
        fn count(node: &OutlineNode) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        self.children.iter().map(count).sum()
    }
}

/// Parses `SUMMARY.md` in `folder` and renames index-convention files on
/// disk as a side effect.
pub fn parse_folder(folder: &Path) -> Result<OutlineNode, OutlineError> {
    let path = folder.join(OUTLINE_FILE);
    if !path.exists() {
        return Err(OutlineError::NotFound(path));
    }
    let contents = std::fs::read_to_string(&path).map_err(|source| OutlineError::Io {
        path: path.clone(),
        source,
    })?;

    let root = parse_lines(contents.lines(), folder)?;
    tracing::info!(
        outline = %path.display(),
        entries = root.entry_count(),
        "parsed outline"
    );
    Ok(root)
}

/// Builds the outline tree from the raw lines of the navigation file.
///
/// Indentation maps to depth at two spaces per level. Depth changes are
/// tracked with an explicit ancestor stack: when a line is no deeper than
/// the stack top, ancestors are popped until the stack top is the parent.
pub fn parse_lines<'a, I>(lines: I, base_folder: &Path) -> Result<OutlineNode, OutlineError>
where
    I: IntoIterator<Item = &'a str>,
{
    // stack[0] is the synthetic root; stack.len() - 1 is the current depth + 1.
    let mut stack: Vec<OutlineNode> = vec![OutlineNode::root()];

    for line in lines {
        let trimmed = line.trim();
        if !trimmed.starts_with('*') && !trimmed.starts_with('-') {
            continue;
        }

        let indent = line.len() - line.trim_start_matches(' ').len();
        let level = indent / 2;

        let content = trimmed
            .trim_start_matches(['*', '-'])
            .trim();
        let node = match parse_link(content) {
            Some((title, href)) => {
                let href = rename_index_file(&href, base_folder)?;
                OutlineNode::entry(title, Some(href))
            }
            None => OutlineNode::entry(content.to_owned(), None),
        };

        while stack.len() > level + 1 {
            let done = stack.pop().unwrap_or_else(OutlineNode::root);
            if let Some(parent) = stack.last_mut() {
                parent.children.push(done);
            }
        }
        stack.push(node);
    }

    while stack.len() > 1 {
        let done = stack.pop().unwrap_or_else(OutlineNode::root);
        if let Some(parent) = stack.last_mut() {
            parent.children.push(done);
        }
    }

    Ok(stack.pop().unwrap_or_else(OutlineNode::root))
}

/// Re-serializes the tree into flat outline lines. Parsing the result yields
/// an identical tree; nodes without children carry no trailing marker.
pub fn to_summary_lines(root: &OutlineNode) -> Vec<String> {
    fn push(node: &OutlineNode, depth: usize, out: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        match &node.content_ref {
            Some(href) => out.push(format!("{indent}* [{}]({href})", node.title)),
            None => out.push(format!("{indent}* {}", node.title)),
        }
        for child in &node.children {
            push(child, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    for child in &root.children {
        push(child, 0, &mut out);
    }
    out
}

fn parse_link(content: &str) -> Option<(String, String)> {
    let open = content.find('[')?;
    let close = content[open..].find(']')? + open;
    let paren = content[close..].find('(')? + close;
    if !content[paren..].contains(')') {
        return None;
    }

    let title = content[open + 1..close].to_owned();
    let href = content[paren + 1..]
        .trim_matches(['>', ')', '<', ' '])
        .to_owned();
    Some((title, href))
}

/// An index-convention file would collide with its directory's own display
/// page in the target schema, so it is renamed once, at parse time. A
/// reference that already points at the renamed file is left alone.
fn rename_index_file(href: &str, base_folder: &Path) -> Result<String, OutlineError> {
    let path = Path::new(href);
    let basename = path.file_name().and_then(|name| name.to_str());
    if !basename.is_some_and(|name| name.eq_ignore_ascii_case(INDEX_BASENAME)) {
        return Ok(href.to_owned());
    }

    let new_ref = match path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => format!(
            "{}/{RENAMED_INDEX_BASENAME}",
            parent.to_string_lossy().replace('\\', "/")
        ),
        None => RENAMED_INDEX_BASENAME.to_owned(),
    };

    let old_path = base_folder.join(href);
    let new_path = base_folder.join(&new_ref);
    if old_path.exists() {
        std::fs::rename(&old_path, &new_path).map_err(|source| OutlineError::Rename {
            from: old_path,
            to: new_path,
            source,
        })?;
        tracing::debug!(from = href, to = %new_ref, "renamed index file");
    }

    Ok(new_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> OutlineNode {
        let dir = tempfile::tempdir().expect("tempdir");
        parse_lines(text.lines(), dir.path()).expect("parse outline")
    }

    #[test]
    fn nested_entries_follow_indentation() {
        let root = parse(
            "# Summary\n\
             * [Intro](intro.md)\n\
             \x20\x20* [Sub](sub/page.md)\n\
             * [Next](next.md)\n",
        );

        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].title, "Intro");
        assert_eq!(root.children[0].content_ref.as_deref(), Some("intro.md"));
        assert_eq!(root.children[0].children.len(), 1);
        assert_eq!(root.children[0].children[0].title, "Sub");
        assert_eq!(root.children[1].title, "Next");
        assert!(root.children[1].children.is_empty());
    }

    #[test]
    fn dedent_by_two_levels_reattaches_to_the_right_ancestor() {
        let root = parse(
            "* [A](a.md)\n\
             \x20\x20* [B](b.md)\n\
             \x20\x20\x20\x20* [C](c.md)\n\
             * [D](d.md)\n",
        );

        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].children[0].children[0].title, "C");
        assert_eq!(root.children[1].title, "D");
    }

    #[test]
    fn line_without_link_becomes_grouping_label() {
        let root = parse(
            "* Getting Started\n\
             \x20\x20* [Install](install.md)\n",
        );

        assert_eq!(root.children[0].title, "Getting Started");
        assert_eq!(root.children[0].content_ref, None);
        assert_eq!(root.children[0].children[0].title, "Install");
    }

    #[test]
    fn angle_bracket_targets_are_trimmed() {
        let root = parse("* [Spaced](<some dir/page.md>)\n");
        assert_eq!(
            root.children[0].content_ref.as_deref(),
            Some("some dir/page.md")
        );
    }

    #[test]
    fn round_trip_is_stable() {
        let text = "* [Intro](intro.md)\n\
                    \x20\x20* Concepts\n\
                    \x20\x20\x20\x20* [Deep](deep/page.md)\n\
                    * [End](end.md)\n";
        let first = parse(text);

        let lines = to_summary_lines(&first);
        let dir = tempfile::tempdir().expect("tempdir");
        let second = parse_lines(lines.iter().map(String::as_str), dir.path())
            .expect("reparse outline");

        assert_eq!(first, second);
    }

    #[test]
    fn index_file_is_renamed_on_disk_and_in_the_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("guide")).expect("mkdir");
        std::fs::write(dir.path().join("guide/README.md"), "# Guide\n").expect("write");

        let root = parse_lines("* [Guide](guide/README.md)".lines(), dir.path())
            .expect("parse outline");

        assert_eq!(
            root.children[0].content_ref.as_deref(),
            Some("guide/_README.md")
        );
        assert!(dir.path().join("guide/_README.md").exists());
        assert!(!dir.path().join("guide/README.md").exists());
    }

    #[test]
    fn index_rename_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("_README.md"), "# Top\n").expect("write");

        // A reference to the already-renamed file must not re-trigger anything.
        let root = parse_lines("* [Top](_README.md)".lines(), dir.path())
            .expect("parse outline");

        assert_eq!(root.children[0].content_ref.as_deref(), Some("_README.md"));
        assert!(dir.path().join("_README.md").exists());
    }

    #[test]
    fn missing_outline_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = parse_folder(dir.path()).unwrap_err();
        assert!(matches!(err, OutlineError::NotFound(_)));
    }
}
