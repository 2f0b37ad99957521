use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

use crate::cli::{MapArgs, MapProfile};
use crate::config::Config;
use crate::outline::{self, OutlineNode, RENAMED_INDEX_BASENAME};

pub const MAP_FILE: &str = "SUMMARY.ftmap";
pub const METADATA_FILE: &str = "metadata.yaml";

const FT_NAMESPACE: &str = "http://ref.fluidtopics.com/v3/ft#";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Optional sidecar supplying extra per-node metadata, keyed by the node's
/// content reference as it appears in the outline.
#[derive(Debug, Default, Deserialize)]
struct MetadataFile {
    #[serde(default)]
    metadata: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone)]
pub struct MapOptions {
    pub title: String,
    pub profile: MapProfile,
    pub metadata: BTreeMap<String, BTreeMap<String, String>>,
}

impl MapOptions {
    pub fn new(title: String, profile: MapProfile) -> Self {
        Self {
            title,
            profile,
            metadata: BTreeMap::new(),
        }
    }
}

pub fn run(args: MapArgs) -> anyhow::Result<()> {
    let config = Config::from_env();
    let docs = config.docs_folder(args.docs.as_deref())?;
    let title = config.publication_title(args.title.as_deref())?;

    let root = outline::parse_folder(&docs)?;
    let mut options = MapOptions::new(title, args.profile);
    options.metadata = load_metadata(&docs)?;

    write_map(&root, &docs, &options)
}

/// Builds the map and writes it to `SUMMARY.ftmap` at the tree root.
pub fn write_map(root: &OutlineNode, folder: &Path, options: &MapOptions) -> anyhow::Result<()> {
    let map = build_map(root, options);
    let path = folder.join(MAP_FILE);
    std::fs::write(&path, map).with_context(|| format!("write map: {}", path.display()))?;
    tracing::info!(map = %path.display(), title = %options.title, "built navigation map");
    Ok(())
}

pub fn load_metadata(folder: &Path) -> anyhow::Result<BTreeMap<String, BTreeMap<String, String>>> {
    let path = folder.join(METADATA_FILE);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("read metadata: {}", path.display()))?;
    let file: MetadataFile = serde_yaml::from_str(&raw)
        .with_context(|| format!("parse metadata: {}", path.display()))?;
    Ok(file.metadata)
}

/// Serializes the outline tree as a tab-indented `ft:map` document. Origin
/// identifiers come from one shared counter, consumed in pre-order for every
/// visited node, grouping labels included; the root is always 0.
pub fn build_map(root: &OutlineNode, options: &MapOptions) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "<ft:map xmlns:ft=\"{FT_NAMESPACE}\" xmlns:xsi=\"{XSI_NAMESPACE}\" \
         xsi:noNamespaceSchemaLocation=\"ftmap.xsd\" ft:lang=\"en-US\" \
         ft:title=\"{}\" ft:originID=\"0\" ft:editorialType=\"book\">\n",
        xml_escape(&options.title)
    ));
    out.push_str("\t<ft:toc>\n");

    let mut next_origin = 1u64;
    for child in &root.children {
        write_node(child, options, 2, &mut next_origin, &mut out);
    }

    out.push_str("\t</ft:toc>\n");
    out.push_str("</ft:map>\n");
    out
}

fn write_node(
    node: &OutlineNode,
    options: &MapOptions,
    depth: usize,
    next_origin: &mut u64,
    out: &mut String,
) {
    let indent = "\t".repeat(depth);
    let origin = *next_origin;
    *next_origin += 1;

    out.push_str(&indent);
    out.push_str(&format!(
        "<ft:node ft:originId=\"{origin}\" ft:title=\"{}\"",
        xml_escape(&node.title)
    ));
    if let Some(href) = &node.content_ref {
        out.push_str(&format!(" href=\"{}\"", xml_escape(&link_target(href))));
    }

    let metas = match options.profile {
        MapProfile::Plain => Vec::new(),
        MapProfile::Metadata => node_metas(node, options),
    };

    if metas.is_empty() && node.children.is_empty() {
        out.push_str(" />\n");
        return;
    }
    out.push_str(">\n");

    if !metas.is_empty() {
        out.push_str(&indent);
        out.push_str("\t<ft:metas>\n");
        for (key, value) in &metas {
            out.push_str(&indent);
            out.push_str(&format!(
                "\t\t<ft:meta key=\"{}\">{}</ft:meta>\n",
                xml_escape(key),
                xml_escape(value)
            ));
        }
        out.push_str(&indent);
        out.push_str("\t</ft:metas>\n");
    }

    for child in &node.children {
        write_node(child, options, depth + 1, next_origin, out);
    }

    out.push_str(&indent);
    out.push_str("</ft:node>\n");
}

fn node_metas(node: &OutlineNode, options: &MapOptions) -> Vec<(String, String)> {
    let mut metas = Vec::new();
    if let Some(href) = &node.content_ref {
        metas.push(("topicUrl".to_owned(), topic_url(&options.title, href)));
        if let Some(extra) = options.metadata.get(href) {
            for (key, value) in extra {
                metas.push((key.clone(), value.clone()));
            }
        }
    }
    metas
}

/// Content references keep their relative path but point at the rendered
/// document.
fn link_target(href: &str) -> String {
    match href.strip_suffix(".md") {
        Some(stem) => format!("{stem}.html"),
        None => href.to_owned(),
    }
}

/// Pretty URL slug: publication title and content path lowercased and
/// dash-joined; an index-convention segment is emptied rather than kept
/// literal.
fn topic_url(title: &str, href: &str) -> String {
    let safe_title = title.replace(' ', "-").to_lowercase();
    let stem = href.strip_suffix(".md").unwrap_or(href);
    let safe_href = stem
        .replace(' ', "-")
        .replace(RENAMED_INDEX_BASENAME.trim_end_matches(".md"), "")
        .replace("README", "")
        .to_lowercase();
    format!("{safe_title}/{safe_href}")
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
