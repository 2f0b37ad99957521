use std::path::{Path, PathBuf};

use anyhow::Context as _;
use walkdir::WalkDir;

use crate::cli::ConvertArgs;
use crate::config::Config;
use crate::{postprocess, render};

pub fn run(args: ConvertArgs) -> anyhow::Result<()> {
    let config = Config::from_env();
    let docs = config.docs_folder(args.docs.as_deref())?;
    convert_all(&docs)
}

/// Converts every Markdown document under `folder` in place: the rendered
/// HTML replaces the source file next to it and the source is removed. The
/// outline file is no exception; it must be parsed before this runs. The file
/// list is collected before any conversion so deletions cannot disturb the
/// walk. Any failure aborts the batch.
pub fn convert_all(folder: &Path) -> anyhow::Result<()> {
    let sources = collect_markdown(folder)?;
    tracing::info!(folder = %folder.display(), count = sources.len(), "converting documents");

    for source in &sources {
        convert_file(source).with_context(|| format!("convert {}", source.display()))?;
    }
    Ok(())
}

fn collect_markdown(folder: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", folder.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "md") {
            sources.push(path.to_owned());
        }
    }
    Ok(sources)
}

fn convert_file(source: &Path) -> anyhow::Result<()> {
    let markdown = std::fs::read_to_string(source)?;
    let html = postprocess::normalize_document(&render::render_document(&markdown));

    let target = source.with_extension("html");
    std::fs::write(&target, html)?;
    std::fs::remove_file(source)?;

    tracing::info!(file = %target.display(), "converted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn markdown_files_are_replaced_by_html() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("page.md"), "# Title\n\nbody\n").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/nested.md"), "text\n").unwrap();

        convert_all(dir.path()).unwrap();

        assert!(!dir.path().join("page.md").exists());
        assert!(dir.path().join("page.html").exists());
        assert!(dir.path().join("sub/nested.html").exists());

        let html = fs::read_to_string(dir.path().join("page.html")).unwrap();
        assert!(html.contains("<p>body</p>"));
        assert!(!html.contains("<h1>"));
    }

    #[test]
    fn the_outline_file_is_converted_too() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("SUMMARY.md"), "* [Page](page.md)\n").unwrap();
        fs::write(dir.path().join("page.md"), "body\n").unwrap();

        convert_all(dir.path()).unwrap();

        assert!(!dir.path().join("SUMMARY.md").exists());
        assert!(dir.path().join("SUMMARY.html").exists());
        assert!(dir.path().join("page.html").exists());
    }

    #[test]
    fn non_markdown_files_are_untouched() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("logo.png"), b"\x89PNG").unwrap();

        convert_all(dir.path()).unwrap();

        assert!(dir.path().join("logo.png").exists());
    }
}
