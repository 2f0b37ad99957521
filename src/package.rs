use std::path::{Path, PathBuf};

use anyhow::Context as _;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::cli::PackageArgs;
use crate::config::Config;

pub fn run(args: PackageArgs) -> anyhow::Result<()> {
    let config = Config::from_env();
    let docs = config.docs_folder(args.docs.as_deref())?;
    let out = resolve_archive_path(&docs, args.out.as_deref().map(Path::new));
    create_archive(&docs, &out)?;
    Ok(())
}

/// Default archive path: a sibling of the tree named after it, so the archive
/// never ends up inside the tree it captures.
pub fn resolve_archive_path(folder: &Path, out: Option<&Path>) -> PathBuf {
    match out {
        Some(path) => path.to_owned(),
        None => {
            let name = folder
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "package".to_owned());
            folder.with_file_name(format!("{name}.zip"))
        }
    }
}

/// Zips the whole tree under `folder`, entry names relative to it, in a
/// stable sorted order.
pub fn create_archive(folder: &Path, out: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(out)
        .with_context(|| format!("create archive: {}", out.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut count = 0usize;
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", folder.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path
            .strip_prefix(folder)
            .expect("walked path is under the root");

        writer.start_file(relative.to_string_lossy(), options)?;
        let mut source = std::fs::File::open(path)
            .with_context(|| format!("read {}", path.display()))?;
        std::io::copy(&mut source, &mut writer)?;
        count += 1;
    }
    writer.finish()?;

    tracing::info!(archive = %out.display(), files = count, "packaged tree");
    Ok(())
}
