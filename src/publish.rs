use std::path::Path;

use crate::cli::PublishArgs;
use crate::config::Config;
use crate::{convert, ftmap, outline, package, upload};

/// Whole pipeline, in order: parse the outline, convert documents, build the
/// navigation map, package, upload. Hosting credentials are resolved up front
/// so a misconfigured upload cannot fail after the tree was already rewritten.
pub fn run(args: PublishArgs) -> anyhow::Result<()> {
    let config = Config::from_env();
    let docs = config.docs_folder(args.docs.as_deref())?;
    let title = config.publication_title(args.title.as_deref())?;

    let hosting = if args.skip_upload {
        None
    } else {
        Some(config.hosting()?)
    };
    if let Some(hosting) = &hosting {
        tracing::info!(
            base_url = %hosting.base_url,
            source_id = %hosting.source_id,
            api_key = %hosting.masked_key(),
            "publishing"
        );
    }

    let root = outline::parse_folder(&docs)?;

    convert::convert_all(&docs)?;

    let mut options = ftmap::MapOptions::new(title, args.profile);
    options.metadata = ftmap::load_metadata(&docs)?;
    ftmap::write_map(&root, &docs, &options)?;

    let archive = package::resolve_archive_path(&docs, args.out.as_deref().map(Path::new));
    package::create_archive(&docs, &archive)?;

    match hosting {
        Some(hosting) => {
            upload::upload(&hosting, &archive)?;
            tracing::info!(archive = %archive.display(), "published");
        }
        None => {
            tracing::info!(archive = %archive.display(), "upload skipped, archive left in place");
        }
    }
    Ok(())
}
