use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert every Markdown document in the tree to HTML (in place).
    Convert(ConvertArgs),
    /// Build the navigation map (`SUMMARY.ftmap`) from the outline file.
    Map(MapArgs),
    /// Package the converted tree into a ZIP archive.
    Package(PackageArgs),
    /// Upload a packaged archive to the hosting service.
    Upload(UploadArgs),
    /// Run the whole pipeline: convert, map, package, upload.
    Publish(PublishArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MapProfile {
    /// Per-node title and origin id only.
    Plain,
    /// Per-node metadata block with a pretty `topicUrl` slug.
    Metadata,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Documentation tree root (default: `GITBOOK_REPO_FOLDER`).
    #[arg(long)]
    pub docs: Option<String>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    /// Documentation tree root (default: `GITBOOK_REPO_FOLDER`).
    #[arg(long)]
    pub docs: Option<String>,

    /// Publication title (default: `PUBLICATION_TITLE`).
    #[arg(long)]
    pub title: Option<String>,

    /// Metadata scheme used for map nodes.
    #[arg(long, value_enum, default_value_t = MapProfile::Plain)]
    pub profile: MapProfile,
}

#[derive(Debug, Args)]
pub struct PackageArgs {
    /// Documentation tree root (default: `GITBOOK_REPO_FOLDER`).
    #[arg(long)]
    pub docs: Option<String>,

    /// Output archive path (default: `<folder name>.zip` next to the tree).
    #[arg(long)]
    pub out: Option<String>,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Archive to upload.
    #[arg(long)]
    pub archive: String,
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Documentation tree root (default: `GITBOOK_REPO_FOLDER`).
    #[arg(long)]
    pub docs: Option<String>,

    /// Publication title (default: `PUBLICATION_TITLE`).
    #[arg(long)]
    pub title: Option<String>,

    /// Metadata scheme used for map nodes.
    #[arg(long, value_enum, default_value_t = MapProfile::Plain)]
    pub profile: MapProfile,

    /// Output archive path (default: `<folder name>.zip` next to the tree).
    #[arg(long)]
    pub out: Option<String>,

    /// Skip the upload step (convert, map and package only).
    #[arg(long, default_value_t = false)]
    pub skip_upload: bool,
}
