use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    fluidify::logging::init().context("init logging")?;

    let cli = fluidify::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        fluidify::cli::Command::Convert(args) => {
            fluidify::convert::run(args).context("convert")?;
        }
        fluidify::cli::Command::Map(args) => {
            fluidify::ftmap::run(args).context("map")?;
        }
        fluidify::cli::Command::Package(args) => {
            fluidify::package::run(args).context("package")?;
        }
        fluidify::cli::Command::Upload(args) => {
            fluidify::upload::run(args).context("upload")?;
        }
        fluidify::cli::Command::Publish(args) => {
            fluidify::publish::run(args).context("publish")?;
        }
    }

    Ok(())
}
