use std::path::Path;

use thiserror::Error;

use crate::cli::UploadArgs;
use crate::config::{Config, HostingConfig};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upload rejected with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("cannot read archive {path}: {source}")]
    Archive {
        path: String,
        source: std::io::Error,
    },
}

pub fn run(args: UploadArgs) -> anyhow::Result<()> {
    let hosting = Config::from_env().hosting()?;
    upload(&hosting, Path::new(&args.archive))?;
    Ok(())
}

pub fn upload_url(hosting: &HostingConfig) -> String {
    format!(
        "{}/api/admin/khub/sources/{}/upload",
        hosting.base_url.trim_end_matches('/'),
        hosting.source_id
    )
}

/// Posts the archive as a multipart form with a single `file` field. One
/// attempt, no retries; a non-success status is surfaced with the response
/// body.
pub fn upload(hosting: &HostingConfig, archive: &Path) -> Result<(), UploadError> {
    let url = upload_url(hosting);
    tracing::info!(
        url = %url,
        archive = %archive.display(),
        api_key = %hosting.masked_key(),
        "uploading archive"
    );

    let form = reqwest::blocking::multipart::Form::new()
        .file("file", archive)
        .map_err(|source| UploadError::Archive {
            path: archive.display().to_string(),
            source,
        })?;

    let response = reqwest::blocking::Client::new()
        .post(&url)
        .bearer_auth(&hosting.api_key)
        .multipart(form)
        .send()?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        tracing::error!(status = %status, body = %body, "upload failed");
        return Err(UploadError::Status { status, body });
    }

    tracing::info!(status = %status, "upload accepted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosting(base_url: &str) -> HostingConfig {
        HostingConfig {
            api_key: "secret".to_owned(),
            base_url: base_url.to_owned(),
            source_id: "my-source".to_owned(),
        }
    }

    #[test]
    fn upload_url_targets_the_source() {
        assert_eq!(
            upload_url(&hosting("https://docs.example.com")),
            "https://docs.example.com/api/admin/khub/sources/my-source/upload"
        );
    }

    #[test]
    fn trailing_slash_in_base_url_is_tolerated() {
        assert_eq!(
            upload_url(&hosting("https://docs.example.com/")),
            "https://docs.example.com/api/admin/khub/sources/my-source/upload"
        );
    }

    #[test]
    fn missing_archive_is_an_archive_error() {
        let err = upload(
            &hosting("http://127.0.0.1:1"),
            Path::new("/definitely/not/here.zip"),
        )
        .unwrap_err();
        assert!(matches!(err, UploadError::Archive { .. }));
    }
}
