use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),
}

/// Pipeline configuration sourced from the environment. CLI flags override
/// individual values; anything still missing when a command needs it is a
/// fatal `ConfigError`.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub docs_folder: Option<PathBuf>,
    pub publication_title: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub source_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            docs_folder: std::env::var("GITBOOK_REPO_FOLDER").ok().map(PathBuf::from),
            publication_title: std::env::var("PUBLICATION_TITLE").ok(),
            api_key: std::env::var("FLUID_TOPICS_API_KEY").ok(),
            base_url: std::env::var("FLUID_TOPICS_BASE_URL").ok(),
            source_id: std::env::var("FLUID_TOPICS_SOURCE_ID").ok(),
        }
    }

    pub fn docs_folder(&self, flag: Option<&str>) -> Result<PathBuf, ConfigError> {
        match flag {
            Some(docs) => Ok(PathBuf::from(docs)),
            None => self
                .docs_folder
                .clone()
                .ok_or(ConfigError::Missing("GITBOOK_REPO_FOLDER")),
        }
    }

    pub fn publication_title(&self, flag: Option<&str>) -> Result<String, ConfigError> {
        match flag {
            Some(title) => Ok(title.to_owned()),
            None => self
                .publication_title
                .clone()
                .ok_or(ConfigError::Missing("PUBLICATION_TITLE")),
        }
    }

    pub fn hosting(&self) -> Result<HostingConfig, ConfigError> {
        Ok(HostingConfig {
            api_key: self
                .api_key
                .clone()
                .ok_or(ConfigError::Missing("FLUID_TOPICS_API_KEY"))?,
            base_url: self
                .base_url
                .clone()
                .ok_or(ConfigError::Missing("FLUID_TOPICS_BASE_URL"))?,
            source_id: self
                .source_id
                .clone()
                .ok_or(ConfigError::Missing("FLUID_TOPICS_SOURCE_ID"))?,
        })
    }
}

/// Credentials and endpoint coordinates for the hosting service.
#[derive(Debug, Clone)]
pub struct HostingConfig {
    pub api_key: String,
    pub base_url: String,
    pub source_id: String,
}

impl HostingConfig {
    /// Key as it may appear in logs: first three characters, rest masked.
    pub fn masked_key(&self) -> String {
        let prefix: String = self.api_key.chars().take(3).collect();
        format!("{prefix}***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docs_folder_flag_overrides_env() {
        let config = Config {
            docs_folder: Some(PathBuf::from("/from-env")),
            ..Config::default()
        };

        let docs = config.docs_folder(Some("/from-flag")).unwrap();
        assert_eq!(docs, PathBuf::from("/from-flag"));
    }

    #[test]
    fn hosting_requires_all_values() {
        let config = Config {
            api_key: Some("secret-key".to_owned()),
            base_url: Some("https://docs.example.com".to_owned()),
            ..Config::default()
        };

        let err = config.hosting().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("FLUID_TOPICS_SOURCE_ID")));
    }

    #[test]
    fn masked_key_hides_the_tail() {
        let hosting = HostingConfig {
            api_key: "abcdef".to_owned(),
            base_url: String::new(),
            source_id: String::new(),
        };
        assert_eq!(hosting.masked_key(), "abc***");
    }
}
