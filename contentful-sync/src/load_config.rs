/// `load_config` module: reads the static YAML options and the environment
/// settings the CLI needs to reach the remote space and the database.
///
/// The YAML file only carries non-secret options under a `contentful:` key.
/// Tokens, space id and database URL always come from the environment.
///
/// # Errors
/// Everything here returns `anyhow::Error` with the offending path or
/// variable in the message; the CLI surfaces it as is.
use anyhow::{anyhow, Context, Result};
use contentful_sync_core::config::ContentfulConfig;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const CONFIG_PATH_ENV: &str = "CONTENTFUL_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "contentful.yaml";
pub const DEFAULT_ENVIRONMENT: &str = "master";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://contentful.db";

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    contentful: ContentfulConfig,
}

/// Config file location: `$CONTENTFUL_CONFIG`, else `contentful.yaml`.
pub fn config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Loads the `contentful:` section of a YAML file. A missing file yields the
/// defaults; an unreadable or malformed one is an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ContentfulConfig> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        info!(config_path = ?path_ref, "Config file not found, using defaults");
        return Ok(ContentfulConfig::default());
    }

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let raw: RawConfig = match serde_yaml::from_str::<Option<RawConfig>>(&content) {
        Ok(conf) => conf.unwrap_or_default(),
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    info!(config_path = ?path_ref, "Parsed config YAML successfully");
    raw.contentful.trace_loaded();
    Ok(raw.contentful)
}

/// Connection settings and secrets read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub space_id: String,
    pub environment: String,
    pub token: Option<String>,
    pub preview_token: Option<String>,
    pub database_url: String,
}

impl Settings {
    /// Only `DATABASE_URL` and `CONTENTFUL_ENVIRONMENT` have defaults. The
    /// space and tokens are checked by [`Settings::delivery`] since the
    /// flatten command never talks to the API.
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());
        let settings = Self {
            space_id: var("CONTENTFUL_SPACE_ID").unwrap_or_default(),
            environment: var("CONTENTFUL_ENVIRONMENT")
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            token: var("CONTENTFUL_TOKEN"),
            preview_token: var("CONTENTFUL_TOKEN_PREVIEW"),
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        };
        info!(
            space_id = %settings.space_id,
            environment = %settings.environment,
            token_set = settings.token.is_some(),
            preview_token_set = settings.preview_token.is_some(),
            "Loaded settings from environment"
        );
        settings
    }

    /// Space id and the token matching the requested API.
    pub fn delivery(&self, preview: bool) -> Result<(&str, &str)> {
        if self.space_id.is_empty() {
            return Err(anyhow!("CONTENTFUL_SPACE_ID missing in environment"));
        }
        let (token, name) = if preview {
            (self.preview_token.as_deref(), "CONTENTFUL_TOKEN_PREVIEW")
        } else {
            (self.token.as_deref(), "CONTENTFUL_TOKEN")
        };
        let token = token.with_context(|| format!("{name} missing in environment"))?;
        Ok((&self.space_id, token))
    }
}
