use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_COUNTRY: &str = "us";

/// Recognised `contentful.*` options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentfulConfig {
    pub default_locale: String,
    pub default_country: String,
    /// `country_locale` combinations that must never be persisted.
    #[serde(deserialize_with = "comma_separated")]
    pub locales_not_flatten: Vec<String>,
    pub image: ImageConfig,
}

impl Default for ContentfulConfig {
    fn default() -> Self {
        Self {
            default_locale: DEFAULT_LOCALE.to_string(),
            default_country: DEFAULT_COUNTRY.to_string(),
            locales_not_flatten: Vec::new(),
            image: ImageConfig::default(),
        }
    }
}

impl ContentfulConfig {
    pub fn trace_loaded(&self) {
        info!(
            default_locale = %self.default_locale,
            default_country = %self.default_country,
            locales_not_flatten = self.locales_not_flatten.len(),
            use_webp = self.image.use_webp,
            "Loaded Contentful config"
        );
        debug!(?self, "Contentful config loaded (full debug)");
    }
}

/// Options for [`crate::image::url`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Zero means "let the image service decide".
    pub default_quality: u32,
    pub use_webp: bool,
    pub use_progressive: bool,
    #[serde(deserialize_with = "comma_separated")]
    pub search_hosts: Vec<String>,
    pub replace_host: Option<String>,
}

/// Accepts either a comma-separated string or a YAML sequence.
fn comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Joined(String),
        List(Vec<String>),
        Missing(()),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::Joined(s) => s.split(',').map(str::to_string).collect(),
        Raw::List(list) => list,
        Raw::Missing(()) => Vec::new(),
    };

    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
