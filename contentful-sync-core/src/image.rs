//! Builds image-service URLs for assets.

use crate::config::ImageConfig;

const WEBP: &str = "webp";

/// Caller-supplied transformation. Zero and empty values mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRequest<'a> {
    pub width: u32,
    pub height: u32,
    pub format: &'a str,
    pub quality: u32,
    /// `None` defers to `image.use_progressive`.
    pub use_progressive: Option<bool>,
    /// Empty means `fill`; `"default"` leaves fitting to the service.
    pub fit: &'a str,
}

/// Returns `base` with its host rewritten and its query string replaced by
/// `w`, `h`, `q`, `fm`, `fl`, `fit` (in that order, unset ones omitted).
/// `accept` is the client's `Accept` header. An empty `base` yields `""`.
pub fn url(base: &str, request: &ImageRequest<'_>, accept: Option<&str>, config: &ImageConfig) -> String {
    if base.is_empty() {
        return String::new();
    }

    let format = detect_format(request.format, accept);
    let quality = if request.quality != 0 {
        request.quality
    } else {
        config.default_quality
    };

    let mut params: Vec<(&str, String)> = Vec::new();
    if request.width != 0 {
        params.push(("w", request.width.to_string()));
    }
    if request.height != 0 {
        params.push(("h", request.height.to_string()));
    }
    if quality != 0 {
        params.push(("q", quality.to_string()));
    }
    if config.use_webp {
        if let Some(format) = format {
            params.push(("fm", format.to_string()));
        }
    }
    if detect_progressive(format, request.use_progressive, config) {
        params.push(("fl", "progressive".to_string()));
    }
    if let Some(fit) = detect_fit(request.fit) {
        params.push(("fit", fit.to_string()));
    }

    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    replace_hosts(base, &query, config)
}

fn detect_format<'a>(format: &'a str, accept: Option<&str>) -> Option<&'a str> {
    let accepts_webp = accept
        .map(|accept| accept.to_lowercase().contains("image/webp"))
        .unwrap_or(false);
    if accepts_webp {
        return Some(WEBP);
    }
    (!format.is_empty()).then_some(format)
}

fn detect_fit(fit: &str) -> Option<&str> {
    match fit {
        "" => Some("fill"),
        "default" => None,
        other => Some(other),
    }
}

fn detect_progressive(format: Option<&str>, requested: Option<bool>, config: &ImageConfig) -> bool {
    if format == Some(WEBP) {
        return false;
    }
    requested.unwrap_or(config.use_progressive)
}

fn replace_hosts(base: &str, query: &str, config: &ImageConfig) -> String {
    let mut url = base.split('?').next().unwrap_or_default().to_string();

    if let Some(replace_host) = config.replace_host.as_deref().filter(|h| !h.is_empty()) {
        for search in &config.search_hosts {
            url = url.replace(search.as_str(), replace_host);
        }
    }

    if url.is_empty() {
        String::new()
    } else if query.is_empty() {
        url
    } else {
        format!("{url}?{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(width: u32, fit: &str) -> ImageRequest<'_> {
        ImageRequest {
            width,
            fit,
            ..Default::default()
        }
    }

    #[test]
    fn omits_unset_parameters_and_drops_existing_query() {
        let config = ImageConfig::default();

        assert_eq!(
            url("https://img.example.com/a.jpg?x=1", &request(100, ""), None, &config),
            "https://img.example.com/a.jpg?w=100&fit=fill"
        );
        assert_eq!(
            url("https://img.example.com/a.jpg?x=1", &request(100, "default"), None, &config),
            "https://img.example.com/a.jpg?w=100"
        );
    }

    #[test]
    fn empty_base_is_empty() {
        let config = ImageConfig {
            default_quality: 80,
            ..Default::default()
        };
        assert_eq!(url("", &request(100, "thumb"), Some("image/webp"), &config), "");
    }

    #[test]
    fn negotiates_webp_only_when_enabled() {
        let mut config = ImageConfig {
            default_quality: 75,
            use_progressive: true,
            ..Default::default()
        };
        let req = ImageRequest {
            width: 300,
            height: 200,
            format: "jpg",
            fit: "thumb",
            ..Default::default()
        };

        assert_eq!(
            url("https://x/a.jpg", &req, Some("image/avif,image/webp,*/*"), &config),
            "https://x/a.jpg?w=300&h=200&q=75&fit=thumb",
            "webp disabled: no fm, and the negotiated format still turns progressive off"
        );
        assert_eq!(
            url("https://x/a.jpg", &req, Some("text/html"), &config),
            "https://x/a.jpg?w=300&h=200&q=75&fl=progressive&fit=thumb"
        );

        config.use_webp = true;
        assert_eq!(
            url("https://x/a.jpg", &req, Some("Image/WebP"), &config),
            "https://x/a.jpg?w=300&h=200&q=75&fm=webp&fit=thumb"
        );
        assert_eq!(
            url("https://x/a.jpg", &req, None, &config),
            "https://x/a.jpg?w=300&h=200&q=75&fm=jpg&fl=progressive&fit=thumb"
        );
    }

    #[test]
    fn explicit_progressive_and_quality_win() {
        let config = ImageConfig {
            default_quality: 75,
            use_progressive: true,
            ..Default::default()
        };
        let req = ImageRequest {
            quality: 40,
            use_progressive: Some(false),
            fit: "default",
            ..Default::default()
        };
        assert_eq!(url("https://x/a.jpg", &req, None, &config), "https://x/a.jpg?q=40");
    }

    #[test]
    fn rewrites_configured_hosts() {
        let config = ImageConfig {
            search_hosts: vec!["images.ctfassets.net".into(), "downloads.ctfassets.net".into()],
            replace_host: Some("cdn.example.com".into()),
            ..Default::default()
        };

        assert_eq!(
            url("https://images.ctfassets.net/s/a.png?w=1", &request(50, ""), None, &config),
            "https://cdn.example.com/s/a.png?w=50&fit=fill"
        );
        assert_eq!(
            url("https://downloads.ctfassets.net/s/b.pdf", &request(0, "default"), None, &config),
            "https://cdn.example.com/s/b.pdf"
        );
    }
}
