//! Link probing.
//!
//! Indicators that judge links go through [`LinkProbe`] so the engine never
//! touches the network itself. [`OfflineProbe`] decides from the URL alone
//! and is fully deterministic.

use serde::Serialize;

/// What a probe found out about a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    /// Whether the resource is considered reachable.
    pub accessible: bool,
    /// Whether it is served over a secure scheme.
    pub secure: bool,
    /// Media type of the resource, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Final URL after redirects.
    pub resolved: String,
}

/// Resolves links for the links-health style indicators.
pub trait LinkProbe: Send + Sync {
    /// Probes `url`.
    fn probe(&self, url: &str) -> LinkStatus;
}

/// Judges URLs by syntax, scheme and file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProbe;

const SCHEMES: &[(&str, bool)] = &[
    ("https", true),
    ("http", false),
    ("ftps", true),
    ("ftp", false),
    ("mqtts", true),
    ("mqtt", false),
];

const MEDIA_TYPES: &[(&str, &str)] = &[
    ("apng", "image/apng"),
    ("avif", "image/avif"),
    ("csv", "text/csv"),
    ("gif", "image/gif"),
    ("grib", "application/x-grib"),
    ("grib2", "application/x-grib2"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("json", "application/json"),
    ("nc", "application/x-netcdf"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("txt", "text/plain"),
    ("webp", "image/webp"),
    ("xml", "application/xml"),
    ("xsd", "application/xml"),
    ("zip", "application/zip"),
];

/// Splits `url` into scheme, host and path.
fn split(url: &str) -> Option<(&str, &str, &str)> {
    let (scheme, rest) = url.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (host, path) = rest.split_at(end);
    let host = host.rsplit_once('@').map(|(_, h)| h).unwrap_or(host);
    if scheme.is_empty() || host.is_empty() || url.chars().any(char::is_whitespace) {
        return None;
    }
    let path = path.split(['?', '#']).next().unwrap_or_default();
    Some((scheme, host, path))
}

/// Media type implied by the extension of a URL path.
#[must_use]
pub fn media_type_of(path: &str) -> Option<&'static str> {
    let file = path.rsplit('/').next()?;
    let (_, extension) = file.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    MEDIA_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, media_type)| *media_type)
}

impl LinkProbe for OfflineProbe {
    fn probe(&self, url: &str) -> LinkStatus {
        let url = url.trim();
        let parsed = split(url).and_then(|(scheme, _, path)| {
            let scheme = scheme.to_ascii_lowercase();
            SCHEMES
                .iter()
                .find(|(s, _)| *s == scheme)
                .map(|(_, secure)| (*secure, path))
        });

        match parsed {
            Some((secure, path)) => LinkStatus {
                accessible: true,
                secure,
                media_type: media_type_of(path).map(str::to_string),
                resolved: url.to_string(),
            },
            None => LinkStatus {
                accessible: false,
                secure: false,
                media_type: None,
                resolved: url.to_string(),
            },
        }
    }
}
