use crate::UrlError;
use std::fmt;
use url::Url;

/// A URL in canonical form together with its dedup key
///
/// The key is the serialized URL with the fragment removed, trailing slashes
/// removed and the host lower-cased. Two URLs with the same key are the same
/// page as far as the crawler is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedUrl {
    url: Url,
    key: String,
}

impl NormalizedUrl {
    /// The dedup key
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The parsed URL used for fetching and for resolving relative links
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Consumes the wrapper and returns the dedup key
    pub fn into_key(self) -> String {
        self.key
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Normalizes a URL into its canonical dedup form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only http:// and https://
/// 3. Lowercase the host
/// 4. Remove the fragment (everything after #)
/// 5. Remove trailing slashes from the path
/// 6. Remove an empty query string (trailing ?)
///
/// Query parameters are kept verbatim: course catalogues frequently address
/// individual courses through them.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(NormalizedUrl)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use course_scout::url::normalize_url;
///
/// let url = normalize_url("https://WWW.Example.EDU/courses/#top").unwrap();
/// assert_eq!(url.as_str(), "https://www.example.edu/courses");
/// ```
pub fn normalize_url(url_str: &str) -> Result<NormalizedUrl, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingDomain)?;
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    url.set_fragment(None);

    let trimmed_path = url.path().trim_end_matches('/').to_string();
    if trimmed_path.is_empty() {
        url.set_path("/");
    } else {
        url.set_path(&trimmed_path);
    }

    if url.query() == Some("") {
        url.set_query(None);
    }

    // The url crate always serializes the root path as "/"
    let mut key = url.to_string();
    if url.path() == "/" && url.query().is_none() && key.ends_with('/') {
        key.pop();
    }

    Ok(NormalizedUrl { url, key })
}
