use std::net::IpAddr;
use url::Url;

/// Second-level labels that sit under a two-letter country code and are
/// registered as a unit (e.g. `ox.ac.uk`, `unimelb.edu.au`)
const COUNTRY_SECOND_LEVEL: &[&str] = &[
    "ac", "co", "com", "edu", "gov", "net", "org", "sch", "nhs", "gob", "or", "ne",
];

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use course_scout::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.EDU/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.edu".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Computes the registrable domain of a host
///
/// The registrable domain is the boundary used for same-site link filtering:
/// `www.example.edu`, `cs.example.edu` and `example.edu` all map to
/// `example.edu`, while `example.ac.uk` keeps three labels. IP addresses and
/// single-label hosts such as `localhost` are returned unchanged.
///
/// This is a heuristic, not a public suffix lookup: shared hosting suffixes
/// such as `github.io` or `blogspot.com` are treated as one site, and
/// country suffixes outside the short second-level list keep two labels.
///
/// # Examples
///
/// ```
/// use course_scout::url::registrable_domain;
///
/// assert_eq!(registrable_domain("cs.Example.edu"), "example.edu");
/// assert_eq!(registrable_domain("www.ox.ac.uk"), "ox.ac.uk");
/// assert_eq!(registrable_domain("127.0.0.1"), "127.0.0.1");
/// ```
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_lowercase();

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return host;
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }

    let tld = labels[labels.len() - 1];
    let second = labels[labels.len() - 2];
    let keep = if tld.len() == 2 && COUNTRY_SECOND_LEVEL.contains(&second) {
        3
    } else {
        2
    };

    labels[labels.len() - keep..].join(".")
}

/// Returns the registrable domain of a URL's host
pub fn url_registrable_domain(url: &Url) -> Option<String> {
    url.host_str().map(registrable_domain)
}
