use url::Url;

const TRACKING_PARAMS: [&str; 10] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "mc_cid",
    "mc_eid",
];

const FULL_URL_SCHEMES: [&str; 3] = ["http", "https", "file"];

/// Second-level labels that belong to the public suffix (`co.uk`, `com.au`).
const SECOND_LEVEL_SUFFIXES: [&str; 7] = ["co", "com", "org", "net", "ac", "gov", "edu"];

fn parse_lenient(url: &str) -> Option<Url> {
    let url = url.trim();
    let url_to_parse = if url.starts_with("//") {
        format!("https:{}", url)
    } else if !url.contains("://") {
        format!("https://{}", url)
    } else {
        url.to_string()
    };

    Url::parse(&url_to_parse).ok().filter(|parsed| parsed.has_host())
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Canonical page key for a raw URL.
///
/// Applies the following transformations:
/// - Drops the scheme and a leading `www.`, lowercases the host
/// - Keeps non-default ports
/// - Strips known tracking query parameters (utm_*, fbclid, gclid, ref, mc_*)
///   and sorts the remaining ones
/// - Drops the fragment and trailing slashes
///
/// Input that cannot be parsed as a URL is returned trimmed and lowercased,
/// without its scheme.
pub fn normalize_url(url: &str) -> String {
    let Some(parsed) = parse_lenient(url) else {
        let trimmed = url.trim();
        let without_scheme = trimmed
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(trimmed);
        return without_scheme.trim_end_matches('/').to_lowercase();
    };

    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    let mut normalized = strip_www(&host).to_string();

    if let Some(port) = parsed.port() {
        normalized.push_str(&format!(":{port}"));
    }

    normalized.push_str(parsed.path().trim_end_matches('/'));

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if !params.is_empty() {
        params.sort();
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        normalized.push('?');
        normalized.push_str(&query);
    }

    normalized
}

/// Whether `url` carries a scheme that can be opened, as opposed to a
/// normalized key or a relative annotation id.
pub fn is_full_url(url: &str) -> bool {
    Url::parse(url.trim())
        .map(|parsed| FULL_URL_SCHEMES.contains(&parsed.scheme()))
        .unwrap_or(false)
}

/// Lowercased hostname without a leading `www.`.
pub fn extract_hostname(url: &str) -> String {
    match parse_lenient(url) {
        Some(parsed) => strip_www(&parsed.host_str().unwrap_or_default().to_lowercase()).to_string(),
        None => normalize_url(url)
            .split(['/', '?'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Registrable domain of the URL's host (`news.bbc.co.uk` → `bbc.co.uk`).
pub fn extract_domain(url: &str) -> String {
    let hostname = extract_hostname(url);
    let labels: Vec<&str> = hostname.split('.').collect();

    if labels.len() <= 2 || labels.iter().all(|l| l.chars().all(|c| c.is_ascii_digit())) {
        return hostname;
    }

    let tld = labels[labels.len() - 1];
    let second = labels[labels.len() - 2];
    let take = if tld.len() == 2 && SECOND_LEVEL_SUFFIXES.contains(&second) {
        3
    } else {
        2
    };

    labels[labels.len() - take..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_scheme_and_www() {
        assert_eq!(normalize_url("https://www.example.com/page"), "example.com/page");
        assert_eq!(normalize_url("http://example.com/page"), "example.com/page");
    }

    #[test]
    fn test_strip_utm_params() {
        let input = "https://example.com/page?utm_source=twitter&utm_medium=social&utm_campaign=spring";
        assert_eq!(normalize_url(input), "example.com/page");
    }

    #[test]
    fn test_strip_ref_fbclid_and_mc_params() {
        let input = "https://example.com/page?ref=share&fbclid=abc&mc_cid=c&mc_eid=e";
        assert_eq!(normalize_url(input), "example.com/page");
    }

    #[test]
    fn test_trailing_slash_and_root() {
        assert_eq!(normalize_url("https://example.com/path/to/page/"), "example.com/path/to/page");
        assert_eq!(normalize_url("https://example.com/"), "example.com");
    }

    #[test]
    fn test_lowercase_host_keeps_path_case() {
        assert_eq!(normalize_url("https://ExAmPlE.CoM/Page"), "example.com/Page");
    }

    #[test]
    fn test_params_sorted_and_kept() {
        let input = "https://example.com/page?search=query&page=2&utm_source=removed";
        assert_eq!(normalize_url(input), "example.com/page?page=2&search=query");
    }

    #[test]
    fn test_fragment_dropped() {
        assert_eq!(normalize_url("https://example.com/page#section"), "example.com/page");
    }

    #[test]
    fn test_port_preserved() {
        assert_eq!(normalize_url("https://example.com:8080/page?utm_source=x"), "example.com:8080/page");
    }

    #[test]
    fn test_already_normalized_is_stable() {
        for input in ["test.com", "test.com/a/b", "example.com/page?a=1&b=2"] {
            assert_eq!(normalize_url(input), input);
            assert_eq!(normalize_url(&normalize_url(input)), normalize_url(input));
        }
    }

    #[test]
    fn test_protocol_relative_url() {
        assert_eq!(normalize_url("//example.com/page?foo=bar&utm_source=test"), "example.com/page?foo=bar");
    }

    #[test]
    fn test_malformed_url() {
        assert_eq!(normalize_url("not a valid url"), "not a valid url");
    }

    #[test]
    fn test_is_full_url() {
        assert!(is_full_url("https://test.com"));
        assert!(is_full_url("http://test.com/a"));
        assert!(is_full_url("file:///tmp/doc.pdf"));
        assert!(!is_full_url("test.com/#1548000000000"));
        assert!(!is_full_url("test.com"));
        assert!(!is_full_url("mailto:me@test.com"));
    }

    #[test]
    fn test_hostname_and_domain() {
        assert_eq!(extract_hostname("https://www.News.bbc.co.uk/story"), "news.bbc.co.uk");
        assert_eq!(extract_domain("https://news.bbc.co.uk/story"), "bbc.co.uk");
        assert_eq!(extract_domain("blog.example.com/post"), "example.com");
        assert_eq!(extract_domain("annotation.url/page"), "annotation.url");
        assert_eq!(extract_hostname("lorem.com/ipsum"), "lorem.com");
    }
}
