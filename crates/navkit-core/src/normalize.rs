//! URL comparison keys.
//!
//! [`normalize`] is the single notion of bookmark identity used by the
//! duplicate detector and the importer. Its output is a key, not a URL:
//! the scheme and fragment are dropped so `http://` and `https://` variants
//! of one resource collide.

use url::Url;

/// Turn a raw URL string into a comparison key. Never fails.
///
/// Parsed URLs become `host[:port] + path + ?query`, with the host
/// lower-cased, a leading `www.` removed, and one trailing `/` removed
/// from the path. Inputs that do not parse, or parse without a host
/// (`mailto:`, `javascript:`), fall back to the lower-cased raw string with
/// one trailing `/` removed.
pub fn normalize(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => match url.host_str() {
            Some(host) => key_from_url(&url, host),
            None => fallback(raw),
        },
        Err(_) => fallback(raw),
    }
}

fn key_from_url(url: &Url, host: &str) -> String {
    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let path = url.path();
    let path = path.strip_suffix('/').unwrap_or(path);

    let mut key = String::with_capacity(host.len() + path.len() + 8);
    key.push_str(host);
    // `port()` is None for the scheme's default port
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    key.push_str(path);
    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        key.push('?');
        key.push_str(query);
    }
    key
}

fn fallback(raw: &str) -> String {
    let lower = raw.to_lowercase();
    match lower.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => lower,
    }
}
