//! URL classification used to short-circuit redirect probing

use crate::models::ANNOTATION_DELIMITER;
use url::Url;

/// Path suffixes that name a playable stream or manifest directly
const STREAM_EXTENSIONS: &[&str] = &[
    ".m3u8", // HLS
    ".m3u",
    ".ts", // MPEG-TS
    ".flv",
    ".mp4",
    ".mkv",
    ".avi",
    ".mov",
    ".wmv",
    ".mpd", // DASH
    ".f4m",
    ".ism", // Smooth Streaming
    ".webm",
];

/// Drop a trailing `$label` annotation
pub fn strip_annotation(url: &str) -> &str {
    url.split(ANNOTATION_DELIMITER).next().unwrap_or(url).trim()
}

pub fn is_http(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// udpxy-style multicast gateway: `/rtp/225.1.2.3:1234` or `/udp/...`.
/// These proxies reject HEAD requests.
pub fn is_proxy_gateway(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let mut segments = parsed.path().trim_start_matches('/').split('/');
    let (Some(kind), Some(target), None) = (segments.next(), segments.next(), segments.next()) else {
        return false;
    };
    if !kind.eq_ignore_ascii_case("rtp") && !kind.eq_ignore_ascii_case("udp") {
        return false;
    }
    let Some((host, port)) = target.rsplit_once(':') else {
        return false;
    };
    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|o| (1..=3).contains(&o.len()) && o.bytes().all(|b| b.is_ascii_digit()))
        && !port.is_empty()
        && port.bytes().all(|b| b.is_ascii_digit())
}

/// Path ends in a known container or playlist extension
pub fn is_terminal_stream(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path().to_lowercase();
    STREAM_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Resolve a `Location` header against the URL that returned it
pub fn join_location(base: &str, location: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(location)) {
        Ok(joined) => joined.to_string(),
        Err(_) => location.to_string(),
    }
}
