//! M3U playlist parser with HTTPS download support
//!
//! Entries that share a display name are alternative sources for the same
//! channel and are merged by [`group_channels`].

use crate::error::PlaylistError;
use crate::models::{Channel, Source};
use std::collections::HashMap;
use std::time::Duration;

/// One `#EXTINF` + URL pair
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub name: String,
    pub url: String,
    pub group: Option<String>,
    pub tvg_id: Option<String>,
    pub tvg_logo: Option<String>,
    pub tvg_name: Option<String>, // Alternate name for EPG matching
    pub catchup: Option<String>,  // Catchup type (default, shift, etc.)
    pub catchup_days: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct Playlist {
    pub entries: Vec<PlaylistEntry>,
    pub epg_url: Option<String>, // From x-tvg-url in header
}

/// Read a playlist from an `http(s)://` URL or a local path and merge its
/// entries into channels
pub fn load_channels(location: &str, user_agent: &str) -> Result<Vec<Channel>, PlaylistError> {
    let content = if is_remote(location) {
        download_playlist(location, user_agent)?
    } else {
        std::fs::read_to_string(location)?
    };

    let playlist = parse_playlist(&content);
    let channels = group_channels(&playlist.entries);
    if channels.is_empty() {
        return Err(PlaylistError::Empty);
    }

    let sources: usize = channels.iter().map(|c| c.sources.len()).sum();
    log::info!(
        "Loaded {} channels ({} sources) from {}",
        channels.len(),
        sources,
        location
    );
    Ok(channels)
}

fn is_remote(location: &str) -> bool {
    let lower = location.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Download playlist text (supports HTTP and HTTPS)
pub fn download_playlist(url: &str, user_agent: &str) -> Result<String, PlaylistError> {
    let agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(120)))
        .timeout_connect(Some(Duration::from_secs(30)))
        .http_status_as_error(false)
        .build()
        .new_agent();

    let mut response = agent.get(url).header("User-Agent", user_agent).call()?;

    let status = response.status().as_u16();
    if status != 200 {
        return Err(PlaylistError::Http(status));
    }

    Ok(response.body_mut().read_to_string()?)
}

/// Parse M3U content, including the EPG URL from the header
pub fn parse_playlist(content: &str) -> Playlist {
    let mut playlist = Playlist::default();

    if let Some(first_line) = content.lines().map(str::trim).find(|l| !l.is_empty()) {
        if first_line.starts_with("#EXTM3U") {
            playlist.epg_url = extract_header_attr(first_line, "x-tvg-url")
                .or_else(|| extract_header_attr(first_line, "url-tvg"));
        }
    }

    playlist.entries = parse_entries(content);
    playlist
}

/// Extract attribute from #EXTM3U header line
fn extract_header_attr(line: &str, attr_name: &str) -> Option<String> {
    let search = format!("{}=\"", attr_name);
    // ASCII lowering keeps byte offsets valid for `line`
    let start = line.to_ascii_lowercase().find(&search)?;
    let rest = &line[start + search.len()..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Parse `#EXTINF` entries. URL lines without a preceding `#EXTINF` are skipped.
pub fn parse_entries(content: &str) -> Vec<PlaylistEntry> {
    let mut entries = Vec::new();
    let mut attrs: HashMap<String, String> = HashMap::new();
    let mut current_name: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();

        // Some malformed playlists drop the '#'
        let info = line
            .strip_prefix("#EXTINF:")
            .or_else(|| line.strip_prefix("EXTINF:"));

        if let Some(info) = info {
            attrs.clear();
            let (attr_part, name) = match info.rfind(',') {
                Some(pos) => (&info[..pos], info[pos + 1..].trim()),
                None => (info, ""),
            };
            extract_attrs(skip_duration(attr_part), &mut attrs);

            let name = if name.is_empty() {
                attrs.get("tvg-name").cloned().unwrap_or_default()
            } else {
                name.to_string()
            };
            current_name = (!name.is_empty()).then_some(name);
        } else if !line.is_empty() && !line.starts_with('#') {
            if let Some(name) = current_name.take() {
                entries.push(PlaylistEntry {
                    name,
                    url: line.to_string(),
                    group: attrs.get("group-title").filter(|g| !g.is_empty()).cloned(),
                    tvg_id: attrs.get("tvg-id").filter(|id| !id.is_empty()).cloned(),
                    tvg_logo: attrs.get("tvg-logo").filter(|l| !l.is_empty()).cloned(),
                    tvg_name: attrs.get("tvg-name").cloned(),
                    catchup: attrs.get("catchup").cloned(),
                    catchup_days: attrs.get("catchup-days").and_then(|s| s.parse().ok()),
                });
            }
        }
    }

    entries
}

/// Drop the leading duration (e.g. "-1" or "10.000000,")
fn skip_duration(info: &str) -> &str {
    let rest = info.trim_start_matches(|c: char| c.is_ascii_digit() || c == '-' || c == '.');
    rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',')
}

/// Extract attributes - handles quoted and unquoted values
fn extract_attrs(info: &str, attrs: &mut HashMap<String, String>) {
    let mut chars = info.chars().peekable();

    while chars.peek().is_some() {
        // Skip separators
        while chars.next_if(|&c| c.is_whitespace() || c == ',').is_some() {}

        // Collect key until '='
        let mut key = String::new();
        let mut has_value = false;
        while let Some(c) = chars.next() {
            if c == '=' {
                has_value = true;
                break;
            }
            if c.is_whitespace() {
                break;
            }
            key.push(c);
        }

        // Stray quotes in front of a key are common in the wild
        let key = key.trim().trim_matches('"').to_lowercase();
        if key.is_empty() || !has_value {
            continue;
        }

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                if c == '"' {
                    break;
                }
                // Escaped quote
                if c == '\\' {
                    if let Some(quote) = chars.next_if_eq(&'"') {
                        value.push(quote);
                        continue;
                    }
                }
                value.push(c);
            }
            attrs.insert(key, value);
        } else {
            // Unquoted value - read until space or comma
            while let Some(c) = chars.next_if(|&c| !c.is_whitespace() && c != ',') {
                value.push(c);
            }
            if !value.is_empty() {
                attrs.insert(key, value);
            }
        }
    }
}

/// Merge entries with the same name (case-insensitive) into one channel,
/// keeping first-seen channel order and source order
pub fn group_channels(entries: &[PlaylistEntry]) -> Vec<Channel> {
    let mut channels: Vec<Channel> = Vec::new();
    let mut index_by_name: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let key = entry.name.trim().to_lowercase();
        let seekable = entry.catchup.is_some();

        match index_by_name.get(&key) {
            Some(&index) => {
                let channel = &mut channels[index];
                channel.sources.push(Source::new(entry.url.as_str()));
                channel.seekable |= seekable;
                if channel.group.is_none() {
                    channel.group = entry.group.clone();
                }
                if channel.epg_id.is_none() {
                    channel.epg_id = entry.tvg_id.clone();
                }
                if channel.logo.is_none() {
                    channel.logo = entry.tvg_logo.clone();
                }
            }
            None => {
                let mut channel = Channel::new(entry.name.trim(), [entry.url.as_str()]).seekable(seekable);
                channel.group = entry.group.clone();
                channel.epg_id = entry.tvg_id.clone();
                channel.logo = entry.tvg_logo.clone();
                index_by_name.insert(key, channels.len());
                channels.push(channel);
            }
        }
    }

    let merged = channels.iter().filter(|c| c.has_multiple_sources()).count();
    if merged > 0 {
        log::debug!("{} channels have alternative sources", merged);
    }
    channels
}

#[cfg(test)]
#[path = "m3u_parser_tests.rs"]
mod tests;
