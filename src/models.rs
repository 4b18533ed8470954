//! Data models for channels and their stream sources

use serde::{Deserialize, Serialize};

/// Text after this character in a source line is a label, not part of the address
pub const ANNOTATION_DELIMITER: char = '$';

/// Direction for channel and source cycling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

impl Direction {
    /// Step `index` one place in this direction, wrapping inside `len`.
    pub fn step(self, index: usize, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        match self {
            Direction::Next => (index + 1) % len,
            Direction::Previous => (index + len - 1) % len,
        }
    }
}

/// One candidate stream address for a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Address part of the source line (annotation stripped)
    pub fn address(&self) -> &str {
        match self.url.split_once(ANNOTATION_DELIMITER) {
            Some((address, _)) => address.trim(),
            None => self.url.trim(),
        }
    }

    /// Annotation after the delimiter, e.g. "HD" in `http://a/b$HD`
    pub fn label(&self) -> Option<&str> {
        self.url
            .split_once(ANNOTATION_DELIMITER)
            .map(|(_, label)| label.trim())
            .filter(|label| !label.is_empty())
    }
}

/// A live channel reachable through one or more sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub group: Option<String>,
    pub sources: Vec<Source>,
    pub epg_id: Option<String>,
    pub logo: Option<String>,
    /// Content supports seeking (catchup / timeshift)
    #[serde(default)]
    pub seekable: bool,
}

impl Channel {
    pub fn new(name: impl Into<String>, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            group: None,
            sources: urls.into_iter().map(Source::new).collect(),
            epg_id: None,
            logo: None,
            seekable: false,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_epg_id(mut self, epg_id: impl Into<String>) -> Self {
        self.epg_id = Some(epg_id.into());
        self
    }

    pub fn seekable(mut self, seekable: bool) -> Self {
        self.seekable = seekable;
        self
    }

    pub fn has_multiple_sources(&self) -> bool {
        self.sources.len() > 1
    }

    pub fn source_urls(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.url.clone()).collect()
    }
}
