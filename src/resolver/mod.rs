//! Redirect resolution
//!
//! Turns a nominal stream URL into the address that should actually be
//! opened. HTTP redirect chains are followed hop by hop with HEAD requests,
//! up to a fixed depth, and the result is cached per original URL.
//!
//! Resolution never fails: on any error the best URL known so far is
//! returned and playback gets to try it.

pub mod cache;
pub mod rules;

pub use cache::{CacheStat, RedirectCache};

use crate::config::ResolverConfig;
use crate::http::{HeadTransport, UreqTransport};
use std::time::Instant;

/// Anything that maps a source URL to the URL to load
pub trait Resolve: Send + Sync {
    fn resolve(&self, url: &str) -> String;
}

pub struct RedirectResolver<T: HeadTransport = UreqTransport> {
    transport: T,
    cache: RedirectCache,
    max_depth: usize,
}

impl RedirectResolver<UreqTransport> {
    pub fn new(config: &ResolverConfig) -> Self {
        Self::with_transport(UreqTransport::for_resolver(config), config)
    }
}

/// Outcome of walking a redirect chain
struct Walk {
    url: String,
    /// False when the walk stopped on a transport failure
    complete: bool,
}

impl<T: HeadTransport> RedirectResolver<T> {
    pub fn with_transport(transport: T, config: &ResolverConfig) -> Self {
        Self {
            transport,
            cache: RedirectCache::new(config.cache_ttl()),
            max_depth: config.max_depth,
        }
    }

    /// Resolve without reading or writing the cache
    pub fn resolve_uncached(&self, url: &str) -> String {
        self.resolve_with(url, false)
    }

    fn resolve_with(&self, url: &str, use_cache: bool) -> String {
        let clean = rules::strip_annotation(url);

        if !rules::is_http(clean) {
            log::debug!("Not HTTP, skipping redirect check: {}", clean);
            return clean.to_string();
        }
        if rules::is_proxy_gateway(clean) {
            log::debug!("Multicast gateway, skipping redirect check: {}", clean);
            return clean.to_string();
        }
        if rules::is_terminal_stream(clean) {
            log::debug!("Direct stream, skipping redirect check: {}", clean);
            return clean.to_string();
        }

        if use_cache {
            if let Some(cached) = self.cache.get(clean) {
                log::debug!("Cached redirect: {} -> {}", clean, cached);
                return cached;
            }
        }

        let walk = self.walk(clean);
        if use_cache && walk.complete {
            self.cache.insert(clean, &walk.url);
        }
        walk.url
    }

    fn walk(&self, start: &str) -> Walk {
        let started = Instant::now();
        let mut current = start.to_string();
        let mut depth = 0;

        loop {
            if depth >= self.max_depth {
                log::warn!("Redirect depth limit ({}) reached at {}", self.max_depth, current);
                return Walk { url: current, complete: true };
            }
            if depth > 0 && (rules::is_terminal_stream(&current) || !rules::is_http(&current)) {
                log::debug!("Redirect chain ends at stream address after {} hop(s): {}", depth, current);
                return Walk { url: current, complete: true };
            }

            match self.transport.head(&current) {
                Ok(response) if response.is_redirect() => match response.location {
                    Some(location) => {
                        let next = rules::join_location(&current, &location);
                        log::debug!(
                            "Hop {} ({} ms): {} -> {}",
                            depth + 1,
                            started.elapsed().as_millis(),
                            current,
                            next
                        );
                        current = next;
                        depth += 1;
                    }
                    None => {
                        log::debug!("HTTP {} without Location, keeping {}", response.status, current);
                        return Walk { url: current, complete: true };
                    }
                },
                Ok(response) => {
                    if response.status == 403 {
                        log::warn!("HTTP 403 from {}, user agent may be rejected", current);
                    }
                    log::debug!(
                        "Resolved in {} hop(s) ({} ms), status {}: {}",
                        depth,
                        started.elapsed().as_millis(),
                        response.status,
                        current
                    );
                    return Walk { url: current, complete: true };
                }
                Err(e) => {
                    log::warn!(
                        "Redirect check failed at hop {} ({} ms): {}",
                        depth + 1,
                        started.elapsed().as_millis(),
                        e
                    );
                    return Walk { url: current, complete: false };
                }
            }
        }
    }

    pub fn clear_cache(&self, url: &str) {
        self.cache.remove(rules::strip_annotation(url));
    }

    pub fn clear_all_cache(&self) {
        self.cache.clear();
    }

    pub fn clear_expired_cache(&self) -> usize {
        self.cache.clear_expired()
    }

    pub fn cache_stats(&self) -> Vec<CacheStat> {
        self.cache.stats()
    }
}

impl<T: HeadTransport> Resolve for RedirectResolver<T> {
    fn resolve(&self, url: &str) -> String {
        self.resolve_with(url, true)
    }
}
