//! Source reachability probing
//!
//! A probe is a single short HEAD request, separate from opening the stream
//! for playback. It blocks, so callers run it on a worker thread.

use crate::config::ProberConfig;
use crate::http::{HeadTransport, UreqTransport};
use crate::resolver::rules::strip_annotation;

pub trait Probe: Send + Sync {
    fn probe(&self, url: &str) -> bool;
}

pub struct SourceProber<T: HeadTransport = UreqTransport> {
    transport: T,
}

impl SourceProber<UreqTransport> {
    pub fn new(config: &ProberConfig) -> Self {
        Self::with_transport(UreqTransport::for_prober(config))
    }
}

impl<T: HeadTransport> SourceProber<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: HeadTransport> Probe for SourceProber<T> {
    /// 2xx and 3xx count as reachable; any failure does not. No retries here.
    fn probe(&self, url: &str) -> bool {
        let url = strip_annotation(url);
        match self.transport.head(url) {
            Ok(response) => {
                let reachable = (200..400).contains(&response.status);
                log::debug!(
                    "Probe {} -> {} ({})",
                    url,
                    response.status,
                    if reachable { "reachable" } else { "unreachable" }
                );
                reachable
            }
            Err(e) => {
                log::debug!("Probe {} failed: {}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    #[test]
    fn test_status_classes() {
        let prober = SourceProber::with_transport(
            ScriptedTransport::new()
                .status("http://a.example.com/ok", 200)
                .redirect("http://a.example.com/moved", "http://b.example.com/")
                .status("http://a.example.com/missing", 404)
                .status("http://a.example.com/broken", 503),
        );

        assert!(prober.probe("http://a.example.com/ok"));
        assert!(prober.probe("http://a.example.com/moved"));
        assert!(!prober.probe("http://a.example.com/missing"));
        assert!(!prober.probe("http://a.example.com/broken"));
    }

    #[test]
    fn test_transport_error_is_unreachable_and_not_retried() {
        let prober = SourceProber::with_transport(ScriptedTransport::new().fail("http://down.example.com/"));

        assert!(!prober.probe("http://down.example.com/"));
        assert_eq!(prober.transport.request_count(), 1);
    }

    #[test]
    fn test_annotation_not_sent() {
        let prober = SourceProber::with_transport(ScriptedTransport::new().status("http://a.example.com/live", 200));

        assert!(prober.probe("http://a.example.com/live$Line 2"));
        assert_eq!(prober.transport.requests_for("http://a.example.com/live"), 1);
    }
}
