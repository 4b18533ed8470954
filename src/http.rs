//! Single HEAD request transport used by the resolver and the prober

use crate::config::{ProberConfig, ResolverConfig};
use crate::error::TransportError;
use std::time::Duration;
use ureq::tls::TlsConfig;

/// Status line and redirect target of one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadResponse {
    pub status: u16,
    pub location: Option<String>,
}

impl HeadResponse {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Issues one HEAD request. Implementations must bound the call with a timeout.
pub trait HeadTransport: Send + Sync {
    fn head(&self, url: &str) -> Result<HeadResponse, TransportError>;
}

/// ureq-backed transport
pub struct UreqTransport {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqTransport {
    /// Agent for redirect resolution: redirects are reported, never followed
    pub fn for_resolver(config: &ResolverConfig) -> Self {
        Self::build(
            config.connect_timeout(),
            config.read_timeout(),
            0,
            config.accept_invalid_certs,
            &config.user_agent,
        )
    }

    /// Agent for reachability probes: redirects are followed like a player would
    pub fn for_prober(config: &ProberConfig) -> Self {
        Self::build(
            config.timeout(),
            config.timeout(),
            5,
            config.accept_invalid_certs,
            &config.user_agent,
        )
    }

    fn build(connect: Duration, read: Duration, max_redirects: u32, accept_invalid_certs: bool, user_agent: &str) -> Self {
        let tls = TlsConfig::builder()
            .disable_verification(accept_invalid_certs)
            .build();

        let agent = ureq::Agent::config_builder()
            .timeout_connect(Some(connect))
            .timeout_recv_response(Some(read))
            .max_redirects(max_redirects)
            .max_redirects_will_error(false)
            .http_status_as_error(false)
            .tls_config(tls)
            .build()
            .new_agent();

        Self {
            agent,
            user_agent: user_agent.to_string(),
        }
    }
}

impl HeadTransport for UreqTransport {
    fn head(&self, url: &str) -> Result<HeadResponse, TransportError> {
        if url::Url::parse(url).is_err() {
            return Err(TransportError::InvalidUrl(url.to_string()));
        }

        let response = self
            .agent
            .head(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "*/*")
            .call()?;

        let location = response
            .headers()
            .get("location")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(HeadResponse {
            status: response.status().as_u16(),
            location,
        })
    }
}
