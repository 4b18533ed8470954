//! Playback resilience core for live IPTV
//!
//! Keeps a channel playing when it is reachable through several alternative
//! stream addresses: redirects are resolved, sources are probed, and failing
//! sources are retried and replaced without blocking the control thread.

pub mod config;
pub mod engine;
pub mod error;
pub mod failover;
pub mod http;
pub mod logging;
pub mod m3u_parser;
pub mod models;
pub mod player;
pub mod prober;
pub mod resolver;
pub mod session;
pub mod status;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, BufferStrength, FailoverConfig, ProberConfig, ResolverConfig};
pub use engine::{EngineEvent, EngineState, PlaybackEngine, PlaybackSnapshot};
pub use error::{PlaylistError, SessionError, TransportError};
pub use failover::{Directive, FailoverController, FailoverState, VerificationToken};
pub use models::{Channel, Direction, Source};
pub use player::ExternalPlayer;
pub use prober::{Probe, SourceProber};
pub use resolver::{RedirectResolver, Resolve};
pub use session::{PlaybackSession, SessionEvent, SourceChange, SourceCycle, SourceIndicator};
pub use status::Status;
