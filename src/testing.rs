//! Scripted fakes for the network and engine seams

use crate::engine::{EngineEvent, PlaybackEngine};
use crate::error::TransportError;
use crate::http::{HeadResponse, HeadTransport};
use crate::prober::Probe;
use crate::resolver::Resolve;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Transport answering from a fixed table. Unknown URLs fail.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: HashMap<String, HeadResponse>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.responses.insert(
            from.to_string(),
            HeadResponse { status: 302, location: Some(to.to_string()) },
        );
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), HeadResponse { status, location: None });
        self
    }

    pub fn fail(mut self, url: &str) -> Self {
        self.responses.remove(url);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }
}

impl HeadTransport for ScriptedTransport {
    fn head(&self, url: &str) -> Result<HeadResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Request(format!("connection refused: {}", url)))
    }
}

/// Prober with a fixed reachable set and a per-probe delay. Records call order.
#[derive(Clone, Default)]
pub struct FakeProber {
    reachable: Arc<Mutex<HashSet<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl FakeProber {
    pub fn new(reachable: &[&str]) -> Self {
        Self {
            reachable: Arc::new(Mutex::new(reachable.iter().map(|s| s.to_string()).collect())),
            calls: Arc::default(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Probe for FakeProber {
    fn probe(&self, url: &str) -> bool {
        self.calls.lock().unwrap().push(url.to_string());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.reachable.lock().unwrap().contains(url)
    }
}

/// Resolver that returns its input unchanged and records each call
#[derive(Clone, Default)]
pub struct EchoResolver {
    calls: Arc<Mutex<Vec<String>>>,
}

impl EchoResolver {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Resolve for EchoResolver {
    fn resolve(&self, url: &str) -> String {
        self.calls.lock().unwrap().push(url.to_string());
        url.to_string()
    }
}

/// Commands received by [`FakeEngine`]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load(String),
    Stop,
    Pause,
    Resume,
    Seek(u64),
    Volume(u8),
}

/// Engine that records commands and replays queued events
#[derive(Default)]
pub struct FakeEngine {
    pub calls: Vec<EngineCall>,
    pending: VecDeque<EngineEvent>,
    playing: bool,
    /// Report that pause and resume are unavailable
    pub cannot_pause: bool,
}

impl FakeEngine {
    pub fn push_event(&mut self, event: EngineEvent) {
        if let EngineEvent::IsPlayingChanged(playing) = event {
            self.playing = playing;
        }
        self.pending.push_back(event);
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::Load(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }
}

impl PlaybackEngine for FakeEngine {
    fn load(&mut self, url: &str) {
        self.calls.push(EngineCall::Load(url.to_string()));
    }

    fn stop(&mut self) {
        self.playing = false;
        self.calls.push(EngineCall::Stop);
    }

    fn pause(&mut self) {
        self.calls.push(EngineCall::Pause);
    }

    fn resume(&mut self) {
        self.calls.push(EngineCall::Resume);
    }

    fn seek_to(&mut self, position_ms: u64) {
        self.calls.push(EngineCall::Seek(position_ms));
    }

    fn set_volume(&mut self, percent: u8) {
        self.calls.push(EngineCall::Volume(percent));
    }

    fn position_ms(&self) -> u64 {
        0
    }

    fn duration_ms(&self) -> Option<u64> {
        None
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn can_pause(&self) -> bool {
        !self.cannot_pause
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        self.pending.drain(..).collect()
    }
}

/// Spin until `done` holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    done()
}
