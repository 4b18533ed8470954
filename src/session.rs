//! Playback session façade
//!
//! Binds the channel list to one playback engine. All state lives on the
//! thread that owns the session; probing and redirect resolution run on
//! short-lived worker threads that hand their results back over a channel.
//! Results are applied in [`PlaybackSession::poll`], after a staleness check
//! against the verification token.

use crate::config::FailoverConfig;
use crate::engine::{EngineEvent, EngineState, PlaybackEngine, PlaybackSnapshot};
use crate::error::SessionError;
use crate::failover::{scan, Directive, FailoverController, FailoverState, ScanOutcome, ScanPlan};
use crate::models::{Channel, Direction};
use crate::prober::Probe;
use crate::resolver::{rules, RedirectCache, Resolve};
use crate::status::{derive_status, Status};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Channel/source position reported to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceChange {
    pub channel_index: usize,
    pub source_index: usize,
    pub total_sources: usize,
}

/// Transient "source i/n" badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceIndicator {
    pub source_index: usize,
    pub total_sources: usize,
}

/// Result of a manual source-cycle request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCycle {
    Started,
    /// A manual switch is still running
    PleaseWait,
    SingleSource,
}

/// Notifications for the UI, drained with [`PlaybackSession::take_events`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ChannelChanged(SourceChange),
    SourceChanged(SourceChange),
    StatusChanged(Status),
    /// A scan is checking source `index` of `total`
    Probing { index: usize, total: usize },
    PleaseWait,
    /// All sources exhausted; terminal until the user acts
    Exhausted { message: String },
}

/// Results sent back from worker threads
enum TaskResult {
    ScanProgress {
        token: u64,
        index: usize,
        total: usize,
    },
    ScanFinished {
        plan: ScanPlan,
        outcome: ScanOutcome,
    },
    Resolved {
        token: u64,
        serial: u64,
        source_index: usize,
        url: String,
    },
}

#[derive(Debug, Clone, Copy)]
enum TimerKind {
    Retry,
    ConfirmStable,
}

#[derive(Debug)]
struct Timer {
    due: Instant,
    kind: TimerKind,
    token: u64,
}

pub struct PlaybackSession<E: PlaybackEngine> {
    engine: E,
    channels: Vec<Channel>,
    resolver: Arc<dyn Resolve>,
    prober: Arc<dyn Probe>,
    /// Short-lived redirect cache in front of the shared resolver
    session_cache: Arc<RedirectCache>,
    config: FailoverConfig,
    failover: FailoverController,

    active_channel: Option<usize>,
    last_loaded_url: Option<String>,
    /// Bumped for every load request so an older resolve cannot overtake a newer one
    load_serial: u64,
    engine_state: EngineState,
    status: Status,
    probing: Option<(usize, usize)>,
    indicator_until: Option<Instant>,
    last_error: Option<String>,
    volume: u8,

    timers: Vec<Timer>,
    events: Vec<SessionEvent>,
    task_sender: Sender<TaskResult>,
    task_receiver: Receiver<TaskResult>,
}

impl<E: PlaybackEngine> PlaybackSession<E> {
    pub fn new(
        engine: E,
        channels: Vec<Channel>,
        resolver: Arc<dyn Resolve>,
        prober: Arc<dyn Probe>,
        config: FailoverConfig,
    ) -> Result<Self, SessionError> {
        if channels.is_empty() {
            return Err(SessionError::EmptyChannelList);
        }

        let (task_sender, task_receiver) = mpsc::channel();
        Ok(Self {
            engine,
            channels,
            resolver,
            prober,
            session_cache: Arc::new(RedirectCache::new(config.session_cache_ttl())),
            failover: FailoverController::new(&config),
            config,
            active_channel: None,
            last_loaded_url: None,
            load_serial: 0,
            engine_state: EngineState::Idle,
            status: Status::Idle,
            probing: None,
            indicator_until: None,
            last_error: None,
            volume: 100,
            timers: Vec::new(),
            events: Vec::new(),
            task_sender,
            task_receiver,
        })
    }

    // ---- Commands ----

    /// Start playing channel `index`.
    ///
    /// With `initial_source` > 0 that source is played directly; otherwise a
    /// multi-source channel is probed in list order first.
    pub fn load_channel(&mut self, index: usize, initial_source: Option<usize>) -> Result<(), SessionError> {
        let channel = self.channels.get(index).ok_or(SessionError::ChannelOutOfRange {
            index,
            len: self.channels.len(),
        })?;
        let total = channel.sources.len();
        if total == 0 {
            return Err(SessionError::NoSources { index });
        }
        if let Some(source) = initial_source {
            if source >= total {
                return Err(SessionError::SourceOutOfRange { index: source, len: total });
            }
        }

        log::info!("Loading channel {} ({} source(s))", channel.name, total);

        self.timers.clear();
        self.probing = None;
        self.last_error = None;
        self.indicator_until = None;
        self.engine.stop();
        self.engine_state = EngineState::Idle;
        self.active_channel = Some(index);

        let directive = self.failover.select_channel(total, initial_source);
        self.events.push(SessionEvent::ChannelChanged(SourceChange {
            channel_index: index,
            source_index: self.failover.active_source_index(),
            total_sources: total,
        }));
        self.execute(directive);
        self.refresh_status();
        Ok(())
    }

    /// Next/previous channel, wrapping at the ends. Always starts from source 0.
    pub fn switch_channel(&mut self, direction: Direction) -> Result<(), SessionError> {
        let current = self.active_channel.ok_or(SessionError::NoActiveChannel)?;
        let next = direction.step(current, self.channels.len());
        self.load_channel(next, None)
    }

    /// Manual search for a reachable source in `direction`
    pub fn cycle_source(&mut self, direction: Direction) -> Result<SourceCycle, SessionError> {
        if self.active_channel.is_none() {
            return Err(SessionError::NoActiveChannel);
        }

        let result = match self.failover.cycle_source(direction) {
            Directive::None => SourceCycle::SingleSource,
            Directive::PleaseWait => {
                log::info!("Source switch already in progress");
                self.events.push(SessionEvent::PleaseWait);
                SourceCycle::PleaseWait
            }
            directive => {
                self.execute(directive);
                SourceCycle::Started
            }
        };
        self.refresh_status();
        Ok(result)
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.require_pausable()?;
        self.engine.pause();
        Ok(())
    }

    pub fn play(&mut self) -> Result<(), SessionError> {
        self.require_pausable()?;
        self.engine.resume();
        Ok(())
    }

    fn require_pausable(&self) -> Result<(), SessionError> {
        self.require_channel()?;
        if !self.engine.can_pause() {
            return Err(SessionError::PauseUnsupported);
        }
        Ok(())
    }

    pub fn seek_to(&mut self, position_ms: u64) -> Result<(), SessionError> {
        let channel = self.require_channel()?;
        if !channel.seekable {
            return Err(SessionError::NotSeekable);
        }
        self.engine.seek_to(position_ms);
        Ok(())
    }

    /// Set volume in percent, clamped to 100
    pub fn set_volume(&mut self, percent: u8) {
        self.volume = percent.min(100);
        self.engine.set_volume(self.volume);
    }

    /// Stop playback and invalidate all outstanding work
    pub fn teardown(&mut self) {
        if self.active_channel.is_none() && self.failover.state() == FailoverState::Idle {
            return;
        }
        log::debug!("Tearing down playback session");
        self.failover.reset();
        self.timers.clear();
        self.probing = None;
        self.indicator_until = None;
        self.active_channel = None;
        self.last_loaded_url = None;
        self.engine.stop();
        self.engine_state = EngineState::Idle;
        self.refresh_status();
    }

    pub fn close(mut self) {
        self.teardown();
    }

    // ---- Control loop ----

    /// Apply engine events, worker results and due timers. Call regularly
    /// from the owning thread.
    pub fn poll(&mut self) {
        for event in self.engine.poll_events() {
            self.handle_engine_event(event);
        }

        while let Ok(result) = self.task_receiver.try_recv() {
            self.handle_task_result(result);
        }

        self.fire_due_timers(Instant::now());
        self.refresh_status();
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::StateChanged(state) => {
                log::debug!("Engine state: {:?}", state);
                self.engine_state = state;
            }
            EngineEvent::IsPlayingChanged(playing) => {
                if playing && self.failover.state() == FailoverState::Loaded {
                    self.schedule(TimerKind::ConfirmStable, self.config.stability_delay());
                }
            }
            EngineEvent::Error(cause) => {
                log::warn!("Playback error: {}", cause);
                self.cancel_stability_check();
                let directive = self.failover.on_engine_error(&cause);
                self.execute(directive);
            }
        }
    }

    fn handle_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::ScanProgress { token, index, total } => {
                if !self.failover.token().is_current(token) {
                    return;
                }
                self.probing = Some((index, total));
                self.events.push(SessionEvent::Probing { index, total });
            }
            TaskResult::ScanFinished { plan, outcome } => {
                if self.failover.token().is_current(plan.token) {
                    self.probing = None;
                }
                let directive = self.failover.scan_finished(&plan, outcome);
                self.execute(directive);
            }
            TaskResult::Resolved { token, serial, source_index, url } => {
                if !self.failover.token().is_current(token)
                    || serial != self.load_serial
                    || source_index != self.failover.active_source_index()
                {
                    log::debug!("Dropping stale resolution of source {}", source_index + 1);
                    return;
                }
                log::info!("Opening source {}/{}: {}", source_index + 1, self.total_sources(), url);
                self.engine.load(&url);
                self.last_loaded_url = Some(url);
            }
        }
    }

    fn fire_due_timers(&mut self, now: Instant) {
        let (due, pending): (Vec<Timer>, Vec<Timer>) =
            std::mem::take(&mut self.timers).into_iter().partition(|t| t.due <= now);
        self.timers = pending;

        for timer in due {
            match timer.kind {
                TimerKind::Retry => {
                    let directive = self.failover.retry_due(timer.token);
                    self.execute(directive);
                }
                TimerKind::ConfirmStable => {
                    if !self.engine.is_playing() {
                        log::debug!("Playback no longer running, stability not confirmed");
                        continue;
                    }
                    if self.failover.confirm_stable(timer.token) {
                        log::debug!("Playback stable, retry counter reset");
                    }
                }
            }
        }
    }

    /// Only a stream that keeps playing may clear earlier failures
    fn cancel_stability_check(&mut self) {
        self.timers.retain(|t| !matches!(t.kind, TimerKind::ConfirmStable));
    }

    fn schedule(&mut self, kind: TimerKind, delay: std::time::Duration) {
        self.timers.push(Timer {
            due: Instant::now() + delay,
            kind,
            token: self.failover.token().current(),
        });
    }

    fn execute(&mut self, directive: Directive) {
        match directive {
            Directive::None => {}
            Directive::Play { source_index } => {
                self.cancel_stability_check();
                self.engine.stop();
                self.engine_state = EngineState::Idle;
                self.last_error = None;
                self.announce_source(source_index);
                self.start_load(source_index);
            }
            Directive::Reload { source_index } => {
                log::info!("Retrying source {}/{}", source_index + 1, self.total_sources());
                self.cancel_stability_check();
                self.engine.stop();
                self.engine_state = EngineState::Idle;
                self.start_load(source_index);
            }
            Directive::ScheduleRetry { token, delay, .. } => {
                self.timers.push(Timer {
                    due: Instant::now() + delay,
                    kind: TimerKind::Retry,
                    token,
                });
            }
            Directive::Scan(plan) => self.start_scan(plan),
            Directive::Exhausted { cause } => {
                let message = format!("All {} source(s) failed: {}", self.total_sources(), cause);
                self.timers.clear();
                self.probing = None;
                self.last_error = Some(message.clone());
                self.events.push(SessionEvent::Exhausted { message });
            }
            Directive::PleaseWait => self.events.push(SessionEvent::PleaseWait),
        }
    }

    fn announce_source(&mut self, source_index: usize) {
        let Some(channel_index) = self.active_channel else {
            return;
        };
        let total_sources = self.total_sources();
        if total_sources > 1 {
            self.indicator_until = Some(Instant::now() + self.config.source_indicator());
        }
        self.events.push(SessionEvent::SourceChanged(SourceChange {
            channel_index,
            source_index,
            total_sources,
        }));
    }

    fn start_scan(&mut self, plan: ScanPlan) {
        let Some(channel) = self.current_channel() else {
            return;
        };
        let urls = channel.source_urls();
        let total = urls.len();
        log::debug!("Starting {:?} scan over {:?}", plan.kind, plan.order);

        let prober = Arc::clone(&self.prober);
        let token = self.failover.token().clone();
        let sender = self.task_sender.clone();

        thread::spawn(move || {
            let generation = plan.token;
            let progress = sender.clone();
            let outcome = scan::run_scan(&plan, &urls, prober.as_ref(), &token, |index| {
                let _ = progress.send(TaskResult::ScanProgress { token: generation, index, total });
            });
            if let Some(outcome) = outcome {
                let _ = sender.send(TaskResult::ScanFinished { plan, outcome });
            }
        });
    }

    fn start_load(&mut self, source_index: usize) {
        let Some(source) = self.current_channel().and_then(|c| c.sources.get(source_index)) else {
            return;
        };
        let original = source.url.clone();

        self.load_serial += 1;
        let serial = self.load_serial;
        let token = self.failover.token().current();
        let resolver = Arc::clone(&self.resolver);
        let cache = Arc::clone(&self.session_cache);
        let sender = self.task_sender.clone();

        thread::spawn(move || {
            let key = rules::strip_annotation(&original);
            let url = match cache.get(key) {
                Some(hit) => hit,
                None => {
                    let resolved = resolver.resolve(&original);
                    // Unchanged results may be failures; leave those to the resolver
                    if resolved != key {
                        cache.insert(key, &resolved);
                    }
                    resolved
                }
            };
            let _ = sender.send(TaskResult::Resolved { token, serial, source_index, url });
        });
    }

    fn refresh_status(&mut self) {
        let status = derive_status(self.failover.state(), self.engine_state, self.engine.is_playing());
        if status != self.status {
            log::debug!("Status: {} -> {}", self.status, status);
            self.status = status;
            self.events.push(SessionEvent::StatusChanged(status));
        }
    }

    fn require_channel(&self) -> Result<&Channel, SessionError> {
        self.current_channel().ok_or(SessionError::NoActiveChannel)
    }

    // ---- Queries ----

    pub fn current_status(&self) -> Status {
        self.status
    }

    /// Status line, with probe progress while a scan runs
    pub fn status_text(&self) -> String {
        match self.probing {
            Some((index, total)) if self.failover.state().is_scanning() => {
                format!("Checking source {}/{}", index + 1, total)
            }
            _ => self.status.to_string(),
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn current_channel_index(&self) -> Option<usize> {
        self.active_channel
    }

    pub fn current_channel(&self) -> Option<&Channel> {
        self.active_channel.and_then(|i| self.channels.get(i))
    }

    pub fn current_source_index(&self) -> usize {
        self.failover.active_source_index()
    }

    pub fn total_sources(&self) -> usize {
        self.current_channel().map_or(0, |c| c.sources.len())
    }

    pub fn retry_count(&self) -> u32 {
        self.failover.retry_count()
    }

    pub fn failover_state(&self) -> FailoverState {
        self.failover.state()
    }

    pub fn last_loaded_url(&self) -> Option<&str> {
        self.last_loaded_url.as_deref()
    }

    /// Message of the last exhaustion, cleared when a new source plays
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Shown for a few seconds after a source change on multi-source channels
    pub fn source_indicator(&self) -> Option<SourceIndicator> {
        let until = self.indicator_until?;
        if Instant::now() >= until || self.total_sources() < 2 {
            return None;
        }
        Some(SourceIndicator {
            source_index: self.failover.active_source_index(),
            total_sources: self.total_sources(),
        })
    }

    pub fn playback_snapshot(&self) -> PlaybackSnapshot {
        let is_playing = self.engine.is_playing();
        PlaybackSnapshot {
            is_playing,
            position_ms: self.engine.position_ms(),
            duration_ms: self.engine.duration_ms(),
            state: PlaybackSnapshot::state_label(self.engine_state, is_playing),
        }
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn session_cache(&self) -> &RedirectCache {
        &self.session_cache
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

impl<E: PlaybackEngine> Drop for PlaybackSession<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
