//! Failover decisions for the active channel
//!
//! [`FailoverController`] owns the active source index, the retry counter and
//! the decision state. It performs no I/O: every transition returns a
//! [`Directive`] that the session carries out (spawn a scan, schedule a retry,
//! load a source). Results come back through
//! [`scan_finished`](FailoverController::scan_finished) and
//! [`retry_due`](FailoverController::retry_due), tagged with the token that was
//! current when the work started.

pub mod scan;
pub mod token;

pub use scan::{ScanKind, ScanOutcome, ScanPlan};
pub use token::VerificationToken;

use crate::config::FailoverConfig;
use crate::models::Direction;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailoverState {
    /// No channel selected
    #[default]
    Idle,
    /// Initial probe of a multi-source channel
    Selecting,
    /// Playing, or attempting to play, the active source
    Loaded,
    /// Waiting out the backoff before reloading the same source
    Retrying,
    /// Probing later sources after retries ran out
    SearchingForward,
    /// User-requested directional search
    ManualSwitching,
    /// Nothing left to try until the user acts
    Exhausted,
}

impl FailoverState {
    pub fn is_scanning(self) -> bool {
        matches!(
            self,
            FailoverState::Selecting | FailoverState::SearchingForward | FailoverState::ManualSwitching
        )
    }
}

/// What the session must do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    None,
    /// Make `source_index` the active source: clear the engine, resolve, load
    Play { source_index: usize },
    /// Load the active source again without changing it
    Reload { source_index: usize },
    ScheduleRetry { token: u64, delay: Duration, attempt: u32 },
    Scan(ScanPlan),
    Exhausted { cause: String },
    /// A manual switch is already running
    PleaseWait,
}

#[derive(Debug)]
pub struct FailoverController {
    max_retries: u32,
    retry_delay: Duration,
    token: VerificationToken,
    state: FailoverState,
    source_count: usize,
    active_source_index: usize,
    retry_count: u32,
    /// Busy flag for user-initiated switches
    manual_switching: bool,
    auto_switching: bool,
}

impl FailoverController {
    pub fn new(config: &FailoverConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            token: VerificationToken::new(),
            state: FailoverState::Idle,
            source_count: 0,
            active_source_index: 0,
            retry_count: 0,
            manual_switching: false,
            auto_switching: false,
        }
    }

    pub fn token(&self) -> &VerificationToken {
        &self.token
    }

    pub fn state(&self) -> FailoverState {
        self.state
    }

    pub fn active_source_index(&self) -> usize {
        self.active_source_index
    }

    pub fn source_count(&self) -> usize {
        self.source_count
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_manual_switching(&self) -> bool {
        self.manual_switching
    }

    pub fn is_auto_switching(&self) -> bool {
        self.auto_switching
    }

    /// A channel was selected. `initial` is validated by the caller.
    pub fn select_channel(&mut self, source_count: usize, initial: Option<usize>) -> Directive {
        let generation = self.token.advance();
        self.source_count = source_count;
        self.retry_count = 0;
        self.manual_switching = false;
        self.auto_switching = false;

        match initial {
            Some(index) if index > 0 && index < source_count => {
                self.activate(index);
                Directive::Play { source_index: index }
            }
            _ if source_count > 1 => {
                self.active_source_index = 0;
                self.state = FailoverState::Selecting;
                Directive::Scan(ScanPlan {
                    kind: ScanKind::Initial,
                    token: generation,
                    order: scan::initial_order(source_count),
                    fallback: 0,
                })
            }
            _ => {
                self.activate(0);
                Directive::Play { source_index: 0 }
            }
        }
    }

    /// The engine reported a playback error
    pub fn on_engine_error(&mut self, cause: &str) -> Directive {
        if self.state != FailoverState::Loaded {
            log::debug!("Ignoring engine error in {:?}: {}", self.state, cause);
            return Directive::None;
        }

        if self.retry_count < self.max_retries {
            self.retry_count += 1;
            self.state = FailoverState::Retrying;
            log::info!("Playback error, retry {}/{}: {}", self.retry_count, self.max_retries, cause);
            return Directive::ScheduleRetry {
                token: self.token.current(),
                delay: self.retry_delay,
                attempt: self.retry_count,
            };
        }

        let next = self.active_source_index + 1;
        if self.source_count > 1 && next < self.source_count {
            let generation = self.token.advance();
            self.state = FailoverState::SearchingForward;
            log::info!(
                "Source {}/{} failed after {} retries, searching forward",
                self.active_source_index + 1,
                self.source_count,
                self.retry_count
            );
            return Directive::Scan(ScanPlan {
                kind: ScanKind::Forward,
                token: generation,
                order: scan::forward_order(self.active_source_index, self.source_count),
                fallback: next,
            });
        }

        self.state = FailoverState::Exhausted;
        log::warn!("All {} source(s) exhausted: {}", self.source_count, cause);
        Directive::Exhausted { cause: cause.to_string() }
    }

    /// Backoff elapsed for the retry scheduled under `generation`
    pub fn retry_due(&mut self, generation: u64) -> Directive {
        if !self.token.is_current(generation) || self.state != FailoverState::Retrying {
            return Directive::None;
        }
        self.state = FailoverState::Loaded;
        Directive::Reload { source_index: self.active_source_index }
    }

    /// User asked for the adjacent source in `direction`
    pub fn cycle_source(&mut self, direction: Direction) -> Directive {
        if self.source_count <= 1 {
            return Directive::None;
        }
        if self.manual_switching {
            return Directive::PleaseWait;
        }

        let generation = self.token.advance();
        self.retry_count = 0;
        self.auto_switching = false;
        self.manual_switching = true;
        self.state = FailoverState::ManualSwitching;

        let start = self.active_source_index;
        Directive::Scan(ScanPlan {
            kind: ScanKind::Manual(direction),
            token: generation,
            order: scan::circular_order(start, self.source_count, direction),
            fallback: direction.step(start, self.source_count),
        })
    }

    /// A scan worker finished. Stale results are dropped without touching state.
    pub fn scan_finished(&mut self, plan: &ScanPlan, outcome: ScanOutcome) -> Directive {
        if !self.token.is_current(plan.token) {
            log::debug!("Dropping stale {:?} scan result {:?}", plan.kind, outcome);
            return Directive::None;
        }

        let chosen = match outcome {
            ScanOutcome::Found(index) => index,
            ScanOutcome::NotFound => {
                log::info!(
                    "No reachable source found, falling back to source {}/{}",
                    plan.fallback + 1,
                    self.source_count
                );
                plan.fallback
            }
        };

        match plan.kind {
            ScanKind::Initial => {}
            ScanKind::Forward => self.auto_switching = true,
            ScanKind::Manual(_) => self.manual_switching = false,
        }

        if chosen >= self.source_count {
            self.state = FailoverState::Exhausted;
            return Directive::Exhausted { cause: "no playable source".to_string() };
        }

        self.activate(chosen);
        Directive::Play { source_index: chosen }
    }

    /// Playback has been stable long enough to forget earlier failures
    pub fn confirm_stable(&mut self, generation: u64) -> bool {
        if !self.token.is_current(generation) || self.state != FailoverState::Loaded {
            return false;
        }
        self.retry_count = 0;
        self.auto_switching = false;
        true
    }

    /// Session teardown: invalidate everything in flight
    pub fn reset(&mut self) {
        self.token.advance();
        self.state = FailoverState::Idle;
        self.source_count = 0;
        self.active_source_index = 0;
        self.retry_count = 0;
        self.manual_switching = false;
        self.auto_switching = false;
    }

    fn activate(&mut self, index: usize) {
        self.active_source_index = index;
        self.retry_count = 0;
        self.state = FailoverState::Loaded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> FailoverController {
        FailoverController::new(&FailoverConfig::default())
    }

    fn expect_scan(directive: Directive) -> ScanPlan {
        match directive {
            Directive::Scan(plan) => plan,
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn test_single_source_plays_immediately() {
        let mut fc = controller();
        assert_eq!(fc.select_channel(1, None), Directive::Play { source_index: 0 });
        assert_eq!(fc.state(), FailoverState::Loaded);
    }

    #[test]
    fn test_multi_source_scans_in_order_and_falls_back_to_zero() {
        let mut fc = controller();
        let plan = expect_scan(fc.select_channel(3, None));
        assert_eq!(plan.order, vec![0, 1, 2]);
        assert_eq!(fc.state(), FailoverState::Selecting);

        assert_eq!(fc.scan_finished(&plan, ScanOutcome::NotFound), Directive::Play { source_index: 0 });
        assert_eq!(fc.state(), FailoverState::Loaded);
    }

    #[test]
    fn test_explicit_initial_source_skips_scan() {
        let mut fc = controller();
        assert_eq!(fc.select_channel(3, Some(2)), Directive::Play { source_index: 2 });
        assert_eq!(fc.active_source_index(), 2);

        let plan = expect_scan(fc.select_channel(3, Some(0)));
        assert_eq!(plan.kind, ScanKind::Initial);
    }

    #[test]
    fn test_retry_bound_then_forward_search() {
        let mut fc = controller();
        fc.select_channel(3, Some(1));

        for attempt in 1..=2 {
            let directive = fc.on_engine_error("timeout");
            let Directive::ScheduleRetry { token, attempt: a, .. } = directive else {
                panic!("expected retry, got {:?}", directive);
            };
            assert_eq!(a, attempt);
            assert_eq!(fc.retry_due(token), Directive::Reload { source_index: 1 });
        }

        let plan = expect_scan(fc.on_engine_error("timeout"));
        assert_eq!(plan.kind, ScanKind::Forward);
        assert_eq!(plan.order, vec![2]);
        assert_eq!(plan.fallback, 2);
        assert_eq!(fc.state(), FailoverState::SearchingForward);

        assert_eq!(fc.scan_finished(&plan, ScanOutcome::NotFound), Directive::Play { source_index: 2 });
        assert_eq!(fc.retry_count(), 0);
        assert!(fc.is_auto_switching());
    }

    #[test]
    fn test_last_source_exhausts() {
        let mut fc = controller();
        fc.select_channel(1, None);
        for _ in 0..2 {
            if let Directive::ScheduleRetry { token, .. } = fc.on_engine_error("404") {
                fc.retry_due(token);
            }
        }
        assert_eq!(fc.on_engine_error("404"), Directive::Exhausted { cause: "404".to_string() });
        assert_eq!(fc.state(), FailoverState::Exhausted);
        assert_eq!(fc.on_engine_error("404"), Directive::None);
    }

    #[test]
    fn test_errors_ignored_during_backoff() {
        let mut fc = controller();
        fc.select_channel(1, None);
        assert!(matches!(fc.on_engine_error("a"), Directive::ScheduleRetry { .. }));
        assert_eq!(fc.on_engine_error("b"), Directive::None);
        assert_eq!(fc.retry_count(), 1);
    }

    #[test]
    fn test_manual_switch_rejects_second_request() {
        let mut fc = controller();
        fc.select_channel(4, Some(1));

        let plan = expect_scan(fc.cycle_source(Direction::Next));
        assert_eq!(plan.order, vec![2, 3, 0]);
        assert_eq!(plan.fallback, 2);
        assert_eq!(fc.cycle_source(Direction::Next), Directive::PleaseWait);

        assert_eq!(fc.scan_finished(&plan, ScanOutcome::Found(3)), Directive::Play { source_index: 3 });
        assert!(!fc.is_manual_switching());
        assert!(matches!(fc.cycle_source(Direction::Previous), Directive::Scan(_)));
    }

    #[test]
    fn test_manual_switch_supersedes_forward_search() {
        let mut fc = controller();
        fc.select_channel(4, Some(1));
        fc.max_retries = 0;

        let auto = expect_scan(fc.on_engine_error("eof"));
        let manual = expect_scan(fc.cycle_source(Direction::Previous));

        assert_eq!(fc.scan_finished(&auto, ScanOutcome::Found(2)), Directive::None);
        assert_eq!(fc.active_source_index(), 1);
        assert_eq!(fc.scan_finished(&manual, ScanOutcome::Found(3)), Directive::Play { source_index: 3 });
        assert_eq!(fc.active_source_index(), 3);
    }

    #[test]
    fn test_stale_manual_result_keeps_busy_flag_of_new_switch() {
        let mut fc = controller();
        fc.select_channel(3, Some(1));
        let stale = expect_scan(fc.cycle_source(Direction::Next));

        fc.select_channel(3, Some(2));
        let _fresh = expect_scan(fc.cycle_source(Direction::Next));
        assert_eq!(fc.scan_finished(&stale, ScanOutcome::Found(0)), Directive::None);
        assert!(fc.is_manual_switching());
    }

    #[test]
    fn test_stability_resets_retry_pressure() {
        let mut fc = controller();
        fc.select_channel(2, Some(1));
        let Directive::ScheduleRetry { token, .. } = fc.on_engine_error("stall") else {
            panic!("expected retry");
        };
        fc.retry_due(token);
        assert_eq!(fc.retry_count(), 1);

        assert!(fc.confirm_stable(fc.token().current()));
        assert_eq!(fc.retry_count(), 0);
        assert!(!fc.confirm_stable(token.wrapping_sub(1)));
    }
}
