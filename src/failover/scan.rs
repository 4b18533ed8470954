//! Source scan orders and the worker loop that walks them
//!
//! A scan probes candidates strictly one at a time in a fixed order and stops
//! at the first reachable one.

use super::token::VerificationToken;
use crate::models::Direction;
use crate::prober::Probe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// First reachable source when a channel is selected
    Initial,
    /// Sources after the failing one, after retries ran out
    Forward,
    /// User-requested circular search
    Manual(Direction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    pub kind: ScanKind,
    /// Generation the scan belongs to
    pub token: u64,
    pub order: Vec<usize>,
    /// Source to switch to when nothing answers
    pub fallback: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Found(usize),
    NotFound,
}

pub fn initial_order(total: usize) -> Vec<usize> {
    (0..total).collect()
}

/// Indices after `current`, no wrap-around
pub fn forward_order(current: usize, total: usize) -> Vec<usize> {
    (current + 1..total).collect()
}

/// Every index except `start`, beginning at its neighbour in `direction` and wrapping
pub fn circular_order(start: usize, total: usize, direction: Direction) -> Vec<usize> {
    let mut order = Vec::with_capacity(total.saturating_sub(1));
    if total < 2 {
        return order;
    }
    let mut index = direction.step(start, total);
    while index != start {
        order.push(index);
        index = direction.step(index, total);
    }
    order
}

/// Probe `urls` in plan order on the calling thread.
///
/// `on_probe` is called with each index just before it is probed. Returns
/// `None` if the token moved on, in which case the scan was abandoned.
pub fn run_scan(
    plan: &ScanPlan,
    urls: &[String],
    prober: &dyn Probe,
    token: &VerificationToken,
    mut on_probe: impl FnMut(usize),
) -> Option<ScanOutcome> {
    for &index in &plan.order {
        if !token.is_current(plan.token) {
            log::debug!("Scan {:?} abandoned before source {}", plan.kind, index + 1);
            return None;
        }
        let Some(url) = urls.get(index) else {
            continue;
        };
        on_probe(index);
        if prober.probe(url) {
            log::debug!("Source {}/{} reachable", index + 1, urls.len());
            return Some(ScanOutcome::Found(index));
        }
        log::debug!("Source {}/{} unreachable", index + 1, urls.len());
    }

    if !token.is_current(plan.token) {
        return None;
    }
    Some(ScanOutcome::NotFound)
}
