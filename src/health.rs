//! Per-source health tracking and active-source rotation.
//!
//! [`FallbackManager`] is the only owner of [`SourceHealth`] state. Adapters
//! report outcomes through [`FallbackManager::track`] (or the `mark_*` methods)
//! and the aggregation facade reads [`FallbackManager::available_sources`] to
//! decide fan-out order.
//!
//! Error counts decay: every success forgives one previous error, so a source
//! recovers through normal traffic without an explicit reset.
//!
//! # Examples
//!
//! ```rust
//! use hondana::health::FallbackManager;
//!
//! let manager = FallbackManager::new([("mangapark", 1), ("mangadex", 2)]);
//! assert_eq!(manager.current_source(), "mangapark");
//!
//! manager.mark_request_start("mangapark");
//! manager.mark_request_failure("mangapark", "connection reset");
//! assert_eq!(manager.current_source(), "mangadex");
//! ```

use chrono::Utc;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, error, info, warn};

use crate::config::SourceConfig;
use crate::error::Result;
use crate::types::SourceHealth;

#[derive(Debug, Default)]
struct HealthState {
    health: HashMap<String, SourceHealth>,
    active: String,
}

impl HealthState {
    fn entry(&mut self, source: &str) -> &mut SourceHealth {
        self.health
            .entry(source.to_string())
            .or_insert_with(|| SourceHealth::new(source))
    }
}

/// Health state machine for every known source.
///
/// All mutations are serialized through one mutex; the lock is never held
/// across an `await`.
#[derive(Debug)]
pub struct FallbackManager {
    priorities: HashMap<String, u32>,
    state: Mutex<HealthState>,
}

impl FallbackManager {
    /// Creates a manager from `(source, priority)` pairs. Lower priority is
    /// preferred; the most preferred source starts as the active one.
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let priorities: HashMap<String, u32> = sources
            .into_iter()
            .map(|(name, priority)| (name.into(), priority))
            .collect();

        let mut state = HealthState::default();
        for name in priorities.keys() {
            state.health.insert(name.clone(), SourceHealth::new(name.as_str()));
        }
        state.active = priorities
            .iter()
            .min_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(name, _)| name.clone())
            .unwrap_or_default();

        Self {
            priorities,
            state: Mutex::new(state),
        }
    }

    /// Creates a manager for every enabled source of a configuration table.
    pub fn from_configs(configs: &[SourceConfig]) -> Self {
        Self::new(
            configs
                .iter()
                .filter(|c| c.enabled)
                .map(|c| (c.name.clone(), c.priority)),
        )
    }

    fn priority(&self, source: &str) -> u32 {
        self.priorities.get(source).copied().unwrap_or(u32::MAX)
    }

    pub fn mark_request_start(&self, source: &str) {
        let mut state = self.state.lock();
        state.entry(source).request_count += 1;
    }

    /// Records a success: recomputes the rate, marks the source healthy and
    /// forgives one outstanding error.
    pub fn mark_request_success(&self, source: &str) {
        let mut state = self.state.lock();
        let health = state.entry(source);
        health.success_rate = success_rate(health.request_count, health.error_count);
        health.healthy = true;
        health.last_success_time = Some(Utc::now());
        health.error_count = health.error_count.saturating_sub(1);
        debug!(
            source,
            success_rate = health.success_rate,
            error_count = health.error_count,
            "Request succeeded"
        );
    }

    /// Records a failure and rotates away from `source` if it is the active one.
    pub fn mark_request_failure(&self, source: &str, reason: &str) {
        let is_active = {
            let mut state = self.state.lock();
            let health = state.entry(source);
            health.error_count += 1;
            health.success_rate = success_rate(health.request_count, health.error_count);
            health.healthy = false;
            warn!(
                source,
                reason,
                success_rate = health.success_rate,
                error_count = health.error_count,
                "Request failed"
            );
            state.active == source
        };

        if is_active {
            self.rotate_source();
        }
    }

    /// Switches the active source to the best available alternative.
    ///
    /// The current source is only kept when it is the sole available one. When
    /// nothing is available the active source is left unchanged.
    pub fn rotate_source(&self) {
        let mut state = self.state.lock();
        let available = self.available_in(&state);

        if available.is_empty() {
            error!(active = %state.active, "No sources available, keeping active source");
            return;
        }

        let candidates: Vec<&SourceHealth> = available
            .iter()
            .copied()
            .filter(|h| h.source != state.active)
            .collect();

        if candidates.is_empty() {
            warn!(active = %state.active, "Only the active source is available, not rotating");
            return;
        }

        let best = candidates
            .into_iter()
            .min_by(|a, b| {
                b.success_rate
                    .partial_cmp(&a.success_rate)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| self.priority(&a.source).cmp(&self.priority(&b.source)))
            })
            .map(|h| h.source.clone());

        if let Some(next) = best {
            info!(from = %state.active, to = %next, "Rotating active source");
            state.active = next;
        }
    }

    fn available_in<'a>(&self, state: &'a HealthState) -> Vec<&'a SourceHealth> {
        let mut available: Vec<&SourceHealth> =
            state.health.values().filter(|h| h.is_available()).collect();
        available.sort_by(|a, b| {
            self.priority(&a.source)
                .cmp(&self.priority(&b.source))
                .then_with(|| {
                    b.success_rate
                        .partial_cmp(&a.success_rate)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.source.cmp(&b.source))
        });
        available
    }

    /// Sources that may receive traffic, by priority then success rate.
    pub fn available_sources(&self) -> Vec<String> {
        let state = self.state.lock();
        self.available_in(&state)
            .into_iter()
            .map(|h| h.source.clone())
            .collect()
    }

    pub fn current_source(&self) -> String {
        self.state.lock().active.clone()
    }

    /// Snapshot of one source's health.
    pub fn health(&self, source: &str) -> Option<SourceHealth> {
        self.state.lock().health.get(source).cloned()
    }

    /// Snapshot of every source, ordered by priority.
    pub fn health_report(&self) -> Vec<SourceHealth> {
        let state = self.state.lock();
        let mut report: Vec<SourceHealth> = state.health.values().cloned().collect();
        report.sort_by(|a, b| {
            self.priority(&a.source)
                .cmp(&self.priority(&b.source))
                .then_with(|| a.source.cmp(&b.source))
        });
        report
    }

    pub fn reset_source(&self, source: &str) {
        let mut state = self.state.lock();
        state
            .health
            .insert(source.to_string(), SourceHealth::new(source));
        info!(source, "Health reset");
    }

    pub fn reset_all_sources(&self) {
        let mut state = self.state.lock();
        for (name, health) in state.health.iter_mut() {
            *health = SourceHealth::new(name.as_str());
        }
        info!("Health reset for all sources");
    }

    /// Runs `operation` for `source`, reporting its start and outcome.
    pub async fn track<T, F>(&self, source: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.mark_request_start(source);
        match operation.await {
            Ok(value) => {
                self.mark_request_success(source);
                Ok(value)
            }
            Err(e) => {
                if e.is_blocking() {
                    error!(source, error = %e, "Source is blocking or rate limiting requests");
                }
                self.mark_request_failure(source, &e.to_string());
                Err(e)
            }
        }
    }
}

fn success_rate(request_count: u64, error_count: u64) -> f64 {
    if request_count == 0 {
        return 100.0;
    }
    let ok = request_count.saturating_sub(error_count) as f64;
    (ok / request_count as f64 * 100.0).clamp(0.0, 100.0)
}
