//! Primary/fallback registry channels with shared rate-limit state
//!
//! Backoff is tracked per channel, not per property: once a channel is
//! throttled, every property's search on it waits. When `degrade_threshold`
//! rate limits land inside `degrade_window`, traffic moves to the fallback
//! channel for `degrade_cooldown`.

use super::{DocumentRegistry, DocumentSummary, RegistryError, SearchQuery};
use crate::config::{DiscoveryConfig, RegistryConfig};
use chrono::Utc;
use fcti_common::events::{EventBus, TitleEvent};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Degradation and backoff settings for a channel pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub degrade_threshold: usize,
    pub degrade_window: Duration,
    pub degrade_cooldown: Duration,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl ChannelPolicy {
    pub fn from_config(registry: &RegistryConfig, discovery: &DiscoveryConfig) -> Self {
        Self {
            degrade_threshold: registry.degrade_threshold.max(1),
            degrade_window: Duration::from_secs(registry.degrade_window_secs),
            degrade_cooldown: Duration::from_secs(registry.degrade_cooldown_secs),
            base_backoff: Duration::from_secs(discovery.base_backoff_secs),
            max_backoff: Duration::from_secs(discovery.max_backoff_secs),
        }
    }
}

/// Result of one search routed through the channels
#[derive(Debug)]
pub struct ChannelOutcome {
    /// Channel that served (or refused) the search
    pub channel: String,
    pub result: Result<Vec<DocumentSummary>, RegistryError>,
    /// Channel-imposed wait when rate limited
    pub wait: Option<Duration>,
}

#[derive(Debug, Default)]
struct ChannelHealth {
    recent_limits: VecDeque<Instant>,
    consecutive_limits: u32,
    blocked_until: Option<Instant>,
}

impl ChannelHealth {
    fn remaining_block(&self, now: Instant) -> Option<Duration> {
        self.blocked_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    primary: ChannelHealth,
    fallback: ChannelHealth,
    degraded_until: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Primary,
    Fallback,
}

pub struct RegistryChannels {
    primary: Arc<dyn DocumentRegistry>,
    fallback: Option<Arc<dyn DocumentRegistry>>,
    policy: ChannelPolicy,
    state: Mutex<ChannelState>,
    events: Option<EventBus>,
}

impl RegistryChannels {
    pub fn new(
        primary: Arc<dyn DocumentRegistry>,
        fallback: Option<Arc<dyn DocumentRegistry>>,
        policy: ChannelPolicy,
    ) -> Self {
        Self {
            primary,
            fallback,
            policy,
            state: Mutex::new(ChannelState::default()),
            events: None,
        }
    }

    /// Publish degradation changes on the event bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn registry(&self, route: Route) -> &Arc<dyn DocumentRegistry> {
        match (route, &self.fallback) {
            (Route::Fallback, Some(fallback)) => fallback,
            _ => &self.primary,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True while traffic is routed to the fallback channel
    pub fn is_degraded(&self) -> bool {
        let state = self.lock_state();
        self.fallback.is_some() && state.degraded_until.map_or(false, |u| u > Instant::now())
    }

    /// Pick the route for the next search, restoring primary after cooldown
    fn choose_route(&self, now: Instant) -> Route {
        let mut state = self.lock_state();
        if self.fallback.is_none() {
            return Route::Primary;
        }
        let degraded_until = state.degraded_until;
        match degraded_until {
            Some(until) if until > now => Route::Fallback,
            Some(_) => {
                state.degraded_until = None;
                state.primary.recent_limits.clear();
                drop(state);
                info!(channel = self.primary.name(), "Registry cooldown elapsed, returning to primary channel");
                self.emit_degraded(self.primary.name(), false);
                Route::Primary
            }
            None => {
                // Throttled primary with a free fallback: use the fallback
                if state.primary.remaining_block(now).is_some()
                    && state.fallback.remaining_block(now).is_none()
                {
                    Route::Fallback
                } else {
                    Route::Primary
                }
            }
        }
    }

    /// Route one search, honouring per-channel backoff
    ///
    /// A channel still inside its backoff window is not called at all; the
    /// outcome reports `RateLimited` with the remaining wait so the caller
    /// can reschedule the task and move on.
    pub async fn search(&self, query: &SearchQuery) -> ChannelOutcome {
        let now = Instant::now();
        let route = self.choose_route(now);
        let registry = self.registry(route).clone();
        let channel = registry.name().to_string();

        let blocked = {
            let state = self.lock_state();
            match route {
                Route::Primary => state.primary.remaining_block(now),
                Route::Fallback => state.fallback.remaining_block(now),
            }
        };
        if let Some(wait) = blocked {
            return ChannelOutcome {
                channel,
                result: Err(RegistryError::RateLimited {
                    retry_after_secs: Some(wait.as_secs().max(1)),
                }),
                wait: Some(wait),
            };
        }

        let result = registry.search(query).await;
        let wait = match &result {
            Err(RegistryError::RateLimited { retry_after_secs }) => {
                Some(self.record_rate_limit(route, *retry_after_secs))
            }
            Ok(_) => {
                let mut state = self.lock_state();
                let health = match route {
                    Route::Primary => &mut state.primary,
                    Route::Fallback => &mut state.fallback,
                };
                health.consecutive_limits = 0;
                health.blocked_until = None;
                None
            }
            Err(_) => None,
        };

        ChannelOutcome {
            channel,
            result,
            wait,
        }
    }

    /// Book a rate limit against a channel; returns the imposed wait
    fn record_rate_limit(&self, route: Route, retry_after_secs: Option<u64>) -> Duration {
        let now = Instant::now();
        let policy = self.policy;
        let mut state = self.lock_state();

        let health = match route {
            Route::Primary => &mut state.primary,
            Route::Fallback => &mut state.fallback,
        };
        let exponent = health.consecutive_limits.min(16);
        health.consecutive_limits += 1;
        let exponential = policy
            .base_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(policy.max_backoff)
            .min(policy.max_backoff);
        let wait = retry_after_secs
            .map(Duration::from_secs)
            .unwrap_or(exponential);
        health.blocked_until = Some(now + wait);

        health.recent_limits.push_back(now);
        while health
            .recent_limits
            .front()
            .map_or(false, |t| now.duration_since(*t) > policy.degrade_window)
        {
            health.recent_limits.pop_front();
        }
        let recent = health.recent_limits.len();

        let degrade = route == Route::Primary
            && self.fallback.is_some()
            && recent >= policy.degrade_threshold
            && state.degraded_until.is_none();
        if degrade {
            state.degraded_until = Some(now + policy.degrade_cooldown);
        }
        drop(state);

        warn!(
            channel = self.registry(route).name(),
            wait_secs = wait.as_secs(),
            recent_limits = recent,
            "Registry rate limited"
        );
        if degrade {
            let fallback = self.registry(Route::Fallback).name().to_string();
            warn!(
                channel = %fallback,
                cooldown_secs = policy.degrade_cooldown.as_secs(),
                "Switching registry traffic to fallback channel"
            );
            self.emit_degraded(&fallback, true);
        }
        wait
    }

    fn emit_degraded(&self, channel: &str, degraded: bool) {
        if let Some(events) = &self.events {
            events.emit_lossy(TitleEvent::ChannelDegraded {
                channel: channel.to_string(),
                degraded,
                timestamp: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchOperator, TaskType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        rate_limit: bool,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl DocumentRegistry for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(&self, _query: &SearchQuery) -> Result<Vec<DocumentSummary>, RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.rate_limit {
                Err(RegistryError::RateLimited { retry_after_secs: Some(0) })
            } else {
                Ok(vec![DocumentSummary::default()])
            }
        }
    }

    fn query() -> SearchQuery {
        SearchQuery {
            task_type: TaskType::Reference,
            term: "X1".into(),
            operator: SearchOperator::Exact,
            date_from: None,
            date_to: None,
        }
    }

    fn policy() -> ChannelPolicy {
        ChannelPolicy {
            degrade_threshold: 3,
            degrade_window: Duration::from_secs(60),
            degrade_cooldown: Duration::from_secs(300),
            base_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(900),
        }
    }

    #[tokio::test]
    async fn test_degrades_to_fallback_after_threshold() {
        let primary = Arc::new(Scripted { name: "primary", rate_limit: true, calls: AtomicUsize::new(0) });
        let fallback = Arc::new(Scripted { name: "fallback", rate_limit: false, calls: AtomicUsize::new(0) });
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let channels = RegistryChannels::new(
            primary.clone(),
            Some(fallback.clone() as Arc<dyn DocumentRegistry>),
            policy(),
        )
            .with_events(bus);

        // Retry-After 0 leaves the primary unblocked, so each call reaches it
        for _ in 0..3 {
            let outcome = channels.search(&query()).await;
            assert_eq!(outcome.channel, "primary");
            assert!(outcome.result.unwrap_err().is_rate_limit());
        }
        assert!(channels.is_degraded());

        let outcome = channels.search(&query()).await;
        assert_eq!(outcome.channel, "fallback");
        assert_eq!(outcome.result.unwrap().len(), 1);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 3);

        match rx.recv().await.unwrap() {
            TitleEvent::ChannelDegraded { channel, degraded, .. } => {
                assert_eq!(channel, "fallback");
                assert!(degraded);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blocked_channel_is_not_called() {
        struct Limited(AtomicUsize);

        #[async_trait::async_trait]
        impl DocumentRegistry for Limited {
            fn name(&self) -> &str {
                "primary"
            }

            async fn search(&self, _query: &SearchQuery) -> Result<Vec<DocumentSummary>, RegistryError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(RegistryError::RateLimited { retry_after_secs: Some(120) })
            }
        }

        let primary = Arc::new(Limited(AtomicUsize::new(0)));
        let channels = RegistryChannels::new(primary.clone(), None, policy());

        let first = channels.search(&query()).await;
        assert_eq!(first.wait, Some(Duration::from_secs(120)));

        // Second property hits the same channel backoff without a request
        let second = channels.search(&query()).await;
        assert!(second.result.unwrap_err().is_rate_limit());
        assert!(second.wait.unwrap() <= Duration::from_secs(120));
        assert_eq!(primary.0.load(Ordering::SeqCst), 1);
        assert!(!channels.is_degraded());
    }
}
