use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Sliding window in-memory rate limiter (process local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), enabled }
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled {
            return true;
        }
        let now = Instant::now();
        let mut entry = self.store.entry(key.to_string()).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) >= window {
                entry.pop_front();
            } else {
                break;
            }
        }
        if entry.len() < limit {
            entry.push_back(now);
            true
        } else {
            false
        }
    }
}

/// The write paths that are rate limited per client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitedAction {
    ForumReply,
    AssignmentSubmission,
    QuizSubmission,
}

impl LimitedAction {
    fn key_prefix(self) -> &'static str {
        match self {
            LimitedAction::ForumReply => "reply",
            LimitedAction::AssignmentSubmission => "assignment",
            LimitedAction::QuizSubmission => "quiz",
        }
    }
}

/// Per-action limits read from `RL_*` variables.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub reply_limit: usize,
    pub reply_window: Duration,
    pub submission_limit: usize,
    pub submission_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            reply_limit: 10,
            reply_window: Duration::from_secs(60),
            submission_limit: 5,
            submission_window: Duration::from_secs(300),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        fn usize_env(name: &str, default: usize) -> usize {
            std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }
        fn dur_env(name: &str, default: Duration) -> Duration {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        }
        let d = Self::default();
        Self {
            enabled: std::env::var("RL_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(d.enabled),
            reply_limit: usize_env("RL_REPLY_LIMIT", d.reply_limit),
            reply_window: dur_env("RL_REPLY_WINDOW", d.reply_window),
            submission_limit: usize_env("RL_SUBMISSION_LIMIT", d.submission_limit),
            submission_window: dur_env("RL_SUBMISSION_WINDOW", d.submission_window),
        }
    }

    fn limit_for(&self, action: LimitedAction) -> (usize, Duration) {
        match action {
            LimitedAction::ForumReply => (self.reply_limit, self.reply_window),
            LimitedAction::AssignmentSubmission | LimitedAction::QuizSubmission => {
                (self.submission_limit, self.submission_window)
            }
        }
    }
}

/// High level guard used by handlers.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self { limiter: InMemoryRateLimiter::new(cfg.enabled), cfg }
    }

    pub fn allow(&self, action: LimitedAction, client: &str) -> bool {
        let (limit, window) = self.cfg.limit_for(action);
        let allowed = self
            .limiter
            .check(&format!("{}:{client}", action.key_prefix()), limit, window);
        if !allowed {
            log::warn!("rate limited {action:?} for {client}");
        }
        allowed
    }
}
