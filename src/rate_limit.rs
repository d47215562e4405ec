use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sliding window in-memory rate limiter (pod local), keyed by account
/// email rather than peer address so a shared school NAT doesn't starve
/// a whole classroom.
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            enabled,
        }
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

/// Per-action limits derived from env.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub question_limit: usize,
    pub question_window: Duration,
    pub answer_limit: usize,
    pub answer_window: Duration,
    pub kudos_limit: usize,
    pub kudos_window: Duration,
    pub upload_limit: usize,
    pub upload_window: Duration,
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        fn usize_env(name: &str, default: usize) -> usize {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn dur_env(name: &str, default: u64) -> Duration {
            Duration::from_secs(
                std::env::var(name)
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default),
            )
        }
        Self {
            question_limit: usize_env("RL_QUESTION_LIMIT", 5),
            question_window: dur_env("RL_QUESTION_WINDOW", 300),
            answer_limit: usize_env("RL_ANSWER_LIMIT", 10),
            answer_window: dur_env("RL_ANSWER_WINDOW", 60),
            kudos_limit: usize_env("RL_KUDOS_LIMIT", 3),
            kudos_window: dur_env("RL_KUDOS_WINDOW", 3600),
            upload_limit: usize_env("RL_UPLOAD_LIMIT", 5),
            upload_window: dur_env("RL_UPLOAD_WINDOW", 3600),
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
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self {
        Self { limiter, cfg }
    }
    pub fn allow_question(&self, email: &str) -> bool {
        self.limiter
            .check(&format!("question:{email}"), self.cfg.question_limit, self.cfg.question_window)
    }
    pub fn allow_answer(&self, email: &str) -> bool {
        self.limiter
            .check(&format!("answer:{email}"), self.cfg.answer_limit, self.cfg.answer_window)
    }
    pub fn allow_kudos(&self, email: &str) -> bool {
        self.limiter
            .check(&format!("kudos:{email}"), self.cfg.kudos_limit, self.cfg.kudos_window)
    }
    pub fn allow_upload(&self, email: &str) -> bool {
        self.limiter
            .check(&format!("upload:{email}"), self.cfg.upload_limit, self.cfg.upload_window)
    }
}
