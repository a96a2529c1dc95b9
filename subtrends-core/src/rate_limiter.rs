use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_concurrent: usize,
    pub max_requests: usize,
    pub time_window: Duration,
}

/// Bounded FIFO of admission timestamps for the trailing window.
#[derive(Debug)]
pub struct SlidingWindow {
    capacity: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity,
            window,
            timestamps: VecDeque::with_capacity(capacity),
        }
    }

    /// How long a request arriving at `now` must wait before it may be admitted.
    pub fn wait_time(&self, now: Instant) -> Option<Duration> {
        if self.timestamps.len() < self.capacity {
            return None;
        }
        let oldest = *self.timestamps.front()?;
        let elapsed = now.saturating_duration_since(oldest);
        let wait = self.window.saturating_sub(elapsed);
        if wait.is_zero() {
            None
        } else {
            Some(wait)
        }
    }

    pub fn record(&mut self, now: Instant) {
        while self.timestamps.len() >= self.capacity.max(1) {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(now);
    }

    pub fn requests_in_window(&self, now: Instant) -> usize {
        self.timestamps
            .iter()
            .filter(|ts| now.saturating_duration_since(**ts) < self.window)
            .count()
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    config: RateLimitConfig,
    window: Mutex<SlidingWindow>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        let window = Mutex::new(SlidingWindow::new(config.max_requests, config.time_window));

        Self {
            semaphore,
            config,
            window,
        }
    }

    /// Waits for a concurrency slot, then for room in the trailing window.
    /// The slot is held until the returned permit is dropped.
    pub async fn acquire_permit(&self) -> Result<RateLimitPermit, CoreError> {
        let start_time = Instant::now();
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CoreError::LimiterClosed)?;

        // Check, wait and record under one lock so two callers cannot both
        // observe the last free slot.
        {
            let mut window = self.window.lock().await;
            if let Some(wait_time) = window.wait_time(Instant::now()) {
                tracing::debug!("Rate limit window full, waiting {:?}", wait_time);
                sleep(wait_time).await;
            }
            window.record(Instant::now());
        }

        Ok(RateLimitPermit {
            _permit: permit,
            queue_wait_time: start_time.elapsed(),
        })
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        let window = self.window.lock().await;
        let now = Instant::now();

        RateLimitStatus {
            available_permits: self.semaphore.available_permits(),
            max_permits: self.config.max_concurrent,
            requests_per_window: self.config.max_requests,
            current_window_requests: window.requests_in_window(now),
            estimated_wait_time: window.wait_time(now),
        }
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
    pub queue_wait_time: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub available_permits: usize,
    pub max_permits: usize,
    pub requests_per_window: usize,
    pub current_window_requests: usize,
    pub estimated_wait_time: Option<Duration>,
}

impl RateLimitStatus {
    pub fn requests_remaining_in_window(&self) -> usize {
        self.requests_per_window
            .saturating_sub(self.current_window_requests)
    }
}
