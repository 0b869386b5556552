use std::time::{Duration, Instant};

pub const DEFAULT_SCROLL_THROTTLE: Duration = Duration::from_millis(500);
pub const DEFAULT_SCROLL_DELAY: Duration = Duration::from_millis(200);

/// Element of the dashboard a scroll can be aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollTarget {
    Question(String),
    Section(String),
    SearchBatch(usize),
    Gate,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollAction {
    pub target: ScrollTarget,
    pub delay: Duration,
}

/// Throttled auto-scroll. Requests inside the throttle window are dropped,
/// never queued.
#[derive(Debug, Clone)]
pub struct AutoScroll {
    enabled: bool,
    throttle: Duration,
    last_scroll: Option<Instant>,
}

impl Default for AutoScroll {
    fn default() -> Self {
        Self::new(true, DEFAULT_SCROLL_THROTTLE)
    }
}

impl AutoScroll {
    pub fn new(enabled: bool, throttle: Duration) -> Self {
        Self {
            enabled,
            throttle,
            last_scroll: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn request(
        &mut self,
        target: ScrollTarget,
        delay: Option<Duration>,
        now: Instant,
    ) -> Option<ScrollAction> {
        if !self.enabled {
            return None;
        }
        if let Some(last) = self.last_scroll {
            if now.saturating_duration_since(last) < self.throttle {
                return None;
            }
        }
        self.last_scroll = Some(now);
        Some(ScrollAction {
            target,
            delay: delay.unwrap_or(DEFAULT_SCROLL_DELAY),
        })
    }
}
