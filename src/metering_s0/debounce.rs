use std::time::{Duration, Instant};

/// Drops edges that follow an accepted edge within `window`
#[derive(Debug, Clone)]
pub struct EdgeDebouncer {
    window: Duration,
    last: Option<Instant>,
}

impl EdgeDebouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}
