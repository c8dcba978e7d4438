use tokio::time::{Duration, Instant};

/// Enforces the minimum spacing between two oracle invocations.
#[derive(Debug, Clone)]
pub struct InvocationThrottle {
    min_spacing: Duration,
    last_invocation: Option<Instant>,
}

impl InvocationThrottle {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            last_invocation: None,
        }
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last_invocation {
            Some(last) => now.saturating_duration_since(last) >= self.min_spacing,
            None => true,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.last_invocation = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_invocation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_until_first_record() {
        let t0 = Instant::now();
        let mut throttle = InvocationThrottle::new(Duration::from_millis(1000));
        assert!(throttle.is_ready(t0));
        throttle.record(t0);
        assert!(!throttle.is_ready(t0 + Duration::from_millis(999)));
        assert!(throttle.is_ready(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn clock_going_backwards_is_not_ready() {
        let t0 = Instant::now() + Duration::from_secs(5);
        let mut throttle = InvocationThrottle::new(Duration::from_millis(1));
        throttle.record(t0);
        assert!(!throttle.is_ready(t0 - Duration::from_secs(1)));
        throttle.reset();
        assert!(throttle.is_ready(t0 - Duration::from_secs(1)));
    }
}
