/// Per-process count of intercepted requests
///
/// Never reset and never shared. Saturates instead of wrapping so the value
/// can only grow.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestCounter {
    count: u64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one request and returns the new count
    pub fn increment(&mut self) -> u64 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    pub fn get(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_starts_at_zero() {
        assert_eq!(RequestCounter::new().get(), 0);
    }

    #[test]
    fn test_increment_returns_new_value() {
        let mut counter = RequestCounter::new();
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn test_counter_saturates() {
        let mut counter = RequestCounter { count: u64::MAX - 1 };
        assert_eq!(counter.increment(), u64::MAX);
        assert_eq!(counter.increment(), u64::MAX);
    }
}
