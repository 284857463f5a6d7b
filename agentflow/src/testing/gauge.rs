use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks how many guarded sections are running at once.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    total: AtomicUsize,
}

impl ConcurrencyGauge {
    /// Creates a gauge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a section as running until the guard drops.
    pub fn enter(&self) -> GaugeGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        GaugeGuard { gauge: self }
    }

    /// Sections running right now.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest concurrent count observed.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Sections entered so far.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

/// Decrements the gauge on drop.
#[derive(Debug)]
pub struct GaugeGuard<'a> {
    gauge: &'a ConcurrencyGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_tracks_peak() {
        let gauge = ConcurrencyGauge::new();
        {
            let _a = gauge.enter();
            let _b = gauge.enter();
            assert_eq!(gauge.in_flight(), 2);
        }
        let _c = gauge.enter();
        assert_eq!(gauge.in_flight(), 1);
        assert_eq!(gauge.max_in_flight(), 2);
        assert_eq!(gauge.total(), 3);
    }
}
