use std::fmt;

/// Counters fed by the protocol controllers as transition side effects.
///
/// A miss is any local access that has to go to the bus; a silent upgrade is
/// an Exclusive block promoted to Modified without bus traffic.
#[derive(Default, Clone, Copy, Debug)]
pub struct Stats {
    pub cache_misses: u64,
    pub silent_upgrades: u64,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }
    pub fn record_miss(&mut self) {
        self.cache_misses += 1;
    }
    pub fn record_silent_upgrade(&mut self) {
        self.silent_upgrades += 1;
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "misses: {}, silent upgrades: {}",
            self.cache_misses, self.silent_upgrades
        )
    }
}
