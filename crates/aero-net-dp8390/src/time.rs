/// Monotonic virtual time for a chip instance, in nanoseconds.
///
/// The clock only moves when the owner calls [`crate::Dp8390::tick`]; nothing here reads host
/// time, which keeps transmit completion deterministic and snapshot-friendly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Clock {
    now_ns: u64,
}

impl Clock {
    pub const fn new() -> Self {
        Self { now_ns: 0 }
    }

    #[inline]
    pub const fn now_ns(&self) -> u64 {
        self.now_ns
    }

    /// Advances the clock by `ns` nanoseconds, saturating at `u64::MAX`.
    #[inline]
    pub fn advance(&mut self, ns: u64) {
        self.now_ns = self.now_ns.saturating_add(ns);
    }

    /// Sets the current time, intended for save/restore.
    #[inline]
    pub fn set_now_ns(&mut self, now_ns: u64) {
        self.now_ns = now_ns;
    }
}

/// One-shot deadline armed against a [`Clock`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deadline {
    at_ns: Option<u64>,
}

impl Deadline {
    pub fn arm(&mut self, clock: &Clock, delay_ns: u64) {
        self.at_ns = Some(clock.now_ns().saturating_add(delay_ns));
    }

    pub fn cancel(&mut self) {
        self.at_ns = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at_ns.is_some()
    }

    pub fn at_ns(&self) -> Option<u64> {
        self.at_ns
    }

    pub fn set_at_ns(&mut self, at_ns: Option<u64>) {
        self.at_ns = at_ns;
    }

    /// Disarms and returns `true` if the deadline has been reached.
    pub fn expire(&mut self, clock: &Clock) -> bool {
        match self.at_ns {
            Some(at) if clock.now_ns() >= at => {
                self.at_ns = None;
                true
            }
            _ => false,
        }
    }
}
