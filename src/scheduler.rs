/// Fast ticks per slow tick: 1 ms base, 100 ms derived.
pub const SLOW_TICK_DIVIDER: u8 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    Fast,
    FastAndSlow,
}

impl Cadence {
    pub fn is_slow(self) -> bool {
        matches!(self, Cadence::FastAndSlow)
    }
}

/// Divides the fixed 1 ms tick into the 1 ms and 100 ms task cadences.
#[derive(Debug, Default)]
pub struct Scheduler {
    counter: u8,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            counter: 0,
        }
    }

    pub fn on_tick(&mut self) -> Cadence {
        self.counter += 1;
        if self.counter >= SLOW_TICK_DIVIDER {
            self.counter = 0;
            Cadence::FastAndSlow
        } else {
            Cadence::Fast
        }
    }
}
