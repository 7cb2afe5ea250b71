use embedded_time::duration::Microseconds;

/// Deadline timer ticks per microsecond (timer clocked at 2 MHz).
pub const TICKS_PER_MICROSECOND: u32 = 2;

/// A count of deadline-timer ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticks(pub u32);

impl Ticks {
    /// Saturates at `u32::MAX` ticks.
    pub const fn from_micros(us: u32) -> Self {
        Ticks(us.saturating_mul(TICKS_PER_MICROSECOND))
    }

    pub const fn as_micros(self) -> u32 {
        self.0 / TICKS_PER_MICROSECOND
    }
}

impl From<Microseconds<u32>> for Ticks {
    fn from(us: Microseconds<u32>) -> Self {
        Ticks::from_micros(us.0)
    }
}

impl From<Ticks> for Microseconds<u32> {
    fn from(ticks: Ticks) -> Self {
        Microseconds(ticks.as_micros())
    }
}

// ------------------------------------------------------------------------
// Reset / presence
// ------------------------------------------------------------------------

pub(crate) const PRESENCE_DRIVE_LOW: Ticks = Ticks::from_micros(480);
pub(crate) const PRESENCE_SAMPLE: Ticks = Ticks::from_micros(70);
pub(crate) const PRESENCE_RECOVERY: Ticks = Ticks::from_micros(410);

// ------------------------------------------------------------------------
// Read slot. Init and sample offset are busy-waits, recovery is scheduled.
// ------------------------------------------------------------------------

pub(crate) const READ_INIT_US: u8 = 6;
pub(crate) const READ_SAMPLE_US: u8 = 15 - READ_INIT_US;
pub(crate) const READ_RECOVERY: Ticks =
    Ticks::from_micros(70 - READ_INIT_US as u32 - READ_SAMPLE_US as u32);

// ------------------------------------------------------------------------
// Write slots
// ------------------------------------------------------------------------

pub(crate) const WRITE_0_DRIVE_US: u8 = 60;
pub(crate) const WRITE_0_RECOVERY: Ticks = Ticks::from_micros(10);

pub(crate) const WRITE_1_DRIVE_US: u8 = 6;
pub(crate) const WRITE_1_RECOVERY: Ticks = Ticks::from_micros(64);
