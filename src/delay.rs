use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::timer::CountDown;

use nb::block;

use crate::timing::Ticks;

/// Bounded busy-waits for the bit slots, counted on a spare `CountDown`.
///
/// Only suitable for the single-digit microsecond waits inside a bit slot;
/// everything longer goes through the [`DeadlineTimer`](crate::timer::DeadlineTimer).
pub struct DelayTimer<CD>
    where
        CD: CountDown,
        CD::Time: From<Ticks>,
{
    count_down: CD,
}

impl<CD> DelayTimer<CD>
    where
        CD: CountDown,
        CD::Time: From<Ticks>,
{
    pub fn new(count_down: CD) -> Self {
        Self {
            count_down,
        }
    }

    pub fn free(self) -> CD {
        self.count_down
    }
}

impl<CD> DelayUs<u8> for DelayTimer<CD>
    where
        CD: CountDown,
        CD::Time: From<Ticks>,
{
    fn delay_us(&mut self, us: u8) {
        self.count_down.start(Ticks::from_micros(u32::from(us)));
        block!(self.count_down.wait()).ok();
    }
}
