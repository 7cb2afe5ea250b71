use embedded_hal::timer::{Cancel, CountDown};

use crate::timing::Ticks;

/// A one-shot hardware countdown: one completion event per `arm`.
///
/// The completion event is delivered by the platform calling
/// [`BusTransport::on_deadline`](crate::transport::BusTransport::on_deadline)
/// from the timer interrupt, or by polling [`has_expired`](Self::has_expired).
pub trait DeadlineTimer {
    /// Reset the counter and start counting towards `ticks`. Re-arming a
    /// running timer restarts the count from zero.
    fn arm(&mut self, ticks: Ticks);

    /// Halt counting without firing.
    fn stop(&mut self);

    fn has_expired(&mut self) -> bool;
}

/// Deadline timer on top of an embedded-hal `CountDown`.
pub struct CountDownDeadline<CD>
    where
        CD: CountDown + Cancel,
        CD::Time: From<Ticks>,
{
    count_down: CD,
}

impl<CD> CountDownDeadline<CD>
    where
        CD: CountDown + Cancel,
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

impl<CD> DeadlineTimer for CountDownDeadline<CD>
    where
        CD: CountDown + Cancel,
        CD::Time: From<Ticks>,
{
    fn arm(&mut self, ticks: Ticks) {
        // cancelling an idle countdown reports an error, which is fine here
        self.count_down.cancel().ok();
        self.count_down.start(ticks);
    }

    fn stop(&mut self) {
        self.count_down.cancel().ok();
    }

    fn has_expired(&mut self) -> bool {
        self.count_down.wait().is_ok()
    }
}
