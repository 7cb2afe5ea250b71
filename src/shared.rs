use core::cell::RefCell;
use core::fmt::Debug;

use critical_section::Mutex;
use embedded_hal::blocking::delay::DelayUs;

use crate::line::OpenDrainLine;
use crate::timer::DeadlineTimer;
use crate::transport::{BusTransport, OneWireBus, Presence, Sample};

/// A bus shared between the deadline-timer interrupt and foreground code.
///
/// Each access runs inside a critical section, so the interrupt handler never
/// observes a half-updated transport. Place it in a `static` and hand
/// `&SharedBus` to the sensor:
///
/// ```ignore
/// static BUS: SharedBus<Transport> = SharedBus::new(transport);
///
/// #[interrupt]
/// fn TIMER1_COMPA() {
///     BUS.on_deadline();
/// }
/// ```
pub struct SharedBus<B> {
    bus: Mutex<RefCell<B>>,
}

impl<B> SharedBus<B> {
    pub const fn new(bus: B) -> Self {
        Self {
            bus: Mutex::new(RefCell::new(bus)),
        }
    }

    pub fn lock<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        critical_section::with(|cs| f(&mut self.bus.borrow_ref_mut(cs)))
    }

    pub fn into_inner(self) -> B {
        self.bus.into_inner().into_inner()
    }
}

impl<Line, Timer, Delay> SharedBus<BusTransport<Line, Timer, Delay>>
    where
        Line: OpenDrainLine,
        Line::Error: Debug,
        Timer: DeadlineTimer,
        Delay: DelayUs<u8>,
{
    /// Deadline timer interrupt entry point.
    pub fn on_deadline(&self) {
        if let Err(e) = self.lock(|bus| bus.on_deadline()) {
            log::warn!("1-Wire line fault in deadline handler: {:?}", e);
        }
    }
}

impl<'a, B> OneWireBus for &'a SharedBus<B>
    where B: OneWireBus
{
    type Error = B::Error;

    fn initialize(&mut self) -> Result<(), Self::Error> {
        self.lock(|bus| bus.initialize())
    }

    fn detect_presence(&mut self) -> Result<(), Self::Error> {
        self.lock(|bus| bus.detect_presence())
    }

    fn presence(&mut self) -> Presence {
        self.lock(|bus| bus.presence())
    }

    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error> {
        self.lock(|bus| bus.write_byte(value))
    }

    fn start_read_byte(&mut self) -> Result<(), Self::Error> {
        self.lock(|bus| bus.start_read_byte())
    }

    fn read_bit(&mut self) -> Result<Sample, Self::Error> {
        self.lock(|bus| bus.read_bit())
    }

    fn is_idle(&self) -> bool {
        self.lock(|bus| bus.is_idle())
    }

    fn last_byte(&self) -> u8 {
        self.lock(|bus| bus.last_byte())
    }
}
