use embedded_hal::digital::v2::{InputPin, OutputPin};

/// Exclusive handle on the open-drain 1-Wire data line.
///
/// The line idles high through the pull-up; the master only ever pulls it low
/// or lets it float.
pub trait OpenDrainLine {
    type Error;

    fn drive_low(&mut self) -> Result<(), Self::Error>;

    fn release(&mut self) -> Result<(), Self::Error>;

    /// `true` when the line reads high.
    fn sample(&self) -> Result<bool, Self::Error>;
}

impl<Pin> OpenDrainLine for Pin
    where Pin: OutputPin + InputPin<Error = <Pin as OutputPin>::Error>
{
    type Error = <Pin as OutputPin>::Error;

    fn drive_low(&mut self) -> Result<(), Self::Error> {
        self.set_low()
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        self.set_high()
    }

    fn sample(&self) -> Result<bool, Self::Error> {
        self.is_high()
    }
}
