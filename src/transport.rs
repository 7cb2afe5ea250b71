//! Non-blocking 1-Wire bus master.
//!
//! Every multi-phase operation is a state machine advanced by deadline-timer
//! expirations; only the short drive/sample windows inside a bit slot are
//! busy-waited. One operation may be outstanding at a time and callers gate
//! on [`OneWireBus::is_idle`] before issuing the next one.

use core::mem;

use embedded_hal::blocking::delay::DelayUs;

use crate::line::OpenDrainLine;
use crate::timer::DeadlineTimer;
use crate::timing::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusState {
    Idle,
    PresenceDriveLow,
    PresenceSample,
    PresenceRecovery,
    Write0Recovery,
    Write1Recovery,
    ReadRecovery,
}

/// Single-slot mailbox between the deadline handler and foreground code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sample {
    Bit0,
    Bit1,
    PresenceOk,
    PresenceNotOk,
    NotReady,
}

impl Sample {
    fn from_level(high: bool) -> Self {
        if high {
            Sample::Bit1
        } else {
            Sample::Bit0
        }
    }

    fn bit(self) -> u8 {
        match self {
            Sample::Bit1 => 1,
            _ => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Write,
    Read,
}

#[derive(Clone, Copy, Debug)]
struct PendingShift {
    value: u8,
    remaining_bits: u8,
    direction: Direction,
}

#[derive(Debug)]
pub enum BusError<E> {
    Line(E),
}

impl<E> From<E> for BusError<E> {
    fn from(e: E) -> Self {
        BusError::Line(e)
    }
}

/// The operations the device sequencer needs from a bus master.
pub trait OneWireBus {
    type Error;

    fn initialize(&mut self) -> Result<(), Self::Error>;

    /// Start a reset pulse and presence detection.
    fn detect_presence(&mut self) -> Result<(), Self::Error>;

    /// Consume the presence sample. Only meaningful once the bus is idle.
    fn presence(&mut self) -> Presence;

    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error>;

    fn start_read_byte(&mut self) -> Result<(), Self::Error>;

    /// Read one slot. The bit is returned immediately, the slot recovery
    /// still has to elapse before the bus is idle again.
    fn read_bit(&mut self) -> Result<Sample, Self::Error>;

    fn is_idle(&self) -> bool;

    /// The byte assembled by the last completed `start_read_byte`.
    fn last_byte(&self) -> u8;
}

pub struct BusTransport<Line, Timer, Delay>
    where
        Line: OpenDrainLine,
        Timer: DeadlineTimer,
        Delay: DelayUs<u8>,
{
    line: Line,
    timer: Timer,
    delay: Delay,
    state: BusState,
    shift: Option<PendingShift>,
    last_sample: Sample,
    last_byte: u8,
}

impl<Line, Timer, Delay> BusTransport<Line, Timer, Delay>
    where
        Line: OpenDrainLine,
        Timer: DeadlineTimer,
        Delay: DelayUs<u8>,
{
    pub fn new(line: Line, timer: Timer, delay: Delay) -> Self {
        Self {
            line,
            timer,
            delay,
            state: BusState::Idle,
            shift: None,
            last_sample: Sample::NotReady,
            last_byte: 0,
        }
    }

    pub fn free(self) -> (Line, Timer, Delay) {
        (self.line, self.timer, self.delay)
    }

    pub fn initialize(&mut self) -> Result<(), BusError<Line::Error>> {
        self.timer.stop();
        self.state = BusState::Idle;
        self.shift = None;
        self.last_sample = Sample::NotReady;
        self.last_byte = 0;
        self.line.release()?;
        Ok(())
    }

    pub fn detect_presence(&mut self) -> Result<(), BusError<Line::Error>> {
        self.timer.stop();
        self.shift = None;
        self.line.drive_low()?;
        self.state = BusState::PresenceDriveLow;
        self.timer.arm(PRESENCE_DRIVE_LOW);
        Ok(())
    }

    pub fn presence(&mut self) -> Presence {
        match mem::replace(&mut self.last_sample, Sample::NotReady) {
            Sample::PresenceOk => Presence::Present,
            _ => Presence::Absent,
        }
    }

    /// Drive one write slot. The low pulse is busy-waited, the recovery is
    /// left to the deadline timer.
    pub fn write_bit(&mut self, bit: bool) -> Result<(), BusError<Line::Error>> {
        let (drive_us, recovery, next) = if bit {
            (WRITE_1_DRIVE_US, WRITE_1_RECOVERY, BusState::Write1Recovery)
        } else {
            (WRITE_0_DRIVE_US, WRITE_0_RECOVERY, BusState::Write0Recovery)
        };

        self.timer.stop();
        self.line.drive_low()?;
        self.delay.delay_us(drive_us);
        self.line.release()?;
        self.state = next;
        self.timer.arm(recovery);
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<Sample, BusError<Line::Error>> {
        self.timer.stop();
        self.line.drive_low()?;
        self.delay.delay_us(READ_INIT_US);
        self.line.release()?;
        self.delay.delay_us(READ_SAMPLE_US);
        let sample = Sample::from_level(self.line.sample()?);
        self.last_sample = sample;
        self.state = BusState::ReadRecovery;
        self.timer.arm(READ_RECOVERY);
        Ok(sample)
    }

    /// Shift `value` out LSB first.
    pub fn write_byte(&mut self, value: u8) -> Result<(), BusError<Line::Error>> {
        self.shift = Some(PendingShift {
            value,
            remaining_bits: 7,
            direction: Direction::Write,
        });
        self.write_bit(value & 0x01 != 0)
    }

    pub fn start_read_byte(&mut self) -> Result<(), BusError<Line::Error>> {
        self.shift = Some(PendingShift {
            value: 0,
            remaining_bits: 7,
            direction: Direction::Read,
        });
        self.read_bit().map(|_| ())
    }

    pub fn is_idle(&self) -> bool {
        self.state == BusState::Idle
    }

    pub fn last_byte(&self) -> u8 {
        self.last_byte
    }

    /// Deadline timer completion. Call from the timer interrupt with
    /// exclusive access to the transport.
    ///
    /// A line fault abandons the running operation and leaves the bus idle.
    pub fn on_deadline(&mut self) -> Result<(), BusError<Line::Error>> {
        self.timer.stop();
        let result = self.advance();
        if result.is_err() {
            self.shift = None;
            self.state = BusState::Idle;
        }
        result
    }

    /// Run the deadline handler if the timer has expired, for platforms
    /// that poll the timer instead of taking its interrupt.
    pub fn poll(&mut self) -> Result<(), BusError<Line::Error>> {
        if self.timer.has_expired() {
            self.on_deadline()
        } else {
            Ok(())
        }
    }

    fn advance(&mut self) -> Result<(), BusError<Line::Error>> {
        match self.state {
            BusState::Idle => {}
            BusState::PresenceDriveLow => {
                self.line.release()?;
                self.state = BusState::PresenceSample;
                self.timer.arm(PRESENCE_SAMPLE);
            }
            BusState::PresenceSample => {
                self.last_sample = if self.line.sample()? {
                    Sample::PresenceNotOk
                } else {
                    Sample::PresenceOk
                };
                self.state = BusState::PresenceRecovery;
                self.timer.arm(PRESENCE_RECOVERY);
            }
            BusState::PresenceRecovery => {
                self.state = BusState::Idle;
            }
            BusState::ReadRecovery => match self.shift {
                Some(mut shift) if shift.direction == Direction::Read => {
                    let sample = mem::replace(&mut self.last_sample, Sample::NotReady);
                    shift.value |= sample.bit() << 7;
                    if shift.remaining_bits != 0 {
                        shift.value >>= 1;
                        shift.remaining_bits -= 1;
                        self.shift = Some(shift);
                        self.read_bit()?;
                    } else {
                        self.last_byte = shift.value;
                        self.shift = None;
                        self.state = BusState::Idle;
                    }
                }
                _ => {
                    self.state = BusState::Idle;
                }
            },
            BusState::Write0Recovery | BusState::Write1Recovery => match self.shift {
                Some(mut shift) if shift.direction == Direction::Write => {
                    if shift.remaining_bits != 0 {
                        shift.remaining_bits -= 1;
                        shift.value >>= 1;
                        self.shift = Some(shift);
                        self.write_bit(shift.value & 0x01 != 0)?;
                    } else {
                        self.shift = None;
                        self.state = BusState::Idle;
                    }
                }
                _ => {
                    self.state = BusState::Idle;
                }
            },
        }
        Ok(())
    }
}

impl<Line, Timer, Delay> OneWireBus for BusTransport<Line, Timer, Delay>
    where
        Line: OpenDrainLine,
        Timer: DeadlineTimer,
        Delay: DelayUs<u8>,
{
    type Error = BusError<Line::Error>;

    fn initialize(&mut self) -> Result<(), Self::Error> {
        BusTransport::initialize(self)
    }

    fn detect_presence(&mut self) -> Result<(), Self::Error> {
        BusTransport::detect_presence(self)
    }

    fn presence(&mut self) -> Presence {
        BusTransport::presence(self)
    }

    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error> {
        BusTransport::write_byte(self, value)
    }

    fn start_read_byte(&mut self) -> Result<(), Self::Error> {
        BusTransport::start_read_byte(self)
    }

    fn read_bit(&mut self) -> Result<Sample, Self::Error> {
        BusTransport::read_bit(self)
    }

    fn is_idle(&self) -> bool {
        BusTransport::is_idle(self)
    }

    fn last_byte(&self) -> u8 {
        BusTransport::last_byte(self)
    }
}
