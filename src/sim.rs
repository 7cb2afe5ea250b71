//! Host-side bus simulation: a virtual clock shared by the line, the
//! deadline timer and the busy-wait delay, plus device models that answer on
//! the line.

use core::convert::Infallible;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_hal::timer::{Cancel, CountDown};
use void::Void;

use crate::commands::*;
use crate::scratchpad::crc8;
use crate::shared::SharedBus;
use crate::timer::DeadlineTimer;
use crate::timing::{Ticks, TICKS_PER_MICROSECOND};
use crate::transport::BusTransport;

const US: u32 = TICKS_PER_MICROSECOND;

pub(crate) type SimTransport = BusTransport<SimLine, SimTimer, SimDelay>;

// ------------------------------------------------------------------------
// Devices
// ------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum ProbeMode {
    Idle,
    Rom,
    Function,
    WriteScratchpad(usize),
    Converting,
    Transmit,
}

/// A DS18B20 on a single-drop bus.
pub(crate) struct Probe {
    pub(crate) present: bool,
    pub(crate) scratchpad: [u8; 9],
    /// `None` never finishes converting.
    pub(crate) conversion_micros: Option<u32>,
    pub(crate) received: Vec<u8>,
    pub(crate) conversions: u32,
    mode: ProbeMode,
    rx: u8,
    rx_bits: u8,
    tx: VecDeque<bool>,
    presence: Option<(u32, u32)>,
    hold_low_until: u32,
    converting_until: u32,
}

impl Probe {
    pub(crate) fn new() -> Self {
        Self {
            present: true,
            scratchpad: [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x1C],
            conversion_micros: Some(20_000),
            received: Vec::new(),
            conversions: 0,
            mode: ProbeMode::Idle,
            rx: 0,
            rx_bits: 0,
            tx: VecDeque::new(),
            presence: None,
            hold_low_until: 0,
            converting_until: 0,
        }
    }

    pub(crate) fn with_temperature(mut self, raw: i16) -> Self {
        let [lsb, msb] = raw.to_le_bytes();
        self.scratchpad[0] = lsb;
        self.scratchpad[1] = msb;
        self
    }

    fn on_pulse(&mut self, start: u32, width: u32) {
        if !self.present {
            return;
        }

        let end = start + width;
        if width >= 480 * US {
            self.presence = Some((end + 15 * US, end + 135 * US));
            self.mode = ProbeMode::Rom;
            self.rx = 0;
            self.rx_bits = 0;
            self.tx.clear();
            return;
        }

        let short = width < 15 * US;
        match self.mode {
            ProbeMode::Transmit => {
                if short {
                    if let Some(false) = self.tx.pop_front() {
                        self.hold_low_until = start + 30 * US;
                    }
                    if self.tx.is_empty() {
                        self.mode = ProbeMode::Idle;
                    }
                }
            }
            ProbeMode::Converting => {
                if short && start < self.converting_until {
                    self.hold_low_until = start + 30 * US;
                }
            }
            _ => self.receive(short, end),
        }
    }

    fn receive(&mut self, bit: bool, at: u32) {
        self.rx |= (bit as u8) << self.rx_bits;
        self.rx_bits += 1;
        if self.rx_bits == 8 {
            let byte = self.rx;
            self.rx = 0;
            self.rx_bits = 0;
            self.on_byte(byte, at);
        }
    }

    fn on_byte(&mut self, byte: u8, at: u32) {
        self.received.push(byte);
        self.mode = match self.mode {
            ProbeMode::Rom if byte == SKIP_ROM => ProbeMode::Function,
            ProbeMode::Function => match byte {
                CONVERT_T => {
                    self.conversions += 1;
                    self.converting_until = match self.conversion_micros {
                        Some(us) => at + us * US,
                        None => u32::MAX,
                    };
                    ProbeMode::Converting
                }
                WRITE_SCRATCHPAD => ProbeMode::WriteScratchpad(2),
                READ_SCRATCHPAD => {
                    self.scratchpad[8] = crc8(&self.scratchpad[..8]);
                    self.tx = self
                        .scratchpad
                        .iter()
                        .flat_map(|byte| (0..8).map(move |i| byte & (1 << i) != 0))
                        .collect();
                    ProbeMode::Transmit
                }
                _ => ProbeMode::Idle,
            },
            ProbeMode::WriteScratchpad(index) => {
                self.scratchpad[index] = byte;
                if index < 4 {
                    ProbeMode::WriteScratchpad(index + 1)
                } else {
                    ProbeMode::Idle
                }
            }
            _ => ProbeMode::Idle,
        };
    }

    fn holds_low(&self, now: u32) -> bool {
        if !self.present {
            return false;
        }
        let in_presence = match self.presence {
            Some((from, to)) => now >= from && now < to,
            None => false,
        };
        in_presence || now < self.hold_low_until
    }
}

/// Records written bits, then plays them back into read slots.
pub(crate) struct Loopback {
    bits: VecDeque<bool>,
    replaying: bool,
    hold_low_until: u32,
}

impl Loopback {
    pub(crate) fn new() -> Self {
        Self {
            bits: VecDeque::new(),
            replaying: false,
            hold_low_until: 0,
        }
    }

    fn on_pulse(&mut self, start: u32, width: u32) {
        let short = width < 15 * US;
        if !self.replaying {
            self.bits.push_back(short);
        } else if short {
            if let Some(false) = self.bits.pop_front() {
                self.hold_low_until = start + 30 * US;
            }
        }
    }

    fn holds_low(&self, now: u32) -> bool {
        now < self.hold_low_until
    }
}

enum Device {
    None,
    Probe(Probe),
    Loopback(Loopback),
}

// ------------------------------------------------------------------------
// World
// ------------------------------------------------------------------------

struct World {
    now: u32,
    master_low: bool,
    low_since: u32,
    deadline: Option<u32>,
    armed: Vec<Ticks>,
    delays: Vec<u32>,
    pulses: Vec<(u32, u32)>,
    device: Device,
}

impl World {
    fn drive_low(&mut self) {
        if !self.master_low {
            self.master_low = true;
            self.low_since = self.now;
        }
    }

    fn release(&mut self) {
        if self.master_low {
            self.master_low = false;
            let start = self.low_since;
            let width = self.now - start;
            self.pulses.push((start, width));
            match &mut self.device {
                Device::Probe(probe) => probe.on_pulse(start, width),
                Device::Loopback(loopback) => loopback.on_pulse(start, width),
                Device::None => {}
            }
        }
    }

    fn level(&self) -> bool {
        let device_low = match &self.device {
            Device::Probe(probe) => probe.holds_low(self.now),
            Device::Loopback(loopback) => loopback.holds_low(self.now),
            Device::None => false,
        };
        !(self.master_low || device_low)
    }
}

pub(crate) struct SimLine(Rc<RefCell<World>>);

impl OutputPin for SimLine {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().drive_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().release();
        Ok(())
    }
}

impl InputPin for SimLine {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Infallible> {
        Ok(self.0.borrow().level())
    }

    fn is_low(&self) -> Result<bool, Infallible> {
        Ok(!self.0.borrow().level())
    }
}

pub(crate) struct SimTimer(Rc<RefCell<World>>);

impl DeadlineTimer for SimTimer {
    fn arm(&mut self, ticks: Ticks) {
        let mut world = self.0.borrow_mut();
        world.armed.push(ticks);
        world.deadline = Some(world.now + ticks.0);
    }

    fn stop(&mut self) {
        self.0.borrow_mut().deadline = None;
    }

    fn has_expired(&mut self) -> bool {
        let world = self.0.borrow();
        match world.deadline {
            Some(deadline) => deadline <= world.now,
            None => false,
        }
    }
}

pub(crate) struct SimDelay(Rc<RefCell<World>>);

impl DelayUs<u8> for SimDelay {
    fn delay_us(&mut self, us: u8) {
        let mut world = self.0.borrow_mut();
        world.delays.push(u32::from(us));
        world.now += u32::from(us) * US;
    }
}

// ------------------------------------------------------------------------
// Rig
// ------------------------------------------------------------------------

pub(crate) struct Rig {
    world: Rc<RefCell<World>>,
}

impl Rig {
    fn with_device(device: Device) -> Self {
        Self {
            world: Rc::new(RefCell::new(World {
                now: 0,
                master_low: false,
                low_since: 0,
                deadline: None,
                armed: Vec::new(),
                delays: Vec::new(),
                pulses: Vec::new(),
                device,
            })),
        }
    }

    /// An empty bus.
    pub(crate) fn new() -> Self {
        Self::with_device(Device::None)
    }

    pub(crate) fn with_probe(probe: Probe) -> Self {
        Self::with_device(Device::Probe(probe))
    }

    pub(crate) fn with_loopback(loopback: Loopback) -> Self {
        Self::with_device(Device::Loopback(loopback))
    }

    pub(crate) fn timer(&self) -> SimTimer {
        SimTimer(self.world.clone())
    }

    pub(crate) fn transport(&self) -> SimTransport {
        BusTransport::new(
            SimLine(self.world.clone()),
            self.timer(),
            SimDelay(self.world.clone()),
        )
    }

    pub(crate) fn deadline(&self) -> Option<u32> {
        self.world.borrow().deadline
    }

    pub(crate) fn advance_to(&self, t: u32) {
        let mut world = self.world.borrow_mut();
        world.now = world.now.max(t);
    }

    pub(crate) fn advance_micros(&self, us: u32) {
        self.world.borrow_mut().now += us * US;
    }

    /// Fire deadlines until the transport has nothing scheduled.
    pub(crate) fn run_until_idle(&self, bus: &mut SimTransport) {
        while let Some(deadline) = self.deadline() {
            self.advance_to(deadline);
            bus.on_deadline().unwrap();
        }
        assert!(bus.is_idle());
    }

    /// One 1 ms scheduler period: fire the deadlines falling inside it, as
    /// the timer interrupt would, then move the clock to its end.
    pub(crate) fn tick(&self, shared: &SharedBus<SimTransport>) {
        let end = self.world.borrow().now + 1000 * US;
        while let Some(deadline) = self.deadline().filter(|d| *d <= end) {
            self.advance_to(deadline);
            shared.on_deadline();
        }
        self.advance_to(end);
    }

    pub(crate) fn replay(&self) {
        if let Device::Loopback(loopback) = &mut self.world.borrow_mut().device {
            loopback.replaying = true;
        }
    }

    pub(crate) fn probe<R>(&self, f: impl FnOnce(&mut Probe) -> R) -> R {
        match &mut self.world.borrow_mut().device {
            Device::Probe(probe) => f(probe),
            _ => panic!("no probe on the bus"),
        }
    }

    pub(crate) fn armed(&self) -> Vec<Ticks> {
        self.world.borrow().armed.clone()
    }

    /// Busy-waited drive time paired with the recovery that followed it.
    pub(crate) fn slots(&self) -> Vec<(u32, Ticks)> {
        let world = self.world.borrow();
        world
            .delays
            .iter()
            .copied()
            .zip(world.armed.iter().copied())
            .collect()
    }

    /// Master low pulses as (start, width) in ticks.
    pub(crate) fn pulses(&self) -> Vec<(u32, u32)> {
        self.world.borrow().pulses.clone()
    }
}

// ------------------------------------------------------------------------
// CountDown fake
// ------------------------------------------------------------------------

pub(crate) struct FakeCountDown {
    pub(crate) started: Vec<Ticks>,
    pub(crate) cancelled: u32,
    pub(crate) polls: u32,
    blocking_polls: u32,
    remaining: u32,
    running: bool,
}

impl FakeCountDown {
    /// Each countdown reports `blocking_polls` times before expiring.
    pub(crate) fn new(blocking_polls: u32) -> Self {
        Self {
            started: Vec::new(),
            cancelled: 0,
            polls: 0,
            blocking_polls,
            remaining: 0,
            running: false,
        }
    }
}

impl CountDown for FakeCountDown {
    type Time = Ticks;

    fn start<T>(&mut self, count: T)
        where T: Into<Self::Time>
    {
        self.started.push(count.into());
        self.remaining = self.blocking_polls;
        self.running = true;
    }

    fn wait(&mut self) -> nb::Result<(), Void> {
        self.polls += 1;
        if !self.running {
            return Err(nb::Error::WouldBlock);
        }
        if self.remaining == 0 {
            Ok(())
        } else {
            self.remaining -= 1;
            Err(nb::Error::WouldBlock)
        }
    }
}

impl Cancel for FakeCountDown {
    type Error = ();

    fn cancel(&mut self) -> Result<(), ()> {
        self.cancelled += 1;
        if self.running {
            self.running = false;
            Ok(())
        } else {
            Err(())
        }
    }
}
