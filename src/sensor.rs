//! DS18B20 command sequencer.
//!
//! A slow state machine stepped once per 1 ms tick. It only ever issues a
//! bus operation when the transport reports idle, so at most one operation is
//! outstanding on the bus.

use core::fmt::Debug;

use crate::commands::*;
use crate::config::{ConfigError, SensorConfig};
use crate::scratchpad::Scratchpad;
use crate::temperature::Temperature;
use crate::transport::{OneWireBus, Presence, Sample};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorState {
    Idle,
    DetectPresence,
    SkipAddressing,
    ConfigurePre,
    ConfigureAlarmHigh,
    ConfigureAlarmLow,
    ConfigureResolution,
    ConvertTemperature,
    ReadScratchpadCmd,
    AcquiringScratchpad,
    ErrorFound,
}

/// Requests and progress flags, set by the public API and cleared by the
/// sequencer as it services them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Events {
    pub configuring: bool,
    pub acquiring: bool,
    pub conversion_finished: bool,
    pub temperature_ready: bool,
    pub configured: bool,
    pub timeout_expired: bool,
}

impl Events {
    fn is_busy(&self) -> bool {
        self.configuring || self.acquiring || self.conversion_finished
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorError {
    NoPresenceDetected,
    AcquisitionTimeout,
    Bus,
}

/// What the control loop needs from a temperature probe.
pub trait TemperatureProbe {
    fn configure(&mut self);

    fn start_acquisition(&mut self);

    fn is_temperature_ready(&mut self) -> bool;

    fn temperature(&mut self) -> Temperature;
}

pub struct TempSensor<B>
    where B: OneWireBus
{
    bus: B,
    config: SensorConfig,
    state: SensorState,
    events: Events,
    // bytes of the acquisition in progress
    scratchpad: Scratchpad,
    // last complete scratchpad
    committed: Scratchpad,
    elapsed_ticks: u32,
    last_error: Option<SensorError>,
}

impl<B> TempSensor<B>
    where
        B: OneWireBus,
        B::Error: Debug,
{
    pub fn new(bus: B, config: SensorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            bus,
            config,
            state: SensorState::Idle,
            events: Events::default(),
            scratchpad: Scratchpad::new(),
            committed: Scratchpad::new(),
            elapsed_ticks: 0,
            last_error: None,
        })
    }

    /// Reset the sequencer and the bus underneath it.
    pub fn initialize(&mut self) {
        self.last_error = None;
        if let Err(e) = self.bus.initialize() {
            log::warn!("1-Wire bus failed to initialize: {:?}", e);
            self.last_error = Some(SensorError::Bus);
        }
        self.state = SensorState::Idle;
        self.events = Events::default();
        self.scratchpad.clear();
        self.committed.clear();
        self.elapsed_ticks = 0;
    }

    /// Request the alarm and resolution registers to be written. No-op once
    /// configured or while configuring.
    pub fn configure(&mut self) {
        if !self.events.configured && !self.events.configuring {
            self.events.configuring = true;
        }
    }

    /// Request a conversion and scratchpad read. Ignored until configured and
    /// while another request is being serviced.
    pub fn start_acquisition(&mut self) {
        if self.events.configured && !self.events.is_busy() {
            self.events.acquiring = true;
            self.events.timeout_expired = false;
            self.elapsed_ticks = 0;
        } else {
            log::debug!("acquisition request ignored: {:?}", self.events);
        }
    }

    /// `true` once per completed acquisition.
    pub fn is_temperature_ready(&mut self) -> bool {
        let ready = self.events.temperature_ready;
        self.events.temperature_ready = false;
        ready
    }

    /// The last measured temperature. Also consumes the ready flag.
    pub fn temperature(&mut self) -> Temperature {
        self.events.temperature_ready = false;
        self.committed.temperature()
    }

    /// The last failure, if any, cleared on read.
    pub fn take_error(&mut self) -> Option<SensorError> {
        self.last_error.take()
    }

    pub fn scratchpad(&self) -> &Scratchpad {
        &self.committed
    }

    pub fn is_configured(&self) -> bool {
        self.events.configured
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub fn events(&self) -> Events {
        self.events
    }

    pub fn task_1ms(&mut self) {
        if self.events.acquiring || self.events.conversion_finished {
            self.elapsed_ticks += 1;
            if self.elapsed_ticks >= self.config.acquisition_timeout.0 {
                self.abandon_acquisition();
                return;
            }
        }

        let next = match self.step() {
            Ok(next) => next,
            Err(e) => {
                log::warn!("1-Wire bus fault in {:?}: {:?}", self.state, e);
                self.fail(SensorError::Bus)
            }
        };

        if next != self.state {
            log::debug!("sensor {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    fn step(&mut self) -> Result<SensorState, B::Error> {
        if self.state == SensorState::ErrorFound {
            return Ok(SensorState::Idle);
        }

        if !self.bus.is_idle() {
            return Ok(self.state);
        }

        let next = match self.state {
            SensorState::Idle => {
                if self.events.configuring || self.events.acquiring {
                    self.bus.detect_presence()?;
                    SensorState::DetectPresence
                } else {
                    SensorState::Idle
                }
            }
            SensorState::DetectPresence => match self.bus.presence() {
                Presence::Present => {
                    self.bus.write_byte(SKIP_ROM)?;
                    SensorState::SkipAddressing
                }
                Presence::Absent => {
                    log::warn!("no presence pulse from probe");
                    self.fail(SensorError::NoPresenceDetected)
                }
            },
            SensorState::SkipAddressing => {
                if self.events.configuring {
                    self.bus.write_byte(WRITE_SCRATCHPAD)?;
                    SensorState::ConfigurePre
                } else if self.events.acquiring {
                    self.bus.write_byte(CONVERT_T)?;
                    SensorState::ConvertTemperature
                } else if self.events.conversion_finished {
                    self.bus.write_byte(READ_SCRATCHPAD)?;
                    SensorState::ReadScratchpadCmd
                } else {
                    SensorState::Idle
                }
            }
            SensorState::ConfigurePre => {
                self.bus.write_byte(self.config.alarm_high)?;
                SensorState::ConfigureAlarmHigh
            }
            SensorState::ConfigureAlarmHigh => {
                self.bus.write_byte(self.config.alarm_low)?;
                SensorState::ConfigureAlarmLow
            }
            SensorState::ConfigureAlarmLow => {
                self.bus.write_byte(self.config.resolution.config_register())?;
                SensorState::ConfigureResolution
            }
            SensorState::ConfigureResolution => {
                self.events.configuring = false;
                self.events.configured = true;
                log::info!("probe configured, {:?}", self.config.resolution);
                SensorState::Idle
            }
            SensorState::ConvertTemperature => {
                if self.events.conversion_finished {
                    // the polling slot has recovered, reset for the read
                    self.bus.detect_presence()?;
                    SensorState::DetectPresence
                } else {
                    // the probe holds the line low until the conversion is done
                    if self.bus.read_bit()? == Sample::Bit1 {
                        self.events.acquiring = false;
                        self.events.conversion_finished = true;
                    }
                    SensorState::ConvertTemperature
                }
            }
            SensorState::ReadScratchpadCmd => {
                self.scratchpad.clear();
                self.bus.start_read_byte()?;
                SensorState::AcquiringScratchpad
            }
            SensorState::AcquiringScratchpad => {
                self.scratchpad.push(self.bus.last_byte()).ok();
                if self.scratchpad.is_complete() {
                    self.commit_scratchpad();
                    SensorState::Idle
                } else {
                    self.bus.start_read_byte()?;
                    SensorState::AcquiringScratchpad
                }
            }
            SensorState::ErrorFound => SensorState::Idle,
        };

        Ok(next)
    }

    fn commit_scratchpad(&mut self) {
        if !self.scratchpad.is_crc_valid() {
            log::warn!("scratchpad CRC mismatch: {:?}", self.scratchpad.as_bytes());
        }
        self.committed = self.scratchpad.clone();
        self.scratchpad.clear();
        self.events.acquiring = false;
        self.events.conversion_finished = false;
        self.events.temperature_ready = true;
        self.elapsed_ticks = 0;
        log::debug!("temperature {}", self.committed.temperature());
    }

    fn abandon_acquisition(&mut self) {
        log::warn!("acquisition timed out in {:?}", self.state);
        self.events.acquiring = false;
        self.events.conversion_finished = false;
        self.events.timeout_expired = true;
        self.scratchpad.clear();
        self.elapsed_ticks = 0;
        self.state = self.fail(SensorError::AcquisitionTimeout);
    }

    fn fail(&mut self, error: SensorError) -> SensorState {
        self.last_error = Some(error);
        SensorState::ErrorFound
    }
}

impl<B> TemperatureProbe for TempSensor<B>
    where
        B: OneWireBus,
        B::Error: Debug,
{
    fn configure(&mut self) {
        TempSensor::configure(self)
    }

    fn start_acquisition(&mut self) {
        TempSensor::start_acquisition(self)
    }

    fn is_temperature_ready(&mut self) -> bool {
        TempSensor::is_temperature_ready(self)
    }

    fn temperature(&mut self) -> Temperature {
        TempSensor::temperature(self)
    }
}
