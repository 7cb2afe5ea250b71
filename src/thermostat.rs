use core::fmt::Debug;

use embedded_hal::digital::v2::OutputPin;

use crate::config::{Mode, ThermostatConfig};
use crate::sensor::TemperatureProbe;
use crate::temperature::Temperature;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadingState {
    Idle,
    WaitForTemperature,
    ErrorFound,
}

/// Hysteresis control of a load relay, stepped on the 100 ms cadence.
pub struct Thermostat<Relay>
    where Relay: OutputPin
{
    relay: Relay,
    config: ThermostatConfig,
    state: ReadingState,
    sample_counter: u8,
    timeout_counter: u8,
    last_temperature: Option<Temperature>,
    load_active: bool,
}

impl<Relay> Thermostat<Relay>
    where
        Relay: OutputPin,
        Relay::Error: Debug,
{
    pub fn new(relay: Relay, config: ThermostatConfig) -> Self {
        Self {
            relay,
            config,
            state: ReadingState::Idle,
            sample_counter: 0,
            timeout_counter: 0,
            last_temperature: None,
            load_active: false,
        }
    }

    pub fn initialize(&mut self, probe: &mut impl TemperatureProbe) {
        self.state = ReadingState::Idle;
        self.sample_counter = 0;
        self.timeout_counter = 0;
        self.last_temperature = None;
        self.switch(false);
        probe.configure();
    }

    pub fn task_100ms(&mut self, probe: &mut impl TemperatureProbe) {
        if let Some(temperature) = self.track_reading(probe) {
            self.regulate(temperature);
        }
    }

    pub fn is_load_active(&self) -> bool {
        self.load_active
    }

    pub fn last_temperature(&self) -> Option<Temperature> {
        self.last_temperature
    }

    pub fn config(&self) -> &ThermostatConfig {
        &self.config
    }

    fn track_reading(&mut self, probe: &mut impl TemperatureProbe) -> Option<Temperature> {
        if self.sample_counter < self.config.sample_period {
            self.sample_counter += 1;
        }

        let mut reading = None;
        self.state = match self.state {
            ReadingState::Idle => {
                if self.sample_counter == self.config.sample_period {
                    self.sample_counter = 0;
                    probe.start_acquisition();
                    self.timeout_counter = self.config.response_timeout;
                    ReadingState::WaitForTemperature
                } else {
                    ReadingState::Idle
                }
            }
            ReadingState::WaitForTemperature => {
                if probe.is_temperature_ready() {
                    let temperature = probe.temperature();
                    self.last_temperature = Some(temperature);
                    reading = Some(temperature);
                    ReadingState::Idle
                } else {
                    self.timeout_counter = self.timeout_counter.saturating_sub(1);
                    if self.timeout_counter == 0 {
                        log::warn!("no temperature reading within {} slow ticks", self.config.response_timeout);
                        ReadingState::ErrorFound
                    } else {
                        ReadingState::WaitForTemperature
                    }
                }
            }
            ReadingState::ErrorFound => ReadingState::Idle,
        };
        reading
    }

    fn regulate(&mut self, temperature: Temperature) {
        let set_point = self.config.set_point;
        let hysteresis = self.config.hysteresis;

        let (switch_on, switch_off) = match self.config.mode {
            Mode::Heating => (
                temperature <= set_point.saturating_sub(hysteresis),
                temperature >= set_point,
            ),
            Mode::Cooling => (
                temperature >= set_point.saturating_add(hysteresis),
                temperature <= set_point,
            ),
        };

        if switch_on && !self.load_active {
            log::info!("{} °C, load on", temperature);
            self.switch(true);
        } else if switch_off && self.load_active {
            log::info!("{} °C, load off", temperature);
            self.switch(false);
        }
    }

    fn switch(&mut self, on: bool) {
        let result = if on {
            self.relay.set_high()
        } else {
            self.relay.set_low()
        };
        match result {
            Ok(()) => self.load_active = on,
            Err(e) => log::warn!("failed to switch relay: {:?}", e),
        }
    }
}
