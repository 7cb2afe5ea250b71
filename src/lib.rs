#![cfg_attr(not(test), no_std)]

pub mod commands;
pub mod config;
mod delay;
mod line;
mod node;
mod scheduler;
mod scratchpad;
mod sensor;
mod shared;
mod temperature;
mod thermostat;
mod timer;
pub mod timing;
mod transport;

#[cfg(test)]
mod sim;

pub use config::{ConfigError, Mode, Resolution, SensorConfig, ThermostatConfig};
pub use delay::DelayTimer;
pub use line::OpenDrainLine;
pub use node::Node;
pub use scheduler::{Cadence, Scheduler, SLOW_TICK_DIVIDER};
pub use scratchpad::{crc8, Scratchpad, SCRATCHPAD_SIZE};
pub use sensor::{Events, SensorError, SensorState, TempSensor, TemperatureProbe};
pub use shared::SharedBus;
pub use temperature::Temperature;
pub use thermostat::Thermostat;
pub use timer::{CountDownDeadline, DeadlineTimer};
pub use timing::Ticks;
pub use transport::{BusError, BusState, BusTransport, OneWireBus, Presence, Sample};
