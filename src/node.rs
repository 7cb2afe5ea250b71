use core::fmt::Debug;

use embedded_hal::digital::v2::OutputPin;

use crate::config::{ConfigError, SensorConfig, ThermostatConfig};
use crate::scheduler::Scheduler;
use crate::sensor::TempSensor;
use crate::thermostat::Thermostat;
use crate::transport::OneWireBus;

/// Owns every periodic subsystem of the node and runs them from the 1 ms tick.
pub struct Node<Bus, Relay>
    where
        Bus: OneWireBus,
        Relay: OutputPin,
{
    scheduler: Scheduler,
    sensor: TempSensor<Bus>,
    thermostat: Thermostat<Relay>,
}

impl<Bus, Relay> Node<Bus, Relay>
    where
        Bus: OneWireBus,
        Bus::Error: Debug,
        Relay: OutputPin,
        Relay::Error: Debug,
{
    pub fn new(
        bus: Bus,
        relay: Relay,
        sensor_config: SensorConfig,
        thermostat_config: ThermostatConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            scheduler: Scheduler::new(),
            sensor: TempSensor::new(bus, sensor_config)?,
            thermostat: Thermostat::new(relay, thermostat_config),
        })
    }

    pub fn initialize(&mut self) {
        self.sensor.initialize();
        self.thermostat.initialize(&mut self.sensor);
        log::info!("thermostat node initialized");
    }

    /// Call unconditionally from the 1 ms tick.
    pub fn on_tick(&mut self) {
        let cadence = self.scheduler.on_tick();

        self.sensor.task_1ms();

        if cadence.is_slow() {
            self.thermostat.task_100ms(&mut self.sensor);
        }
    }

    pub fn sensor(&mut self) -> &mut TempSensor<Bus> {
        &mut self.sensor
    }

    pub fn thermostat(&self) -> &Thermostat<Relay> {
        &self.thermostat
    }
}
