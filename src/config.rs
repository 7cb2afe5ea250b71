use embedded_time::duration::Milliseconds;

use crate::temperature::Temperature;

/// Conversion resolution, written to the probe's configuration register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    Bits12,
}

impl Resolution {
    pub fn config_register(self) -> u8 {
        match self {
            Resolution::Bits9 => 0x1F,
            Resolution::Bits10 => 0x3F,
            Resolution::Bits11 => 0x5F,
            Resolution::Bits12 => 0x7F,
        }
    }

    /// Worst-case conversion time.
    pub fn conversion_time(self) -> Milliseconds<u32> {
        match self {
            Resolution::Bits9 => Milliseconds(94),
            Resolution::Bits10 => Milliseconds(188),
            Resolution::Bits11 => Milliseconds(375),
            Resolution::Bits12 => Milliseconds(750),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    TimeoutShorterThanConversion,
}

#[derive(Clone, Copy, Debug)]
pub struct SensorConfig {
    /// Raw T_H register byte.
    pub alarm_high: u8,
    /// Raw T_L register byte.
    pub alarm_low: u8,
    pub resolution: Resolution,
    /// Upper bound for one acquisition, counted in sensor task ticks (1 ms).
    pub acquisition_timeout: Milliseconds<u32>,
}

impl SensorConfig {
    pub fn validate(&self) -> Result<&Self, ConfigError> {
        if self.acquisition_timeout.0 < self.resolution.conversion_time().0 {
            Err(ConfigError::TimeoutShorterThanConversion)
        } else {
            Ok(self)
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            alarm_high: 0x32,
            alarm_low: 0x85,
            resolution: Resolution::Bits12,
            acquisition_timeout: Milliseconds(1000),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Winter: the load heats, on below the band, off at the set point.
    Heating,
    /// Summer: the load cools, on above the band, off at the set point.
    Cooling,
}

#[derive(Clone, Copy, Debug)]
pub struct ThermostatConfig {
    pub set_point: Temperature,
    pub hysteresis: Temperature,
    pub mode: Mode,
    /// Slow (100 ms) ticks between acquisitions.
    pub sample_period: u8,
    /// Slow ticks to wait for a reading before giving up on it.
    pub response_timeout: u8,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            set_point: Temperature::from_tenths(250),
            hysteresis: Temperature::from_tenths(15),
            mode: Mode::Heating,
            sample_period: 50,
            response_timeout: 10,
        }
    }
}
