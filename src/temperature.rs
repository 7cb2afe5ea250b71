use core::fmt;

/// Signed Q12.4 fixed-point temperature in degrees Celsius, the probe's
/// native format (1 LSB = 1/16 °C).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature(i16);

impl Temperature {
    pub const FRACTIONAL_BITS: u32 = 4;

    pub const fn from_raw(raw: i16) -> Self {
        Temperature(raw)
    }

    pub const fn from_degrees(degrees: i16) -> Self {
        Temperature(degrees << Self::FRACTIONAL_BITS)
    }

    /// Tenths of a degree, truncated to the nearest sixteenth. Saturates at
    /// the ends of the Q12.4 range.
    pub const fn from_tenths(tenths: i16) -> Self {
        let raw = tenths as i32 * 16 / 10;
        if raw > i16::MAX as i32 {
            Temperature(i16::MAX)
        } else if raw < i16::MIN as i32 {
            Temperature(i16::MIN)
        } else {
            Temperature(raw as i16)
        }
    }

    pub const fn raw(self) -> i16 {
        self.0
    }

    pub fn as_celsius(self) -> f32 {
        f32::from(self.0) / 16.0
    }

    pub fn saturating_add(self, other: Temperature) -> Temperature {
        Temperature(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Temperature) -> Temperature {
        Temperature(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = i32::from(self.0);
        let sign = if raw < 0 { "-" } else { "" };
        let magnitude = raw.abs();
        write!(f, "{}{}.{:04}", sign, magnitude >> 4, (magnitude & 0xF) * 625)
    }
}
