//! Type-safe wrappers for the two physical quantities the simulator tracks
//!
//! Both serialize as bare JSON numbers so the sensor log stays flat:
//! temperatures with one decimal place, fan speeds as whole RPM.

use serde::{Deserialize, Serialize};

/// Round f64 to one decimal place for sensor output
fn round1<S: serde::Serializer>(val: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((*val * 10.0).round() / 10.0)
}

/// Truncate to whole RPM, fan tachometers do not report fractions
fn whole<S: serde::Serializer>(val: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u32(val.max(0.0) as u32)
}

/// Degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Celsius(#[serde(serialize_with = "round1")] pub f64);

impl Celsius {
    pub fn clamp(self, min: Celsius, max: Celsius) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }

    /// Value rounded the way it appears in a sensor reading
    pub fn rounded(self) -> f64 {
        (self.0 * 10.0).round() / 10.0
    }
}

/// Fan speed in revolutions per minute
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Rpm(#[serde(serialize_with = "whole")] pub f64);

impl Rpm {
    /// Clamp to `[0, max]`
    pub fn clamp(self, max: Rpm) -> Self {
        Self(self.0.clamp(0.0, max.0))
    }

    pub fn whole(self) -> u32 {
        self.0.max(0.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_celsius_serializes_with_one_decimal() {
        let json = serde_json::to_string(&Celsius(45.2345)).unwrap();
        assert_eq!(json, "45.2");
    }

    #[test]
    fn test_rpm_serializes_as_integer() {
        let json = serde_json::to_string(&Rpm(1450.9)).unwrap();
        assert_eq!(json, "1450");
    }

    #[test]
    fn test_rpm_clamp_floors_at_zero() {
        assert_eq!(Rpm(-30.0).clamp(Rpm(4800.0)), Rpm(0.0));
        assert_eq!(Rpm(5000.0).clamp(Rpm(4800.0)), Rpm(4800.0));
    }

    #[test]
    fn test_celsius_clamp() {
        let c = Celsius(99.0).clamp(Celsius(25.0), Celsius(88.0));
        assert_eq!(c, Celsius(88.0));
    }
}
