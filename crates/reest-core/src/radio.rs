//! Radio and channel configuration applied before network bring-up

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One point of the radio parameter matrix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RadioParams {
    /// NR operating band
    pub band: u16,
    /// Common subcarrier spacing (kHz)
    pub common_scs: u16,
    /// Channel bandwidth (MHz)
    pub bandwidth: u16,
    /// Injected noise spectral density (dBm/Hz), 0 disables noise
    pub noise_spd: i32,
}

impl RadioParams {
    pub fn new(band: u16, common_scs: u16, bandwidth: u16, noise_spd: i32) -> Self {
        RadioParams {
            band,
            common_scs,
            bandwidth,
            noise_spd,
        }
    }

    /// Human-readable identifier encoding every axis value
    pub fn id(&self) -> String {
        format!(
            "band:{}-scs:{}-bandwidth:{}-noise:{}",
            self.band, self.common_scs, self.bandwidth, self.noise_spd
        )
    }
}

impl fmt::Display for RadioParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Time alignment calibration passed to the base station
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TimeAlignmentCalibration {
    Auto,
    Fixed(i32),
    #[default]
    Disabled,
}

impl Serialize for TimeAlignmentCalibration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TimeAlignmentCalibration::Auto => serializer.serialize_str("auto"),
            TimeAlignmentCalibration::Fixed(v) => serializer.serialize_i32(*v),
            TimeAlignmentCalibration::Disabled => serializer.serialize_i32(0),
        }
    }
}

impl<'de> Deserialize<'de> for TimeAlignmentCalibration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CalibrationVisitor;

        impl<'de> Visitor<'de> for CalibrationVisitor {
            type Value = TimeAlignmentCalibration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"auto\" or an integer sample offset")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if v.eq_ignore_ascii_case("auto") {
                    Ok(TimeAlignmentCalibration::Auto)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                let v = i32::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))?;
                Ok(TimeAlignmentCalibration::from(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                let v = i32::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))?;
                Ok(TimeAlignmentCalibration::from(v))
            }
        }

        deserializer.deserialize_any(CalibrationVisitor)
    }
}

impl From<i32> for TimeAlignmentCalibration {
    fn from(v: i32) -> Self {
        if v == 0 {
            TimeAlignmentCalibration::Disabled
        } else {
            TimeAlignmentCalibration::Fixed(v)
        }
    }
}

/// Full radio configuration bound to the testbed for one scenario
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RadioConfig {
    pub params: RadioParams,
    /// Sample rate in Hz; `None` keeps the testbed default
    pub sample_rate: Option<u32>,
    pub global_timing_advance: i32,
    pub time_alignment_calibration: TimeAlignmentCalibration,
    /// Enable QoS flows that survive reestablishment
    pub enable_qos_reestablishment: bool,
}

impl RadioConfig {
    pub fn new(params: RadioParams) -> Self {
        RadioConfig {
            params,
            sample_rate: None,
            global_timing_advance: 0,
            time_alignment_calibration: TimeAlignmentCalibration::Disabled,
            enable_qos_reestablishment: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_params_id() {
        let params = RadioParams::new(41, 30, 50, -74);
        assert_eq!(params.id(), "band:41-scs:30-bandwidth:50-noise:-74");
        assert_eq!(params.to_string(), params.id());
    }

    #[test]
    fn test_radio_config_defaults() {
        let cfg = RadioConfig::new(RadioParams::new(3, 15, 50, 0));
        assert!(cfg.enable_qos_reestablishment);
        assert_eq!(cfg.sample_rate, None);
        assert_eq!(cfg.time_alignment_calibration, TimeAlignmentCalibration::Disabled);
    }

    #[test]
    fn test_calibration_from_int() {
        assert_eq!(TimeAlignmentCalibration::from(0), TimeAlignmentCalibration::Disabled);
        assert_eq!(TimeAlignmentCalibration::from(-12), TimeAlignmentCalibration::Fixed(-12));
    }
}
