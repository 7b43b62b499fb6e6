//! Scenario expansion over the radio parameter matrix
//!
//! Expansion is deterministic: the same axes always give the same
//! scenarios in the same order, with duplicates removed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{FaultSchedule, RadioConfig, RadioParams, ScenarioConfig, TimeAlignmentCalibration};

/// Discrete axis values for a cross-product expansion
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioAxes {
    pub bands: Vec<u16>,
    pub common_scs: Vec<u16>,
    pub bandwidths: Vec<u16>,
    pub noise_spd: Vec<i32>,
}

/// Settings shared by every scenario of a matrix
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioTemplate {
    pub schedule: FaultSchedule,
    pub sample_rate: Option<u32>,
    pub global_timing_advance: i32,
    pub time_alignment_calibration: TimeAlignmentCalibration,
    pub enable_qos_reestablishment: bool,
}

impl ScenarioTemplate {
    pub fn new(schedule: FaultSchedule) -> Self {
        ScenarioTemplate {
            schedule,
            sample_rate: None,
            global_timing_advance: 0,
            time_alignment_calibration: TimeAlignmentCalibration::Disabled,
            enable_qos_reestablishment: true,
        }
    }

    fn radio_for(&self, params: RadioParams) -> RadioConfig {
        RadioConfig {
            params,
            sample_rate: self.sample_rate,
            global_timing_advance: self.global_timing_advance,
            time_alignment_calibration: self.time_alignment_calibration,
            enable_qos_reestablishment: self.enable_qos_reestablishment,
        }
    }
}

/// Ordered, duplicate-free set of radio points
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScenarioMatrix {
    points: Vec<RadioParams>,
}

impl ScenarioMatrix {
    /// Full cross-product. Band varies slowest, noise fastest.
    pub fn cross_product(axes: &RadioAxes) -> Self {
        let mut points = Vec::new();
        for &band in &axes.bands {
            for &scs in &axes.common_scs {
                for &bandwidth in &axes.bandwidths {
                    for &noise in &axes.noise_spd {
                        points.push(RadioParams::new(band, scs, bandwidth, noise));
                    }
                }
            }
        }
        Self::enumerated(points)
    }

    /// Explicit subset; the first occurrence of a repeated point wins
    pub fn enumerated<I>(points: I) -> Self
    where
        I: IntoIterator<Item = RadioParams>,
    {
        let mut seen = HashSet::new();
        let points = points.into_iter().filter(|p| seen.insert(*p)).collect();
        ScenarioMatrix { points }
    }

    /// The four band/noise combinations of the reestablishment suite
    pub fn reestablishment_defaults() -> Self {
        Self::enumerated([
            RadioParams::new(3, 15, 50, 0),
            RadioParams::new(41, 30, 50, 0),
            RadioParams::new(3, 15, 50, -74),
            RadioParams::new(41, 30, 50, -74),
        ])
    }

    pub fn points(&self) -> &[RadioParams] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// One independent scenario per point
    pub fn expand(&self, template: &ScenarioTemplate) -> Vec<ScenarioConfig> {
        self.points
            .iter()
            .map(|&params| ScenarioConfig::new(template.radio_for(params), template.schedule.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;

    fn template() -> ScenarioTemplate {
        ScenarioTemplate::new(
            FaultSchedule::new(Duration::from_secs(50), Duration::from_secs(10)).unwrap(),
        )
    }

    #[test]
    fn test_cross_product_ordering() {
        let axes = RadioAxes {
            bands: vec![3, 41],
            common_scs: vec![15],
            bandwidths: vec![50],
            noise_spd: vec![0, -74],
        };
        let matrix = ScenarioMatrix::cross_product(&axes);
        let ids: Vec<_> = matrix.expand(&template()).iter().map(|s| s.id().to_string()).collect();

        assert_eq!(
            ids,
            vec![
                "band:3-scs:15-bandwidth:50-noise:0",
                "band:3-scs:15-bandwidth:50-noise:-74",
                "band:41-scs:15-bandwidth:50-noise:0",
                "band:41-scs:15-bandwidth:50-noise:-74",
            ]
        );
    }

    #[test]
    fn test_cross_product_removes_duplicates() {
        let axes = RadioAxes {
            bands: vec![3, 3],
            common_scs: vec![15],
            bandwidths: vec![50, 50],
            noise_spd: vec![0],
        };
        assert_eq!(ScenarioMatrix::cross_product(&axes).len(), 1);
    }

    #[test]
    fn test_empty_axis_gives_empty_matrix() {
        let axes = RadioAxes {
            bands: vec![3],
            common_scs: vec![],
            bandwidths: vec![50],
            noise_spd: vec![0],
        };
        assert!(ScenarioMatrix::cross_product(&axes).is_empty());
    }

    #[test]
    fn test_reestablishment_defaults() {
        let matrix = ScenarioMatrix::reestablishment_defaults();
        assert_eq!(matrix.len(), 4);
        assert_eq!(matrix.points()[1], RadioParams::new(41, 30, 50, 0));

        let scenarios = matrix.expand(&template());
        assert!(scenarios.iter().all(|s| s.schedule().cycle_count() == 5));
        assert!(scenarios.iter().all(|s| s.radio().enable_qos_reestablishment));
    }

    #[test]
    fn test_template_settings_propagate() {
        let mut tpl = template();
        tpl.sample_rate = Some(23_040_000);
        tpl.time_alignment_calibration = TimeAlignmentCalibration::Auto;

        let scenarios = ScenarioMatrix::reestablishment_defaults().expand(&tpl);
        assert!(scenarios.iter().all(|s| s.radio().sample_rate == Some(23_040_000)));
        assert!(scenarios
            .iter()
            .all(|s| s.radio().time_alignment_calibration == TimeAlignmentCalibration::Auto));
    }

    fn axes_strategy() -> impl Strategy<Value = RadioAxes> {
        (
            prop::collection::vec(prop::sample::select(vec![1u16, 3, 7, 41, 78]), 0..4),
            prop::collection::vec(prop::sample::select(vec![15u16, 30]), 0..3),
            prop::collection::vec(prop::sample::select(vec![10u16, 20, 50]), 0..3),
            prop::collection::vec(prop::sample::select(vec![0i32, -74, -90]), 0..3),
        )
            .prop_map(|(bands, common_scs, bandwidths, noise_spd)| RadioAxes {
                bands,
                common_scs,
                bandwidths,
                noise_spd,
            })
    }

    proptest! {
        #[test]
        fn prop_expansion_is_idempotent(axes in axes_strategy()) {
            let first = ScenarioMatrix::cross_product(&axes).expand(&template());
            let second = ScenarioMatrix::cross_product(&axes).expand(&template());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_expansion_has_no_duplicates(axes in axes_strategy()) {
            let matrix = ScenarioMatrix::cross_product(&axes);
            let unique: HashSet<_> = matrix.points().iter().collect();
            prop_assert_eq!(unique.len(), matrix.len());

            let ids: HashSet<_> = matrix.expand(&template()).into_iter().map(|s| s.id().to_string()).collect();
            prop_assert_eq!(ids.len(), matrix.len());
        }

        #[test]
        fn prop_expansion_covers_every_combination(axes in axes_strategy()) {
            let matrix = ScenarioMatrix::cross_product(&axes);
            for &band in &axes.bands {
                for &scs in &axes.common_scs {
                    for &bw in &axes.bandwidths {
                        for &noise in &axes.noise_spd {
                            prop_assert!(matrix.points().contains(&RadioParams::new(band, scs, bw, noise)));
                        }
                    }
                }
            }
        }
    }
}
