/// The reading of a segment that is completely submerged.
pub const FULL_SEGMENT_READING: u8 = 255;

/// The summed segment readings of a sensor's tank when it is known to be full.
///
/// Used to turn raw readings into a percentage by ratio instead of estimating from the tank
/// geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Calibration {
    full_reading: u16,
}

impl Calibration {
    /// Creates a calibration from a full-tank reading. Returns `None` for a zero reading.
    pub const fn new(full_reading: u16) -> Option<Calibration> {
        if full_reading == 0 {
            None
        } else {
            Some(Calibration { full_reading })
        }
    }

    pub fn full_reading(&self) -> u16 {
        self.full_reading
    }
}

/// Looks up the calibration recorded for a sensor, if any.
pub trait CalibrationTable {
    fn get(&self, sensor_id: u8) -> Option<Calibration>;
}

/// A table with no calibration for any sensor. Every level will be estimated.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCalibration;

impl CalibrationTable for NoCalibration {
    fn get(&self, _sensor_id: u8) -> Option<Calibration> {
        None
    }
}

/// Calibrations indexed by sensor id. Ids past the end of the array are uncalibrated.
impl<const N: usize> CalibrationTable for [Option<Calibration>; N] {
    fn get(&self, sensor_id: u8) -> Option<Calibration> {
        self.as_slice().get(sensor_id as usize).copied().flatten()
    }
}

/// Converts segment readings into a tank fill percentage.
///
/// Segments are scanned from the start for the first wet one; if there is none the tank is empty.
///
/// Without a calibration, the tank is assumed to have a uniform cross-section. Every segment after
/// the first wet one is counted as full, and the first wet segment contributes the fraction of the
/// average reading of those full segments (or of [`FULL_SEGMENT_READING`] if it is the last). The
/// result is capped at 100.
///
/// With a calibration, the level is the sum of all readings relative to the full-tank reading.
/// This is not capped, so an over-full tank or a stale calibration can read above 100.
pub fn level(segments: &[u8], calibration: Option<Calibration>) -> f32 {
    let level_seg = match segments.iter().position(|segment| *segment != 0) {
        Some(index) => index,
        None => return 0.0,
    };

    match calibration {
        Some(calibration) => sum(segments) as f32 / calibration.full_reading() as f32 * 100.0,
        None => {
            let contribution_per_segment = 100.0 / segments.len() as f32;
            let full_segments = &segments[level_seg + 1..];
            let full_sum = sum(full_segments);
            // A run of dry strips above the wet one would otherwise divide by zero.
            let avg_reading_per_seg = if full_segments.is_empty() || full_sum == 0 {
                FULL_SEGMENT_READING as f32
            } else {
                full_sum as f32 / full_segments.len() as f32
            };

            let level = (segments[level_seg] as f32 / avg_reading_per_seg
                + full_segments.len() as f32)
                * contribution_per_segment;
            if level > 100.0 {
                100.0
            } else {
                level
            }
        }
    }
}

fn sum(segments: &[u8]) -> u32 {
    segments.iter().map(|segment| *segment as u32).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f32, expected: f32) {
        let diff = actual - expected;
        assert!(
            diff < 0.01 && diff > -0.01,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    macro_rules! test_level {
        ($name:ident, $segments:expr, $calibration:expr, $expected:expr) => {
            #[test]
            fn $name() {
                assert_close(level(&$segments, $calibration), $expected);
            }
        };
    }

    test_level!(empty_tank_uncalibrated, [0u8, 0, 0], None, 0.0);
    test_level!(empty_tank_calibrated, [0u8, 0, 0], Calibration::new(300), 0.0);
    test_level!(no_segments, [0u8; 0], None, 0.0);
    test_level!(
        first_segment_partially_wet,
        [200u8, 255, 255],
        None,
        (200.0 / 255.0 + 2.0) * (100.0 / 3.0)
    );
    test_level!(full_tank_uncalibrated, [255u8, 255, 255], None, 100.0);
    test_level!(
        only_last_segment_wet,
        [0u8, 0, 0, 51],
        None,
        (51.0 / 255.0) * 25.0
    );
    test_level!(
        averages_full_segments,
        [100u8, 200, 200],
        None,
        (100.0 / 200.0 + 2.0) * (100.0 / 3.0)
    );
    test_level!(
        over_reading_is_capped,
        [250u8, 100, 100],
        None,
        100.0
    );
    test_level!(
        dry_segments_after_wet_one,
        [51u8, 0, 0],
        None,
        (51.0 / 255.0 + 2.0) * (100.0 / 3.0)
    );
    test_level!(calibrated_ratio, [100u8, 50], Calibration::new(300), 50.0);
    test_level!(
        calibrated_single_segment,
        [128u8],
        Calibration::new(256),
        50.0
    );

    #[test]
    fn calibrated_level_is_not_capped() {
        // The estimated branch caps at 100 but the calibrated one does not.
        let segments = [255u8, 255];
        assert_close(level(&segments, Calibration::new(255)), 200.0);
        assert_close(level(&segments, None), 100.0);
    }

    #[test]
    fn zero_calibration_is_rejected() {
        assert_eq!(Calibration::new(0), None);
        assert_eq!(Calibration::new(1).map(|c| c.full_reading()), Some(1));
    }

    #[test]
    fn array_table_lookup() {
        let table = [None, Calibration::new(400)];
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(1), Calibration::new(400));
        assert_eq!(table.get(2), None);
    }

    #[test]
    fn no_calibration_table() {
        assert_eq!(NoCalibration.get(0), None);
        assert_eq!(NoCalibration.get(255), None);
    }
}
